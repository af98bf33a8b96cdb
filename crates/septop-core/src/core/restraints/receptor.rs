use super::GeometryError;
use crate::core::utils::geometry::{angle, distance};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Geometric requirements on receptor anchor atoms `[r1, r2, r3]`.
///
/// Distances are in nm and angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnchorCriteria {
    /// Allowed r1-l1 distance window.
    pub min_distance: f64,
    pub max_distance: f64,
    /// Minimum pairwise distance between the three receptor anchors.
    pub min_separation: f64,
    /// Allowed window for the angles r2-r1-l1, r1-l1-l2 and r3-r2-r1.
    pub min_angle: f64,
    pub max_angle: f64,
    /// Only this many candidates closest to l1 are searched.
    pub max_candidates: usize,
}

impl Default for AnchorCriteria {
    fn default() -> Self {
        Self {
            min_distance: 0.5,
            max_distance: 1.5,
            min_separation: 0.3,
            min_angle: 30.0,
            max_angle: 150.0,
            max_candidates: 50,
        }
    }
}

impl AnchorCriteria {
    fn angle_ok(&self, theta: f64) -> bool {
        (self.min_angle.to_radians()..=self.max_angle.to_radians()).contains(&theta)
    }

    fn distance_ok(&self, r: f64) -> bool {
        (self.min_distance..=self.max_distance).contains(&r)
    }
}

/// Whether `receptor` is a valid anchor triplet for the ligand reference atoms `ligand`.
///
/// Out-of-range indices make the triplet invalid rather than raising an error.
pub fn check_receptor_idxs(
    positions: &[Point3<f64>],
    receptor: [usize; 3],
    ligand: [usize; 3],
    criteria: &AnchorCriteria,
) -> bool {
    if receptor
        .iter()
        .chain(ligand.iter())
        .any(|&i| i >= positions.len())
    {
        return false;
    }
    let [r1, r2, r3] = receptor.map(|i| positions[i]);
    let [l1, l2, _] = ligand.map(|i| positions[i]);
    let [i1, i2, i3] = receptor;
    i1 != i2
        && i2 != i3
        && i1 != i3
        && criteria.distance_ok(distance(&r1, &l1))
        && distance(&r1, &r2) >= criteria.min_separation
        && distance(&r2, &r3) >= criteria.min_separation
        && distance(&r1, &r3) >= criteria.min_separation
        && criteria.angle_ok(angle(&r2, &r1, &l1))
        && criteria.angle_ok(angle(&r1, &l1, &l2))
        && criteria.angle_ok(angle(&r3, &r2, &r1))
}

/// Selects receptor anchors `[r1, r2, r3]` from `candidates` for the ligand reference atoms.
///
/// Candidates are searched in order of increasing distance from l1 (ties by index), so the
/// first valid triplet favours anchors close to the ligand.
pub fn select_receptor_idxs(
    positions: &[Point3<f64>],
    candidates: &[usize],
    ligand: [usize; 3],
    criteria: &AnchorCriteria,
) -> Result<[usize; 3], GeometryError> {
    super::check_indices(candidates, positions.len())?;
    super::check_indices(&ligand, positions.len())?;
    let l1 = positions[ligand[0]];

    let mut pool: Vec<(f64, usize)> = candidates
        .iter()
        .map(|&i| (distance(&positions[i], &l1), i))
        .filter(|&(r, _)| criteria.distance_ok(r))
        .collect();
    pool.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    pool.truncate(criteria.max_candidates);
    let pool: Vec<usize> = pool.into_iter().map(|(_, i)| i).collect();
    debug!(
        n_candidates = candidates.len(),
        n_in_window = pool.len(),
        "Searching receptor anchor triplets."
    );

    for &r1 in &pool {
        for &r2 in &pool {
            if r2 == r1 {
                continue;
            }
            for &r3 in &pool {
                if check_receptor_idxs(positions, [r1, r2, r3], ligand, criteria) {
                    return Ok([r1, r2, r3]);
                }
            }
        }
    }
    Err(GeometryError::NoReceptorAnchors {
        ligand_atom: ligand[0],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // A zig-zag backbone along x at z = 0 and a ligand above it.
    fn frame() -> (Vec<Point3<f64>>, Vec<usize>, [usize; 3]) {
        let mut positions: Vec<Point3<f64>> = (0..12)
            .map(|i| {
                let y = if i % 2 == 0 { 0.0 } else { 0.25 };
                Point3::new(-1.0 + 0.2 * i as f64, y, 0.0)
            })
            .collect();
        let backbone: Vec<usize> = (0..12).collect();
        positions.push(Point3::new(0.1, 0.1, 0.8));
        positions.push(Point3::new(0.25, 0.1, 0.85));
        positions.push(Point3::new(0.3, 0.25, 0.9));
        (positions, backbone, [12, 13, 14])
    }

    #[test]
    fn selected_anchors_pass_the_validity_check() {
        let (positions, backbone, ligand) = frame();
        let criteria = AnchorCriteria::default();
        let anchors = select_receptor_idxs(&positions, &backbone, ligand, &criteria).unwrap();
        assert!(check_receptor_idxs(&positions, anchors, ligand, &criteria));
        assert!(anchors.iter().all(|i| backbone.contains(i)));
    }

    #[test]
    fn selection_is_deterministic() {
        let (positions, backbone, ligand) = frame();
        let criteria = AnchorCriteria::default();
        let first = select_receptor_idxs(&positions, &backbone, ligand, &criteria).unwrap();
        let mut reversed = backbone.clone();
        reversed.reverse();
        let second = select_receptor_idxs(&positions, &reversed, ligand, &criteria).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn no_candidates_in_distance_window_is_an_error() {
        let (positions, backbone, ligand) = frame();
        let criteria = AnchorCriteria {
            min_distance: 5.0,
            max_distance: 6.0,
            ..AnchorCriteria::default()
        };
        assert_eq!(
            select_receptor_idxs(&positions, &backbone, ligand, &criteria),
            Err(GeometryError::NoReceptorAnchors { ligand_atom: 12 })
        );
    }

    #[test]
    fn check_rejects_duplicate_and_out_of_range_anchors() {
        let (positions, _, ligand) = frame();
        let criteria = AnchorCriteria::default();
        assert!(!check_receptor_idxs(&positions, [3, 3, 6], ligand, &criteria));
        assert!(!check_receptor_idxs(&positions, [3, 5, 99], ligand, &criteria));
    }

    #[test]
    fn out_of_range_candidates_are_reported() {
        let (positions, _, ligand) = frame();
        assert_eq!(
            select_receptor_idxs(&positions, &[0, 42], ligand, &AnchorCriteria::default()),
            Err(GeometryError::IndexOutOfRange {
                index: 42,
                n_atoms: 15
            })
        );
    }
}
