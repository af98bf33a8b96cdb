use super::GeometryError;
use crate::core::models::atom::Atom;
use crate::core::utils::geometry::{angle, centroid, distance};
use nalgebra::Point3;
use std::cmp::Ordering;

/// Accepted range for the angle spanned by a reference triplet, in degrees.
const MIN_TRIPLET_ANGLE: f64 = 30.0;
const MAX_TRIPLET_ANGLE: f64 = 150.0;

/// Chooses three heavy atoms of a ligand to serve as its reference frame.
///
/// The middle atom of the returned triplet is the heavy atom closest to the heavy-atom centroid.
/// The outer two are the closest pair of heavy atoms to it that span a non-collinear angle.
/// Indices refer to `atoms`/`positions`, which must be parallel.
pub fn select_ligand_idxs(
    atoms: &[Atom],
    positions: &[Point3<f64>],
) -> Result<[usize; 3], GeometryError> {
    if atoms.len() != positions.len() {
        return Err(GeometryError::PositionCount {
            atoms: atoms.len(),
            positions: positions.len(),
        });
    }
    let heavy: Vec<usize> = atoms
        .iter()
        .enumerate()
        .filter(|(_, a)| a.is_heavy())
        .map(|(i, _)| i)
        .collect();
    if heavy.len() < 3 {
        return Err(GeometryError::TooFewHeavyAtoms { found: heavy.len() });
    }

    let heavy_positions: Vec<_> = heavy.iter().map(|&i| positions[i]).collect();
    let center = centroid(&heavy_positions).ok_or(GeometryError::EmptySelection)?;
    let by_distance_to = |point: Point3<f64>| {
        move |a: &usize, b: &usize| {
            distance(&positions[*a], &point)
                .partial_cmp(&distance(&positions[*b], &point))
                .unwrap_or(Ordering::Equal)
        }
    };

    let central = heavy
        .iter()
        .copied()
        .min_by(by_distance_to(center))
        .ok_or(GeometryError::EmptySelection)?;
    let mut others: Vec<usize> = heavy.into_iter().filter(|&i| i != central).collect();
    others.sort_by(by_distance_to(positions[central]));

    let window = MIN_TRIPLET_ANGLE.to_radians()..=MAX_TRIPLET_ANGLE.to_radians();
    for (n, &first) in others.iter().enumerate() {
        for &second in &others[n + 1..] {
            let theta = angle(&positions[first], &positions[central], &positions[second]);
            if window.contains(&theta) {
                return Ok([first, central, second]);
            }
        }
    }
    Err(GeometryError::DegenerateLigand)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn benzene() -> (Vec<Atom>, Vec<Point3<f64>>) {
        let mut atoms = Vec::new();
        let mut positions = Vec::new();
        for k in 0..6 {
            let phi = (k as f64 * 60.0).to_radians();
            atoms.push(Atom::new(&format!("C{}", k + 1), "C"));
            positions.push(Point3::new(0.14 * phi.cos(), 0.14 * phi.sin(), 0.0));
        }
        for k in 0..6 {
            let phi = (k as f64 * 60.0).to_radians();
            atoms.push(Atom::new(&format!("H{}", k + 1), "H"));
            positions.push(Point3::new(0.248 * phi.cos(), 0.248 * phi.sin(), 0.0));
        }
        (atoms, positions)
    }

    #[test]
    fn benzene_triplet_is_a_ring_carbon_and_its_ring_neighbours() {
        let (atoms, positions) = benzene();
        let [a, b, c] = select_ligand_idxs(&atoms, &positions).unwrap();
        assert!(b < 6);
        let mut flanks = [a, c];
        flanks.sort();
        let mut expected = [(b + 1) % 6, (b + 5) % 6];
        expected.sort();
        assert_eq!(flanks, expected);
    }

    #[test]
    fn triplet_never_contains_hydrogens() {
        let (atoms, positions) = benzene();
        let triplet = select_ligand_idxs(&atoms, &positions).unwrap();
        assert!(triplet.iter().all(|&i| atoms[i].is_heavy()));
    }

    #[test]
    fn fewer_than_three_heavy_atoms_is_an_error() {
        let atoms = vec![Atom::new("O", "O"), Atom::new("H1", "H"), Atom::new("H2", "H")];
        let positions = vec![Point3::origin(); 3];
        assert_eq!(
            select_ligand_idxs(&atoms, &positions),
            Err(GeometryError::TooFewHeavyAtoms { found: 1 })
        );
    }

    #[test]
    fn mismatched_positions_are_rejected() {
        let (atoms, positions) = benzene();
        assert_eq!(
            select_ligand_idxs(&atoms, &positions[..5]),
            Err(GeometryError::PositionCount {
                atoms: 12,
                positions: 5
            })
        );
    }

    #[test]
    fn linear_molecule_is_degenerate() {
        let atoms = (0..4).map(|i| Atom::new(&format!("C{i}"), "C")).collect::<Vec<_>>();
        let positions = (0..4)
            .map(|i| Point3::new(0.12 * i as f64, 0.0, 0.0))
            .collect::<Vec<_>>();
        assert_eq!(
            select_ligand_idxs(&atoms, &positions),
            Err(GeometryError::DegenerateLigand)
        );
    }
}
