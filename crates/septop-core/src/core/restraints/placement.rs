use super::{GeometryError, check_indices};
use crate::core::forces::terms::BondTerm;
use crate::core::forces::{Force, ForceKind};
use crate::core::utils::geometry::{centroid, distance, kabsch_superposition, max_radius};
use nalgebra::{Point3, Vector3};

pub const ALIGNMENT_RESTRAINT_NAME: &str = "alignment_restraint";

/// Superimposes a whole frame onto a reference using matching backbone selections.
///
/// Returns every position of `mobile` transformed by the rigid motion that best maps its
/// backbone atoms onto the reference backbone atoms.
pub fn superpose_on_backbone(
    mobile: &[Point3<f64>],
    mobile_backbone: &[usize],
    reference: &[Point3<f64>],
    reference_backbone: &[usize],
) -> Result<Vec<Point3<f64>>, GeometryError> {
    if mobile_backbone.len() != reference_backbone.len() {
        return Err(GeometryError::BackboneMismatch {
            reference: reference_backbone.len(),
            mobile: mobile_backbone.len(),
        });
    }
    check_indices(mobile_backbone, mobile.len())?;
    check_indices(reference_backbone, reference.len())?;

    let mobile_sel: Vec<_> = mobile_backbone.iter().map(|&i| mobile[i]).collect();
    let reference_sel: Vec<_> = reference_backbone.iter().map(|&i| reference[i]).collect();
    let transform = kabsch_superposition(&mobile_sel, &reference_sel).ok_or_else(|| {
        GeometryError::Superposition(format!(
            "could not superpose {} backbone atoms",
            mobile_sel.len()
        ))
    })?;
    Ok(mobile.iter().map(|p| transform * p).collect())
}

/// Separation between the two ligand centers in the solvent leg, in nm.
///
/// The ligands are kept 1.5 times the sum of their radii apart, but never more than half the
/// shortest box edge so that they do not approach each other's periodic images.
pub fn ligand_separation(
    ligand_a: &[Point3<f64>],
    ligand_b: &[Point3<f64>],
    box_edges: Option<Vector3<f64>>,
) -> Result<f64, GeometryError> {
    let radius_a = max_radius(ligand_a).ok_or(GeometryError::EmptySelection)?;
    let radius_b = max_radius(ligand_b).ok_or(GeometryError::EmptySelection)?;
    let separation = 1.5 * (radius_a + radius_b);
    Ok(match box_edges {
        Some(edges) => separation.min(0.5 * edges.min()),
        None => separation,
    })
}

/// Translation that moves ligand B's center to ligand A's center shifted along +x by
/// [`ligand_separation`].
pub fn solvent_offset(
    ligand_a: &[Point3<f64>],
    ligand_b: &[Point3<f64>],
    box_edges: Option<Vector3<f64>>,
) -> Result<Vector3<f64>, GeometryError> {
    let center_a = centroid(ligand_a).ok_or(GeometryError::EmptySelection)?;
    let center_b = centroid(ligand_b).ok_or(GeometryError::EmptySelection)?;
    let separation = ligand_separation(ligand_a, ligand_b, box_edges)?;
    Ok(center_a - center_b + Vector3::new(separation, 0.0, 0.0))
}

/// A harmonic bond holding the central atoms of the two ligands at their current distance.
///
/// The restraint is always active: it carries no lambda control parameter.
pub fn alignment_restraint(
    positions: &[Point3<f64>],
    central_a: usize,
    central_b: usize,
    k_distance: f64,
) -> Result<Force, GeometryError> {
    check_indices(&[central_a, central_b], positions.len())?;
    let length = distance(&positions[central_a], &positions[central_b]);
    Ok(Force::new(
        ALIGNMENT_RESTRAINT_NAME,
        ForceKind::HarmonicBond {
            terms: vec![BondTerm {
                atoms: [central_a, central_b],
                length,
                k: k_distance,
            }],
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::geometry::{calculate_rmsd, rotation_from_axis_angle};
    use std::collections::BTreeMap;

    fn triangle(offset: Vector3<f64>) -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0) + offset,
            Point3::new(0.2, 0.0, 0.0) + offset,
            Point3::new(0.0, 0.2, 0.0) + offset,
        ]
    }

    #[test]
    fn superposition_moves_whole_frame_onto_reference_backbone() {
        let reference = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.38, 0.0, 0.0),
            Point3::new(0.5, 0.35, 0.1),
            Point3::new(0.9, 0.4, -0.2),
            Point3::new(0.3, 0.3, 1.0),
        ];
        let rotation = rotation_from_axis_angle(&Vector3::new(1.0, 2.0, 0.5), 140.0);
        let mobile: Vec<_> = reference
            .iter()
            .map(|p| rotation * p + Vector3::new(3.0, 1.0, -2.0))
            .collect();
        let backbone = [0, 1, 2, 3];

        let aligned = superpose_on_backbone(&mobile, &backbone, &reference, &backbone).unwrap();
        assert!(calculate_rmsd(&aligned, &reference).unwrap() < 1e-8);
    }

    #[test]
    fn superposition_requires_matching_selection_sizes() {
        let frame = triangle(Vector3::zeros());
        assert_eq!(
            superpose_on_backbone(&frame, &[0, 1], &frame, &[0, 1, 2]),
            Err(GeometryError::BackboneMismatch {
                reference: 3,
                mobile: 2
            })
        );
    }

    #[test]
    fn separation_is_capped_by_half_the_shortest_box_edge() {
        let a = triangle(Vector3::zeros());
        let b = triangle(Vector3::new(5.0, 0.0, 0.0));
        let uncapped = ligand_separation(&a, &b, None).unwrap();
        let radius = max_radius(&a).unwrap();
        assert!((uncapped - 3.0 * radius).abs() < 1e-12);

        let edges = Vector3::new(4.0, 0.3, 5.0);
        let capped = ligand_separation(&a, &b, Some(edges)).unwrap();
        assert!((capped - 0.15).abs() < 1e-12);
    }

    #[test]
    fn offset_places_ligand_b_along_x_from_ligand_a() {
        let a = triangle(Vector3::new(1.0, 1.0, 1.0));
        let b = triangle(Vector3::new(-2.0, 0.5, 3.0));
        let offset = solvent_offset(&a, &b, None).unwrap();
        let moved: Vec<_> = b.iter().map(|p| p + offset).collect();
        let delta = centroid(&moved).unwrap() - centroid(&a).unwrap();
        let separation = ligand_separation(&a, &b, None).unwrap();
        assert!((delta - Vector3::new(separation, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn alignment_restraint_is_at_rest_for_current_positions() {
        let positions = triangle(Vector3::zeros());
        let force = alignment_restraint(&positions, 0, 2, 1000.0).unwrap();
        assert_eq!(force.name, ALIGNMENT_RESTRAINT_NAME);
        assert!(force.kind.controlling_parameters().is_empty());
        assert!(force.energy(&positions, &BTreeMap::new()).abs() < 1e-12);
        assert!(alignment_restraint(&positions, 0, 7, 1000.0).is_err());
    }
}
