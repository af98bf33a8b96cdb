use crate::core::forces::terms::IndexMap;
use crate::core::utils::geometry::{angle, dihedral, distance, wrap_angle};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A six-term Boresch orientational restraint between a receptor and a ligand.
///
/// With receptor anchors `[r1, r2, r3]` and ligand reference atoms `[l1, l2, l3]` the restrained
/// coordinates are the distance r1-l1, the angles r2-r1-l1 and r1-l1-l2, and the dihedrals
/// r3-r2-r1-l1, r2-r1-l1-l2 and r1-l1-l2-l3. The whole energy is multiplied by the global
/// parameter named in `control_parameter`, when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoreschRestraint {
    pub receptor: [usize; 3],
    pub ligand: [usize; 3],
    /// Distance force constant in kJ/mol/nm².
    pub k_distance: f64,
    /// Angle and dihedral force constant in kJ/mol/rad².
    pub k_theta: f64,
    pub r0: f64,
    pub theta_a0: f64,
    pub theta_b0: f64,
    pub phi_a0: f64,
    pub phi_b0: f64,
    pub phi_c0: f64,
    pub control_parameter: Option<String>,
}

/// The six internal coordinates a Boresch restraint acts on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoreschGeometry {
    pub r: f64,
    pub theta_a: f64,
    pub theta_b: f64,
    pub phi_a: f64,
    pub phi_b: f64,
    pub phi_c: f64,
}

impl BoreschGeometry {
    pub fn measure(receptor: [usize; 3], ligand: [usize; 3], positions: &[Point3<f64>]) -> Self {
        let [r1, r2, r3] = receptor.map(|i| positions[i]);
        let [l1, l2, l3] = ligand.map(|i| positions[i]);
        Self {
            r: distance(&r1, &l1),
            theta_a: angle(&r2, &r1, &l1),
            theta_b: angle(&r1, &l1, &l2),
            phi_a: dihedral(&r3, &r2, &r1, &l1),
            phi_b: dihedral(&r2, &r1, &l1, &l2),
            phi_c: dihedral(&r1, &l1, &l2, &l3),
        }
    }
}

impl BoreschRestraint {
    /// Creates a restraint whose equilibrium values are the geometry found in `positions`.
    pub fn from_positions(
        receptor: [usize; 3],
        ligand: [usize; 3],
        positions: &[Point3<f64>],
        k_distance: f64,
        k_theta: f64,
        control_parameter: Option<String>,
    ) -> Self {
        let g = BoreschGeometry::measure(receptor, ligand, positions);
        Self {
            receptor,
            ligand,
            k_distance,
            k_theta,
            r0: g.r,
            theta_a0: g.theta_a,
            theta_b0: g.theta_b,
            phi_a0: g.phi_a,
            phi_b0: g.phi_b,
            phi_c0: g.phi_c,
            control_parameter,
        }
    }

    pub fn atoms(&self) -> [usize; 6] {
        let [r1, r2, r3] = self.receptor;
        let [l1, l2, l3] = self.ligand;
        [r1, r2, r3, l1, l2, l3]
    }

    pub fn energy(&self, positions: &[Point3<f64>], parameters: &BTreeMap<String, f64>) -> f64 {
        let scale = self
            .control_parameter
            .as_ref()
            .map_or(1.0, |p| parameters.get(p).copied().unwrap_or(1.0));
        if scale == 0.0 {
            return 0.0;
        }
        let g = BoreschGeometry::measure(self.receptor, self.ligand, positions);
        let dr = g.r - self.r0;
        let angular = [
            g.theta_a - self.theta_a0,
            g.theta_b - self.theta_b0,
            wrap_angle(g.phi_a - self.phi_a0),
            wrap_angle(g.phi_b - self.phi_b0),
            wrap_angle(g.phi_c - self.phi_c0),
        ]
        .iter()
        .map(|d| d * d)
        .sum::<f64>();
        scale * 0.5 * (self.k_distance * dr * dr + self.k_theta * angular)
    }

    pub(crate) fn remap(&self, map: IndexMap<'_>) -> Option<Self> {
        let [r1, r2, r3] = self.receptor;
        let [l1, l2, l3] = self.ligand;
        Some(Self {
            receptor: [map(r1)?, map(r2)?, map(r3)?],
            ligand: [map(l1)?, map(l2)?, map(l3)?],
            control_parameter: self.control_parameter.clone(),
            ..*self
        })
    }
}
