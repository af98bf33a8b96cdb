//! Standard molecular-mechanics terms and their energies.
//!
//! Units: nm, radians, kJ/mol and elementary charges.

use crate::core::utils::geometry::{angle, dihedral, distance};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Coulomb constant 1/(4πε₀) in kJ·nm/(mol·e²).
pub const ONE_4PI_EPS0: f64 = 138.935456;

pub(crate) type IndexMap<'a> = &'a dyn Fn(usize) -> Option<usize>;

fn remap_all<const N: usize>(atoms: [usize; N], map: IndexMap<'_>) -> Option<[usize; N]> {
    let mut out = [0; N];
    for (slot, &atom) in out.iter_mut().zip(atoms.iter()) {
        *slot = map(atom)?;
    }
    Some(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BondTerm {
    pub atoms: [usize; 2],
    pub length: f64,
    pub k: f64,
}

impl BondTerm {
    pub fn energy(&self, positions: &[Point3<f64>]) -> f64 {
        let [i, j] = self.atoms;
        let dr = distance(&positions[i], &positions[j]) - self.length;
        0.5 * self.k * dr * dr
    }

    pub(crate) fn remap(&self, map: IndexMap<'_>) -> Option<Self> {
        Some(Self {
            atoms: remap_all(self.atoms, map)?,
            ..*self
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleTerm {
    pub atoms: [usize; 3],
    pub theta: f64,
    pub k: f64,
}

impl AngleTerm {
    pub fn energy(&self, positions: &[Point3<f64>]) -> f64 {
        let [i, j, k] = self.atoms;
        let dtheta = angle(&positions[i], &positions[j], &positions[k]) - self.theta;
        0.5 * self.k * dtheta * dtheta
    }

    pub(crate) fn remap(&self, map: IndexMap<'_>) -> Option<Self> {
        Some(Self {
            atoms: remap_all(self.atoms, map)?,
            ..*self
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TorsionTerm {
    pub atoms: [usize; 4],
    pub periodicity: u32,
    pub phase: f64,
    pub k: f64,
}

impl TorsionTerm {
    pub fn energy(&self, positions: &[Point3<f64>]) -> f64 {
        let [i, j, k, l] = self.atoms;
        let phi = dihedral(&positions[i], &positions[j], &positions[k], &positions[l]);
        self.k * (1.0 + (self.periodicity as f64 * phi - self.phase).cos())
    }

    pub(crate) fn remap(&self, map: IndexMap<'_>) -> Option<Self> {
        Some(Self {
            atoms: remap_all(self.atoms, map)?,
            ..*self
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NonbondedParticle {
    pub charge: f64,
    pub sigma: f64,
    pub epsilon: f64,
}

impl NonbondedParticle {
    /// A particle that neither carries charge nor takes part in dispersion.
    pub const fn neutral() -> Self {
        Self {
            charge: 0.0,
            sigma: 0.1,
            epsilon: 0.0,
        }
    }

    pub fn is_interacting(&self) -> bool {
        self.charge != 0.0 || self.epsilon != 0.0
    }
}

/// Explicit pair parameters replacing the combination rule for one atom pair.
///
/// A zero charge product and zero epsilon excludes the pair entirely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NonbondedException {
    pub atoms: [usize; 2],
    pub charge_product: f64,
    pub sigma: f64,
    pub epsilon: f64,
}

impl NonbondedException {
    pub fn exclusion(i: usize, j: usize) -> Self {
        Self {
            atoms: [i, j],
            charge_product: 0.0,
            sigma: 0.1,
            epsilon: 0.0,
        }
    }

    pub fn involves(&self, i: usize, j: usize) -> bool {
        self.atoms == [i, j] || self.atoms == [j, i]
    }
}

pub fn lennard_jones(r: f64, sigma: f64, epsilon: f64) -> f64 {
    let sr6 = (sigma / r).powi(6);
    4.0 * epsilon * (sr6 * sr6 - sr6)
}

pub fn coulomb(r: f64, charge_product: f64) -> f64 {
    ONE_4PI_EPS0 * charge_product / r
}

/// Lorentz-Berthelot combination of two particles' dispersion parameters.
pub fn combine(a: &NonbondedParticle, b: &NonbondedParticle) -> (f64, f64) {
    (0.5 * (a.sigma + b.sigma), (a.epsilon * b.epsilon).sqrt())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NonbondedForce {
    pub particles: Vec<NonbondedParticle>,
    pub exceptions: Vec<NonbondedException>,
    /// Direct-space cutoff in nm; `None` evaluates every pair.
    pub cutoff: Option<f64>,
}

impl NonbondedForce {
    pub fn new(particles: Vec<NonbondedParticle>, cutoff: Option<f64>) -> Self {
        Self {
            particles,
            exceptions: Vec::new(),
            cutoff,
        }
    }

    pub fn exception_for(&self, i: usize, j: usize) -> Option<&NonbondedException> {
        self.exceptions.iter().find(|e| e.involves(i, j))
    }

    pub fn energy(&self, positions: &[Point3<f64>]) -> f64 {
        let mut total = 0.0;
        let n = self.particles.len();
        for i in 0..n {
            for j in (i + 1)..n {
                if self.exception_for(i, j).is_some() {
                    continue;
                }
                let r = distance(&positions[i], &positions[j]);
                if self.cutoff.is_some_and(|c| r >= c) {
                    continue;
                }
                let (a, b) = (&self.particles[i], &self.particles[j]);
                let (sigma, epsilon) = combine(a, b);
                total += lennard_jones(r, sigma, epsilon) + coulomb(r, a.charge * b.charge);
            }
        }
        for e in &self.exceptions {
            let [i, j] = e.atoms;
            let r = distance(&positions[i], &positions[j]);
            total += lennard_jones(r, e.sigma, e.epsilon) + coulomb(r, e.charge_product);
        }
        total
    }

    /// Restricts the force to `atoms` (new index = position in `atoms`).
    pub(crate) fn subset(&self, atoms: &[usize], map: IndexMap<'_>) -> Self {
        Self {
            particles: atoms
                .iter()
                .map(|&i| self.particles.get(i).copied().unwrap_or(NonbondedParticle::neutral()))
                .collect(),
            exceptions: self
                .exceptions
                .iter()
                .filter_map(|e| {
                    Some(NonbondedException {
                        atoms: remap_all(e.atoms, map)?,
                        ..*e
                    })
                })
                .collect(),
            cutoff: self.cutoff,
        }
    }

    /// Appends the particles and exceptions of `other`, whose atoms start at `offset`.
    pub(crate) fn extend_from(&mut self, other: &NonbondedForce, offset: usize) {
        self.pad_to(offset);
        self.particles.extend(other.particles.iter().copied());
        self.exceptions.extend(other.exceptions.iter().map(|e| NonbondedException {
            atoms: [e.atoms[0] + offset, e.atoms[1] + offset],
            ..*e
        }));
    }

    pub(crate) fn pad_to(&mut self, n_particles: usize) {
        if self.particles.len() < n_particles {
            self.particles
                .resize(n_particles, NonbondedParticle::neutral());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn bond_energy_is_harmonic_in_displacement() {
        let bond = BondTerm {
            atoms: [0, 1],
            length: 0.1,
            k: 1000.0,
        };
        let positions = [Point3::origin(), Point3::new(0.2, 0.0, 0.0)];
        assert!((bond.energy(&positions) - 5.0).abs() < TOLERANCE);
    }

    #[test]
    fn torsion_energy_peaks_at_phase_aligned_dihedral() {
        let torsion = TorsionTerm {
            atoms: [0, 1, 2, 3],
            periodicity: 1,
            phase: 0.0,
            k: 2.0,
        };
        let cis = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::origin(),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
        ];
        assert!((torsion.energy(&cis) - 4.0).abs() < TOLERANCE);
    }

    #[test]
    fn lennard_jones_minimum_is_minus_epsilon() {
        let sigma: f64 = 0.3;
        let r_min = 2f64.powf(1.0 / 6.0) * sigma;
        assert!((lennard_jones(r_min, sigma, 0.5) + 0.5).abs() < TOLERANCE);
        assert!(lennard_jones(sigma, sigma, 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn nonbonded_energy_skips_excluded_pairs_and_respects_cutoff() {
        let particle = NonbondedParticle {
            charge: 1.0,
            sigma: 0.3,
            epsilon: 0.5,
        };
        let positions = [Point3::origin(), Point3::new(0.5, 0.0, 0.0)];
        let mut force = NonbondedForce::new(vec![particle, particle], None);
        let expected = lennard_jones(0.5, 0.3, 0.5) + coulomb(0.5, 1.0);
        assert!((force.energy(&positions) - expected).abs() < TOLERANCE);

        force.cutoff = Some(0.4);
        assert_eq!(force.energy(&positions), 0.0);

        force.cutoff = None;
        force.exceptions.push(NonbondedException::exclusion(1, 0));
        assert_eq!(force.energy(&positions), 0.0);
    }

    #[test]
    fn subset_keeps_particles_in_requested_order_and_remaps_exceptions() {
        let particles = (0..3)
            .map(|i| NonbondedParticle {
                charge: i as f64,
                sigma: 0.3,
                epsilon: 0.1,
            })
            .collect();
        let mut force = NonbondedForce::new(particles, Some(1.0));
        force.exceptions.push(NonbondedException::exclusion(1, 2));
        force.exceptions.push(NonbondedException::exclusion(0, 1));

        let atoms = [2, 1];
        let map = |i: usize| atoms.iter().position(|&a| a == i);
        let sub = force.subset(&atoms, &map);
        assert_eq!(sub.particles.len(), 2);
        assert_eq!(sub.particles[0].charge, 2.0);
        assert_eq!(sub.exceptions.len(), 1);
        assert!(sub.exceptions[0].involves(0, 1));
    }

    #[test]
    fn extend_from_pads_missing_particles_and_offsets_exceptions() {
        let mut host = NonbondedForce::new(vec![NonbondedParticle::neutral()], None);
        let mut guest = NonbondedForce::new(vec![NonbondedParticle::neutral(); 2], None);
        guest.exceptions.push(NonbondedException::exclusion(0, 1));
        host.extend_from(&guest, 3);
        assert_eq!(host.particles.len(), 5);
        assert_eq!(host.exceptions[0].atoms, [3, 4]);
    }
}
