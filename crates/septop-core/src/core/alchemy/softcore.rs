use super::{LambdaKind, lambda_parameter};
use crate::core::forces::terms::{IndexMap, NonbondedParticle, coulomb, combine, lennard_jones};
use crate::core::utils::geometry::distance;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionInteraction {
    /// Region atoms against every atom outside all alchemical regions; lambda-scaled.
    Environment,
    /// Region atoms against each other; never scaled.
    Intra,
}

/// Nonbonded interactions of one alchemical region.
///
/// Sterics use a Beutler soft-core Lennard-Jones form so that the potential stays finite as
/// `lambda_sterics` goes to zero; electrostatics are scaled linearly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlchemicalNonbonded {
    pub region: String,
    pub interaction: RegionInteraction,
    pub region_atoms: Vec<usize>,
    /// Partner atoms for [`RegionInteraction::Environment`]; unused for intra-region terms.
    pub environment_atoms: Vec<usize>,
    /// Nonbonded parameters for every particle of the system.
    pub particles: Vec<NonbondedParticle>,
    /// Atom pairs whose interaction is handled by explicit exceptions elsewhere.
    pub excluded_pairs: Vec<[usize; 2]>,
    pub cutoff: Option<f64>,
    pub softcore_alpha: f64,
}

impl AlchemicalNonbonded {
    pub fn controlling_parameters(&self) -> Vec<String> {
        match self.interaction {
            RegionInteraction::Environment => vec![
                lambda_parameter(LambdaKind::Electrostatics, &self.region),
                lambda_parameter(LambdaKind::Sterics, &self.region),
            ],
            RegionInteraction::Intra => Vec::new(),
        }
    }

    fn is_excluded(&self, i: usize, j: usize) -> bool {
        self.excluded_pairs
            .iter()
            .any(|&p| p == [i, j] || p == [j, i])
    }

    fn pairs(&self) -> Vec<(usize, usize)> {
        match self.interaction {
            RegionInteraction::Environment => self
                .region_atoms
                .iter()
                .flat_map(|&i| self.environment_atoms.iter().map(move |&j| (i, j)))
                .collect(),
            RegionInteraction::Intra => self
                .region_atoms
                .iter()
                .enumerate()
                .flat_map(|(n, &i)| self.region_atoms[n + 1..].iter().map(move |&j| (i, j)))
                .collect(),
        }
    }

    fn softcore_lennard_jones(&self, r: f64, sigma: f64, epsilon: f64, lambda: f64) -> f64 {
        if lambda >= 1.0 {
            return lennard_jones(r, sigma, epsilon);
        }
        let x = self.softcore_alpha * (1.0 - lambda) + (r / sigma).powi(6);
        4.0 * epsilon * lambda * (1.0 / (x * x) - 1.0 / x)
    }

    pub fn energy(&self, positions: &[Point3<f64>], parameters: &BTreeMap<String, f64>) -> f64 {
        let (lambda_elec, lambda_sterics) = match self.interaction {
            RegionInteraction::Environment => {
                let get = |kind| {
                    parameters
                        .get(&lambda_parameter(kind, &self.region))
                        .copied()
                        .unwrap_or(1.0)
                };
                (get(LambdaKind::Electrostatics), get(LambdaKind::Sterics))
            }
            RegionInteraction::Intra => (1.0, 1.0),
        };

        self.pairs()
            .into_iter()
            .filter(|&(i, j)| !self.is_excluded(i, j))
            .map(|(i, j)| {
                let r = distance(&positions[i], &positions[j]);
                if self.cutoff.is_some_and(|c| r >= c) {
                    return 0.0;
                }
                let (a, b) = (&self.particles[i], &self.particles[j]);
                let (sigma, epsilon) = combine(a, b);
                self.softcore_lennard_jones(r, sigma, epsilon, lambda_sterics)
                    + lambda_elec * coulomb(r, a.charge * b.charge)
            })
            .sum()
    }

    pub(crate) fn remap(&self, map: IndexMap<'_>) -> Option<Self> {
        let region_atoms = self
            .region_atoms
            .iter()
            .map(|&i| map(i))
            .collect::<Option<Vec<_>>>()?;
        let environment_atoms = self.environment_atoms.iter().filter_map(|&i| map(i)).collect();
        let mut particles = Vec::new();
        for (old, particle) in self.particles.iter().enumerate() {
            if let Some(new) = map(old) {
                if particles.len() <= new {
                    particles.resize(new + 1, NonbondedParticle::neutral());
                }
                particles[new] = *particle;
            }
        }
        let excluded_pairs = self
            .excluded_pairs
            .iter()
            .filter_map(|&[i, j]| Some([map(i)?, map(j)?]))
            .collect();
        Some(Self {
            region: self.region.clone(),
            interaction: self.interaction,
            region_atoms,
            environment_atoms,
            particles,
            excluded_pairs,
            cutoff: self.cutoff,
            softcore_alpha: self.softcore_alpha,
        })
    }
}
