//! # Forces Module
//!
//! A backend-neutral description of a parameterized simulation system: per-particle masses plus
//! a list of named forces. The simulation backend produces these systems; the orchestration
//! layer merges them, adds restraints, makes them alchemical and assigns force groups.
//!
//! Energies are evaluated directly (no periodic imaging, no reciprocal space) and serve for
//! checking restraint and alchemical-parameter behavior, not for production sampling.

pub mod groups;
pub mod terms;

use crate::core::alchemy::softcore::AlchemicalNonbonded;
use crate::core::restraints::boresch::BoreschRestraint;
use groups::ForceGroup;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use terms::{AngleTerm, BondTerm, IndexMap, NonbondedForce, TorsionTerm};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForceError {
    #[error("Atom index {index} is out of range for a system of {n_particles} particles")]
    IndexOutOfRange { index: usize, n_particles: usize },

    #[error("Expected {expected} positions but received {found}")]
    PositionCount { expected: usize, found: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ForceKind {
    HarmonicBond { terms: Vec<BondTerm> },
    HarmonicAngle { terms: Vec<AngleTerm> },
    PeriodicTorsion { terms: Vec<TorsionTerm> },
    Nonbonded(NonbondedForce),
    Boresch(BoreschRestraint),
    AlchemicalNonbonded(AlchemicalNonbonded),
    Barostat {
        pressure_bar: f64,
        temperature_kelvin: f64,
        frequency: u32,
    },
    /// A backend-specific force this crate does not interpret.
    Opaque,
}

impl ForceKind {
    /// Global parameters the force reads, with their default values.
    pub fn controlling_parameters(&self) -> Vec<(String, f64)> {
        match self {
            Self::Boresch(r) => r
                .control_parameter
                .iter()
                .map(|p| (p.clone(), 1.0))
                .collect(),
            Self::AlchemicalNonbonded(a) => a
                .controlling_parameters()
                .into_iter()
                .map(|p| (p, 1.0))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn remap(&self, map: IndexMap<'_>) -> Option<ForceKind> {
        let kind = match self {
            Self::HarmonicBond { terms } => Self::HarmonicBond {
                terms: terms.iter().filter_map(|t| t.remap(map)).collect(),
            },
            Self::HarmonicAngle { terms } => Self::HarmonicAngle {
                terms: terms.iter().filter_map(|t| t.remap(map)).collect(),
            },
            Self::PeriodicTorsion { terms } => Self::PeriodicTorsion {
                terms: terms.iter().filter_map(|t| t.remap(map)).collect(),
            },
            Self::Boresch(r) => Self::Boresch(r.remap(map)?),
            Self::AlchemicalNonbonded(a) => Self::AlchemicalNonbonded(a.remap(map)?),
            Self::Nonbonded(_) | Self::Barostat { .. } | Self::Opaque => self.clone(),
        };
        if kind.is_empty() { None } else { Some(kind) }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::HarmonicBond { terms } => terms.is_empty(),
            Self::HarmonicAngle { terms } => terms.is_empty(),
            Self::PeriodicTorsion { terms } => terms.is_empty(),
            _ => false,
        }
    }

    /// Merges the terms of a same-kind bonded force into this one, handing `other` back otherwise.
    fn absorb(&mut self, other: ForceKind) -> Result<(), ForceKind> {
        match (self, other) {
            (Self::HarmonicBond { terms }, Self::HarmonicBond { terms: extra }) => terms.extend(extra),
            (Self::HarmonicAngle { terms }, Self::HarmonicAngle { terms: extra }) => {
                terms.extend(extra)
            }
            (Self::PeriodicTorsion { terms }, Self::PeriodicTorsion { terms: extra }) => {
                terms.extend(extra)
            }
            (_, other) => return Err(other),
        }
        Ok(())
    }

    fn same_kind(&self, other: &ForceKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Force {
    pub name: String,
    #[serde(default)]
    pub group: Option<ForceGroup>,
    pub kind: ForceKind,
}

impl Force {
    pub fn new(name: &str, kind: ForceKind) -> Self {
        Self {
            name: name.to_string(),
            group: None,
            kind,
        }
    }

    /// Potential energy in kJ/mol under the given global parameter values.
    ///
    /// Parameters missing from `parameters` take their default of 1.0.
    pub fn energy(&self, positions: &[Point3<f64>], parameters: &BTreeMap<String, f64>) -> f64 {
        match &self.kind {
            ForceKind::HarmonicBond { terms } => terms.iter().map(|t| t.energy(positions)).sum(),
            ForceKind::HarmonicAngle { terms } => terms.iter().map(|t| t.energy(positions)).sum(),
            ForceKind::PeriodicTorsion { terms } => {
                terms.iter().map(|t| t.energy(positions)).sum()
            }
            ForceKind::Nonbonded(nb) => nb.energy(positions),
            ForceKind::Boresch(r) => r.energy(positions, parameters),
            ForceKind::AlchemicalNonbonded(a) => a.energy(positions, parameters),
            ForceKind::Barostat { .. } | ForceKind::Opaque => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct System {
    masses: Vec<f64>,
    forces: Vec<Force>,
}

impl System {
    pub fn new(masses: Vec<f64>) -> Self {
        Self {
            masses,
            forces: Vec::new(),
        }
    }

    pub fn n_particles(&self) -> usize {
        self.masses.len()
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn forces(&self) -> &[Force] {
        &self.forces
    }

    pub fn forces_mut(&mut self) -> &mut [Force] {
        &mut self.forces
    }

    pub fn add_force(&mut self, force: Force) -> usize {
        self.forces.push(force);
        self.forces.len() - 1
    }

    pub fn remove_force(&mut self, index: usize) -> Option<Force> {
        (index < self.forces.len()).then(|| self.forces.remove(index))
    }

    pub fn force(&self, name: &str) -> Option<&Force> {
        self.forces.iter().find(|f| f.name == name)
    }

    pub fn nonbonded(&self) -> Option<&NonbondedForce> {
        self.forces.iter().find_map(|f| match &f.kind {
            ForceKind::Nonbonded(nb) => Some(nb),
            _ => None,
        })
    }

    fn nonbonded_mut(&mut self) -> Option<&mut NonbondedForce> {
        self.forces.iter_mut().find_map(|f| match &mut f.kind {
            ForceKind::Nonbonded(nb) => Some(nb),
            _ => None,
        })
    }

    /// All global parameters read by the system's forces, with their defaults.
    pub fn global_parameters(&self) -> BTreeMap<String, f64> {
        self.forces
            .iter()
            .flat_map(|f| f.kind.controlling_parameters())
            .collect()
    }

    fn check_indices(&self, atoms: &[usize]) -> Result<(), ForceError> {
        match atoms.iter().find(|&&i| i >= self.n_particles()) {
            Some(&index) => Err(ForceError::IndexOutOfRange {
                index,
                n_particles: self.n_particles(),
            }),
            None => Ok(()),
        }
    }

    /// Extracts the sub-system spanned by `atoms`, renumbered in the given order.
    ///
    /// Bonded terms and restraints survive only if all their atoms are retained.
    pub fn extract(&self, atoms: &[usize]) -> Result<System, ForceError> {
        self.check_indices(atoms)?;
        let mut map = vec![None; self.n_particles()];
        for (new, &old) in atoms.iter().enumerate() {
            map[old] = Some(new);
        }
        let lookup = |i: usize| map.get(i).copied().flatten();

        let forces = self
            .forces
            .iter()
            .filter_map(|force| {
                let kind = match &force.kind {
                    ForceKind::Nonbonded(nb) => ForceKind::Nonbonded(nb.subset(atoms, &lookup)),
                    other => other.remap(&lookup)?,
                };
                Some(Force {
                    name: force.name.clone(),
                    group: force.group,
                    kind,
                })
            })
            .collect();

        Ok(System {
            masses: atoms.iter().map(|&i| self.masses[i]).collect(),
            forces,
        })
    }

    /// Appends `other` to this system and returns the index offset of its particles.
    ///
    /// Nonbonded parameters are merged into this system's nonbonded force; bonded forces are
    /// merged into an existing force of the same name and kind. A barostat is only kept once.
    pub fn append(&mut self, other: &System) -> usize {
        let offset = self.n_particles();
        self.masses.extend_from_slice(&other.masses);
        let shift = |i: usize| Some(i + offset);

        for force in &other.forces {
            match &force.kind {
                ForceKind::Nonbonded(nb) => {
                    if let Some(host) = self.nonbonded_mut() {
                        host.extend_from(nb, offset);
                    } else {
                        let mut shifted = NonbondedForce {
                            particles: Vec::new(),
                            exceptions: Vec::new(),
                            cutoff: nb.cutoff,
                        };
                        shifted.extend_from(nb, offset);
                        self.forces.push(Force {
                            kind: ForceKind::Nonbonded(shifted),
                            ..force.clone()
                        });
                    }
                }
                ForceKind::Barostat { .. } => {
                    if !self
                        .forces
                        .iter()
                        .any(|f| matches!(f.kind, ForceKind::Barostat { .. }))
                    {
                        self.forces.push(force.clone());
                    }
                }
                kind => {
                    let Some(shifted) = kind.remap(&shift) else {
                        continue;
                    };
                    let position = self
                        .forces
                        .iter()
                        .position(|f| f.name == force.name && f.kind.same_kind(&shifted));
                    let unmerged = match position {
                        Some(index) => self.forces[index].kind.absorb(shifted).err(),
                        None => Some(shifted),
                    };
                    if let Some(kind) = unmerged {
                        self.forces.push(Force {
                            name: force.name.clone(),
                            group: force.group,
                            kind,
                        });
                    }
                }
            }
        }

        let n_particles = self.n_particles();
        if let Some(host) = self.nonbonded_mut() {
            host.pad_to(n_particles);
        }
        offset
    }

    /// Per-force energies in kJ/mol, keyed by force name. Forces sharing a name are summed.
    pub fn energy_by_force(
        &self,
        positions: &[Point3<f64>],
        parameters: &BTreeMap<String, f64>,
    ) -> Result<BTreeMap<String, f64>, ForceError> {
        if positions.len() != self.n_particles() {
            return Err(ForceError::PositionCount {
                expected: self.n_particles(),
                found: positions.len(),
            });
        }
        let mut energies = BTreeMap::new();
        for force in &self.forces {
            *energies.entry(force.name.clone()).or_insert(0.0) +=
                force.energy(positions, parameters);
        }
        Ok(energies)
    }
}
