//! # Alchemy Module
//!
//! Turns a fully interacting system into one whose ligand interactions are controlled by
//! global lambda parameters, one set per alchemical region.
//!
//! Lambda parameters follow the sampler convention: `1.0` means fully interacting and `0.0`
//! means fully decoupled. Each region `X` owns `lambda_electrostatics_X`, `lambda_sterics_X`
//! and, when restrained, `lambda_restraints_X`.
//!
//! - [`factory`] - Builds the alchemical system from a reference system and regions
//! - [`softcore`] - Lambda-scaled region/environment nonbonded interactions
//! - [`state`] - Parameter values for one thermodynamic state and per-window schedules

pub mod factory;
pub mod softcore;
pub mod state;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const LIGAND_A_REGION: &str = "ligandA";
pub const LIGAND_B_REGION: &str = "ligandB";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LambdaKind {
    Electrostatics,
    Sterics,
    Restraints,
}

impl LambdaKind {
    pub const ALL: [LambdaKind; 3] = [Self::Electrostatics, Self::Sterics, Self::Restraints];

    fn prefix(self) -> &'static str {
        match self {
            Self::Electrostatics => "lambda_electrostatics",
            Self::Sterics => "lambda_sterics",
            Self::Restraints => "lambda_restraints",
        }
    }
}

impl fmt::Display for LambdaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Name of the global parameter controlling `kind` for `region`, e.g. `lambda_sterics_ligandA`.
pub fn lambda_parameter(kind: LambdaKind, region: &str) -> String {
    format!("{}_{}", kind.prefix(), region)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlchemicalRegion {
    pub name: String,
    pub atoms: Vec<usize>,
}

impl AlchemicalRegion {
    pub fn new(name: &str, atoms: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            atoms,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlchemyError {
    #[error("Reference system has no nonbonded force to make alchemical")]
    MissingNonbonded,

    #[error("Reference system has more than one nonbonded force")]
    MultipleNonbonded,

    #[error("Alchemical region '{region}' is empty")]
    EmptyRegion { region: String },

    #[error("Atom {atom} belongs to more than one alchemical region")]
    OverlappingRegions { atom: usize },

    #[error("Atom index {index} of region '{region}' is out of range for {n_particles} particles")]
    IndexOutOfRange {
        region: String,
        index: usize,
        n_particles: usize,
    },

    #[error("Unknown alchemical parameter '{0}'")]
    UnknownParameter(String),

    #[error("Value {value} for alchemical parameter '{name}' is outside [0, 1]")]
    ValueOutOfRange { name: String, value: f64 },

    #[error("Lambda schedule entries have unequal lengths: {0}")]
    RaggedSchedule(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_parameter_names_follow_region_suffix_convention() {
        assert_eq!(
            lambda_parameter(LambdaKind::Electrostatics, LIGAND_A_REGION),
            "lambda_electrostatics_ligandA"
        );
        assert_eq!(
            lambda_parameter(LambdaKind::Restraints, LIGAND_B_REGION),
            "lambda_restraints_ligandB"
        );
    }
}
