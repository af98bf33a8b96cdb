//! # Restraints Module
//!
//! Geometry behind the SepTop restraint scheme: choosing reference atoms on the ligands and
//! the receptor, building Boresch restraints for the complex leg, and positioning the second
//! ligand (superposition in the complex, separation in solvent).

pub mod boresch;
pub mod ligand;
pub mod placement;
pub mod receptor;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Ligand has {found} heavy atoms but at least 3 are needed for a reference triplet")]
    TooFewHeavyAtoms { found: usize },

    #[error("No non-collinear reference triplet exists among the ligand heavy atoms")]
    DegenerateLigand,

    #[error("No receptor anchor triplet satisfies the selection criteria for ligand atom {ligand_atom}")]
    NoReceptorAnchors { ligand_atom: usize },

    #[error("Backbone selections differ in size: {reference} reference atoms vs {mobile} mobile atoms")]
    BackboneMismatch { reference: usize, mobile: usize },

    #[error("Superposition failed: {0}")]
    Superposition(String),

    #[error("Atom index {index} is out of range for {n_atoms} positions")]
    IndexOutOfRange { index: usize, n_atoms: usize },

    #[error("{atoms} atoms were given with {positions} positions")]
    PositionCount { atoms: usize, positions: usize },

    #[error("Cannot compute a geometric center of an empty selection")]
    EmptySelection,
}

pub(crate) fn check_indices(indices: &[usize], n_atoms: usize) -> Result<(), GeometryError> {
    match indices.iter().find(|&&i| i >= n_atoms) {
        Some(&index) => Err(GeometryError::IndexOutOfRange { index, n_atoms }),
        None => Ok(()),
    }
}
