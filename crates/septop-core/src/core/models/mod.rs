//! # Core Models Module
//!
//! Data structures describing the chemistry that a SepTop transformation operates on.
//!
//! ## Key Components
//!
//! - [`atom`] - Atom identity (name, element, residue, formal charge)
//! - [`component`] - Proteins, small molecules and bulk solvent
//! - [`system`] - Labelled end-state systems and alchemical-component detection
//! - [`topology`] - Parameterized-system topology with per-atom component origin and box vectors

pub mod atom;
pub mod component;
pub mod system;
pub mod topology;
