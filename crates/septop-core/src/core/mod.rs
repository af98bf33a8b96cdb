//! # Core Module
//!
//! Stateless building blocks of SepTop relative binding free-energy calculations: chemical
//! models, unit-bearing quantities, the backend-neutral force representation, alchemical
//! transformation of systems, restraint geometry, sampler storage and analysis diagnostics.
//!
//! ## Architecture
//!
//! - **Chemistry** ([`models`]) - Atoms, components, end-state systems and topologies
//! - **Quantities** ([`units`]) - Magnitudes paired with units, convertible within a dimension
//! - **Forces** ([`forces`]) - Named force terms, system merging/extraction and force groups
//! - **Alchemy** ([`alchemy`]) - Lambda-controlled ligand regions and thermodynamic states
//! - **Restraints** ([`restraints`]) - Reference-atom selection, Boresch restraints, placement
//! - **Storage** ([`io`]) - Read-only access to replica-exchange output
//! - **Diagnostics** ([`analysis`]) - Overlap and transition matrices, convergence series

pub mod alchemy;
pub mod analysis;
pub mod forces;
pub mod io;
pub mod models;
pub mod restraints;
pub mod units;
pub mod utils;
