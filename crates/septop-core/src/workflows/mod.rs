//! # Workflows Module
//!
//! The user-facing entry points of a SepTop calculation.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]) - Validates a transformation, builds its execution units and
//!   gathers unit results across any number of DAGs.
//! - **Results** ([`results`]) - Reduces gathered run outputs into the relative binding free
//!   energy, its uncertainty and per-repeat diagnostics.

pub mod protocol;
pub mod results;
