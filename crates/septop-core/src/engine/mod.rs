//! # Engine Module
//!
//! Turns a validated transformation into execution units and runs them against an external
//! simulation backend.
//!
//! ## Architecture
//!
//! - **Settings** ([`settings`]) - Protocol settings groups, TOML loading and configuration errors
//! - **Validation** ([`validation`]) - End-state, alchemical-component, lambda and timing checks
//! - **Units** ([`unit`]) - Execution units keyed by repeat, generation, leg and phase
//! - **Leg Strategies** ([`legs`]) - Per-leg settings, components, placement, restraints and schedules
//! - **Backend Seam** ([`backend`]) - The simulation engine and multistate sampler collaborator
//! - **Execution** ([`driver`]) - The per-unit state machine, setup artifacts and unit results
//! - **State Tracking** ([`state`]) - Stages an execution unit passes through
//! - **Progress Monitoring** ([`progress`]) - Progress reporting and user feedback mechanisms
//! - **Citations** ([`citations`]) - Explicit, idempotent registration of method citations
//! - **Error Handling** ([`error`]) - Engine-specific error types and error propagation

pub mod backend;
pub mod citations;
pub mod driver;
pub mod error;
pub mod legs;
pub mod progress;
pub mod settings;
pub mod state;
pub mod unit;
pub mod validation;
