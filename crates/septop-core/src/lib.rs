//! # SepTop Core Library
//!
//! Orchestration, restraint geometry and statistical aggregation for Separated Topologies
//! (SepTop) relative binding free-energy calculations. Both ligands are simulated in their
//! own topology, in a solvent leg and a complex leg, and the per-leg free energies are
//! combined through the thermodynamic cycle.
//!
//! ## Architectural Philosophy
//!
//! The library keeps a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (components, chemical systems,
//!   topologies), unit-bearing quantities, the backend-neutral force model, alchemical
//!   regions and states, restraint geometry and sampler storage.
//!
//! - **[`engine`]: The Logic Core.** Settings and validation, execution units, per-leg
//!   strategies and the per-unit execution driver that talks to an external
//!   [`SimulationBackend`](engine::backend::SimulationBackend).
//!
//! - **[`workflows`]: The Public API.** The [`SepTopProtocol`](workflows::protocol::SepTopProtocol)
//!   that validates a transformation and creates its units, and the
//!   [`SepTopProtocolResult`](workflows::results::SepTopProtocolResult) that reduces unit
//!   outputs into a final estimate.

pub mod core;
pub mod engine;
pub mod workflows;
