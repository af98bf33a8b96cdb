//! The seam to the molecular-mechanics engine and multistate sampler.
//!
//! This crate prepares systems, restraints and lambda schedules; a [`SimulationBackend`]
//! parameterizes components, integrates equations of motion and runs the sampler.

use super::legs::ResolvedSettings;
use super::settings::SamplerMethod;
use super::unit::Leg;
use crate::core::alchemy::state::AlchemicalState;
use crate::core::analysis::{ForwardReverseAnalysis, MatrixDiagnostics};
use crate::core::forces::System;
use crate::core::models::component::{ProteinComponent, SmallMoleculeComponent, SolventComponent};
use crate::core::models::topology::Topology;
use crate::core::units::{Energy, Temperature, Time};
use nalgebra::{Point3, Vector3};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("Backend failed while {operation}: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },

    #[error("Backend does not support {0}")]
    Unsupported(String),
}

/// Components to parameterize and solvate into a single system.
#[derive(Debug, Clone)]
pub struct SystemRequest<'a> {
    pub leg: Leg,
    pub protein: Option<&'a ProteinComponent>,
    pub solvent: Option<&'a SolventComponent>,
    pub small_molecules: Vec<&'a SmallMoleculeComponent>,
    pub settings: &'a ResolvedSettings<'a>,
}

/// A parameterized, solvated system ready for simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSystem {
    pub system: System,
    pub topology: Topology,
    pub positions: Vec<Point3<f64>>,
    /// Particle indices of each requested small molecule, in request order.
    pub small_molecule_atoms: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensemble {
    Nvt,
    Npt,
}

/// One plain MD stage used to equilibrate an end state.
#[derive(Debug, Clone, PartialEq)]
pub struct MdRequest {
    pub ensemble: Ensemble,
    pub steps: usize,
    pub temperature: Temperature,
    pub timestep: Time,
    /// File the final structure or trajectory of the stage is written to.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MdOutcome {
    pub positions: Vec<Point3<f64>>,
    pub box_vectors: Option<[Vector3<f64>; 3]>,
}

/// Everything the sampler needs for one alchemical multistate run.
///
/// `positions` are already minimized; the sampler equilibrates and then samples production.
#[derive(Debug, Clone)]
pub struct MultiStateJob<'a> {
    pub leg: Leg,
    pub system: &'a System,
    pub topology: &'a Topology,
    pub positions: &'a [Point3<f64>],
    /// One thermodynamic state per replica, in the sampler's convention (1 = interacting).
    pub states: &'a [AlchemicalState],
    pub sampler: SamplerMethod,
    pub steps_per_iteration: usize,
    pub equilibration_iterations: usize,
    pub production_iterations: usize,
    pub checkpoint_interval: usize,
    pub storage: PathBuf,
    pub checkpoint: PathBuf,
    pub settings: &'a ResolvedSettings<'a>,
}

/// Analysed output of a multistate run.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiStateOutcome {
    pub estimate: Energy,
    pub uncertainty: Energy,
    pub overlap: MatrixDiagnostics,
    /// Only reported by samplers that exchange replicas.
    pub replica_exchange: Option<MatrixDiagnostics>,
    /// `None` when the analysis failed, typically for lack of decorrelated samples.
    pub forward_reverse: Option<ForwardReverseAnalysis>,
    pub equilibration_iterations: usize,
    pub production_iterations: usize,
}

pub trait SimulationBackend {
    fn parameterize(&self, request: &SystemRequest<'_>) -> Result<PreparedSystem, BackendError>;

    fn minimize(
        &self,
        prepared: &PreparedSystem,
        positions: &[Point3<f64>],
        max_steps: usize,
    ) -> Result<Vec<Point3<f64>>, BackendError>;

    fn equilibrate(
        &self,
        prepared: &PreparedSystem,
        positions: &[Point3<f64>],
        request: &MdRequest,
    ) -> Result<MdOutcome, BackendError>;

    fn run_multistate(&self, job: &MultiStateJob<'_>) -> Result<MultiStateOutcome, BackendError>;
}
