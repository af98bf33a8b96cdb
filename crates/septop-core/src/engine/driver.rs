//! Executes the units of a protocol DAG against a [`SimulationBackend`].
//!
//! A setup unit parameterizes and equilibrates both end states of its leg, moves ligand B
//! into place, merges ligand B into end state A, makes both ligands alchemical and adds the
//! leg's restraints. The result is written as a JSON [`SetupArtifact`] that the paired run
//! unit reads back before driving the multistate sampler.
//!
//! Failures never escape [`execute_unit`]: they are recorded on the [`UnitResult`] so that
//! sibling units keep running and the failed unit is simply left out of aggregation.

use super::backend::{
    BackendError, Ensemble, MdRequest, MultiStateJob, PreparedSystem, SimulationBackend,
    SystemRequest,
};
use super::error::EngineError;
use super::legs::{
    Frame, LegComponents, LegStrategy, LigandReferences, ResolvedSettings, RestraintSummary,
    strategy_for,
};
use super::progress::{Progress, ProgressReporter};
use super::settings::{SamplerMethod, SepTopSettings};
use super::state::{StageTracker, UnitStage};
use super::unit::{ExecutionUnit, Leg, Phase, ProtocolDag, RepeatId, UnitKey};
use super::validation::whole_multiple;
use crate::core::alchemy::factory::create_alchemical_system;
use crate::core::alchemy::state::AlchemicalState;
use crate::core::alchemy::{AlchemicalRegion, LIGAND_A_REGION, LIGAND_B_REGION};
use crate::core::analysis::{ForwardReverseAnalysis, MatrixDiagnostics};
use crate::core::forces::System;
use crate::core::models::atom::Atom;
use crate::core::models::component::SmallMoleculeComponent;
use crate::core::models::topology::Topology;
use crate::core::restraints::GeometryError;
use crate::core::restraints::ligand::select_ligand_idxs;
use crate::core::units::Energy;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// File name of the per-unit result record written by [`run_dag`].
pub const UNIT_RESULT_FILENAME: &str = "unit_result.json";

/// Directories a unit may write to.
///
/// `shared` outlives the unit and holds everything referenced by its outputs; `scratch`
/// holds intermediate files.
#[derive(Debug, Clone)]
pub struct UnitContext {
    pub shared: PathBuf,
    pub scratch: PathBuf,
}

impl UnitContext {
    pub fn new(shared: impl Into<PathBuf>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            shared: shared.into(),
            scratch: scratch.into(),
        }
    }

    pub fn create_dirs(&self) -> Result<(), EngineError> {
        for dir in [&self.shared, &self.scratch] {
            fs::create_dir_all(dir).map_err(|source| EngineError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// The alchemical system handed from a setup unit to its run unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SetupArtifact {
    pub leg: Leg,
    pub repeat_id: RepeatId,
    pub system: System,
    pub topology: Topology,
    pub positions: Vec<Point3<f64>>,
    pub ligand_a_atoms: Vec<usize>,
    pub ligand_b_atoms: Vec<usize>,
    pub restraints: RestraintSummary,
}

impl SetupArtifact {
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let file = fs::File::create(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), self).map_err(|source| {
            EngineError::Artifact {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let file = fs::File::open(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| EngineError::Artifact {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SetupOutputs {
    pub artifact: PathBuf,
    pub restraints: RestraintSummary,
    pub n_atoms: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunOutputs {
    pub estimate: Energy,
    pub uncertainty: Energy,
    pub overlap: MatrixDiagnostics,
    pub replica_exchange: Option<MatrixDiagnostics>,
    /// `None` when the forward/reverse analysis could not be computed.
    pub forward_reverse: Option<ForwardReverseAnalysis>,
    pub equilibration_iterations: usize,
    pub production_iterations: usize,
    /// Primary sampler storage.
    pub storage: PathBuf,
    /// Checkpoint file name, resolved next to `storage`.
    pub checkpoint: PathBuf,
    pub sampler: SamplerMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum UnitOutputs {
    Setup(SetupOutputs),
    Run(RunOutputs),
}

/// Outcome of executing one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitResult {
    pub key: UnitKey,
    pub name: String,
    pub ok: bool,
    pub outputs: Option<UnitOutputs>,
    pub error: Option<String>,
    pub stages: Vec<UnitStage>,
}

impl UnitResult {
    pub fn setup_outputs(&self) -> Option<&SetupOutputs> {
        match &self.outputs {
            Some(UnitOutputs::Setup(outputs)) => Some(outputs),
            _ => None,
        }
    }

    pub fn run_outputs(&self) -> Option<&RunOutputs> {
        match &self.outputs {
            Some(UnitOutputs::Run(outputs)) => Some(outputs),
            _ => None,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let file = fs::File::create(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|source| {
            EngineError::Artifact {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let file = fs::File::open(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| EngineError::Artifact {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Results of every unit of one DAG, setup units first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DagResult {
    pub unit_results: Vec<UnitResult>,
}

impl DagResult {
    pub fn ok(&self) -> bool {
        self.unit_results.iter().all(|r| r.ok)
    }

    pub fn result(&self, key: &UnitKey) -> Option<&UnitResult> {
        self.unit_results.iter().find(|r| &r.key == key)
    }
}

/// Executes one unit. Run units need the result of their setup unit.
#[instrument(skip_all, fields(unit = %unit.name))]
pub fn execute_unit<B>(
    unit: &ExecutionUnit,
    setup: Option<&UnitResult>,
    settings: &SepTopSettings,
    backend: &B,
    context: &UnitContext,
) -> UnitResult
where
    B: SimulationBackend + ?Sized,
{
    let mut tracker = StageTracker::new();
    let outcome = match unit.key.phase {
        Phase::Setup => {
            run_setup(unit, settings, backend, context, &mut tracker).map(UnitOutputs::Setup)
        }
        Phase::Run => run_production(unit, setup, settings, backend, context, &mut tracker)
            .map(UnitOutputs::Run),
    };

    match outcome {
        Ok(outputs) => {
            tracker.advance(UnitStage::OutputsEmitted);
            info!("Unit completed.");
            UnitResult {
                key: unit.key,
                name: unit.name.clone(),
                ok: true,
                outputs: Some(outputs),
                error: None,
                stages: tracker.into_stages(),
            }
        }
        Err(e) => {
            warn!(stage = %tracker.current(), error = %e, "Unit failed.");
            UnitResult {
                key: unit.key,
                name: unit.name.clone(),
                ok: false,
                outputs: None,
                error: Some(e.to_string()),
                stages: tracker.into_stages(),
            }
        }
    }
}

/// An equilibrated end state of one leg.
struct EndState {
    prepared: PreparedSystem,
    positions: Vec<Point3<f64>>,
    ligand_atoms: Vec<usize>,
}

impl EndState {
    fn frame(&self) -> Frame<'_> {
        Frame {
            topology: &self.prepared.topology,
            positions: &self.positions,
            ligand_atoms: &self.ligand_atoms,
        }
    }
}

/// MD step counts of end-state equilibration, computed before any simulation work.
struct EquilibrationPlan {
    nvt_steps: Option<usize>,
    npt_steps: usize,
    production_steps: usize,
}

impl EquilibrationPlan {
    fn new(settings: &ResolvedSettings<'_>) -> Result<Self, EngineError> {
        let timestep = settings.integrator.timestep;
        let md = settings.equil_simulation;
        let nvt_steps = md
            .equilibration_length_nvt
            .map(|length| whole_multiple("equilibration-length-nvt", length, "timestep", timestep))
            .transpose()?;
        Ok(Self {
            nvt_steps,
            npt_steps: whole_multiple(
                "equilibration-length",
                md.equilibration_length,
                "timestep",
                timestep,
            )?,
            production_steps: whole_multiple(
                "production-length",
                md.production_length,
                "timestep",
                timestep,
            )?,
        })
    }
}

fn prefixed(dir: &Path, prefix: &str, name: Option<&String>) -> Option<PathBuf> {
    name.map(|name| dir.join(format!("{prefix}_{name}")))
}

fn prepare_end_state<B>(
    backend: &B,
    strategy: &dyn LegStrategy,
    components: &LegComponents<'_>,
    ligand: &SmallMoleculeComponent,
    settings: &ResolvedSettings<'_>,
    plan: &EquilibrationPlan,
    dir: &Path,
    prefix: &str,
) -> Result<EndState, EngineError>
where
    B: SimulationBackend + ?Sized,
{
    let small_molecules = std::iter::once(ligand)
        .chain(components.cofactors.iter().copied())
        .collect();
    let request = SystemRequest {
        leg: strategy.leg(),
        protein: components.protein,
        solvent: components.solvent,
        small_molecules,
        settings,
    };
    let mut prepared = backend.parameterize(&request)?;
    let ligand_atoms = prepared
        .small_molecule_atoms
        .first()
        .cloned()
        .ok_or_else(|| BackendError::Failed {
            operation: "parameterizing",
            message: format!("no particles reported for ligand '{}'", ligand.name),
        })?;
    debug!(
        state = prefix,
        n_particles = prepared.system.n_particles(),
        n_ligand_atoms = ligand_atoms.len(),
        "Parameterized end state."
    );

    let equil = settings.equil_simulation;
    let outputs = settings.equil_output;
    let mut positions =
        backend.minimize(&prepared, &prepared.positions, equil.minimization_steps)?;

    let stages = [
        (
            Ensemble::Nvt,
            plan.nvt_steps,
            prefixed(dir, prefix, outputs.equil_nvt_structure.as_ref()),
        ),
        (
            Ensemble::Npt,
            Some(plan.npt_steps),
            prefixed(dir, prefix, outputs.equil_npt_structure.as_ref()),
        ),
        (
            Ensemble::Npt,
            Some(plan.production_steps),
            prefixed(dir, prefix, outputs.production_trajectory_filename.as_ref()),
        ),
    ];
    for (ensemble, steps, output) in stages {
        let Some(steps) = steps.filter(|&s| s > 0) else {
            continue;
        };
        let request = MdRequest {
            ensemble,
            steps,
            temperature: settings.thermo.temperature,
            timestep: settings.integrator.timestep,
            output,
        };
        let outcome = backend.equilibrate(&prepared, &positions, &request)?;
        positions = outcome.positions;
        if outcome.box_vectors.is_some() {
            prepared.topology.box_vectors = outcome.box_vectors;
        }
    }

    Ok(EndState {
        prepared,
        positions,
        ligand_atoms,
    })
}

/// Reference triplet of a ligand, as particle indices of the combined system.
fn ligand_reference(
    topology: &Topology,
    positions: &[Point3<f64>],
    ligand_atoms: &[usize],
) -> Result<[usize; 3], GeometryError> {
    let mut atoms: Vec<Atom> = Vec::with_capacity(ligand_atoms.len());
    let mut coordinates = Vec::with_capacity(ligand_atoms.len());
    for &i in ligand_atoms {
        let (Some(atom), Some(position)) = (topology.atoms.get(i), positions.get(i)) else {
            return Err(GeometryError::IndexOutOfRange {
                index: i,
                n_atoms: positions.len(),
            });
        };
        atoms.push(atom.atom.clone());
        coordinates.push(*position);
    }
    let local = select_ligand_idxs(&atoms, &coordinates)?;
    Ok(local.map(|k| ligand_atoms[k]))
}

fn run_setup<B>(
    unit: &ExecutionUnit,
    settings: &SepTopSettings,
    backend: &B,
    context: &UnitContext,
    tracker: &mut StageTracker,
) -> Result<SetupOutputs, EngineError>
where
    B: SimulationBackend + ?Sized,
{
    let strategy = strategy_for(unit.key.leg);
    let resolved = strategy.resolve_settings(settings)?;
    let plan = EquilibrationPlan::new(&resolved)?;
    tracker.advance(UnitStage::SettingsResolved);

    let components = strategy.components(&unit.transformation, &unit.alchemical)?;
    let state_a = prepare_end_state(
        backend,
        strategy,
        &components,
        components.ligand_a,
        &resolved,
        &plan,
        &context.scratch,
        "stateA",
    )?;
    let state_b = prepare_end_state(
        backend,
        strategy,
        &components,
        components.ligand_b,
        &resolved,
        &plan,
        &context.scratch,
        "stateB",
    )?;

    let positions_b = strategy.update_positions(state_a.frame(), state_b.frame())?;
    let ligand_b_system = state_b.prepared.system.extract(&state_b.ligand_atoms)?;
    let ligand_b_positions = state_b
        .ligand_atoms
        .iter()
        .map(|&i| {
            positions_b.get(i).copied().ok_or(GeometryError::IndexOutOfRange {
                index: i,
                n_atoms: positions_b.len(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut system = state_a.prepared.system.clone();
    let offset = system.append(&ligand_b_system);
    let mut topology = state_a.prepared.topology.clone();
    topology.append(&state_b.prepared.topology.subset(&state_b.ligand_atoms));
    let mut positions = state_a.positions.clone();
    positions.extend(ligand_b_positions);
    let ligand_a_atoms = state_a.ligand_atoms.clone();
    let ligand_b_atoms: Vec<usize> = (offset..offset + state_b.ligand_atoms.len()).collect();

    let regions = [
        AlchemicalRegion::new(LIGAND_A_REGION, ligand_a_atoms.clone()),
        AlchemicalRegion::new(LIGAND_B_REGION, ligand_b_atoms.clone()),
    ];
    let mut alchemical =
        create_alchemical_system(&system, &regions, resolved.alchemical.softcore_alpha)?;
    info!(
        n_particles = alchemical.n_particles(),
        "Assembled alchemical system for both ligands."
    );
    tracker.advance(UnitStage::ComponentsAssembled);

    let references = LigandReferences {
        ligand_a: ligand_reference(&topology, &positions, &ligand_a_atoms)?,
        ligand_b: ligand_reference(&topology, &positions, &ligand_b_atoms)?,
    };
    let restraints = strategy.add_restraints(
        &mut alchemical,
        &topology,
        &positions,
        references,
        resolved.restraints,
    )?;
    tracker.advance(UnitStage::RestraintsApplied);

    let artifact = SetupArtifact {
        leg: unit.key.leg,
        repeat_id: unit.key.repeat_id,
        system: alchemical,
        topology,
        positions,
        ligand_a_atoms,
        ligand_b_atoms,
        restraints,
    };
    let path = context
        .shared
        .join(format!("{}_system.json", unit.key.label()));
    artifact.save(&path)?;
    info!(path = %path.display(), "Wrote setup artifact.");

    Ok(SetupOutputs {
        artifact: path,
        n_atoms: artifact.positions.len(),
        restraints: artifact.restraints,
    })
}

fn run_production<B>(
    unit: &ExecutionUnit,
    setup: Option<&UnitResult>,
    settings: &SepTopSettings,
    backend: &B,
    context: &UnitContext,
    tracker: &mut StageTracker,
) -> Result<RunOutputs, EngineError>
where
    B: SimulationBackend + ?Sized,
{
    let strategy = strategy_for(unit.key.leg);
    let resolved = strategy.resolve_settings(settings)?;
    let simulation = resolved.simulation;
    let timestep = resolved.integrator.timestep;
    let per_iteration = simulation.time_per_iteration;
    let steps_per_iteration =
        whole_multiple("time-per-iteration", per_iteration, "timestep", timestep)?;
    let equilibration_iterations = whole_multiple(
        "equilibration-length",
        simulation.equilibration_length,
        "time-per-iteration",
        per_iteration,
    )?;
    let production_iterations = whole_multiple(
        "production-length",
        simulation.production_length,
        "time-per-iteration",
        per_iteration,
    )?;
    let checkpoint_interval = whole_multiple(
        "checkpoint-interval",
        resolved.output.checkpoint_interval,
        "time-per-iteration",
        per_iteration,
    )?;
    tracker.advance(UnitStage::SettingsResolved);

    let artifact_path = setup
        .filter(|r| r.ok)
        .and_then(UnitResult::setup_outputs)
        .map(|outputs| outputs.artifact.clone())
        .ok_or_else(|| EngineError::MissingSetup {
            unit: unit.name.clone(),
        })?;
    let artifact = SetupArtifact::load(&artifact_path)?;
    if artifact.leg != unit.key.leg {
        return Err(EngineError::MissingSetup {
            unit: unit.name.clone(),
        });
    }
    if artifact.repeat_id != unit.key.repeat_id {
        return Err(EngineError::SetupMismatch {
            unit: unit.name.clone(),
            expected: unit.key.repeat_id,
            found: artifact.repeat_id,
        });
    }

    let template = AlchemicalState::from_system(&artifact.system);
    let states = strategy.lambda_schedule(resolved.lambda).states(&template)?;
    debug!(n_states = states.len(), "Built thermodynamic states.");

    let prepared = PreparedSystem {
        system: artifact.system,
        topology: artifact.topology,
        positions: artifact.positions,
        small_molecule_atoms: vec![artifact.ligand_a_atoms, artifact.ligand_b_atoms],
    };
    let positions = backend.minimize(&prepared, &prepared.positions, simulation.minimization_steps)?;
    tracker.advance(UnitStage::Minimized);

    let storage = context.shared.join(&resolved.output.output_filename);
    let checkpoint = PathBuf::from(&resolved.output.checkpoint_storage_filename);
    let job = MultiStateJob {
        leg: unit.key.leg,
        system: &prepared.system,
        topology: &prepared.topology,
        positions: &positions,
        states: &states,
        sampler: simulation.sampler_method,
        steps_per_iteration,
        equilibration_iterations,
        production_iterations,
        checkpoint_interval,
        storage: storage.clone(),
        checkpoint: checkpoint.clone(),
        settings: &resolved,
    };
    let outcome = backend.run_multistate(&job)?;
    tracker.advance(UnitStage::Equilibrated);
    tracker.advance(UnitStage::ProductionRun);

    if outcome.forward_reverse.is_none() {
        warn!("Forward and reverse analysis failed, likely due to insufficient decorrelated samples.");
    }
    let replica_exchange = outcome
        .replica_exchange
        .filter(|_| simulation.sampler_method.exchanges_replicas());

    Ok(RunOutputs {
        estimate: outcome.estimate,
        uncertainty: outcome.uncertainty,
        overlap: outcome.overlap,
        replica_exchange,
        forward_reverse: outcome.forward_reverse,
        equilibration_iterations: outcome.equilibration_iterations,
        production_iterations: outcome.production_iterations,
        storage,
        checkpoint,
        sampler: simulation.sampler_method,
    })
}

/// Runs every unit of `dag` serially, setup units first, each in its own directory under
/// `root`. Each unit's result is also written to `<root>/<unit label>/unit_result.json`.
#[instrument(skip_all, name = "dag_runner")]
pub fn run_dag<B>(
    dag: &ProtocolDag,
    settings: &SepTopSettings,
    backend: &B,
    root: &Path,
    reporter: &ProgressReporter,
) -> Result<DagResult, EngineError>
where
    B: SimulationBackend + ?Sized,
{
    let mut results = DagResult::default();
    for (phase, name) in [(Phase::Setup, "Setup"), (Phase::Run, "Run")] {
        reporter.report(Progress::PhaseStart { name });
        let units: Vec<&ExecutionUnit> = dag.units_in(phase).collect();
        reporter.report(Progress::TaskStart {
            total_steps: units.len() as u64,
        });

        for unit in units {
            let dir = root.join(unit.key.label());
            let context = UnitContext::new(&dir, dir.join("scratch"));
            context.create_dirs()?;

            reporter.report(Progress::UnitStart(unit.name.clone()));
            let setup = unit.setup.as_ref().and_then(|key| results.result(key));
            let result = execute_unit(unit, setup, settings, backend, &context);
            result.save(&dir.join(UNIT_RESULT_FILENAME))?;
            reporter.report(Progress::UnitFinish {
                name: result.name.clone(),
                ok: result.ok,
            });
            reporter.report(Progress::TaskIncrement);
            results.unit_results.push(result);
        }

        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);
    }

    let failed = results.unit_results.iter().filter(|r| !r.ok).count();
    info!(
        units = results.unit_results.len(),
        failed, "Finished executing protocol DAG."
    );
    Ok(results)
}
