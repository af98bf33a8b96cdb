mod common;

use common::{
    COMPLEX_DG_KCAL, MockBackend, SOLVENT_DG_KCAL, STORED_ITERATIONS, complex_state, ring_ligand,
};
use septop::core::alchemy::factory::{environment_force_name, intra_region_force_name};
use septop::core::alchemy::state::AlchemicalState;
use septop::core::alchemy::{LIGAND_A_REGION, LIGAND_B_REGION};
use septop::core::forces::groups::ForceGroup;
use septop::engine::driver::{
    DagResult, SetupArtifact, UNIT_RESULT_FILENAME, UnitContext, UnitResult, execute_unit, run_dag,
};
use septop::engine::progress::ProgressReporter;
use septop::engine::state::UnitStage;
use septop::engine::unit::{Leg, Phase};
use septop::workflows::protocol::SepTopProtocol;
use septop::workflows::results::ResultError;
use tempfile::TempDir;

const TOLERANCE: f64 = 1e-9;

fn protocol(repeats: usize) -> SepTopProtocol {
    let mut settings = SepTopProtocol::default_settings();
    settings.protocol_repeats = repeats;
    SepTopProtocol::new(settings)
}

fn execute(protocol: &SepTopProtocol, backend: &MockBackend, root: &TempDir) -> DagResult {
    let dag = protocol
        .create(
            complex_state(ring_ligand("benzene", false)),
            complex_state(ring_ligand("toluene", true)),
            None,
        )
        .unwrap();
    run_dag(
        &dag,
        &protocol.settings,
        backend,
        root.path(),
        &ProgressReporter::new(),
    )
    .unwrap()
}

fn setup_artifact(dag_result: &DagResult, leg: Leg) -> SetupArtifact {
    let setup = dag_result
        .unit_results
        .iter()
        .find(|r| r.key.leg == leg && r.key.phase == Phase::Setup)
        .unwrap();
    SetupArtifact::load(&setup.setup_outputs().unwrap().artifact).unwrap()
}

#[test]
fn full_protocol_combines_both_legs_into_relative_estimate() {
    let root = TempDir::new().unwrap();
    let backend = MockBackend::new();
    let p = protocol(2);
    let dag_result = execute(&p, &backend, &root);

    assert!(dag_result.ok(), "{:?}", dag_result.unit_results);
    assert_eq!(dag_result.unit_results.len(), 8);

    let result = p.result([&dag_result]).unwrap();
    let (estimate, uncertainty) = result.estimate_kcal().unwrap();
    assert!((estimate - (SOLVENT_DG_KCAL - COMPLEX_DG_KCAL)).abs() < TOLERANCE);
    assert!(uncertainty.abs() < TOLERANCE);
    assert_eq!(result.repeat_ids().solvent, result.repeat_ids().complex);
    assert!(result.forward_and_reverse_energy_analysis().warnings.is_empty());
}

#[test]
fn every_unit_writes_its_result_and_walks_its_stages() {
    let root = TempDir::new().unwrap();
    let backend = MockBackend::new();
    let dag_result = execute(&protocol(1), &backend, &root);

    for result in &dag_result.unit_results {
        let path = root.path().join(result.key.label()).join(UNIT_RESULT_FILENAME);
        let saved = UnitResult::load(&path).unwrap();
        assert_eq!(saved.key, result.key);
        assert!(saved.ok);

        let expected = match result.key.phase {
            Phase::Setup => vec![
                UnitStage::Created,
                UnitStage::SettingsResolved,
                UnitStage::ComponentsAssembled,
                UnitStage::RestraintsApplied,
                UnitStage::OutputsEmitted,
            ],
            Phase::Run => vec![
                UnitStage::Created,
                UnitStage::SettingsResolved,
                UnitStage::Minimized,
                UnitStage::Equilibrated,
                UnitStage::ProductionRun,
                UnitStage::OutputsEmitted,
            ],
        };
        assert_eq!(result.stages, expected, "{}", result.name);
    }
}

#[test]
fn replica_states_are_read_back_from_sampler_storage() {
    let root = TempDir::new().unwrap();
    let backend = MockBackend::new();
    let p = protocol(1);
    let dag_result = execute(&p, &backend, &root);
    let result = p.result([&dag_result]).unwrap();

    let states = result.replica_states().unwrap();
    for (leg, per_repeat) in [(Leg::Solvent, &states.solvent), (Leg::Complex, &states.complex)] {
        let [iterations] = per_repeat.as_slice() else {
            panic!("expected one repeat for the {leg} leg");
        };
        let n_windows = backend
            .recorded()
            .iter()
            .find(|job| job.leg == leg)
            .unwrap()
            .states
            .len();
        assert_eq!(iterations.len(), STORED_ITERATIONS);
        assert!(iterations.iter().all(|row| row.len() == n_windows));
    }

    let mixing = result.replica_transition_statistics().unwrap();
    assert_eq!(mixing.complex[0].n_states(), 19);
    assert_eq!(result.overlap_matrices().solvent[0].n_states(), 19);
}

#[test]
fn complex_setup_restrains_both_ligands_to_the_receptor() {
    let root = TempDir::new().unwrap();
    let backend = MockBackend::new();
    let dag_result = execute(&protocol(1), &backend, &root);
    let artifact = setup_artifact(&dag_result, Leg::Complex);

    let summary = &artifact.restraints;
    assert!(summary.receptor_a.is_some());
    assert!(summary.receptor_b.is_some());
    assert!(summary.ligand_a.iter().all(|i| artifact.ligand_a_atoms.contains(i)));
    assert!(summary.ligand_b.iter().all(|i| artifact.ligand_b_atoms.contains(i)));
    for region in [LIGAND_A_REGION, LIGAND_B_REGION] {
        let force = artifact
            .system
            .force(&format!("boresch_restraint_{region}"))
            .unwrap();
        assert_eq!(force.group, Some(ForceGroup::BoreschRestraint));
    }
    assert!(artifact.system.force("alignment_restraint").is_none());
}

#[test]
fn solvent_setup_separates_ligands_and_aligns_them() {
    let root = TempDir::new().unwrap();
    let backend = MockBackend::new();
    let dag_result = execute(&protocol(1), &backend, &root);
    let artifact = setup_artifact(&dag_result, Leg::Solvent);

    assert_eq!(artifact.restraints.receptor_a, None);
    let force = artifact.system.force("alignment_restraint").unwrap();
    assert_eq!(force.group, Some(ForceGroup::AlignmentRestraint));

    let [_, central_a, _] = artifact.restraints.ligand_a;
    let [_, central_b, _] = artifact.restraints.ligand_b;
    let separation = (artifact.positions[central_a] - artifact.positions[central_b]).norm();
    assert!(separation > 0.3, "ligands overlap: {separation} nm apart");
}

#[test]
fn sampler_receives_interacting_convention_and_leg_specific_parameters() {
    let root = TempDir::new().unwrap();
    let backend = MockBackend::new();
    execute(&protocol(1), &backend, &root);

    let restraint_a = format!("lambda_restraints_{LIGAND_A_REGION}");
    let elec_a = format!("lambda_electrostatics_{LIGAND_A_REGION}");
    let elec_b = format!("lambda_electrostatics_{LIGAND_B_REGION}");
    for job in backend.recorded() {
        assert_eq!(job.states.len(), 19);
        let first = &job.states[0];
        let last = &job.states[job.states.len() - 1];
        assert_eq!(first.get(&elec_a), Some(1.0));
        assert_eq!(first.get(&elec_b), Some(0.0));
        assert_eq!(last.get(&elec_a), Some(0.0));
        assert_eq!(last.get(&elec_b), Some(1.0));
        match job.leg {
            Leg::Complex => assert_eq!(last.get(&restraint_a), Some(1.0)),
            Leg::Solvent => assert_eq!(first.get(&restraint_a), None),
        }
    }
}

#[test]
fn decoupling_a_ligand_removes_its_environment_interactions() {
    let root = TempDir::new().unwrap();
    let backend = MockBackend::new();
    let dag_result = execute(&protocol(1), &backend, &root);
    let artifact = setup_artifact(&dag_result, Leg::Solvent);
    let environment = environment_force_name(LIGAND_A_REGION);

    let mut state = AlchemicalState::from_system(&artifact.system);
    let coupled = state
        .energy_components(&artifact.system, &artifact.positions)
        .unwrap();
    assert!(coupled[&environment].abs() > TOLERANCE);

    state
        .set(&format!("lambda_electrostatics_{LIGAND_A_REGION}"), 0.0)
        .unwrap();
    state
        .set(&format!("lambda_sterics_{LIGAND_A_REGION}"), 0.0)
        .unwrap();
    let decoupled = state
        .energy_components(&artifact.system, &artifact.positions)
        .unwrap();
    assert!(decoupled[&environment].abs() < TOLERANCE);
    assert!(
        (decoupled[&environment_force_name(LIGAND_B_REGION)]
            - coupled[&environment_force_name(LIGAND_B_REGION)])
            .abs()
            < TOLERANCE
    );
}

/// Energy change of each region's environment and intra-region terms when one ligand A
/// parameter is lowered from fully coupled, ordered as env A, intra A, env B, intra B.
fn region_energy_changes(parameter: &str) -> [f64; 4] {
    let root = TempDir::new().unwrap();
    let backend = MockBackend::new();
    let dag_result = execute(&protocol(1), &backend, &root);
    let artifact = setup_artifact(&dag_result, Leg::Complex);

    let mut state = AlchemicalState::from_system(&artifact.system);
    let coupled = state
        .energy_components(&artifact.system, &artifact.positions)
        .unwrap();
    state.set(parameter, 0.3).unwrap();
    let toggled = state
        .energy_components(&artifact.system, &artifact.positions)
        .unwrap();

    [
        environment_force_name(LIGAND_A_REGION),
        intra_region_force_name(LIGAND_A_REGION),
        environment_force_name(LIGAND_B_REGION),
        intra_region_force_name(LIGAND_B_REGION),
    ]
    .map(|name| toggled[&name] - coupled[&name])
}

#[test]
fn electrostatics_lambda_only_scales_its_region_environment() {
    let [env_a, intra_a, env_b, intra_b] =
        region_energy_changes(&format!("lambda_electrostatics_{LIGAND_A_REGION}"));
    assert!(env_a.abs() > TOLERANCE);
    assert!(intra_a.abs() < TOLERANCE);
    assert!(env_b.abs() < TOLERANCE);
    assert!(intra_b.abs() < TOLERANCE);
}

#[test]
fn sterics_lambda_only_scales_its_region_environment() {
    let [env_a, intra_a, env_b, intra_b] =
        region_energy_changes(&format!("lambda_sterics_{LIGAND_A_REGION}"));
    assert!(env_a.abs() > TOLERANCE);
    assert!(intra_a.abs() < TOLERANCE);
    assert!(env_b.abs() < TOLERANCE);
    assert!(intra_b.abs() < TOLERANCE);
}

#[test]
fn run_unit_rejects_setup_output_of_another_repeat() {
    let root = TempDir::new().unwrap();
    let backend = MockBackend::new();
    let p = protocol(2);
    let dag = p
        .create(
            complex_state(ring_ligand("benzene", false)),
            complex_state(ring_ligand("toluene", true)),
            None,
        )
        .unwrap();
    let dag_result = run_dag(
        &dag,
        &p.settings,
        &backend,
        root.path(),
        &ProgressReporter::new(),
    )
    .unwrap();
    assert!(dag_result.ok());

    let run = dag
        .units_in(Phase::Run)
        .find(|u| u.key.leg == Leg::Solvent)
        .unwrap();
    let other_setup = dag_result
        .unit_results
        .iter()
        .find(|r| {
            r.key.leg == Leg::Solvent
                && r.key.phase == Phase::Setup
                && r.key.repeat_id != run.key.repeat_id
        })
        .unwrap();

    let shared = root.path().join("mismatched");
    let context = UnitContext::new(&shared, shared.join("scratch"));
    context.create_dirs().unwrap();
    let result = execute_unit(run, Some(other_setup), &p.settings, &backend, &context);
    assert!(!result.ok);
    assert!(result.error.unwrap().contains("setup output of repeat"));
    assert_eq!(result.stages, vec![UnitStage::Created, UnitStage::SettingsResolved]);
}

#[test]
fn failed_leg_is_excluded_and_result_reports_it_empty() {
    let root = TempDir::new().unwrap();
    let backend = MockBackend::failing(Leg::Complex);
    let p = protocol(1);
    let dag_result = execute(&p, &backend, &root);

    assert!(!dag_result.ok());
    let failed: Vec<_> = dag_result.unit_results.iter().filter(|r| !r.ok).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].key.leg, Leg::Complex);
    assert!(failed[0].error.as_deref().unwrap().contains("NaN"));

    let result = p.result([&dag_result]).unwrap();
    assert!(result.individual_estimates().complex.is_empty());
    assert!(matches!(
        result.estimate(),
        Err(ResultError::Empty { leg: Leg::Complex })
    ));
}
