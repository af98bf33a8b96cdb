use super::settings::{
    ConfigError, LambdaSettings, MultiStateSimulationSettings, NonbondedMethod, SepTopSettings,
};
use crate::core::models::component::{Component, ComponentKind};
use crate::core::models::system::{AlchemicalComponents, ChemicalSystem};
use crate::core::units::{Mass, MassUnit, Time, TimeUnit};
use tracing::warn;

/// Relative tolerance used when checking that one duration divides another.
const DIVISIBILITY_TOLERANCE: f64 = 1e-6;

/// Checks that both end states hold a protein and a solvent component.
pub fn validate_endstates(
    state_a: &ChemicalSystem,
    state_b: &ChemicalSystem,
) -> Result<(), ConfigError> {
    for (kind, label) in [
        (ComponentKind::Protein, "ProteinComponent"),
        (ComponentKind::Solvent, "SolventComponent"),
    ] {
        for (state, name) in [(state_a, "stateA"), (state_b, "stateB")] {
            if state.count_kind(kind) == 0 {
                return Err(ConfigError::MissingComponent {
                    kind: label,
                    state: name,
                });
            }
        }
    }
    Ok(())
}

/// Checks that exactly one small molecule changes on each side of the transformation.
pub fn validate_alchemical_components(
    alchemical: &AlchemicalComponents,
) -> Result<(), ConfigError> {
    for (components, state) in [
        (&alchemical.state_a, "stateA"),
        (&alchemical.state_b, "stateB"),
    ] {
        if components.len() != 1 {
            return Err(ConfigError::AlchemicalCount {
                state,
                found: components.len(),
            });
        }
    }
    let all_small_molecules = alchemical
        .state_a
        .iter()
        .chain(&alchemical.state_b)
        .all(|c| c.kind() == ComponentKind::SmallMolecule);
    if !all_small_molecules {
        return Err(ConfigError::NonSmallMoleculeAlchemical);
    }
    Ok(())
}

/// Checks the shape and values of the lambda schedule against a leg's replica count.
///
/// Windows that leave charges on a ligand whose sterics are fully off are reported as
/// warnings only.
pub fn validate_lambda_schedule(
    lambda: &LambdaSettings,
    simulation: &MultiStateSimulationSettings,
) -> Result<(), ConfigError> {
    let lengths = lambda.sequences().map(|(_, values)| values.len());
    if lengths.iter().any(|&len| len != lengths[0]) {
        return Err(ConfigError::LambdaWindowMismatch {
            elec_a: lengths[0],
            elec_b: lengths[1],
            vdw_a: lengths[2],
            vdw_b: lengths[3],
            restraints_a: lengths[4],
            restraints_b: lengths[5],
        });
    }
    if lengths[0] == 0 {
        return Err(ConfigError::EmptyLambdaSchedule);
    }
    if simulation.n_replicas != lambda.lambda_vdw_ligand_b.len() {
        return Err(ConfigError::ReplicaMismatch {
            n_replicas: simulation.n_replicas,
            n_windows: lambda.lambda_vdw_ligand_b.len(),
        });
    }

    for (sequence, values) in lambda.sequences() {
        if let Some((window, &value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !(0.0..=1.0).contains(*v))
        {
            return Err(ConfigError::LambdaOutOfRange {
                sequence,
                window,
                value,
            });
        }
        check_monotonic(sequence, values)?;
    }

    if let Err(e) = check_naked_charges(lambda) {
        warn!("{e}");
    }
    Ok(())
}

fn check_monotonic(sequence: &'static str, values: &[f64]) -> Result<(), ConfigError> {
    let mut increasing = true;
    let mut decreasing = true;
    for (window, pair) in values.windows(2).enumerate() {
        increasing &= pair[1] >= pair[0];
        decreasing &= pair[1] <= pair[0];
        if !increasing && !decreasing {
            return Err(ConfigError::NonMonotonicLambda {
                sequence,
                window: window + 1,
            });
        }
    }
    Ok(())
}

/// Fails on the first window where a ligand still carries charge but has no steric
/// interactions.
pub fn check_naked_charges(lambda: &LambdaSettings) -> Result<(), ConfigError> {
    for (ligand, elec, vdw) in [
        (
            "ligandA",
            &lambda.lambda_elec_ligand_a,
            &lambda.lambda_vdw_ligand_a,
        ),
        (
            "ligandB",
            &lambda.lambda_elec_ligand_b,
            &lambda.lambda_vdw_ligand_b,
        ),
    ] {
        for (window, (&e, &v)) in elec.iter().zip(vdw.iter()).enumerate() {
            if e < 1.0 && v == 1.0 {
                return Err(ConfigError::NakedCharge {
                    ligand,
                    window,
                    elec: e,
                    vdw: v,
                });
            }
        }
    }
    Ok(())
}

/// Both alchemical ligands must carry the same net formal charge.
pub fn validate_charge_difference(alchemical: &AlchemicalComponents) -> Result<(), ConfigError> {
    let net_charge = |components: &[Component]| -> i32 {
        components
            .iter()
            .filter_map(Component::as_small_molecule)
            .map(|m| m.net_charge())
            .sum()
    };
    let difference = net_charge(&alchemical.state_a) - net_charge(&alchemical.state_b);
    if difference != 0 {
        return Err(ConfigError::ChargeDifference { difference });
    }
    Ok(())
}

/// At most one solvent component, and only with a periodic nonbonded method.
pub fn validate_solvent(
    state: &ChemicalSystem,
    nonbonded_method: NonbondedMethod,
) -> Result<(), ConfigError> {
    match state.count_kind(ComponentKind::Solvent) {
        0 => Ok(()),
        1 if nonbonded_method.is_periodic() => Ok(()),
        1 => Err(ConfigError::IncompatibleSolvent {
            method: nonbonded_method,
        }),
        _ => Err(ConfigError::MultipleComponents {
            kind: "SolventComponent",
        }),
    }
}

pub fn validate_protein(state: &ChemicalSystem) -> Result<(), ConfigError> {
    if state.count_kind(ComponentKind::Protein) > 1 {
        return Err(ConfigError::MultipleComponents {
            kind: "ProteinComponent",
        });
    }
    Ok(())
}

/// Timesteps above 2 fs need hydrogen-mass repartitioning to at least 3 amu.
pub fn validate_timestep(hydrogen_mass: Mass, timestep: Time) -> Result<(), ConfigError> {
    if hydrogen_mass.magnitude_in(MassUnit::Amu) < 3.0
        && timestep.magnitude_in(TimeUnit::Femtosecond) > 2.0 + DIVISIBILITY_TOLERANCE
    {
        return Err(ConfigError::TimestepTooLarge {
            timestep: timestep.to_string(),
            hydrogen_mass: hydrogen_mass.to_string(),
        });
    }
    Ok(())
}

/// Number of whole `step`s in `length`, failing when `length` is not a multiple of `step`.
pub fn whole_multiple(
    name: &'static str,
    length: Time,
    step_name: &'static str,
    step: Time,
) -> Result<usize, ConfigError> {
    let not_whole = || ConfigError::NonIntegerIterations {
        name,
        length: length.to_string(),
        step_name,
        step: step.to_string(),
    };
    if step.canonical() <= 0.0 || length.canonical() < 0.0 {
        return Err(not_whole());
    }
    let ratio = length.canonical() / step.canonical();
    let rounded = ratio.round();
    if (ratio - rounded).abs() > DIVISIBILITY_TOLERANCE * rounded.max(1.0) {
        return Err(not_whole());
    }
    Ok(rounded as usize)
}

/// Checks everything that does not depend on the chemical systems.
pub fn validate_settings(settings: &SepTopSettings) -> Result<(), ConfigError> {
    if settings.protocol_repeats == 0 {
        return Err(ConfigError::InvalidValue {
            name: "protocol-repeats",
            reason: "at least one repeat is required".to_string(),
        });
    }
    if settings.complex_restraints_settings.k_theta.is_none() {
        return Err(ConfigError::MissingParameter("complex-restraints-settings.k-theta"));
    }
    if settings.alchemical_settings.softcore_alpha < 0.0 {
        return Err(ConfigError::InvalidValue {
            name: "alchemical-settings.softcore-alpha",
            reason: "must not be negative".to_string(),
        });
    }

    let timestep = settings.integrator_settings.timestep;
    for (forcefield, simulation, output) in [
        (
            &settings.solvent_forcefield_settings,
            &settings.solvent_simulation_settings,
            &settings.solvent_output_settings,
        ),
        (
            &settings.complex_forcefield_settings,
            &settings.complex_simulation_settings,
            &settings.complex_output_settings,
        ),
    ] {
        validate_timestep(forcefield.hydrogen_mass, timestep)?;
        validate_lambda_schedule(&settings.lambda_settings, simulation)?;
        let per_iteration = simulation.time_per_iteration;
        whole_multiple("time-per-iteration", per_iteration, "timestep", timestep)?;
        whole_multiple(
            "equilibration-length",
            simulation.equilibration_length,
            "time-per-iteration",
            per_iteration,
        )?;
        whole_multiple(
            "production-length",
            simulation.production_length,
            "time-per-iteration",
            per_iteration,
        )?;
        whole_multiple(
            "checkpoint-interval",
            output.checkpoint_interval,
            "time-per-iteration",
            per_iteration,
        )?;
    }

    for equil in [
        &settings.solvent_equil_simulation_settings,
        &settings.complex_equil_simulation_settings,
    ] {
        let lengths = [
            ("equilibration-length-nvt", equil.equilibration_length_nvt),
            ("equilibration-length", Some(equil.equilibration_length)),
            ("production-length", Some(equil.production_length)),
        ];
        for (name, length) in lengths {
            if let Some(length) = length {
                whole_multiple(name, length, "timestep", timestep)?;
            }
        }
    }
    Ok(())
}
