//! Protocol settings.
//!
//! [`SepTopSettings`] gathers every option group of the protocol. Groups that differ between
//! the two legs exist twice (`solvent-*` and `complex-*`); the leg strategies in
//! [`crate::engine::legs`] pick the right copy. All groups deserialize from partial TOML, with
//! missing keys taking the protocol defaults.

use crate::core::restraints::receptor::AnchorCriteria;
use crate::core::units::{
    AngularForceConstant, AngularForceConstantUnit, DistanceForceConstant,
    DistanceForceConstantUnit, Length, LengthUnit, Mass, MassUnit, Pressure, PressureUnit,
    Temperature, TemperatureUnit, Time, TimeUnit,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No {kind} found in {state}")]
    MissingComponent { kind: &'static str, state: &'static str },

    #[error(
        "Exactly one alchemical component must be present in {state}. Found {found} alchemical components in {state}"
    )]
    AlchemicalCount { state: &'static str, found: usize },

    #[error("Non SmallMoleculeComponent alchemical species are not currently supported")]
    NonSmallMoleculeAlchemical,

    #[error(
        "Components elec, vdw, and restraints must have equal amount of lambda windows. Got {elec_a} and {elec_b} elec lambda windows, {vdw_a} and {vdw_b} vdw lambda windows, and {restraints_a} and {restraints_b} restraints lambda windows."
    )]
    LambdaWindowMismatch {
        elec_a: usize,
        elec_b: usize,
        vdw_a: usize,
        vdw_b: usize,
        restraints_a: usize,
        restraints_b: usize,
    },

    #[error("The lambda schedule has no windows")]
    EmptyLambdaSchedule,

    #[error("Number of replicas {n_replicas} does not equal the number of lambda windows {n_windows}")]
    ReplicaMismatch { n_replicas: usize, n_windows: usize },

    #[error("Lambda value {value} at window {window} of '{sequence}' is outside [0, 1]")]
    LambdaOutOfRange {
        sequence: &'static str,
        window: usize,
        value: f64,
    },

    #[error("Lambda sequence '{sequence}' is not monotonic at window {window}")]
    NonMonotonicLambda { sequence: &'static str, window: usize },

    #[error(
        "There are states along this lambda schedule where there are atoms with charges but no LJ interactions: {ligand} lambda {window}: elec {elec} vdW {vdw}"
    )]
    NakedCharge {
        ligand: &'static str,
        window: usize,
        elec: f64,
        vdw: f64,
    },

    #[error(
        "A charge difference of {difference} is observed between the end states. Alchemical transformations between ligands with different net charges are not supported"
    )]
    ChargeDifference { difference: i32 },

    #[error("Multiple {kind}s found in state; only one is supported")]
    MultipleComponents { kind: &'static str },

    #[error("Solvent components are not compatible with the {method} nonbonded method")]
    IncompatibleSolvent { method: NonbondedMethod },

    #[error(
        "Timestep {timestep} is too large for hydrogen mass {hydrogen_mass}; use a timestep of at most 2 fs or repartition to at least 3 amu"
    )]
    TimestepTooLarge { timestep: String, hydrogen_mass: String },

    #[error("{name} ({length}) is not a whole multiple of {step_name} ({step})")]
    NonIntegerIterations {
        name: &'static str,
        length: String,
        step_name: &'static str,
        step: String,
    },

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Extending a previous calculation is not supported")]
    ExtensionUnsupported,

    #[error("Could not parse settings: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintPolicy {
    None,
    #[serde(rename = "hbonds")]
    HBonds,
    #[serde(rename = "allbonds")]
    AllBonds,
    #[serde(rename = "hangles")]
    HAngles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NonbondedMethod {
    Pme,
    NoCutoff,
    CutoffPeriodic,
    CutoffNonPeriodic,
}

impl NonbondedMethod {
    pub fn is_periodic(self) -> bool {
        matches!(self, Self::Pme | Self::CutoffPeriodic)
    }
}

impl fmt::Display for NonbondedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pme => "PME",
            Self::NoCutoff => "NoCutoff",
            Self::CutoffPeriodic => "CutoffPeriodic",
            Self::CutoffNonPeriodic => "CutoffNonPeriodic",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ForcefieldSettings {
    pub constraints: ConstraintPolicy,
    pub rigid_water: bool,
    pub remove_com: bool,
    /// Mass assigned to hydrogens by hydrogen-mass repartitioning.
    pub hydrogen_mass: Mass,
    pub forcefields: Vec<String>,
    pub small_molecule_forcefield: String,
    pub nonbonded_method: NonbondedMethod,
    pub nonbonded_cutoff: Length,
}

impl Default for ForcefieldSettings {
    fn default() -> Self {
        Self {
            constraints: ConstraintPolicy::HBonds,
            rigid_water: true,
            remove_com: false,
            hydrogen_mass: Mass::new(3.0, MassUnit::Amu),
            forcefields: vec![
                "amber/ff14SB.xml".to_string(),
                "amber/tip3p_standard.xml".to_string(),
                "amber/tip3p_HFE_multivalent.xml".to_string(),
                "amber/phosaa10.xml".to_string(),
            ],
            small_molecule_forcefield: "openff-2.1.1".to_string(),
            nonbonded_method: NonbondedMethod::Pme,
            nonbonded_cutoff: Length::new(1.0, LengthUnit::Nanometer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ThermoSettings {
    pub temperature: Temperature,
    pub pressure: Pressure,
}

impl Default for ThermoSettings {
    fn default() -> Self {
        Self {
            temperature: Temperature::new(298.15, TemperatureUnit::Kelvin),
            pressure: Pressure::new(1.0, PressureUnit::Bar),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AlchemicalSettings {
    /// Alpha of the Beutler softcore Lennard-Jones potential.
    pub softcore_alpha: f64,
}

impl Default for AlchemicalSettings {
    fn default() -> Self {
        Self {
            softcore_alpha: 0.5,
        }
    }
}

/// The lambda schedule, one value per window for each ligand and energy term.
///
/// A value of 0 means the term is fully coupled and 1 fully decoupled for the electrostatics
/// and sterics sequences. Restraint sequences give the fraction of the restraint switched on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LambdaSettings {
    pub lambda_elec_ligand_a: Vec<f64>,
    pub lambda_elec_ligand_b: Vec<f64>,
    pub lambda_vdw_ligand_a: Vec<f64>,
    pub lambda_vdw_ligand_b: Vec<f64>,
    pub lambda_restraints_ligand_a: Vec<f64>,
    pub lambda_restraints_ligand_b: Vec<f64>,
}

impl LambdaSettings {
    /// Every sequence with its settings name, in a fixed order.
    pub fn sequences(&self) -> [(&'static str, &[f64]); 6] {
        [
            ("lambda-elec-ligand-a", &self.lambda_elec_ligand_a),
            ("lambda-elec-ligand-b", &self.lambda_elec_ligand_b),
            ("lambda-vdw-ligand-a", &self.lambda_vdw_ligand_a),
            ("lambda-vdw-ligand-b", &self.lambda_vdw_ligand_b),
            ("lambda-restraints-ligand-a", &self.lambda_restraints_ligand_a),
            ("lambda-restraints-ligand-b", &self.lambda_restraints_ligand_b),
        ]
    }
}

impl Default for LambdaSettings {
    fn default() -> Self {
        let restraints_a = vec![
            0.0, 0.05, 0.1, 0.3, 0.5, 0.75, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
            1.0, 1.0,
        ];
        let elec_a = vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.25, 0.5, 0.75, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
            1.0, 1.0,
        ];
        let vdw_a = vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.14, 0.29, 0.43, 0.57,
            0.71, 0.86, 1.0,
        ];
        let reversed = |v: &[f64]| v.iter().rev().copied().collect::<Vec<_>>();
        Self {
            lambda_elec_ligand_b: reversed(&elec_a),
            lambda_vdw_ligand_b: reversed(&vdw_a),
            lambda_restraints_ligand_b: reversed(&restraints_a),
            lambda_elec_ligand_a: elec_a,
            lambda_vdw_ligand_a: vdw_a,
            lambda_restraints_ligand_a: restraints_a,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PartialChargeSettings {
    pub partial_charge_method: String,
    pub off_toolkit_backend: String,
    pub number_of_conformers: Option<usize>,
    pub nagl_model: Option<String>,
}

impl Default for PartialChargeSettings {
    fn default() -> Self {
        Self {
            partial_charge_method: "am1bcc".to_string(),
            off_toolkit_backend: "ambertools".to_string(),
            number_of_conformers: None,
            nagl_model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SolvationSettings {
    pub solvent_model: String,
    pub solvent_padding: Length,
}

impl Default for SolvationSettings {
    fn default() -> Self {
        Self {
            solvent_model: "tip3p".to_string(),
            solvent_padding: Length::new(1.2, LengthUnit::Nanometer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineSettings {
    /// Backend platform name; `None` lets the backend choose the fastest available.
    pub compute_platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IntegratorSettings {
    pub timestep: Time,
    /// Langevin collision rate, in 1/ps.
    pub langevin_collision_rate: f64,
    /// Monte Carlo barostat attempt frequency, in timesteps.
    pub barostat_frequency: u32,
    pub constraint_tolerance: f64,
    pub reassign_velocities: bool,
    pub n_restart_attempts: u32,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            timestep: Time::new(4.0, TimeUnit::Femtosecond),
            langevin_collision_rate: 1.0,
            barostat_frequency: 25,
            constraint_tolerance: 1e-6,
            reassign_velocities: false,
            n_restart_attempts: 20,
        }
    }
}

/// Plain MD run used to equilibrate a leg before the multistate simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MdSimulationSettings {
    pub minimization_steps: usize,
    /// Optional NVT stage before NPT equilibration.
    pub equilibration_length_nvt: Option<Time>,
    pub equilibration_length: Time,
    pub production_length: Time,
}

impl Default for MdSimulationSettings {
    fn default() -> Self {
        Self {
            minimization_steps: 5000,
            equilibration_length_nvt: None,
            equilibration_length: Time::new(0.2, TimeUnit::Nanosecond),
            production_length: Time::new(0.5, TimeUnit::Nanosecond),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MdOutputSettings {
    pub equil_nvt_structure: Option<String>,
    pub equil_npt_structure: Option<String>,
    pub production_trajectory_filename: Option<String>,
    pub log_output: Option<String>,
    pub trajectory_write_interval: Time,
}

impl Default for MdOutputSettings {
    fn default() -> Self {
        Self {
            equil_nvt_structure: None,
            equil_npt_structure: Some("equil_structure.pdb".to_string()),
            production_trajectory_filename: Some("production_equil.xtc".to_string()),
            log_output: Some("equil_simulation.log".to_string()),
            trajectory_write_interval: Time::new(20.0, TimeUnit::Picosecond),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplerMethod {
    Repex,
    Sams,
    Independent,
}

impl SamplerMethod {
    /// Whether replicas swap states, producing replica transition statistics.
    pub fn exchanges_replicas(self) -> bool {
        !matches!(self, Self::Independent)
    }
}

impl fmt::Display for SamplerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Repex => "repex",
            Self::Sams => "sams",
            Self::Independent => "independent",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MultiStateSimulationSettings {
    pub sampler_method: SamplerMethod,
    pub n_replicas: usize,
    pub minimization_steps: usize,
    pub equilibration_length: Time,
    pub production_length: Time,
    pub time_per_iteration: Time,
}

impl Default for MultiStateSimulationSettings {
    fn default() -> Self {
        Self {
            sampler_method: SamplerMethod::Repex,
            n_replicas: 19,
            minimization_steps: 5000,
            equilibration_length: Time::new(1.0, TimeUnit::Nanosecond),
            production_length: Time::new(5.0, TimeUnit::Nanosecond),
            time_per_iteration: Time::new(2.5, TimeUnit::Picosecond),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MultiStateOutputSettings {
    pub output_filename: String,
    pub checkpoint_storage_filename: String,
    pub checkpoint_interval: Time,
}

impl Default for MultiStateOutputSettings {
    fn default() -> Self {
        Self {
            output_filename: "simulation.nc".to_string(),
            checkpoint_storage_filename: "checkpoint.nc".to_string(),
            checkpoint_interval: Time::new(250.0, TimeUnit::Picosecond),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RestraintsSettings {
    pub k_distance: DistanceForceConstant,
    /// Angular force constant of the Boresch restraint; unused by the solvent leg.
    pub k_theta: Option<AngularForceConstant>,
    pub anchors: AnchorCriteria,
}

impl Default for RestraintsSettings {
    fn default() -> Self {
        Self {
            k_distance: DistanceForceConstant::new(
                8368.0,
                DistanceForceConstantUnit::KilojoulePerMoleNm2,
            ),
            k_theta: None,
            anchors: AnchorCriteria::default(),
        }
    }
}

/// Complete settings of a SepTop calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SepTopSettings {
    pub protocol_repeats: usize,
    pub solvent_forcefield_settings: ForcefieldSettings,
    pub complex_forcefield_settings: ForcefieldSettings,
    pub thermo_settings: ThermoSettings,
    pub alchemical_settings: AlchemicalSettings,
    pub lambda_settings: LambdaSettings,
    pub partial_charge_settings: PartialChargeSettings,
    pub solvent_solvation_settings: SolvationSettings,
    pub complex_solvation_settings: SolvationSettings,
    pub solvent_engine_settings: EngineSettings,
    pub complex_engine_settings: EngineSettings,
    pub integrator_settings: IntegratorSettings,
    pub solvent_equil_simulation_settings: MdSimulationSettings,
    pub complex_equil_simulation_settings: MdSimulationSettings,
    pub solvent_equil_output_settings: MdOutputSettings,
    pub complex_equil_output_settings: MdOutputSettings,
    pub solvent_simulation_settings: MultiStateSimulationSettings,
    pub complex_simulation_settings: MultiStateSimulationSettings,
    pub solvent_output_settings: MultiStateOutputSettings,
    pub complex_output_settings: MultiStateOutputSettings,
    pub solvent_restraints_settings: RestraintsSettings,
    pub complex_restraints_settings: RestraintsSettings,
}

impl Default for SepTopSettings {
    fn default() -> Self {
        Self {
            protocol_repeats: 1,
            solvent_forcefield_settings: ForcefieldSettings::default(),
            complex_forcefield_settings: ForcefieldSettings::default(),
            thermo_settings: ThermoSettings::default(),
            alchemical_settings: AlchemicalSettings::default(),
            lambda_settings: LambdaSettings::default(),
            partial_charge_settings: PartialChargeSettings::default(),
            solvent_solvation_settings: SolvationSettings {
                solvent_padding: Length::new(1.8, LengthUnit::Nanometer),
                ..SolvationSettings::default()
            },
            complex_solvation_settings: SolvationSettings::default(),
            solvent_engine_settings: EngineSettings::default(),
            complex_engine_settings: EngineSettings::default(),
            integrator_settings: IntegratorSettings::default(),
            solvent_equil_simulation_settings: MdSimulationSettings {
                equilibration_length_nvt: Some(Time::new(0.1, TimeUnit::Nanosecond)),
                ..MdSimulationSettings::default()
            },
            complex_equil_simulation_settings: MdSimulationSettings::default(),
            solvent_equil_output_settings: MdOutputSettings {
                equil_nvt_structure: Some("equil_nvt_structure.pdb".to_string()),
                equil_npt_structure: Some("equil_npt_structure.pdb".to_string()),
                ..MdOutputSettings::default()
            },
            complex_equil_output_settings: MdOutputSettings::default(),
            solvent_simulation_settings: MultiStateSimulationSettings {
                minimization_steps: 10000,
                equilibration_length: Time::new(1.0, TimeUnit::Nanosecond),
                production_length: Time::new(10.0, TimeUnit::Nanosecond),
                ..MultiStateSimulationSettings::default()
            },
            complex_simulation_settings: MultiStateSimulationSettings {
                equilibration_length: Time::new(0.5, TimeUnit::Nanosecond),
                production_length: Time::new(2.0, TimeUnit::Nanosecond),
                ..MultiStateSimulationSettings::default()
            },
            solvent_output_settings: MultiStateOutputSettings {
                output_filename: "solvent.nc".to_string(),
                checkpoint_storage_filename: "solvent_checkpoint.nc".to_string(),
                ..MultiStateOutputSettings::default()
            },
            complex_output_settings: MultiStateOutputSettings {
                output_filename: "complex.nc".to_string(),
                checkpoint_storage_filename: "complex_checkpoint.nc".to_string(),
                ..MultiStateOutputSettings::default()
            },
            solvent_restraints_settings: RestraintsSettings {
                k_distance: DistanceForceConstant::new(
                    1000.0,
                    DistanceForceConstantUnit::KilojoulePerMoleNm2,
                ),
                ..RestraintsSettings::default()
            },
            complex_restraints_settings: RestraintsSettings {
                k_theta: Some(AngularForceConstant::new(
                    83.68,
                    AngularForceConstantUnit::KilojoulePerMoleRad2,
                )),
                ..RestraintsSettings::default()
            },
        }
    }
}

impl SepTopSettings {
    /// Parses settings from TOML; keys that are absent keep their default values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_protocol_values() {
        let settings = SepTopSettings::default();
        assert_eq!(settings.protocol_repeats, 1);
        assert_eq!(settings.solvent_simulation_settings.n_replicas, 19);
        assert_eq!(settings.complex_simulation_settings.n_replicas, 19);
        assert_eq!(settings.thermo_settings.temperature.magnitude(), 298.15);
        assert_eq!(
            settings
                .integrator_settings
                .timestep
                .magnitude_in(TimeUnit::Femtosecond),
            4.0
        );
        assert_eq!(settings.complex_restraints_settings.k_distance.canonical(), 8368.0);
        assert_eq!(settings.solvent_restraints_settings.k_distance.canonical(), 1000.0);
        assert!(settings.solvent_restraints_settings.k_theta.is_none());
        assert_eq!(settings.complex_output_settings.output_filename, "complex.nc");
    }

    #[test]
    fn default_schedule_has_one_window_per_replica() {
        let lambda = LambdaSettings::default();
        for (name, values) in lambda.sequences() {
            assert_eq!(values.len(), 19, "{name}");
        }
        assert_eq!(lambda.lambda_vdw_ligand_b[0], 1.0);
        assert_eq!(lambda.lambda_vdw_ligand_b[18], 0.0);
    }

    #[test]
    fn toml_round_trip_reproduces_settings() {
        let mut settings = SepTopSettings::default();
        settings.protocol_repeats = 3;
        settings.complex_engine_settings.compute_platform = Some("CUDA".to_string());
        settings.complex_simulation_settings.sampler_method = SamplerMethod::Independent;

        let text = settings.to_toml_string().unwrap();
        assert!(text.contains("protocol-repeats = 3"));
        assert!(text.contains("\"298.15 kelvin\""));
        assert_eq!(SepTopSettings::from_toml_str(&text).unwrap(), settings);
    }

    #[test]
    fn json_round_trip_reproduces_settings() {
        let settings = SepTopSettings::default();
        let text = serde_json::to_string(&settings).unwrap();
        let back: SepTopSettings = serde_json::from_str(&text).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_keys() {
        let settings = SepTopSettings::from_toml_str(
            r#"
            protocol-repeats = 2

            [integrator-settings]
            timestep = "2 fs"

            [solvent-simulation-settings]
            n-replicas = 11
            "#,
        )
        .unwrap();
        assert_eq!(settings.protocol_repeats, 2);
        assert_eq!(settings.integrator_settings.timestep.magnitude(), 2.0);
        assert_eq!(settings.integrator_settings.barostat_frequency, 25);
        assert_eq!(settings.solvent_simulation_settings.n_replicas, 11);
        assert_eq!(
            settings.thermo_settings,
            ThermoSettings::default(),
        );
    }

    #[test]
    fn quantities_with_wrong_dimension_are_rejected() {
        let result = SepTopSettings::from_toml_str(
            r#"
            [thermo-settings]
            temperature = "300 bar"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn nonbonded_method_periodicity() {
        assert!(NonbondedMethod::Pme.is_periodic());
        assert!(NonbondedMethod::CutoffPeriodic.is_periodic());
        assert!(!NonbondedMethod::NoCutoff.is_periodic());
        assert!(!NonbondedMethod::CutoffNonPeriodic.is_periodic());
    }
}
