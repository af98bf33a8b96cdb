//! Leg-specific behavior of the execution driver.
//!
//! The solvent and complex legs differ in which settings groups they read, which components
//! they simulate, how ligand B is positioned relative to ligand A, which restraints tie the
//! ligands in place and which lambda dimensions the sampler sees. Each leg implements
//! [`LegStrategy`]; the driver picks one with [`strategy_for`] and never branches on the leg
//! itself.

use super::settings::{
    AlchemicalSettings, ConfigError, EngineSettings, ForcefieldSettings, IntegratorSettings,
    LambdaSettings, MdOutputSettings, MdSimulationSettings, MultiStateOutputSettings,
    MultiStateSimulationSettings, PartialChargeSettings, RestraintsSettings, SepTopSettings,
    SolvationSettings, ThermoSettings,
};
use super::unit::{Leg, Transformation};
use super::validation::validate_timestep;
use crate::core::alchemy::state::LambdaProtocol;
use crate::core::alchemy::{LIGAND_A_REGION, LIGAND_B_REGION, LambdaKind, lambda_parameter};
use crate::core::forces::groups::assign_force_groups;
use crate::core::forces::{Force, ForceKind, System};
use crate::core::models::component::{
    Component, ProteinComponent, SmallMoleculeComponent, SolventComponent,
};
use crate::core::models::system::AlchemicalComponents;
use crate::core::models::topology::Topology;
use crate::core::restraints::{GeometryError, check_indices};
use crate::core::restraints::boresch::BoreschRestraint;
use crate::core::restraints::placement::{alignment_restraint, solvent_offset, superpose_on_backbone};
use crate::core::restraints::receptor::{check_receptor_idxs, select_receptor_idxs};
use crate::core::units::{AngularForceConstantUnit, DistanceForceConstantUnit};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The settings groups that apply to one leg.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSettings<'a> {
    pub forcefield: &'a ForcefieldSettings,
    pub thermo: &'a ThermoSettings,
    pub charges: &'a PartialChargeSettings,
    pub solvation: &'a SolvationSettings,
    pub alchemical: &'a AlchemicalSettings,
    pub lambda: &'a LambdaSettings,
    pub engine: &'a EngineSettings,
    pub integrator: &'a IntegratorSettings,
    pub equil_simulation: &'a MdSimulationSettings,
    pub equil_output: &'a MdOutputSettings,
    pub simulation: &'a MultiStateSimulationSettings,
    pub output: &'a MultiStateOutputSettings,
    pub restraints: &'a RestraintsSettings,
}

/// Components simulated by one leg.
#[derive(Debug, Clone)]
pub struct LegComponents<'a> {
    pub ligand_a: &'a SmallMoleculeComponent,
    pub ligand_b: &'a SmallMoleculeComponent,
    pub solvent: Option<&'a SolventComponent>,
    pub protein: Option<&'a ProteinComponent>,
    /// Non-alchemical small molecules (cofactors) present in both end states.
    pub cofactors: Vec<&'a SmallMoleculeComponent>,
}

/// An end-state frame: its topology, coordinates and the particles of its alchemical ligand.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub topology: &'a Topology,
    pub positions: &'a [Point3<f64>],
    pub ligand_atoms: &'a [usize],
}

/// Reference atoms of both ligands, as particle indices of the combined system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LigandReferences {
    pub ligand_a: [usize; 3],
    pub ligand_b: [usize; 3],
}

/// What a leg added to keep the ligands in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RestraintSummary {
    pub ligand_a: [usize; 3],
    pub ligand_b: [usize; 3],
    /// Receptor anchors of each Boresch restraint; absent in the solvent leg.
    pub receptor_a: Option<[usize; 3]>,
    pub receptor_b: Option<[usize; 3]>,
    pub forces: Vec<String>,
}

pub trait LegStrategy: Send + Sync {
    fn leg(&self) -> Leg;

    /// Picks this leg's settings groups and checks the timestep against hydrogen masses.
    fn resolve_settings<'a>(
        &self,
        settings: &'a SepTopSettings,
    ) -> Result<ResolvedSettings<'a>, ConfigError>;

    fn components<'a>(
        &self,
        transformation: &'a Transformation,
        alchemical: &'a AlchemicalComponents,
    ) -> Result<LegComponents<'a>, ConfigError>;

    /// Returns the coordinates of frame B moved into place relative to frame A.
    fn update_positions(
        &self,
        frame_a: Frame<'_>,
        frame_b: Frame<'_>,
    ) -> Result<Vec<Point3<f64>>, GeometryError>;

    fn add_restraints(
        &self,
        system: &mut System,
        topology: &Topology,
        positions: &[Point3<f64>],
        references: LigandReferences,
        settings: &RestraintsSettings,
    ) -> Result<RestraintSummary, GeometryError>;

    /// Lambda schedule in the sampler's convention, where 1 means fully interacting.
    fn lambda_schedule(&self, lambda: &LambdaSettings) -> LambdaProtocol;
}

pub fn strategy_for(leg: Leg) -> &'static dyn LegStrategy {
    match leg {
        Leg::Solvent => &SolventLeg,
        Leg::Complex => &ComplexLeg,
    }
}

fn single_small_molecule<'a>(
    components: &'a [Component],
    state: &'static str,
) -> Result<&'a SmallMoleculeComponent, ConfigError> {
    match components {
        [only] => only
            .as_small_molecule()
            .ok_or(ConfigError::NonSmallMoleculeAlchemical),
        _ => Err(ConfigError::AlchemicalCount {
            state,
            found: components.len(),
        }),
    }
}

fn alchemical_pair(
    alchemical: &AlchemicalComponents,
) -> Result<(&SmallMoleculeComponent, &SmallMoleculeComponent), ConfigError> {
    Ok((
        single_small_molecule(&alchemical.state_a, "stateA")?,
        single_small_molecule(&alchemical.state_b, "stateB")?,
    ))
}

fn interaction_schedule(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| 1.0 - v).collect()
}

fn nonbonded_schedule(lambda: &LambdaSettings) -> LambdaProtocol {
    LambdaProtocol::new()
        .with(
            lambda_parameter(LambdaKind::Electrostatics, LIGAND_A_REGION),
            interaction_schedule(&lambda.lambda_elec_ligand_a),
        )
        .with(
            lambda_parameter(LambdaKind::Sterics, LIGAND_A_REGION),
            interaction_schedule(&lambda.lambda_vdw_ligand_a),
        )
        .with(
            lambda_parameter(LambdaKind::Electrostatics, LIGAND_B_REGION),
            interaction_schedule(&lambda.lambda_elec_ligand_b),
        )
        .with(
            lambda_parameter(LambdaKind::Sterics, LIGAND_B_REGION),
            interaction_schedule(&lambda.lambda_vdw_ligand_b),
        )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SolventLeg;

impl LegStrategy for SolventLeg {
    fn leg(&self) -> Leg {
        Leg::Solvent
    }

    fn resolve_settings<'a>(
        &self,
        s: &'a SepTopSettings,
    ) -> Result<ResolvedSettings<'a>, ConfigError> {
        validate_timestep(
            s.solvent_forcefield_settings.hydrogen_mass,
            s.integrator_settings.timestep,
        )?;
        Ok(ResolvedSettings {
            forcefield: &s.solvent_forcefield_settings,
            thermo: &s.thermo_settings,
            charges: &s.partial_charge_settings,
            solvation: &s.solvent_solvation_settings,
            alchemical: &s.alchemical_settings,
            lambda: &s.lambda_settings,
            engine: &s.solvent_engine_settings,
            integrator: &s.integrator_settings,
            equil_simulation: &s.solvent_equil_simulation_settings,
            equil_output: &s.solvent_equil_output_settings,
            simulation: &s.solvent_simulation_settings,
            output: &s.solvent_output_settings,
            restraints: &s.solvent_restraints_settings,
        })
    }

    /// Only the two ligands and the solvent; proteins and cofactors stay out of this leg.
    fn components<'a>(
        &self,
        transformation: &'a Transformation,
        alchemical: &'a AlchemicalComponents,
    ) -> Result<LegComponents<'a>, ConfigError> {
        let (ligand_a, ligand_b) = alchemical_pair(alchemical)?;
        let solvent = transformation
            .state_a
            .solvent()
            .ok_or(ConfigError::MissingComponent {
                kind: "SolventComponent",
                state: "stateA",
            })?;
        Ok(LegComponents {
            ligand_a,
            ligand_b,
            solvent: Some(solvent),
            protein: None,
            cofactors: Vec::new(),
        })
    }

    fn update_positions(
        &self,
        frame_a: Frame<'_>,
        frame_b: Frame<'_>,
    ) -> Result<Vec<Point3<f64>>, GeometryError> {
        let select = |frame: &Frame<'_>| -> Result<Vec<Point3<f64>>, GeometryError> {
            check_indices(frame.ligand_atoms, frame.positions.len())?;
            Ok(frame
                .ligand_atoms
                .iter()
                .map(|&i| frame.positions[i])
                .collect())
        };
        let offset = solvent_offset(
            &select(&frame_a)?,
            &select(&frame_b)?,
            frame_a.topology.box_edge_lengths(),
        )?;
        debug!(
            dx = offset.x,
            dy = offset.y,
            dz = offset.z,
            "Offsetting ligand B in solvent."
        );

        let mut positions = frame_b.positions.to_vec();
        for &i in frame_b.ligand_atoms {
            positions[i] += offset;
        }
        Ok(positions)
    }

    fn add_restraints(
        &self,
        system: &mut System,
        _topology: &Topology,
        positions: &[Point3<f64>],
        references: LigandReferences,
        settings: &RestraintsSettings,
    ) -> Result<RestraintSummary, GeometryError> {
        let k_distance = settings
            .k_distance
            .magnitude_in(DistanceForceConstantUnit::KilojoulePerMoleNm2);
        let force = alignment_restraint(
            positions,
            references.ligand_a[1],
            references.ligand_b[1],
            k_distance,
        )?;
        let name = force.name.clone();
        system.add_force(force);
        assign_force_groups(system);
        Ok(RestraintSummary {
            ligand_a: references.ligand_a,
            ligand_b: references.ligand_b,
            receptor_a: None,
            receptor_b: None,
            forces: vec![name],
        })
    }

    fn lambda_schedule(&self, lambda: &LambdaSettings) -> LambdaProtocol {
        nonbonded_schedule(lambda)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexLeg;

impl ComplexLeg {
    fn boresch_force(
        region: &str,
        receptor: [usize; 3],
        ligand: [usize; 3],
        positions: &[Point3<f64>],
        k_distance: f64,
        k_theta: f64,
    ) -> Force {
        let restraint = BoreschRestraint::from_positions(
            receptor,
            ligand,
            positions,
            k_distance,
            k_theta,
            Some(lambda_parameter(LambdaKind::Restraints, region)),
        );
        Force::new(
            &format!("boresch_restraint_{region}"),
            ForceKind::Boresch(restraint),
        )
    }
}

impl LegStrategy for ComplexLeg {
    fn leg(&self) -> Leg {
        Leg::Complex
    }

    fn resolve_settings<'a>(
        &self,
        s: &'a SepTopSettings,
    ) -> Result<ResolvedSettings<'a>, ConfigError> {
        validate_timestep(
            s.complex_forcefield_settings.hydrogen_mass,
            s.integrator_settings.timestep,
        )?;
        Ok(ResolvedSettings {
            forcefield: &s.complex_forcefield_settings,
            thermo: &s.thermo_settings,
            charges: &s.partial_charge_settings,
            solvation: &s.complex_solvation_settings,
            alchemical: &s.alchemical_settings,
            lambda: &s.lambda_settings,
            engine: &s.complex_engine_settings,
            integrator: &s.integrator_settings,
            equil_simulation: &s.complex_equil_simulation_settings,
            equil_output: &s.complex_equil_output_settings,
            simulation: &s.complex_simulation_settings,
            output: &s.complex_output_settings,
            restraints: &s.complex_restraints_settings,
        })
    }

    fn components<'a>(
        &self,
        transformation: &'a Transformation,
        alchemical: &'a AlchemicalComponents,
    ) -> Result<LegComponents<'a>, ConfigError> {
        let (ligand_a, ligand_b) = alchemical_pair(alchemical)?;
        let state_a = &transformation.state_a;
        let protein = state_a.protein().ok_or(ConfigError::MissingComponent {
            kind: "ProteinComponent",
            state: "stateA",
        })?;
        let solvent = state_a.solvent().ok_or(ConfigError::MissingComponent {
            kind: "SolventComponent",
            state: "stateA",
        })?;
        let cofactors = state_a
            .small_molecules()
            .filter(|&m| m != ligand_a)
            .collect();
        Ok(LegComponents {
            ligand_a,
            ligand_b,
            solvent: Some(solvent),
            protein: Some(protein),
            cofactors,
        })
    }

    /// Superimposes all of frame B onto frame A using the protein backbone.
    fn update_positions(
        &self,
        frame_a: Frame<'_>,
        frame_b: Frame<'_>,
    ) -> Result<Vec<Point3<f64>>, GeometryError> {
        superpose_on_backbone(
            frame_b.positions,
            &frame_b.topology.backbone_atoms(),
            frame_a.positions,
            &frame_a.topology.backbone_atoms(),
        )
    }

    /// Adds one Boresch restraint per ligand, sharing receptor anchors when they also suit
    /// ligand B.
    fn add_restraints(
        &self,
        system: &mut System,
        topology: &Topology,
        positions: &[Point3<f64>],
        references: LigandReferences,
        settings: &RestraintsSettings,
    ) -> Result<RestraintSummary, GeometryError> {
        let criteria = &settings.anchors;
        let candidates = topology.backbone_atoms();
        let receptor_a = select_receptor_idxs(positions, &candidates, references.ligand_a, criteria)?;
        let receptor_b =
            if check_receptor_idxs(positions, receptor_a, references.ligand_b, criteria) {
                receptor_a
            } else {
                select_receptor_idxs(positions, &candidates, references.ligand_b, criteria)?
            };
        debug!(?receptor_a, ?receptor_b, "Selected receptor anchors.");

        let k_distance = settings
            .k_distance
            .magnitude_in(DistanceForceConstantUnit::KilojoulePerMoleNm2);
        // Settings validation rejects a complex leg without an angular force constant.
        let k_theta = settings
            .k_theta
            .map_or(0.0, |k| k.magnitude_in(AngularForceConstantUnit::KilojoulePerMoleRad2));

        let mut forces = Vec::with_capacity(2);
        for (region, receptor, ligand) in [
            (LIGAND_A_REGION, receptor_a, references.ligand_a),
            (LIGAND_B_REGION, receptor_b, references.ligand_b),
        ] {
            let force =
                Self::boresch_force(region, receptor, ligand, positions, k_distance, k_theta);
            forces.push(force.name.clone());
            system.add_force(force);
        }
        assign_force_groups(system);

        Ok(RestraintSummary {
            ligand_a: references.ligand_a,
            ligand_b: references.ligand_b,
            receptor_a: Some(receptor_a),
            receptor_b: Some(receptor_b),
            forces,
        })
    }

    fn lambda_schedule(&self, lambda: &LambdaSettings) -> LambdaProtocol {
        nonbonded_schedule(lambda)
            .with(
                lambda_parameter(LambdaKind::Restraints, LIGAND_A_REGION),
                lambda.lambda_restraints_ligand_a.clone(),
            )
            .with(
                lambda_parameter(LambdaKind::Restraints, LIGAND_B_REGION),
                lambda.lambda_restraints_ligand_b.clone(),
            )
    }
}
