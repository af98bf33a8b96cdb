use super::AlchemyError;
use crate::core::forces::{ForceError, System};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values of every alchemical parameter of a system for one thermodynamic state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlchemicalState {
    parameters: BTreeMap<String, f64>,
}

impl AlchemicalState {
    /// Reads the parameters a system exposes, initialized to their defaults.
    pub fn from_system(system: &System) -> Self {
        Self {
            parameters: system.global_parameters(),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    /// Sets a parameter the system exposes; unknown names and values outside [0, 1] are rejected.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), AlchemyError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(AlchemyError::ValueOutOfRange {
                name: name.to_string(),
                value,
            });
        }
        let slot = self
            .parameters
            .get_mut(name)
            .ok_or_else(|| AlchemyError::UnknownParameter(name.to_string()))?;
        *slot = value;
        Ok(())
    }

    pub fn parameters(&self) -> &BTreeMap<String, f64> {
        &self.parameters
    }

    /// Energy of each named force of `system` in this state, in kJ/mol.
    pub fn energy_components(
        &self,
        system: &System,
        positions: &[Point3<f64>],
    ) -> Result<BTreeMap<String, f64>, ForceError> {
        system.energy_by_force(positions, &self.parameters)
    }
}

/// Per-window values of alchemical parameters, one entry per controlled parameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LambdaProtocol {
    windows: BTreeMap<String, Vec<f64>>,
}

impl LambdaProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, parameter: String, values: Vec<f64>) -> Self {
        self.windows.insert(parameter, values);
        self
    }

    pub fn n_windows(&self) -> usize {
        self.windows.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &[f64])> + '_ {
        self.windows.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn values(&self, parameter: &str) -> Option<&[f64]> {
        self.windows.get(parameter).map(Vec::as_slice)
    }

    /// Builds one state per window by applying the schedule to `template`.
    pub fn states(&self, template: &AlchemicalState) -> Result<Vec<AlchemicalState>, AlchemyError> {
        let n_windows = self.n_windows();
        if self.windows.values().any(|v| v.len() != n_windows) {
            let lengths = self
                .windows
                .iter()
                .map(|(k, v)| format!("{k}: {}", v.len()))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AlchemyError::RaggedSchedule(lengths));
        }

        (0..n_windows)
            .map(|window| {
                let mut state = template.clone();
                for (name, values) in &self.windows {
                    state.set(name, values[window])?;
                }
                Ok(state)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forces::{Force, ForceKind};
    use crate::core::restraints::boresch::BoreschRestraint;

    fn restrained_system() -> System {
        let mut system = System::new(vec![1.0; 6]);
        let restraint = BoreschRestraint {
            receptor: [0, 1, 2],
            ligand: [3, 4, 5],
            k_distance: 100.0,
            k_theta: 10.0,
            r0: 0.5,
            theta_a0: 1.5,
            theta_b0: 1.5,
            phi_a0: 0.0,
            phi_b0: 0.0,
            phi_c0: 0.0,
            control_parameter: Some("lambda_restraints_ligandA".to_string()),
        };
        system.add_force(Force::new(
            "boresch_restraint_ligandA",
            ForceKind::Boresch(restraint),
        ));
        system
    }

    #[test]
    fn from_system_exposes_restraint_parameter_at_default() {
        let state = AlchemicalState::from_system(&restrained_system());
        assert_eq!(state.get("lambda_restraints_ligandA"), Some(1.0));
        assert_eq!(state.get("lambda_sterics_ligandA"), None);
    }

    #[test]
    fn set_rejects_unknown_and_out_of_range_values() {
        let mut state = AlchemicalState::from_system(&restrained_system());
        assert_eq!(
            state.set("lambda_sterics_ligandA", 0.5),
            Err(AlchemyError::UnknownParameter("lambda_sterics_ligandA".into()))
        );
        assert!(matches!(
            state.set("lambda_restraints_ligandA", 1.5),
            Err(AlchemyError::ValueOutOfRange { .. })
        ));
        state.set("lambda_restraints_ligandA", 0.25).unwrap();
        assert_eq!(state.get("lambda_restraints_ligandA"), Some(0.25));
    }

    #[test]
    fn protocol_builds_one_state_per_window() {
        let template = AlchemicalState::from_system(&restrained_system());
        let protocol =
            LambdaProtocol::new().with("lambda_restraints_ligandA".into(), vec![0.0, 0.5, 1.0]);
        let states = protocol.states(&template).unwrap();
        assert_eq!(states.len(), 3);
        assert_eq!(states[1].get("lambda_restraints_ligandA"), Some(0.5));
    }

    #[test]
    fn protocol_rejects_ragged_or_unknown_entries() {
        let template = AlchemicalState::from_system(&restrained_system());
        let ragged = LambdaProtocol::new()
            .with("lambda_restraints_ligandA".into(), vec![0.0, 1.0])
            .with("lambda_restraints_ligandB".into(), vec![0.0]);
        assert!(matches!(
            ragged.states(&template),
            Err(AlchemyError::RaggedSchedule(_))
        ));

        let unknown = LambdaProtocol::new().with("lambda_restraints_ligandB".into(), vec![0.0]);
        assert!(matches!(
            unknown.states(&template),
            Err(AlchemyError::UnknownParameter(_))
        ));
    }
}
