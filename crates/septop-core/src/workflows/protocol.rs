use super::results::{ResultError, SepTopProtocolResult};
use crate::core::models::component::Component;
use crate::core::models::system::{ChemicalSystem, alchemical_components};
use crate::engine::citations::register_citations;
use crate::engine::driver::{DagResult, UnitResult};
use crate::engine::settings::{ConfigError, SepTopSettings};
use crate::engine::unit::{Leg, Phase, ProtocolDag, RepeatId, Transformation};
use crate::engine::validation::{
    validate_alchemical_components, validate_charge_difference, validate_endstates,
    validate_protein, validate_settings, validate_solvent,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// Unit results grouped by leg and phase, then by repeat, each group ordered by generation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GatheredResults {
    pub solvent_setup: BTreeMap<RepeatId, Vec<UnitResult>>,
    pub solvent: BTreeMap<RepeatId, Vec<UnitResult>>,
    pub complex_setup: BTreeMap<RepeatId, Vec<UnitResult>>,
    pub complex: BTreeMap<RepeatId, Vec<UnitResult>>,
}

/// Groups the successful unit results of any number of DAGs.
///
/// Results are first partitioned by the leg and phase recorded in their keys, then grouped
/// by repeat within each partition. Failed units are left out.
pub fn gather<'a>(dag_results: impl IntoIterator<Item = &'a DagResult>) -> GatheredResults {
    let mut partitions: BTreeMap<(Leg, Phase), Vec<&UnitResult>> = BTreeMap::new();
    for result in dag_results
        .into_iter()
        .flat_map(|dag| &dag.unit_results)
        .filter(|r| r.ok)
    {
        partitions
            .entry((result.key.leg, result.key.phase))
            .or_default()
            .push(result);
    }

    let mut group = |leg: Leg, phase: Phase| {
        let mut members = partitions.remove(&(leg, phase)).unwrap_or_default();
        members.sort_by_key(|r| (r.key.repeat_id, r.key.generation));
        let mut grouped: BTreeMap<RepeatId, Vec<UnitResult>> = BTreeMap::new();
        for result in members {
            grouped
                .entry(result.key.repeat_id)
                .or_default()
                .push(result.clone());
        }
        grouped
    };

    GatheredResults {
        solvent_setup: group(Leg::Solvent, Phase::Setup),
        solvent: group(Leg::Solvent, Phase::Run),
        complex_setup: group(Leg::Complex, Phase::Setup),
        complex: group(Leg::Complex, Phase::Run),
    }
}

/// The Separated Topologies relative binding free-energy protocol.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SepTopProtocol {
    pub settings: SepTopSettings,
}

impl SepTopProtocol {
    pub fn new(settings: SepTopSettings) -> Self {
        Self { settings }
    }

    pub fn default_settings() -> SepTopSettings {
        SepTopSettings::default()
    }

    /// Validates a transformation and builds its execution units.
    ///
    /// All validation happens here, before any simulation work. Extending a previous
    /// calculation is not supported.
    #[instrument(skip_all, name = "septop_create")]
    pub fn create(
        &self,
        state_a: ChemicalSystem,
        state_b: ChemicalSystem,
        extends: Option<&DagResult>,
    ) -> Result<ProtocolDag, ConfigError> {
        if extends.is_some() {
            return Err(ConfigError::ExtensionUnsupported);
        }

        validate_endstates(&state_a, &state_b)?;
        let alchemical = alchemical_components(&state_a, &state_b);
        validate_alchemical_components(&alchemical)?;
        validate_charge_difference(&alchemical)?;

        let settings = &self.settings;
        for state in [&state_a, &state_b] {
            for forcefield in [
                &settings.solvent_forcefield_settings,
                &settings.complex_forcefield_settings,
            ] {
                validate_solvent(state, forcefield.nonbonded_method)?;
            }
            validate_protein(state)?;
        }
        validate_settings(settings)?;

        let name_of = |components: &[Component]| {
            components
                .first()
                .map(|c| c.name().to_string())
                .unwrap_or_default()
        };
        let name_a = name_of(&alchemical.state_a);
        let name_b = name_of(&alchemical.state_b);

        register_citations();
        let dag = ProtocolDag::build(
            Arc::new(Transformation::new(state_a, state_b)),
            Arc::new(alchemical),
            (&name_a, &name_b),
            settings.protocol_repeats,
        );
        info!(
            ligand_a = %name_a,
            ligand_b = %name_b,
            units = dag.len(),
            "Created SepTop protocol DAG."
        );
        Ok(dag)
    }

    pub fn gather<'a>(
        &self,
        dag_results: impl IntoIterator<Item = &'a DagResult>,
    ) -> GatheredResults {
        gather(dag_results)
    }

    /// Gathers the results of any number of DAGs into a protocol result.
    pub fn result<'a>(
        &self,
        dag_results: impl IntoIterator<Item = &'a DagResult>,
    ) -> Result<SepTopProtocolResult, ResultError> {
        SepTopProtocolResult::from_gathered(&gather(dag_results))
    }
}
