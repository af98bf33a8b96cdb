use crate::cli::PlanArgs;
use crate::config::load_settings;
use crate::error::{CliError, Result};
use septop::core::models::system::ChemicalSystem;
use septop::engine::citations::register_citations;
use septop::engine::unit::{Leg, Phase, ProtocolDag, RepeatId};
use septop::workflows::protocol::SepTopProtocol;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// One execution unit as listed by `septop plan`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlannedUnit {
    pub label: String,
    pub name: String,
    pub repeat_id: RepeatId,
    pub leg: Leg,
    pub phase: Phase,
    /// Label of the setup unit whose artifact this unit consumes.
    pub depends_on: Option<String>,
}

fn read_system(path: &Path) -> Result<ChemicalSystem> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

pub fn planned_units(dag: &ProtocolDag) -> Vec<PlannedUnit> {
    dag.units()
        .iter()
        .map(|unit| PlannedUnit {
            label: unit.key.label(),
            name: unit.name.clone(),
            repeat_id: unit.key.repeat_id,
            leg: unit.key.leg,
            phase: unit.key.phase,
            depends_on: unit.setup.map(|key| key.label()),
        })
        .collect()
}

pub fn run(args: PlanArgs) -> Result<()> {
    let settings = load_settings(
        args.source.settings.as_deref(),
        &args.source.set_values,
        args.source.repeats,
    )?;
    info!("Loading end states from {:?} and {:?}", &args.state_a, &args.state_b);
    let state_a = read_system(&args.state_a)?;
    let state_b = read_system(&args.state_b)?;

    let protocol = SepTopProtocol::new(settings);
    let dag = protocol.create(state_a, state_b, None)?;
    let units = planned_units(&dag);

    println!(
        "Transformation is valid: {} unit(s) over {} repeat(s).",
        units.len(),
        dag.repeat_ids().len()
    );
    for unit in &units {
        match &unit.depends_on {
            Some(setup) => println!("  {}  <- {}", unit.label, setup),
            None => println!("  {}", unit.label),
        }
    }

    println!("Please cite:");
    for citation in register_citations() {
        println!("  {} ({}), doi:{}", citation.title, citation.key, citation.doi);
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&units).map_err(|e| CliError::Other(e.into()))?;
        std::fs::write(path, json)?;
        info!("Wrote execution plan to {:?}", path);
    }
    Ok(())
}
