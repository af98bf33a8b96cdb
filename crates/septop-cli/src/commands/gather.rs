use crate::cli::GatherArgs;
use crate::error::{CliError, Result};
use septop::core::units::{Energy, EnergyUnit};
use septop::engine::driver::{DagResult, UNIT_RESULT_FILENAME, UnitResult};
use septop::engine::unit::Leg;
use septop::workflows::protocol::SepTopProtocol;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Combined estimate written by `septop gather --output`. Energies are in kcal/mol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GatherReport {
    pub estimate: f64,
    pub uncertainty: f64,
    pub solvent: Vec<f64>,
    pub complex: Vec<f64>,
    pub failed_units: Vec<String>,
    pub warnings: Vec<String>,
}

fn collect_result_files(path: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if !path.is_dir() {
        files.push(path.to_path_buf());
        return Ok(());
    }
    let mut entries = std::fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    for entry in entries {
        if entry.is_dir() {
            collect_result_files(&entry, files)?;
        } else if entry.file_name().is_some_and(|name| name == UNIT_RESULT_FILENAME) {
            files.push(entry);
        }
    }
    Ok(())
}

fn load_results(paths: &[PathBuf]) -> Result<DagResult> {
    let mut files = Vec::new();
    for path in paths {
        collect_result_files(path, &mut files)?;
    }
    if files.is_empty() {
        return Err(CliError::Argument(format!(
            "No '{}' files found in the given paths",
            UNIT_RESULT_FILENAME
        )));
    }

    let mut results = DagResult::default();
    for file in files {
        debug!("Reading unit result {:?}", file);
        results.unit_results.push(UnitResult::load(&file)?);
    }
    Ok(results)
}

pub fn build_report(dag_result: &DagResult) -> Result<GatherReport> {
    let result = SepTopProtocol::default().result([dag_result])?;
    let (estimate, uncertainty) = result.estimate_kcal()?;
    let estimates = result.individual_estimates();
    let in_kcal = |values: &[(Energy, Energy)]| {
        values
            .iter()
            .map(|(dg, _)| dg.magnitude_in(EnergyUnit::KilocaloriePerMole))
            .collect::<Vec<_>>()
    };

    Ok(GatherReport {
        estimate,
        uncertainty,
        solvent: in_kcal(estimates.get(Leg::Solvent)),
        complex: in_kcal(estimates.get(Leg::Complex)),
        failed_units: dag_result
            .unit_results
            .iter()
            .filter(|r| !r.ok)
            .map(|r| r.name.clone())
            .collect(),
        warnings: result
            .forward_and_reverse_energy_analysis()
            .warnings
            .iter()
            .map(ToString::to_string)
            .collect(),
    })
}

pub fn run(args: GatherArgs) -> Result<()> {
    let dag_result = load_results(&args.results)?;
    info!("Loaded {} unit result(s).", dag_result.unit_results.len());
    let report = build_report(&dag_result)?;

    for name in &report.failed_units {
        warn!("Excluded failed unit: {}", name);
        println!("Warning: excluded failed unit '{}'", name);
    }
    for (leg, values) in [("solvent", &report.solvent), ("complex", &report.complex)] {
        let formatted: Vec<String> = values.iter().map(|v| format!("{v:.2}")).collect();
        println!("{leg} leg ΔG (kcal/mol): [{}]", formatted.join(", "));
    }
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }
    println!(
        "ΔΔG = {:.2} ± {:.2} kcal/mol",
        report.estimate, report.uncertainty
    );

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report).map_err(|e| CliError::Other(e.into()))?;
        std::fs::write(path, json)?;
        info!("Wrote combined estimate to {:?}", path);
    }
    Ok(())
}
