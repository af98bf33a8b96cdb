//! Statistical reduction of the run-unit outputs of one or more protocol DAGs.

use super::protocol::GatheredResults;
use crate::core::analysis::{ForwardReverseAnalysis, MatrixDiagnostics};
use crate::core::io::storage::{MultiStateStorage, StorageError};
use crate::core::units::{Energy, EnergyUnit};
use crate::engine::driver::RunOutputs;
use crate::engine::unit::{Leg, RepeatId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ResultError {
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("No successful {leg} leg results are available")]
    Empty { leg: Leg },

    #[error("Run unit '{unit}' reported success without run outputs")]
    MissingOutputs { unit: String },

    #[error("Could not read sampler storage: {source}")]
    Storage {
        #[from]
        source: StorageError,
    },
}

/// One value per repeat for each leg, ordered by repeat identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegValues<T> {
    pub solvent: Vec<T>,
    pub complex: Vec<T>,
}

impl<T> LegValues<T> {
    pub fn get(&self, leg: Leg) -> &[T] {
        match leg {
            Leg::Solvent => &self.solvent,
            Leg::Complex => &self.complex,
        }
    }
}

/// A non-fatal sign that a repeat may not be converged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvergenceWarning {
    pub leg: Leg,
    pub repeat_id: RepeatId,
    pub message: String,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} leg, repeat {}: {}", self.leg, self.repeat_id, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForwardReverseReport {
    pub analyses: LegValues<Option<ForwardReverseAnalysis>>,
    pub warnings: Vec<ConvergenceWarning>,
}

/// Mean and population standard deviation of the estimates of one leg.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LegStatistics {
    mean: Energy,
    std: Energy,
}

fn leg_statistics(leg: Leg, estimates: &[Energy]) -> Result<LegStatistics, ResultError> {
    let unit = estimates.first().ok_or(ResultError::Empty { leg })?.unit();
    let mut magnitudes: Vec<f64> = estimates.iter().map(|e| e.magnitude_in(unit)).collect();
    magnitudes.sort_by(f64::total_cmp);
    let n = magnitudes.len() as f64;
    let mean = magnitudes.iter().sum::<f64>() / n;
    let variance = magnitudes.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Ok(LegStatistics {
        mean: Energy::new(mean, unit),
        std: Energy::new(variance.sqrt(), unit),
    })
}

/// Free-energy result of a SepTop calculation, reduced over repeats.
///
/// Each leg holds the run outputs of every successful repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct SepTopProtocolResult {
    solvent: Vec<(RepeatId, RunOutputs)>,
    complex: Vec<(RepeatId, RunOutputs)>,
}

impl SepTopProtocolResult {
    /// Builds the result from gathered unit results.
    ///
    /// Fails if any repeat spans more than one generation, since stitching extended runs
    /// together is not supported.
    pub fn from_gathered(gathered: &GatheredResults) -> Result<Self, ResultError> {
        let collect = |leg: Leg| -> Result<Vec<(RepeatId, RunOutputs)>, ResultError> {
            let groups = match leg {
                Leg::Solvent => &gathered.solvent,
                Leg::Complex => &gathered.complex,
            };
            let mut repeats = Vec::with_capacity(groups.len());
            for (repeat_id, results) in groups {
                let [result] = results.as_slice() else {
                    return Err(ResultError::Unsupported(format!(
                        "repeat {repeat_id} of the {leg} leg has {} generations; results from extended simulations cannot be combined",
                        results.len()
                    )));
                };
                let outputs = result
                    .run_outputs()
                    .cloned()
                    .ok_or_else(|| ResultError::MissingOutputs {
                        unit: result.name.clone(),
                    })?;
                repeats.push((*repeat_id, outputs));
            }
            Ok(repeats)
        };
        Ok(Self {
            solvent: collect(Leg::Solvent)?,
            complex: collect(Leg::Complex)?,
        })
    }

    fn leg(&self, leg: Leg) -> &[(RepeatId, RunOutputs)] {
        match leg {
            Leg::Solvent => &self.solvent,
            Leg::Complex => &self.complex,
        }
    }

    fn per_leg<T>(&self, f: impl Fn(&RunOutputs) -> T) -> LegValues<T> {
        LegValues {
            solvent: self.solvent.iter().map(|(_, o)| f(o)).collect(),
            complex: self.complex.iter().map(|(_, o)| f(o)).collect(),
        }
    }

    pub fn repeat_ids(&self) -> LegValues<RepeatId> {
        LegValues {
            solvent: self.solvent.iter().map(|(id, _)| *id).collect(),
            complex: self.complex.iter().map(|(id, _)| *id).collect(),
        }
    }

    /// The (estimate, uncertainty) pair of every repeat.
    pub fn individual_estimates(&self) -> LegValues<(Energy, Energy)> {
        self.per_leg(|o| (o.estimate, o.uncertainty))
    }

    fn statistics(&self, leg: Leg) -> Result<LegStatistics, ResultError> {
        let estimates: Vec<Energy> = self.leg(leg).iter().map(|(_, o)| o.estimate).collect();
        leg_statistics(leg, &estimates)
    }

    /// Mean ΔG of a single leg over its repeats.
    pub fn leg_estimate(&self, leg: Leg) -> Result<Energy, ResultError> {
        Ok(self.statistics(leg)?.mean)
    }

    /// Relative binding free energy, mean solvent ΔG minus mean complex ΔG.
    ///
    /// Reported in the unit of the first solvent repeat.
    pub fn estimate(&self) -> Result<Energy, ResultError> {
        let solvent = self.statistics(Leg::Solvent)?.mean;
        let complex = self.statistics(Leg::Complex)?.mean;
        let unit = solvent.unit();
        Ok(Energy::new(
            solvent.magnitude() - complex.magnitude_in(unit),
            unit,
        ))
    }

    /// Combined uncertainty of [`estimate`](Self::estimate), treating the legs' spreads over
    /// repeats as independent.
    pub fn uncertainty(&self) -> Result<Energy, ResultError> {
        let solvent = self.statistics(Leg::Solvent)?.std;
        let complex = self.statistics(Leg::Complex)?.std;
        let unit = solvent.unit();
        let combined = solvent.magnitude().hypot(complex.magnitude_in(unit));
        Ok(Energy::new(combined, unit))
    }

    /// Forward and reverse convergence analyses, with a warning for every repeat whose
    /// analysis is missing.
    pub fn forward_and_reverse_energy_analysis(&self) -> ForwardReverseReport {
        let mut warnings = Vec::new();
        for leg in Leg::ALL {
            for (repeat_id, outputs) in self.leg(leg) {
                if outputs.forward_reverse.is_none() {
                    let warning = ConvergenceWarning {
                        leg,
                        repeat_id: *repeat_id,
                        message: "One or more forward and reverse analyses are missing, likely due to insufficient decorrelated samples".to_string(),
                    };
                    warn!("{warning}");
                    warnings.push(warning);
                }
            }
        }
        ForwardReverseReport {
            analyses: self.per_leg(|o| o.forward_reverse.clone()),
            warnings,
        }
    }

    pub fn overlap_matrices(&self) -> LegValues<MatrixDiagnostics> {
        self.per_leg(|o| o.overlap.clone())
    }

    /// Replica exchange transition statistics; fails when any repeat did not exchange
    /// replicas.
    pub fn replica_transition_statistics(&self) -> Result<LegValues<MatrixDiagnostics>, ResultError> {
        let pick = |leg: Leg| -> Result<Vec<MatrixDiagnostics>, ResultError> {
            self.leg(leg)
                .iter()
                .map(|(_, o)| {
                    o.replica_exchange.clone().ok_or_else(|| {
                        ResultError::Unsupported(format!(
                            "replica transition statistics are only available for replica exchange simulations; the {leg} leg used the '{}' sampler",
                            o.sampler
                        ))
                    })
                })
                .collect()
        };
        Ok(LegValues {
            solvent: pick(Leg::Solvent)?,
            complex: pick(Leg::Complex)?,
        })
    }

    /// Thermodynamic state visited by each replica at every stored iteration, read back from
    /// sampler storage.
    pub fn replica_states(&self) -> Result<LegValues<Vec<Vec<usize>>>, ResultError> {
        let read = |leg: Leg| -> Result<Vec<Vec<Vec<usize>>>, ResultError> {
            self.leg(leg)
                .iter()
                .map(|(_, o)| {
                    let storage = MultiStateStorage::open_read_only(&o.storage, &o.checkpoint)?;
                    Ok(storage.read_replica_thermodynamic_states()?)
                })
                .collect()
        };
        Ok(LegValues {
            solvent: read(Leg::Solvent)?,
            complex: read(Leg::Complex)?,
        })
    }

    pub fn equilibration_iterations(&self) -> LegValues<usize> {
        self.per_leg(|o| o.equilibration_iterations)
    }

    pub fn production_iterations(&self) -> LegValues<usize> {
        self.per_leg(|o| o.production_iterations)
    }

    /// Summary of estimates per leg and overall, keyed for reporting.
    pub fn summary(&self) -> Result<BTreeMap<&'static str, Energy>, ResultError> {
        let mut summary = BTreeMap::new();
        summary.insert("solvent", self.leg_estimate(Leg::Solvent)?);
        summary.insert("complex", self.leg_estimate(Leg::Complex)?);
        summary.insert("estimate", self.estimate()?);
        summary.insert("uncertainty", self.uncertainty()?);
        Ok(summary)
    }

    /// Estimate and uncertainty converted to kcal/mol.
    pub fn estimate_kcal(&self) -> Result<(f64, f64), ResultError> {
        Ok((
            self.estimate()?.magnitude_in(EnergyUnit::KilocaloriePerMole),
            self.uncertainty()?.magnitude_in(EnergyUnit::KilocaloriePerMole),
        ))
    }
}
