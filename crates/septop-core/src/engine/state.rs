use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Stages an execution unit passes through, in order.
///
/// Setup units equilibrate each end state while assembling components and emit their outputs
/// once restraints are applied. Run units go from [`UnitStage::SettingsResolved`] through
/// minimization, equilibration and production of the alchemical system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitStage {
    Created,
    SettingsResolved,
    ComponentsAssembled,
    RestraintsApplied,
    Minimized,
    Equilibrated,
    ProductionRun,
    OutputsEmitted,
}

impl fmt::Display for UnitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::SettingsResolved => "settings resolved",
            Self::ComponentsAssembled => "components assembled",
            Self::RestraintsApplied => "restraints applied",
            Self::Minimized => "minimized",
            Self::Equilibrated => "equilibrated",
            Self::ProductionRun => "production run",
            Self::OutputsEmitted => "outputs emitted",
        })
    }
}

/// Records the stages a unit has reached. Stages only move forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTracker {
    stages: Vec<UnitStage>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            stages: vec![UnitStage::Created],
        }
    }

    pub fn current(&self) -> UnitStage {
        // Never empty: constructed with `Created`.
        self.stages.last().copied().unwrap_or(UnitStage::Created)
    }

    /// Moves to `stage`. Returns `false`, leaving the tracker untouched, if `stage` is not
    /// strictly after the current one.
    pub fn advance(&mut self, stage: UnitStage) -> bool {
        if stage <= self.current() {
            return false;
        }
        info!(stage = %stage, "Unit stage reached.");
        self.stages.push(stage);
        true
    }

    pub fn stages(&self) -> &[UnitStage] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<UnitStage> {
        self.stages
    }
}
