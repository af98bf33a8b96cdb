use crate::core::models::system::{AlchemicalComponents, ChemicalSystem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// One side of the thermodynamic cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Leg {
    Solvent,
    Complex,
}

impl Leg {
    pub const ALL: [Leg; 2] = [Leg::Solvent, Leg::Complex];
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Solvent => "solvent",
            Self::Complex => "complex",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Setup,
    Run,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Setup => "Setup",
            Self::Run => "Run",
        })
    }
}

/// Identifier shared by the four units (setup and run, both legs) of one repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepeatId(Uuid);

impl RepeatId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RepeatId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RepeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured identity of an execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitKey {
    pub repeat_id: RepeatId,
    pub generation: u32,
    pub leg: Leg,
    pub phase: Phase,
}

impl UnitKey {
    /// A directory-safe label, unique within a DAG.
    pub fn label(&self) -> String {
        format!(
            "{}_{}_{}_gen{}",
            self.leg,
            self.phase.to_string().to_lowercase(),
            self.repeat_id,
            self.generation
        )
    }
}

/// The two end states of a relative binding free-energy calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Transformation {
    pub state_a: ChemicalSystem,
    pub state_b: ChemicalSystem,
}

impl Transformation {
    pub fn new(state_a: ChemicalSystem, state_b: ChemicalSystem) -> Self {
        Self { state_a, state_b }
    }
}

/// A single setup or run step of one repeat of one leg.
#[derive(Debug, Clone)]
pub struct ExecutionUnit {
    pub key: UnitKey,
    pub name: String,
    pub transformation: Arc<Transformation>,
    pub alchemical: Arc<AlchemicalComponents>,
    /// The setup unit whose artifact a run unit consumes.
    pub setup: Option<UnitKey>,
}

/// The execution units of one `create` call, setup units before their run units.
#[derive(Debug, Clone)]
pub struct ProtocolDag {
    units: Vec<ExecutionUnit>,
}

impl ProtocolDag {
    /// Builds a setup and a run unit for every leg and repeat, all at generation 0.
    ///
    /// Each repeat gets a fresh [`RepeatId`], so independently built DAGs never share
    /// identifiers.
    pub fn build(
        transformation: Arc<Transformation>,
        alchemical: Arc<AlchemicalComponents>,
        ligand_names: (&str, &str),
        repeats: usize,
    ) -> Self {
        let (name_a, name_b) = ligand_names;
        let ids: Vec<RepeatId> = (0..repeats).map(|_| RepeatId::new()).collect();
        let mut units = Vec::with_capacity(4 * repeats);
        for leg in Leg::ALL {
            for phase in [Phase::Setup, Phase::Run] {
                for (i, &repeat_id) in ids.iter().enumerate() {
                    let key = UnitKey {
                        repeat_id,
                        generation: 0,
                        leg,
                        phase,
                    };
                    let setup = (phase == Phase::Run).then_some(UnitKey {
                        phase: Phase::Setup,
                        ..key
                    });
                    units.push(ExecutionUnit {
                        key,
                        name: format!(
                            "SepTop RBFE {phase}, transformation {name_a} to {name_b}, {leg} leg: repeat {i} generation 0"
                        ),
                        transformation: Arc::clone(&transformation),
                        alchemical: Arc::clone(&alchemical),
                        setup,
                    });
                }
            }
        }
        Self { units }
    }

    pub fn units(&self) -> &[ExecutionUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn unit(&self, key: &UnitKey) -> Option<&ExecutionUnit> {
        self.units.iter().find(|u| &u.key == key)
    }

    pub fn units_in(&self, phase: Phase) -> impl Iterator<Item = &ExecutionUnit> + '_ {
        self.units.iter().filter(move |u| u.key.phase == phase)
    }

    pub fn repeat_ids(&self) -> BTreeSet<RepeatId> {
        self.units.iter().map(|u| u.key.repeat_id).collect()
    }
}
