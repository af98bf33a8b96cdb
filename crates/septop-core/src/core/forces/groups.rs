use super::{Force, ForceKind, System};
use phf::{Map, phf_map};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Force groups used to decompose energies reported by the simulation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForceGroup {
    Bond,
    Angle,
    Dihedral,
    Nonbonded,
    ComRestraint,
    AlignmentRestraint,
    PositionRestraint,
    BoreschRestraint,
    Barostat,
    Other,
}

impl ForceGroup {
    /// The integer group index handed to the backend.
    pub fn index(self) -> u8 {
        match self {
            Self::Bond => 1,
            Self::Angle => 2,
            Self::Dihedral => 3,
            Self::Nonbonded => 4,
            Self::ComRestraint => 5,
            Self::AlignmentRestraint => 6,
            Self::PositionRestraint => 7,
            Self::BoreschRestraint => 8,
            Self::Barostat => 9,
            Self::Other => 10,
        }
    }
}

impl fmt::Display for ForceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

static NAMED_GROUPS: Map<&'static str, ForceGroup> = phf_map! {
    "com_restraint" => ForceGroup::ComRestraint,
    "alignment_restraint" => ForceGroup::AlignmentRestraint,
};

const PREFIX_GROUPS: [(&str, ForceGroup); 2] = [
    ("position_restraint", ForceGroup::PositionRestraint),
    ("boresch_restraint", ForceGroup::BoreschRestraint),
];

/// Chooses a group by exact name, then by name prefix, then by force kind.
pub fn classify(force: &Force) -> ForceGroup {
    if let Some(&group) = NAMED_GROUPS.get(force.name.as_str()) {
        return group;
    }
    if let Some((_, group)) = PREFIX_GROUPS
        .iter()
        .find(|(prefix, _)| force.name.starts_with(prefix))
    {
        return *group;
    }
    match force.kind {
        ForceKind::HarmonicBond { .. } => ForceGroup::Bond,
        ForceKind::HarmonicAngle { .. } => ForceGroup::Angle,
        ForceKind::PeriodicTorsion { .. } => ForceGroup::Dihedral,
        ForceKind::Nonbonded(_) | ForceKind::AlchemicalNonbonded(_) => ForceGroup::Nonbonded,
        ForceKind::Boresch(_) => ForceGroup::BoreschRestraint,
        ForceKind::Barostat { .. } => ForceGroup::Barostat,
        ForceKind::Opaque => ForceGroup::Other,
    }
}

/// Assigns every force of `system` to its group. Idempotent.
pub fn assign_force_groups(system: &mut System) {
    for force in system.forces_mut() {
        force.group = Some(classify(force));
    }
}
