use crate::core::utils::identifiers::{is_backbone_atom, is_hydrogen_element};
use serde::{Deserialize, Serialize};

/// An atom of a chemical component, carrying its identity but not its coordinates.
///
/// Coordinates live alongside the atoms in a [`Structure`](super::component::Structure) or in a
/// position array parallel to a [`Topology`](super::topology::Topology), so that the same atom
/// records can be reused for several frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Atom {
    /// The name of the atom (e.g., "CA", "C1").
    pub name: String,
    /// The element symbol (e.g., "C", "H", "Cl").
    pub element: String,
    #[serde(default)]
    pub residue_name: String,
    #[serde(default)]
    pub residue_index: usize,
    /// Formal charge in elementary charge units.
    #[serde(default)]
    pub formal_charge: i32,
}

impl Atom {
    pub fn new(name: &str, element: &str) -> Self {
        Self {
            name: name.to_string(),
            element: element.to_string(),
            residue_name: String::new(),
            residue_index: 0,
            formal_charge: 0,
        }
    }

    pub fn with_residue(mut self, residue_name: &str, residue_index: usize) -> Self {
        self.residue_name = residue_name.to_string();
        self.residue_index = residue_index;
        self
    }

    pub fn with_formal_charge(mut self, formal_charge: i32) -> Self {
        self.formal_charge = formal_charge;
        self
    }

    pub fn is_heavy(&self) -> bool {
        !is_hydrogen_element(&self.element)
    }

    /// Whether the atom name denotes a heavy protein backbone atom.
    pub fn is_backbone(&self) -> bool {
        self.is_heavy() && is_backbone_atom(&self.name)
    }
}
