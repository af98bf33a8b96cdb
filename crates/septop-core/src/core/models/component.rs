use super::atom::Atom;
use crate::core::units::{Concentration, ConcentrationUnit};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The broad category of a chemical component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    Protein,
    SmallMolecule,
    Solvent,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Protein => "protein component",
            Self::SmallMolecule => "small-molecule component",
            Self::Solvent => "solvent component",
        })
    }
}

/// Atoms, coordinates (nm) and bonds of an explicitly modeled molecule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Structure {
    pub atoms: Vec<Atom>,
    pub positions: Vec<Point3<f64>>,
    #[serde(default)]
    pub bonds: Vec<(usize, usize)>,
}

impl Structure {
    pub fn new(atoms: Vec<Atom>, positions: Vec<Point3<f64>>) -> Self {
        Self {
            atoms,
            positions,
            bonds: Vec::new(),
        }
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn net_charge(&self) -> i32 {
        self.atoms.iter().map(|a| a.formal_charge).sum()
    }

    pub fn heavy_atoms(&self) -> impl Iterator<Item = usize> + '_ {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_heavy())
            .map(|(i, _)| i)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinComponent {
    pub name: String,
    pub structure: Structure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmallMoleculeComponent {
    pub name: String,
    pub structure: Structure,
}

impl SmallMoleculeComponent {
    pub fn new(name: &str, structure: Structure) -> Self {
        Self {
            name: name.to_string(),
            structure,
        }
    }

    pub fn net_charge(&self) -> i32 {
        self.structure.net_charge()
    }
}

/// Bulk solvent description; the solvent is built by the simulation backend, not stored atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SolventComponent {
    pub smiles: String,
    pub positive_ion: String,
    pub negative_ion: String,
    pub ion_concentration: Concentration,
    pub neutralize: bool,
}

impl Default for SolventComponent {
    fn default() -> Self {
        Self {
            smiles: "O".to_string(),
            positive_ion: "Na+".to_string(),
            negative_ion: "Cl-".to_string(),
            ion_concentration: Concentration::new(0.15, ConcentrationUnit::Molar),
            neutralize: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Component {
    Protein(ProteinComponent),
    SmallMolecule(SmallMoleculeComponent),
    Solvent(SolventComponent),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Protein(_) => ComponentKind::Protein,
            Self::SmallMolecule(_) => ComponentKind::SmallMolecule,
            Self::Solvent(_) => ComponentKind::Solvent,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Protein(p) => &p.name,
            Self::SmallMolecule(m) => &m.name,
            Self::Solvent(s) => &s.smiles,
        }
    }

    pub fn as_small_molecule(&self) -> Option<&SmallMoleculeComponent> {
        match self {
            Self::SmallMolecule(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_protein(&self) -> Option<&ProteinComponent> {
        match self {
            Self::Protein(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_solvent(&self) -> Option<&SolventComponent> {
        match self {
            Self::Solvent(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charged_ligand() -> SmallMoleculeComponent {
        let atoms = vec![
            Atom::new("N1", "N").with_formal_charge(1),
            Atom::new("C1", "C"),
            Atom::new("H1", "H"),
        ];
        let positions = vec![Point3::origin(); 3];
        SmallMoleculeComponent::new("amine", Structure::new(atoms, positions))
    }

    #[test]
    fn net_charge_sums_formal_charges() {
        assert_eq!(charged_ligand().net_charge(), 1);
    }

    #[test]
    fn heavy_atoms_skips_hydrogens() {
        let ligand = charged_ligand();
        let heavy: Vec<_> = ligand.structure.heavy_atoms().collect();
        assert_eq!(heavy, vec![0, 1]);
    }

    #[test]
    fn component_kind_matches_variant() {
        let component = Component::SmallMolecule(charged_ligand());
        assert_eq!(component.kind(), ComponentKind::SmallMolecule);
        assert_eq!(component.name(), "amine");
        assert!(component.as_protein().is_none());
        assert_eq!(
            Component::Solvent(SolventComponent::default()).kind(),
            ComponentKind::Solvent
        );
    }

    #[test]
    fn component_serializes_with_kind_tag() {
        let component = Component::Solvent(SolventComponent::default());
        let json = serde_json::to_value(&component).unwrap();
        assert_eq!(json["kind"], "solvent");
        assert_eq!(json["ion-concentration"], "0.15 molar");
        let back: Component = serde_json::from_value(json).unwrap();
        assert_eq!(back, component);
    }
}
