use super::component::{
    Component, ComponentKind, ProteinComponent, SmallMoleculeComponent, SolventComponent,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A labelled collection of chemical components describing one end state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChemicalSystem {
    #[serde(default)]
    pub name: String,
    pub components: BTreeMap<String, Component>,
}

impl ChemicalSystem {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            components: BTreeMap::new(),
        }
    }

    pub fn with_component(mut self, label: &str, component: Component) -> Self {
        self.components.insert(label.to_string(), component);
        self
    }

    pub fn get(&self, label: &str) -> Option<&Component> {
        self.components.get(label)
    }

    pub fn contains(&self, component: &Component) -> bool {
        self.components.values().any(|c| c == component)
    }

    pub fn of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &Component> + '_ {
        self.components.values().filter(move |c| c.kind() == kind)
    }

    pub fn count_kind(&self, kind: ComponentKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn protein(&self) -> Option<&ProteinComponent> {
        self.components.values().find_map(Component::as_protein)
    }

    pub fn solvent(&self) -> Option<&SolventComponent> {
        self.components.values().find_map(Component::as_solvent)
    }

    pub fn small_molecules(&self) -> impl Iterator<Item = &SmallMoleculeComponent> + '_ {
        self.components.values().filter_map(Component::as_small_molecule)
    }
}

/// Components unique to each end state of a transformation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AlchemicalComponents {
    pub state_a: Vec<Component>,
    pub state_b: Vec<Component>,
}

/// Computes the components present in one end state but not the other.
///
/// Components are compared by value, not by label, so relabelling a shared protein or solvent
/// does not make it alchemical.
pub fn alchemical_components(
    state_a: &ChemicalSystem,
    state_b: &ChemicalSystem,
) -> AlchemicalComponents {
    let unique = |from: &ChemicalSystem, other: &ChemicalSystem| {
        from.components
            .values()
            .filter(|c| !other.contains(c))
            .cloned()
            .collect()
    };
    AlchemicalComponents {
        state_a: unique(state_a, state_b),
        state_b: unique(state_b, state_a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::component::Structure;
    use nalgebra::Point3;

    fn ligand(name: &str) -> Component {
        let structure = Structure::new(vec![Atom::new("C1", "C")], vec![Point3::origin()]);
        Component::SmallMolecule(SmallMoleculeComponent::new(name, structure))
    }

    fn protein() -> Component {
        let structure = Structure::new(
            vec![Atom::new("CA", "C").with_residue("ALA", 1)],
            vec![Point3::new(1.0, 0.0, 0.0)],
        );
        Component::Protein(ProteinComponent {
            name: "receptor".to_string(),
            structure,
        })
    }

    #[test]
    fn alchemical_components_are_the_unshared_ligands() {
        let a = ChemicalSystem::new("A")
            .with_component("protein", protein())
            .with_component("solvent", Component::Solvent(SolventComponent::default()))
            .with_component("ligand", ligand("benzene"));
        let b = ChemicalSystem::new("B")
            .with_component("protein", protein())
            .with_component("solvent", Component::Solvent(SolventComponent::default()))
            .with_component("ligand", ligand("toluene"));

        let alchemical = alchemical_components(&a, &b);
        assert_eq!(alchemical.state_a, vec![ligand("benzene")]);
        assert_eq!(alchemical.state_b, vec![ligand("toluene")]);
    }

    #[test]
    fn relabelled_components_are_not_alchemical() {
        let a = ChemicalSystem::new("A").with_component("p1", protein());
        let b = ChemicalSystem::new("B").with_component("receptor", protein());
        let alchemical = alchemical_components(&a, &b);
        assert!(alchemical.state_a.is_empty());
        assert!(alchemical.state_b.is_empty());
    }

    #[test]
    fn accessors_find_components_by_kind() {
        let system = ChemicalSystem::new("complex")
            .with_component("protein", protein())
            .with_component("ligand", ligand("benzene"));
        assert!(system.protein().is_some());
        assert!(system.solvent().is_none());
        assert_eq!(system.count_kind(ComponentKind::SmallMolecule), 1);
        assert_eq!(system.small_molecules().next().unwrap().name, "benzene");
    }
}
