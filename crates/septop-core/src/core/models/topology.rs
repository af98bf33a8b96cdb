use super::atom::Atom;
use super::component::ComponentKind;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyAtom {
    pub atom: Atom,
    /// The kind of component this atom was built from.
    pub origin: ComponentKind,
}

/// Atom records, bonds and periodic box of a parameterized system.
///
/// Atom indices in a `Topology` are the particle indices of the matching
/// [`System`](crate::core::forces::System).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Topology {
    pub atoms: Vec<TopologyAtom>,
    pub bonds: Vec<(usize, usize)>,
    /// Periodic box vectors in nm, or `None` for a non-periodic system.
    pub box_vectors: Option<[Vector3<f64>; 3]>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn add_atom(&mut self, atom: Atom, origin: ComponentKind) -> usize {
        self.atoms.push(TopologyAtom { atom, origin });
        self.atoms.len() - 1
    }

    pub fn add_bond(&mut self, i: usize, j: usize) {
        self.bonds.push((i, j));
    }

    /// Appends `other`, shifting its atom indices, and returns the offset applied.
    ///
    /// The box vectors of `self` are kept.
    pub fn append(&mut self, other: &Topology) -> usize {
        let offset = self.atoms.len();
        self.atoms.extend(other.atoms.iter().cloned());
        self.bonds
            .extend(other.bonds.iter().map(|&(i, j)| (i + offset, j + offset)));
        offset
    }

    /// Builds a topology containing only `atoms`, in the given order.
    ///
    /// Bonds with both partners retained are remapped; all others are dropped.
    pub fn subset(&self, atoms: &[usize]) -> Topology {
        let mut map = vec![None; self.atoms.len()];
        for (new, &old) in atoms.iter().enumerate() {
            if let Some(slot) = map.get_mut(old) {
                *slot = Some(new);
            }
        }
        let bonds = self
            .bonds
            .iter()
            .filter_map(|&(i, j)| Some((map.get(i).copied()??, map.get(j).copied()??)))
            .collect();
        Topology {
            atoms: atoms
                .iter()
                .filter_map(|&i| self.atoms.get(i).cloned())
                .collect(),
            bonds,
            box_vectors: self.box_vectors,
        }
    }

    pub fn select<F>(&self, predicate: F) -> Vec<usize>
    where
        F: Fn(&TopologyAtom) -> bool,
    {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| predicate(a))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn atoms_of(&self, origin: ComponentKind) -> Vec<usize> {
        self.select(|a| a.origin == origin)
    }

    /// Heavy backbone atoms of protein residues.
    pub fn backbone_atoms(&self) -> Vec<usize> {
        self.select(|a| a.origin == ComponentKind::Protein && a.atom.is_backbone())
    }

    /// Edge lengths of the periodic box, taken from the diagonal of the box vectors.
    pub fn box_edge_lengths(&self) -> Option<Vector3<f64>> {
        self.box_vectors
            .map(|[a, b, c]| Vector3::new(a.x, b.y, c.z))
    }
}
