use phf::{Set, phf_set};

static BACKBONE_ATOM_NAMES: Set<&'static str> = phf_set! {
    "N", "CA", "C", "O", "OXT", "NT", "OT1", "OT2",
};

static HYDROGEN_ELEMENTS: Set<&'static str> = phf_set! {
    "H", "D", "T",
};

pub fn is_backbone_atom(atom_name: &str) -> bool {
    BACKBONE_ATOM_NAMES.contains(atom_name.trim())
}

pub fn is_hydrogen_element(element: &str) -> bool {
    HYDROGEN_ELEMENTS.contains(element.trim())
}
