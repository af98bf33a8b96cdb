use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub key: &'static str,
    pub title: &'static str,
    pub doi: &'static str,
}

static METHOD_CITATIONS: [Citation; 4] = [
    Citation {
        key: "OpenMMTools",
        title: "OpenMMTools: a batteries-included toolkit for the GPU-accelerated OpenMM molecular simulation engine",
        doi: "10.5281/zenodo.2541527",
    },
    Citation {
        key: "OpenMM",
        title: "OpenMM 7: Rapid development of high performance algorithms for molecular dynamics",
        doi: "10.1371/journal.pcbi.1005659",
    },
    Citation {
        key: "MBAR",
        title: "Statistically optimal analysis of samples from multiple equilibrium states",
        doi: "10.1063/1.2978177",
    },
    Citation {
        key: "SepTop",
        title: "Separated topologies: a method for relative binding free energy calculations using orientational restraints",
        doi: "10.1063/5.0133036",
    },
];

static REGISTRY: OnceLock<&'static [Citation]> = OnceLock::new();

/// Registers the method citations for this process and returns them.
///
/// Only the first call registers; later calls return the same registry.
pub fn register_citations() -> &'static [Citation] {
    REGISTRY.get_or_init(|| {
        debug!(count = METHOD_CITATIONS.len(), "Registering method citations.");
        &METHOD_CITATIONS
    })
}
