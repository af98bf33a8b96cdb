use super::softcore::{AlchemicalNonbonded, RegionInteraction};
use super::{AlchemicalRegion, AlchemyError};
use crate::core::forces::groups::assign_force_groups;
use crate::core::forces::terms::{NonbondedForce, NonbondedParticle};
use crate::core::forces::{Force, ForceKind, System};
use tracing::debug;

pub const ALCHEMICAL_NONBONDED_NAME: &str = "alchemically modified NonbondedForce";

pub fn environment_force_name(region: &str) -> String {
    format!(
        "{ALCHEMICAL_NONBONDED_NAME} for non-alchemical/alchemical sterics for region {region}"
    )
}

pub fn intra_region_force_name(region: &str) -> String {
    format!("{ALCHEMICAL_NONBONDED_NAME} for alchemical/alchemical sterics for region {region}")
}

fn region_membership(
    n_particles: usize,
    regions: &[AlchemicalRegion],
) -> Result<Vec<Option<usize>>, AlchemyError> {
    let mut membership = vec![None; n_particles];
    for (r, region) in regions.iter().enumerate() {
        if region.atoms.is_empty() {
            return Err(AlchemyError::EmptyRegion {
                region: region.name.clone(),
            });
        }
        for &atom in &region.atoms {
            let slot = membership
                .get_mut(atom)
                .ok_or_else(|| AlchemyError::IndexOutOfRange {
                    region: region.name.clone(),
                    index: atom,
                    n_particles,
                })?;
            if slot.is_some() {
                return Err(AlchemyError::OverlappingRegions { atom });
            }
            *slot = Some(r);
        }
    }
    Ok(membership)
}

fn single_nonbonded(reference: &System) -> Result<&NonbondedForce, AlchemyError> {
    let mut nonbonded = reference.forces().iter().filter_map(|f| match &f.kind {
        ForceKind::Nonbonded(nb) => Some(nb),
        _ => None,
    });
    match (nonbonded.next(), nonbonded.next()) {
        (Some(nb), None) => Ok(nb),
        (None, _) => Err(AlchemyError::MissingNonbonded),
        (Some(_), Some(_)) => Err(AlchemyError::MultipleNonbonded),
    }
}

/// Builds an alchemical copy of `reference` with one lambda-controlled set of interactions per
/// region.
///
/// The reference nonbonded force keeps only environment/environment interactions (and every
/// explicit exception). Each region gains a lambda-scaled term against the environment and an
/// unscaled intra-region term. Atoms in different regions never interact. All other forces are
/// carried over unchanged and every force is (re)assigned to its force group.
pub fn create_alchemical_system(
    reference: &System,
    regions: &[AlchemicalRegion],
    softcore_alpha: f64,
) -> Result<System, AlchemyError> {
    let n_particles = reference.n_particles();
    let membership = region_membership(n_particles, regions)?;
    let nonbonded = single_nonbonded(reference)?;

    let environment: Vec<usize> = (0..n_particles)
        .filter(|&i| membership[i].is_none())
        .collect();
    let mut particles = nonbonded.particles.clone();
    particles.resize(n_particles, NonbondedParticle::neutral());
    let excluded_pairs: Vec<[usize; 2]> = nonbonded.exceptions.iter().map(|e| e.atoms).collect();

    let mut base = NonbondedForce {
        particles: particles.clone(),
        exceptions: nonbonded.exceptions.clone(),
        cutoff: nonbonded.cutoff,
    };
    for (particle, region) in base.particles.iter_mut().zip(&membership) {
        if region.is_some() {
            particle.charge = 0.0;
            particle.epsilon = 0.0;
        }
    }

    let mut alchemical = System::new(reference.masses().to_vec());
    for force in reference.forces() {
        match force.kind {
            ForceKind::Nonbonded(_) => {
                alchemical.add_force(Force::new(
                    ALCHEMICAL_NONBONDED_NAME,
                    ForceKind::Nonbonded(base.clone()),
                ));
            }
            _ => {
                alchemical.add_force(force.clone());
            }
        }
    }

    for region in regions {
        for (name, interaction) in [
            (environment_force_name(&region.name), RegionInteraction::Environment),
            (intra_region_force_name(&region.name), RegionInteraction::Intra),
        ] {
            let term = AlchemicalNonbonded {
                region: region.name.clone(),
                interaction,
                region_atoms: region.atoms.clone(),
                environment_atoms: environment.clone(),
                particles: particles.clone(),
                excluded_pairs: excluded_pairs.clone(),
                cutoff: nonbonded.cutoff,
                softcore_alpha,
            };
            alchemical.add_force(Force::new(&name, ForceKind::AlchemicalNonbonded(term)));
        }
        debug!(
            region = %region.name,
            n_atoms = region.atoms.len(),
            "Created alchemical region."
        );
    }

    assign_force_groups(&mut alchemical);
    Ok(alchemical)
}
