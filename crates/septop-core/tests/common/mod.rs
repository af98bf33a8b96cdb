#![allow(dead_code)]

use nalgebra::{Point3, Vector3};
use septop::core::alchemy::state::AlchemicalState;
use septop::core::analysis::{ForwardReverseAnalysis, MatrixDiagnostics};
use septop::core::forces::terms::{BondTerm, NonbondedException, NonbondedForce, NonbondedParticle};
use septop::core::forces::{Force, ForceKind, System};
use septop::core::io::storage::{CheckpointMetadata, MultiStateStorage};
use septop::core::models::atom::Atom;
use septop::core::models::component::{
    Component, ComponentKind, ProteinComponent, SmallMoleculeComponent, SolventComponent, Structure,
};
use septop::core::models::system::ChemicalSystem;
use septop::core::models::topology::Topology;
use septop::core::units::{Energy, EnergyUnit};
use septop::engine::backend::{
    BackendError, MdOutcome, MdRequest, MultiStateJob, MultiStateOutcome, PreparedSystem,
    SimulationBackend, SystemRequest,
};
use septop::engine::unit::Leg;
use std::sync::Mutex;

pub const SOLVENT_DG_KCAL: f64 = -10.0;
pub const COMPLEX_DG_KCAL: f64 = -12.5;
pub const STORED_ITERATIONS: usize = 3;
const BOX_EDGE: f64 = 3.0;
const CUTOFF: f64 = 1.2;

/// What the sampler was asked to do for one run unit.
#[derive(Debug, Clone)]
pub struct RecordedJob {
    pub leg: Leg,
    pub states: Vec<AlchemicalState>,
    pub n_particles: usize,
}

/// A backend that builds small force-field-free systems from component coordinates and
/// reports fixed free energies per leg.
#[derive(Debug, Default)]
pub struct MockBackend {
    pub fail_leg: Option<Leg>,
    pub jobs: Mutex<Vec<RecordedJob>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(leg: Leg) -> Self {
        Self {
            fail_leg: Some(leg),
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Vec<RecordedJob> {
        self.jobs.lock().unwrap().clone()
    }
}

fn mass_of(element: &str) -> f64 {
    match element {
        "C" => 12.011,
        "N" => 14.007,
        "O" => 15.999,
        _ => 1.008,
    }
}

#[derive(Default)]
struct SystemBuilder {
    topology: Topology,
    positions: Vec<Point3<f64>>,
    masses: Vec<f64>,
    particles: Vec<NonbondedParticle>,
    bonds: Vec<(usize, usize)>,
}

impl SystemBuilder {
    fn add(
        &mut self,
        structure: &Structure,
        origin: ComponentKind,
        particle: NonbondedParticle,
    ) -> Vec<usize> {
        let indices: Vec<usize> = structure
            .atoms
            .iter()
            .zip(&structure.positions)
            .map(|(atom, position)| {
                self.masses.push(mass_of(&atom.element));
                self.particles.push(particle);
                self.positions.push(*position);
                self.topology.add_atom(atom.clone(), origin)
            })
            .collect();
        for &(i, j) in &structure.bonds {
            self.topology.add_bond(indices[i], indices[j]);
            self.bonds.push((indices[i], indices[j]));
        }
        indices
    }

    fn add_waters(&mut self) {
        let water = NonbondedParticle {
            charge: -0.4,
            sigma: 0.315,
            epsilon: 0.65,
        };
        let sites = [
            Vector3::x(),
            -Vector3::x(),
            Vector3::y(),
            -Vector3::y(),
            Vector3::z(),
            -Vector3::z(),
        ];
        for (n, direction) in sites.iter().enumerate() {
            self.masses.push(mass_of("O"));
            self.particles.push(water);
            self.positions.push(Point3::from(direction * 0.5));
            self.topology.add_atom(
                Atom::new("O", "O").with_residue("HOH", n + 1),
                ComponentKind::Solvent,
            );
        }
        self.topology.box_vectors = Some([
            Vector3::new(BOX_EDGE, 0.0, 0.0),
            Vector3::new(0.0, BOX_EDGE, 0.0),
            Vector3::new(0.0, 0.0, BOX_EDGE),
        ]);
    }

    fn finish(self, small_molecule_atoms: Vec<Vec<usize>>) -> PreparedSystem {
        let mut nonbonded = NonbondedForce::new(self.particles, Some(CUTOFF));
        nonbonded.exceptions = self
            .bonds
            .iter()
            .map(|&(i, j)| NonbondedException::exclusion(i, j))
            .collect();
        let terms = self
            .bonds
            .iter()
            .map(|&(i, j)| BondTerm {
                atoms: [i, j],
                length: (self.positions[i] - self.positions[j]).norm(),
                k: 1000.0,
            })
            .collect();

        let mut system = System::new(self.masses);
        system.add_force(Force::new("HarmonicBondForce", ForceKind::HarmonicBond { terms }));
        system.add_force(Force::new("NonbondedForce", ForceKind::Nonbonded(nonbonded)));
        PreparedSystem {
            system,
            topology: self.topology,
            positions: self.positions,
            small_molecule_atoms,
        }
    }
}

fn failure(operation: &'static str, message: impl ToString) -> BackendError {
    BackendError::Failed {
        operation,
        message: message.to_string(),
    }
}

/// Row-stochastic tridiagonal matrix coupling neighbouring states.
fn neighbour_overlap(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| match (i.abs_diff(j), n) {
                    (_, 1) => 1.0,
                    (0, _) if i == 0 || i == n - 1 => 0.75,
                    (0, _) => 0.5,
                    (1, _) => 0.25,
                    _ => 0.0,
                })
                .collect()
        })
        .collect()
}

impl SimulationBackend for MockBackend {
    fn parameterize(&self, request: &SystemRequest<'_>) -> Result<PreparedSystem, BackendError> {
        let mut builder = SystemBuilder::default();
        if let Some(protein) = request.protein {
            builder.add(
                &protein.structure,
                ComponentKind::Protein,
                NonbondedParticle {
                    charge: 0.0,
                    sigma: 0.34,
                    epsilon: 0.36,
                },
            );
        }
        let small_molecule_atoms = request
            .small_molecules
            .iter()
            .map(|molecule| {
                builder.add(
                    &molecule.structure,
                    ComponentKind::SmallMolecule,
                    NonbondedParticle {
                        charge: 0.1,
                        sigma: 0.34,
                        epsilon: 0.36,
                    },
                )
            })
            .collect();
        if request.solvent.is_some() {
            builder.add_waters();
        }
        Ok(builder.finish(small_molecule_atoms))
    }

    fn minimize(
        &self,
        _: &PreparedSystem,
        positions: &[Point3<f64>],
        _: usize,
    ) -> Result<Vec<Point3<f64>>, BackendError> {
        Ok(positions.to_vec())
    }

    fn equilibrate(
        &self,
        prepared: &PreparedSystem,
        positions: &[Point3<f64>],
        _: &MdRequest,
    ) -> Result<MdOutcome, BackendError> {
        Ok(MdOutcome {
            positions: positions.to_vec(),
            box_vectors: prepared.topology.box_vectors,
        })
    }

    fn run_multistate(&self, job: &MultiStateJob<'_>) -> Result<MultiStateOutcome, BackendError> {
        if self.fail_leg == Some(job.leg) {
            return Err(failure("sampling", "integrator produced NaN coordinates"));
        }
        self.jobs.lock().unwrap().push(RecordedJob {
            leg: job.leg,
            states: job.states.to_vec(),
            n_particles: job.system.n_particles(),
        });

        let n = job.states.len();
        let metadata = CheckpointMetadata {
            n_replicas: n,
            n_states: n,
            n_iterations: STORED_ITERATIONS,
            checkpoint_interval: job.checkpoint_interval,
        };
        let replica_states: Vec<Vec<usize>> = (0..STORED_ITERATIONS)
            .map(|iteration| (0..n).map(|r| (r + iteration) % n).collect())
            .collect();
        MultiStateStorage::write(&job.storage, &job.checkpoint, &metadata, &replica_states)
            .map_err(|e| failure("writing storage", e))?;

        let overlap = MatrixDiagnostics::from_matrix(neighbour_overlap(n))
            .map_err(|e| failure("analysing overlap", e))?;
        let dg = match job.leg {
            Leg::Solvent => SOLVENT_DG_KCAL,
            Leg::Complex => COMPLEX_DG_KCAL,
        };
        let estimate = Energy::new(dg, EnergyUnit::KilocaloriePerMole);
        let uncertainty = Energy::new(0.1, EnergyUnit::KilocaloriePerMole);
        Ok(MultiStateOutcome {
            estimate,
            uncertainty,
            replica_exchange: job.sampler.exchanges_replicas().then(|| overlap.clone()),
            overlap,
            forward_reverse: Some(ForwardReverseAnalysis {
                fractions: vec![0.5, 1.0],
                forward_dgs: vec![estimate, estimate],
                forward_ddgs: vec![uncertainty, uncertainty],
                reverse_dgs: vec![estimate, estimate],
                reverse_ddgs: vec![uncertainty, uncertainty],
            }),
            equilibration_iterations: job.equilibration_iterations,
            production_iterations: job.production_iterations,
        })
    }
}

/// A planar six-membered carbon ring centred on the origin, optionally with a methyl carbon.
pub fn ring_ligand(name: &str, methyl: bool) -> Component {
    let mut atoms = Vec::new();
    let mut positions = Vec::new();
    for k in 0..6 {
        let phi = (k as f64 * 60.0).to_radians();
        atoms.push(Atom::new(&format!("C{}", k + 1), "C").with_residue("LIG", 1));
        positions.push(Point3::new(0.14 * phi.cos(), 0.14 * phi.sin(), 0.0));
    }
    let mut bonds: Vec<(usize, usize)> = (0..6).map(|k| (k, (k + 1) % 6)).collect();
    if methyl {
        atoms.push(Atom::new("C7", "C").with_residue("LIG", 1));
        positions.push(Point3::new(0.29, 0.0, 0.0));
        bonds.push((0, 6));
    }
    let mut structure = Structure::new(atoms, positions);
    structure.bonds = bonds;
    Component::SmallMolecule(SmallMoleculeComponent::new(name, structure))
}

/// Backbone atoms on a helix of radius 0.8 nm above the ligand plane.
pub fn helix_protein() -> Component {
    let names = ["N", "CA", "C"];
    let mut atoms = Vec::new();
    let mut positions = Vec::new();
    for k in 0..12 {
        let theta = (k as f64 * 30.0).to_radians();
        let name = names[k % 3];
        let element = if name == "N" { "N" } else { "C" };
        atoms.push(Atom::new(name, element).with_residue("ALA", k / 3 + 1));
        positions.push(Point3::new(
            0.8 * theta.cos(),
            0.8 * theta.sin(),
            0.6 + 0.03 * k as f64,
        ));
    }
    let mut structure = Structure::new(atoms, positions);
    structure.bonds = (0..11).map(|k| (k, k + 1)).collect();
    Component::Protein(ProteinComponent {
        name: "helix".to_string(),
        structure,
    })
}

pub fn complex_state(ligand: Component) -> ChemicalSystem {
    ChemicalSystem::new(ligand.name())
        .with_component("protein", helix_protein())
        .with_component("solvent", Component::Solvent(SolventComponent::default()))
        .with_component("ligand", ligand)
}
