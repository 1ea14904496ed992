//! Shared in-memory collaborator implementations for unit tests: a
//! table-backed energy function, a vector pose, and a map-backed rotamer
//! library.

use crate::core::energy::EnergyFunction;
use crate::core::models::pose::{Pose, ResidueIdentity};
use crate::core::rotamers::library::RotamerLibrary;
use crate::core::rotamers::rotamer::{GeometryHandle, Rotamer};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub(crate) struct TableEnergy {
    one_body: HashMap<(usize, GeometryHandle), f64>,
    pairwise: HashMap<(usize, GeometryHandle, usize, GeometryHandle), f64>,
    cutoff: f64,
    /// `None` means every distinct pair of positions interacts.
    contacts: Option<HashSet<(usize, usize)>>,
}

impl TableEnergy {
    pub fn new() -> Self {
        Self {
            cutoff: 10.0,
            ..Self::default()
        }
    }

    pub fn set_one_body(&mut self, position: usize, geometry: u64, energy: f64) {
        self.one_body
            .insert((position, GeometryHandle(geometry)), energy);
    }

    pub fn set_pairwise(&mut self, a: (usize, u64), b: (usize, u64), energy: f64) {
        let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        self.pairwise.insert(
            (lo.0, GeometryHandle(lo.1), hi.0, GeometryHandle(hi.1)),
            energy,
        );
    }

    /// Restrict edge existence to the listed position pairs.
    pub fn restrict_contacts(&mut self, pairs: &[(usize, usize)]) {
        self.contacts = Some(
            pairs
                .iter()
                .map(|&(a, b)| (a.min(b), a.max(b)))
                .collect(),
        );
    }
}

impl EnergyFunction for TableEnergy {
    fn one_body(&self, rotamer: &Rotamer) -> f64 {
        *self
            .one_body
            .get(&(rotamer.position, rotamer.geometry))
            .unwrap_or(&0.0)
    }

    fn two_body(&self, a: &Rotamer, b: &Rotamer) -> f64 {
        let (lo, hi) = if a.position <= b.position {
            (a, b)
        } else {
            (b, a)
        };
        *self
            .pairwise
            .get(&(lo.position, lo.geometry, hi.position, hi.geometry))
            .unwrap_or(&0.0)
    }

    fn interaction_cutoff(&self) -> f64 {
        self.cutoff
    }

    fn positions_interact(&self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }
        match &self.contacts {
            None => true,
            Some(set) => set.contains(&(a.min(b), a.max(b))),
        }
    }
}

#[derive(Debug)]
pub(crate) struct VecPose {
    identities: Vec<ResidueIdentity>,
    current: Vec<GeometryHandle>,
    /// Geometry written back per position, if any.
    pub applied: Vec<Option<GeometryHandle>>,
}

impl VecPose {
    pub fn new(identities: &[&str], current_geometries: &[u64]) -> Self {
        assert_eq!(identities.len(), current_geometries.len());
        Self {
            identities: identities.iter().map(|&s| ResidueIdentity::from(s)).collect(),
            current: current_geometries
                .iter()
                .map(|&g| GeometryHandle(g))
                .collect(),
            applied: vec![None; identities.len()],
        }
    }
}

impl Pose for VecPose {
    fn len(&self) -> usize {
        self.identities.len()
    }

    fn identity(&self, position: usize) -> ResidueIdentity {
        self.identities[position].clone()
    }

    fn current_geometry(&self, position: usize) -> GeometryHandle {
        self.current[position]
    }

    fn apply_rotamer(&mut self, position: usize, rotamer: &Rotamer) {
        self.current[position] = rotamer.geometry;
        self.applied[position] = Some(rotamer.geometry);
    }
}

#[derive(Debug, Default)]
pub(crate) struct MapLibrary {
    entries: HashMap<(usize, ResidueIdentity), Vec<GeometryHandle>>,
}

impl MapLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, position: usize, identity: &str, geometries: &[u64]) {
        self.entries.insert(
            (position, ResidueIdentity::from(identity)),
            geometries.iter().map(|&g| GeometryHandle(g)).collect(),
        );
    }
}

impl RotamerLibrary for MapLibrary {
    fn candidates(&self, position: usize, identity: &ResidueIdentity) -> Vec<GeometryHandle> {
        self.entries
            .get(&(position, identity.clone()))
            .cloned()
            .unwrap_or_default()
    }
}

pub(crate) struct TwoSite {
    pub pose: VecPose,
    pub library: MapLibrary,
    pub energy: TableEnergy,
}

/// The trivial two-position scenario: A has states a1 (E=0) and a2 (E=5), B
/// has b1 (E=0) and b2 (E=2); pairwise E(a1,b1)=0, E(a1,b2)=10, E(a2,b1)=1,
/// E(a2,b2)=1. Global optimum is (a1, b1) with total energy 0. The pose
/// starts in the worst corner (a2, b2).
pub(crate) fn two_site() -> TwoSite {
    let pose = VecPose::new(&["ALA", "SER"], &[2, 12]);

    let mut library = MapLibrary::new();
    library.add(0, "ALA", &[1, 2]);
    library.add(1, "SER", &[11, 12]);

    let mut energy = TableEnergy::new();
    energy.set_one_body(0, 1, 0.0);
    energy.set_one_body(0, 2, 5.0);
    energy.set_one_body(1, 11, 0.0);
    energy.set_one_body(1, 12, 2.0);
    energy.set_pairwise((0, 1), (1, 11), 0.0);
    energy.set_pairwise((0, 1), (1, 12), 10.0);
    energy.set_pairwise((0, 2), (1, 11), 1.0);
    energy.set_pairwise((0, 2), (1, 12), 1.0);

    TwoSite {
        pose,
        library,
        energy,
    }
}
