use crate::core::rotamers::rotamer::{GeometryHandle, Rotamer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chemical identity of the residue modeled at a position.
///
/// Kept open-ended (rather than a closed enum) because design positions may
/// introduce identities the core cannot enumerate up front; the rotamer
/// library and energy function are the authorities on what a given identity
/// means.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResidueIdentity(pub String);

impl ResidueIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResidueIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResidueIdentity {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Read/write access to the structure being packed.
///
/// The core reads current identities and geometries at build time and writes
/// winning rotamers back once the search has finished. Everything else about
/// the structure (coordinates, chemistry, I/O) is the caller's business.
pub trait Pose {
    /// Number of positions, indexed `0..len()`.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identity of the residue currently modeled at `position`.
    fn identity(&self, position: usize) -> ResidueIdentity;

    /// Geometry of the conformation currently modeled at `position`.
    fn current_geometry(&self, position: usize) -> GeometryHandle;

    /// Replace the conformation at `position` with the given rotamer.
    fn apply_rotamer(&mut self, position: usize, rotamer: &Rotamer);
}
