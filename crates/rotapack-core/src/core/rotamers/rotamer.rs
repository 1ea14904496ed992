use crate::core::models::pose::ResidueIdentity;
use serde::{Deserialize, Serialize};

/// Opaque token identifying a rotamer geometry in the caller's library.
///
/// The core never interprets it; it is carried on each [`Rotamer`] and passed
/// through to the external energy function and back to the pose untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeometryHandle(pub u64);

/// A candidate discrete state at one position.
///
/// State ids are dense and contiguous per position, assigned in enumeration
/// order during rotamer-set construction. Immutable once packing begins.
#[derive(Debug, Clone, PartialEq)]
pub struct Rotamer {
    pub position: usize,
    pub state: usize,
    pub identity: ResidueIdentity,
    pub geometry: GeometryHandle,
    /// One-body energy, computed exactly once at set construction.
    pub one_body: f64,
}
