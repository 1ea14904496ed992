use crate::core::models::pose::ResidueIdentity;
use crate::core::rotamers::rotamer::GeometryHandle;

/// External source of candidate rotamer geometries.
///
/// Queried once per (position, identity) pair during rotamer-set
/// construction. An empty candidate list is legal here; whether it is an
/// error depends on the task flags for the position and is decided by
/// [`crate::engine::rotamer_set::RotamerSet::build`].
pub trait RotamerLibrary {
    fn candidates(&self, position: usize, identity: &ResidueIdentity) -> Vec<GeometryHandle>;
}
