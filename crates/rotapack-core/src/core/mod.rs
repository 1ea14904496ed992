//! Stateless data models and the contracts this core holds with its external
//! collaborators: the energy function, the pose, and the rotamer library.

pub mod energy;
pub mod models;
pub mod rotamers;

#[cfg(test)]
pub(crate) mod fixtures;
