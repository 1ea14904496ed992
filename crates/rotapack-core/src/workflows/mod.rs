//! # Workflows Module
//!
//! This module provides the high-level entry points that orchestrate complete
//! packing runs.
//!
//! ## Overview
//!
//! Workflows are the top-level API for users of the crate. They encapsulate
//! the entire pipeline from task validation through rotamer enumeration,
//! graph construction, annealing, and writing the winning conformations back
//! to the pose, with progress reporting along the way.
//!
//! ## Architecture
//!
//! - **Packing Workflow** ([`pack`]) - Complete fixed-backbone side-chain
//!   optimization over a caller-supplied pose, rotamer library, and energy
//!   function.

pub mod pack;
