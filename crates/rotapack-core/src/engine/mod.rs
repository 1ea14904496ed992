//! # Engine Module
//!
//! This module implements the combinatorial optimization engine for rotamer
//! packing, providing the stateful machinery that turns a task description
//! into an optimized assignment.
//!
//! ## Overview
//!
//! The engine consumes the stateless abstractions of the core layer (poses,
//! rotamers, energy functions) and drives the actual search: it enumerates
//! legal rotamer sets, materializes the pairwise interaction graph under the
//! configured memory policy, and runs simulated annealing over it.
//!
//! ## Architecture
//!
//! The module is organized into specialized submodules that handle different
//! aspects of the optimization process:
//!
//! - **Task Configuration** ([`task`]) - Per-position packing directives and
//!   global optimizer knobs, with builder-based validation
//! - **Rotamer Sets** ([`rotamer_set`]) - Legal candidate enumeration with
//!   cached one-body energies
//! - **Interaction Graph** ([`graph`]) - Pairwise-energy storage and
//!   incremental move evaluation under four memory policies
//! - **Annealer** ([`annealer`]) - Metropolis cooling, variant proposal
//!   strategies, and the greedy quench
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-specific error types and
//!   propagation

pub mod annealer;
pub mod error;
pub mod graph;
pub mod progress;
pub mod rotamer_set;
pub mod task;
