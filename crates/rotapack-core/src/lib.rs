//! # rotapack Core Library
//!
//! A combinatorial rotamer-packing optimizer: given a structure and a set of
//! allowed discrete states ("rotamers") per position, choose one state per
//! position that jointly minimizes a pairwise-decomposable energy, under
//! configurable memory and runtime budgets.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Stateless data models ([`core::models`],
//!   [`core::rotamers`]) and the contracts with external collaborators: the
//!   black-box [`core::energy::EnergyFunction`], the opaque
//!   [`core::models::pose::Pose`], and the [`core::rotamers::library::RotamerLibrary`].
//!
//! - **[`engine`]: The Logic Core.** This stateful layer holds the
//!   [`engine::graph::InteractionGraph`] (pairwise energies under one of four
//!   memory policies, with incremental consider/commit re-scoring), the
//!   [`engine::annealer::Annealer`] search driver, and the
//!   [`engine::task::PackerTask`] configuration contract.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer.
//!   [`workflows::pack::run`] ties the engine and core together: it builds
//!   rotamer sets from a task, assembles the interaction graph, runs the
//!   annealer, and writes the winning rotamers back into the caller's pose.

pub mod core;
pub mod engine;
pub mod workflows;
