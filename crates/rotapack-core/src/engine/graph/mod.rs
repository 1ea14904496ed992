//! The sparse weighted graph over (position, rotamer-state) pairs.
//!
//! One graph type serves all four memory policies; the policy varies only how
//! pairwise cells are stored and fetched, never the edge-existence or
//! incremental-delta logic.

use super::error::EngineError;
use super::rotamer_set::RotamerSets;
use super::task::{GraphOptions, GraphPolicy};
use crate::core::energy::{DeltaEnergy, EnergyFunction};
use crate::core::models::assignment::Assignment;
use itertools::Itertools;
use storage::{EdgeTable, RowCache, RowKey};
use tracing::{info, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

mod storage;

#[derive(Debug)]
struct Edge {
    a: usize,
    b: usize,
    table: EdgeTable,
    last_touch: u64,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    position: usize,
    state: usize,
    delta: f64,
}

/// Pairwise-energy store plus incremental re-scoring over a committed
/// assignment.
///
/// Pairwise values are cached keyed by `(edge, state, state)`, not by the
/// current assignment, so cached cells stay valid across commits and a
/// value once computed is never recomputed differently within one run.
pub struct InteractionGraph<'a> {
    sets: &'a RotamerSets,
    energy: &'a dyn EnergyFunction,
    policy: GraphPolicy,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<usize>>,
    current: Vec<Option<usize>>,
    total: f64,
    pending: Option<Pending>,
    row_cache: Option<RowCache>,
    memory_limit: Option<u64>,
    allocated_bytes: u64,
    touch_tick: u64,
}

impl<'a> InteractionGraph<'a> {
    /// Build the graph: an edge exists between two positions when the energy
    /// function says they interact and at least one endpoint is packable.
    /// Table-backed policies are checked against the byte budget here, before
    /// any allocation; violations abort with the offending position pair.
    pub fn build(
        sets: &'a RotamerSets,
        energy: &'a dyn EnergyFunction,
        options: &GraphOptions,
    ) -> Result<Self, EngineError> {
        let n = sets.len();
        let mut edges = Vec::new();
        let mut adjacency = vec![Vec::new(); n];

        for (a, b) in (0..n).tuple_combinations() {
            if !(sets.position(a).packable() || sets.position(b).packable()) {
                continue;
            }
            if !energy.positions_interact(a, b) {
                continue;
            }
            adjacency[a].push(edges.len());
            adjacency[b].push(edges.len());
            edges.push(Edge {
                a,
                b,
                table: EdgeTable::External,
                last_touch: 0,
            });
        }

        check_memory_budget(&edges, sets, options)?;

        let mut graph = Self {
            sets,
            energy,
            policy: options.policy,
            edges,
            adjacency,
            current: vec![None; n],
            total: 0.0,
            pending: None,
            row_cache: match options.policy {
                GraphPolicy::LinearMemory => Some(RowCache::new(options.linmem_history * n.max(1))),
                _ => None,
            },
            memory_limit: options.memory_limit_bytes,
            allocated_bytes: 0,
            touch_tick: 0,
        };

        match options.policy {
            GraphPolicy::Precomputed => graph.precompute_tables(options.threads)?,
            GraphPolicy::Lazy => {
                for idx in 0..graph.edges.len() {
                    let cells = graph.cell_count(idx);
                    graph.edges[idx].table =
                        EdgeTable::Sparse(vec![None; cells].into_boxed_slice());
                }
            }
            GraphPolicy::DoubleLazy => {
                for edge in &mut graph.edges {
                    edge.table = EdgeTable::Deferred(None);
                }
            }
            GraphPolicy::LinearMemory => {}
        }

        info!(
            positions = n,
            edges = graph.edges.len(),
            total_states = sets.total_states(),
            policy = %options.policy,
            "Interaction graph built"
        );
        Ok(graph)
    }

    fn precompute_tables(&mut self, threads: usize) -> Result<(), EngineError> {
        let sets = self.sets;
        let energy = self.energy;
        let pairs: Vec<(usize, usize)> = self.edges.iter().map(|e| (e.a, e.b)).collect();

        let fill = |&(a, b): &(usize, usize)| -> Box<[f64]> {
            let (na, nb) = (sets.position(a).num_states(), sets.position(b).num_states());
            let mut table = vec![0.0; na * nb];
            for sa in 0..na {
                for sb in 0..nb {
                    table[sa * nb + sb] =
                        energy.two_body(sets.position(a).rotamer(sa), sets.position(b).rotamer(sb));
                }
            }
            table.into_boxed_slice()
        };

        #[cfg(feature = "parallel")]
        let tables: Vec<Box<[f64]>> = if threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| EngineError::WorkerPool(e.to_string()))?;
            tracing::debug!(threads, "Precomputing pairwise tables on a bounded pool");
            pool.install(|| pairs.par_iter().map(fill).collect())
        } else {
            pairs.par_iter().map(fill).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let tables: Vec<Box<[f64]>> = {
            let _ = threads;
            pairs.iter().map(fill).collect()
        };

        for (edge, table) in self.edges.iter_mut().zip(tables) {
            edge.table = EdgeTable::Dense(table);
        }
        Ok(())
    }

    pub fn num_positions(&self) -> usize {
        self.current.len()
    }

    pub fn num_states(&self, position: usize) -> usize {
        self.sets.position(position).num_states()
    }

    pub fn degree(&self, position: usize) -> usize {
        self.adjacency[position].len()
    }

    pub fn policy(&self) -> GraphPolicy {
        self.policy
    }

    pub fn sets(&self) -> &'a RotamerSets {
        self.sets
    }

    pub fn current_state(&self, position: usize) -> Option<usize> {
        self.current[position]
    }

    pub fn current_assignment(&self) -> Assignment {
        let mut assignment = Assignment::new(self.current.len());
        for (position, state) in self.current.iter().enumerate() {
            if let Some(state) = state {
                assignment.set(position, *state);
            }
        }
        assignment
    }

    /// The running total, maintained incrementally across commits. Never
    /// recomputed from scratch during a run.
    pub fn current_total_energy(&self) -> f64 {
        self.total
    }

    /// Seed the committed state for every position and compute the total
    /// once from scratch.
    pub fn set_assignment(&mut self, states: &[usize]) -> f64 {
        debug_assert_eq!(states.len(), self.current.len());
        for (slot, &state) in self.current.iter_mut().zip(states) {
            *slot = Some(state);
        }
        self.pending = None;
        self.total = self.recompute_total_energy();
        self.total
    }

    /// Ground-truth total over the committed assignment: Σ one-body plus Σ
    /// pairwise over all edges. Used for seeding and for drift checks; the
    /// search itself relies on [`Self::current_total_energy`].
    pub fn recompute_total_energy(&mut self) -> f64 {
        let sets = self.sets;
        let mut total = 0.0;
        for (position, state) in self.current.iter().enumerate() {
            if let Some(state) = state {
                total += sets.position(position).rotamer(*state).one_body;
            }
        }
        for idx in 0..self.edges.len() {
            let (a, b) = (self.edges[idx].a, self.edges[idx].b);
            if let (Some(sa), Some(sb)) = (self.current[a], self.current[b]) {
                total += self.pair_energy(idx, true, sa, sb);
            }
        }
        total
    }

    /// Energy change of swapping only `position` to `state`, holding every
    /// other position fixed. O(degree(position)); does not mutate the
    /// committed state. Any non-finite contribution makes the move
    /// [`DeltaEnergy::Invalid`].
    pub fn consider_substitution(&mut self, position: usize, state: usize) -> DeltaEnergy {
        let sets = self.sets;
        let Some(current) = self.current[position] else {
            return DeltaEnergy::Invalid;
        };

        let set = sets.position(position);
        let mut delta = set.rotamer(state).one_body - set.rotamer(current).one_body;

        for k in 0..self.adjacency[position].len() {
            let edge_idx = self.adjacency[position][k];
            let (a, b) = (self.edges[edge_idx].a, self.edges[edge_idx].b);
            let on_first = a == position;
            let other = if on_first { b } else { a };
            let Some(other_state) = self.current[other] else {
                continue;
            };
            let new_pair = self.pair_energy(edge_idx, on_first, state, other_state);
            let old_pair = self.pair_energy(edge_idx, on_first, current, other_state);
            delta += new_pair - old_pair;
        }

        self.pending = Some(Pending {
            position,
            state,
            delta,
        });
        trace!(position, state, delta, "Considered substitution");
        DeltaEnergy::from_raw(delta)
    }

    /// Make the considered substitution the committed state and fold its
    /// delta into the running total. Callers must only commit moves whose
    /// considered delta was finite. Cached pairwise values stay valid.
    pub fn commit_substitution(&mut self, position: usize, state: usize) -> f64 {
        let delta = match self.pending.take() {
            Some(p) if p.position == position && p.state == state => p.delta,
            _ => {
                // No matching pending move; derive the delta fresh. Cached
                // cells make this as cheap as the original consider.
                self.consider_substitution(position, state);
                match self.pending.take() {
                    Some(p) => p.delta,
                    None => 0.0,
                }
            }
        };
        self.current[position] = Some(state);
        self.total += delta;
        debug_assert!(self.total.is_finite(), "committed an invalid move");
        self.total
    }

    fn cell_count(&self, edge_idx: usize) -> usize {
        let edge = &self.edges[edge_idx];
        self.sets.position(edge.a).num_states() * self.sets.position(edge.b).num_states()
    }

    fn compute_pair(&self, a: usize, sa: usize, b: usize, sb: usize) -> f64 {
        self.energy
            .two_body(self.sets.position(a).rotamer(sa), self.sets.position(b).rotamer(sb))
    }

    /// Fetch one pairwise value through whatever storage the policy chose.
    /// `on_first` says which endpoint `driver_state` indexes.
    fn pair_energy(
        &mut self,
        edge_idx: usize,
        on_first: bool,
        driver_state: usize,
        other_state: usize,
    ) -> f64 {
        self.touch_tick += 1;
        self.edges[edge_idx].last_touch = self.touch_tick;

        let (sa, sb) = if on_first {
            (driver_state, other_state)
        } else {
            (other_state, driver_state)
        };

        match self.policy {
            GraphPolicy::Precomputed => self.dense_value(edge_idx, sa, sb),
            GraphPolicy::Lazy => self.sparse_value(edge_idx, sa, sb),
            GraphPolicy::DoubleLazy => {
                self.ensure_table(edge_idx);
                self.sparse_value(edge_idx, sa, sb)
            }
            GraphPolicy::LinearMemory => {
                self.row_value(edge_idx, on_first, driver_state, other_state)
            }
        }
    }

    fn dense_value(&self, edge_idx: usize, sa: usize, sb: usize) -> f64 {
        let edge = &self.edges[edge_idx];
        let nb = self.sets.position(edge.b).num_states();
        match &edge.table {
            EdgeTable::Dense(table) => table[sa * nb + sb],
            _ => self.compute_pair(edge.a, sa, edge.b, sb),
        }
    }

    fn sparse_value(&mut self, edge_idx: usize, sa: usize, sb: usize) -> f64 {
        let (a, b) = (self.edges[edge_idx].a, self.edges[edge_idx].b);
        let nb = self.sets.position(b).num_states();
        let cell = sa * nb + sb;

        if let EdgeTable::Sparse(cells) | EdgeTable::Deferred(Some(cells)) =
            &self.edges[edge_idx].table
        {
            if let Some(value) = cells[cell] {
                return value;
            }
        }
        let value = self.compute_pair(a, sa, b, sb);
        if let EdgeTable::Sparse(cells) | EdgeTable::Deferred(Some(cells)) =
            &mut self.edges[edge_idx].table
        {
            cells[cell] = Some(value);
        }
        value
    }

    /// Allocate a deferred table, evicting least-recently-touched tables
    /// while over the byte budget. Build-time checks guarantee any single
    /// table fits, so eviction always makes room.
    fn ensure_table(&mut self, edge_idx: usize) {
        if matches!(self.edges[edge_idx].table, EdgeTable::Deferred(Some(_))) {
            return;
        }
        let bytes = table_bytes(self.policy, self.cell_count(edge_idx));
        if let Some(limit) = self.memory_limit {
            while self.allocated_bytes + bytes > limit {
                let victim = self
                    .edges
                    .iter()
                    .enumerate()
                    .filter(|(idx, e)| {
                        *idx != edge_idx && matches!(e.table, EdgeTable::Deferred(Some(_)))
                    })
                    .min_by_key(|(_, e)| e.last_touch)
                    .map(|(idx, _)| idx);
                let Some(victim) = victim else { break };
                let victim_bytes = table_bytes(self.policy, self.cell_count(victim));
                self.edges[victim].table = EdgeTable::Deferred(None);
                self.allocated_bytes = self.allocated_bytes.saturating_sub(victim_bytes);
                trace!(edge = victim, "Evicted pairwise table under memory pressure");
            }
        }
        let cells = self.cell_count(edge_idx);
        self.edges[edge_idx].table = EdgeTable::Deferred(Some(vec![None; cells].into_boxed_slice()));
        self.allocated_bytes += bytes;
    }

    fn row_value(
        &mut self,
        edge_idx: usize,
        on_first: bool,
        driver_state: usize,
        other_state: usize,
    ) -> f64 {
        let (a, b) = (self.edges[edge_idx].a, self.edges[edge_idx].b);
        let sets = self.sets;
        let energy = self.energy;
        let (driver_pos, other_pos) = if on_first { (a, b) } else { (b, a) };

        match self.row_cache.as_mut() {
            Some(cache) => {
                let key = RowKey {
                    edge: edge_idx,
                    on_first,
                    state: driver_state,
                };
                let row = cache.get_or_fill(key, || {
                    let driver = sets.position(driver_pos).rotamer(driver_state);
                    (0..sets.position(other_pos).num_states())
                        .map(|s| {
                            let other = sets.position(other_pos).rotamer(s);
                            // Normalize call order so both sides of an edge
                            // observe identical values.
                            if on_first {
                                energy.two_body(driver, other)
                            } else {
                                energy.two_body(other, driver)
                            }
                        })
                        .collect::<Vec<_>>()
                        .into_boxed_slice()
                });
                row[other_state]
            }
            None => {
                let (sa, sb) = if on_first {
                    (driver_state, other_state)
                } else {
                    (other_state, driver_state)
                };
                self.compute_pair(a, sa, b, sb)
            }
        }
    }
}

fn table_bytes(policy: GraphPolicy, cells: usize) -> u64 {
    let cell_size = match policy {
        GraphPolicy::Precomputed => std::mem::size_of::<f64>(),
        _ => std::mem::size_of::<Option<f64>>(),
    };
    (cells * cell_size) as u64
}

fn check_memory_budget(
    edges: &[Edge],
    sets: &RotamerSets,
    options: &GraphOptions,
) -> Result<(), EngineError> {
    let Some(limit) = options.memory_limit_bytes else {
        return Ok(());
    };
    match options.policy {
        GraphPolicy::Precomputed | GraphPolicy::Lazy => {
            let mut cumulative = 0u64;
            for edge in edges {
                let cells =
                    sets.position(edge.a).num_states() * sets.position(edge.b).num_states();
                cumulative += table_bytes(options.policy, cells);
                if cumulative > limit {
                    return Err(EngineError::MemoryBudget {
                        policy: options.policy,
                        positions: (edge.a, edge.b),
                        requested_bytes: cumulative,
                        limit_bytes: limit,
                    });
                }
            }
        }
        GraphPolicy::DoubleLazy => {
            // Any single table must fit, or runtime eviction could never
            // make room for it.
            for edge in edges {
                let cells =
                    sets.position(edge.a).num_states() * sets.position(edge.b).num_states();
                let bytes = table_bytes(options.policy, cells);
                if bytes > limit {
                    return Err(EngineError::MemoryBudget {
                        policy: options.policy,
                        positions: (edge.a, edge.b),
                        requested_bytes: bytes,
                        limit_bytes: limit,
                    });
                }
            }
        }
        GraphPolicy::LinearMemory => {}
    }
    Ok(())
}
