use std::collections::HashMap;

/// Cell storage for one edge's pairwise-energy table. Which variant an edge
/// carries is decided once, by the graph policy, at build time.
#[derive(Debug, Clone)]
pub(crate) enum EdgeTable {
    /// Fully filled at build time.
    Dense(Box<[f64]>),
    /// Allocated at build time, cells filled on first touch.
    Sparse(Box<[Option<f64>]>),
    /// Allocation deferred until any cell is touched; may be dropped again
    /// under memory pressure and re-allocated later.
    Deferred(Option<Box<[Option<f64>]>>),
    /// No per-edge storage; rows live in the graph-wide [`RowCache`].
    External,
}

/// Key of one cached row: the energies of a single state on one side of an
/// edge against every state on the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RowKey {
    pub edge: usize,
    /// Whether `state` indexes the edge's first endpoint.
    pub on_first: bool,
    pub state: usize,
}

#[derive(Debug)]
struct CachedRow {
    values: Box<[f64]>,
    last_used: u64,
}

/// Bounded least-recently-used cache of pairwise-energy rows, shared across
/// the whole graph under the linear-memory policy. A miss triggers
/// recomputation through the external energy function; the memory ceiling
/// stays proportional to the configured history rather than the full
/// quadratic table volume.
#[derive(Debug)]
pub(crate) struct RowCache {
    capacity: usize,
    tick: u64,
    rows: HashMap<RowKey, CachedRow>,
    hits: u64,
    misses: u64,
}

impl RowCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tick: 0,
            rows: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Fetch the row for `key`, computing it with `fill` on a miss. Evicts
    /// the least-recently-used row when the cache is full.
    pub fn get_or_fill(&mut self, key: RowKey, fill: impl FnOnce() -> Box<[f64]>) -> &[f64] {
        self.tick += 1;
        if self.rows.contains_key(&key) {
            self.hits += 1;
        } else {
            self.misses += 1;
            if self.rows.len() >= self.capacity {
                self.evict_lru();
            }
            self.rows.insert(
                key,
                CachedRow {
                    values: fill(),
                    last_used: self.tick,
                },
            );
        }
        let row = self.rows.get_mut(&key).unwrap();
        row.last_used = self.tick;
        &row.values
    }

    fn evict_lru(&mut self) {
        if let Some(victim) = self
            .rows
            .iter()
            .min_by_key(|(_, row)| row.last_used)
            .map(|(key, _)| *key)
        {
            self.rows.remove(&victim);
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
