use crate::core::models::pose::ResidueIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum TaskError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for {parameter}: {message}")]
    InvalidValue {
        parameter: &'static str,
        message: String,
    },

    #[error("Position {position} is out of range for a task of {len} positions")]
    PositionOutOfRange { position: usize, len: usize },

    #[error("Position {position} is designable but has no allowed identities")]
    DesignWithoutIdentities { position: usize },
}

/// Memory/time tradeoff for pairwise-energy storage in the interaction graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphPolicy {
    /// Every pairwise table filled eagerly at build time. Fastest per move,
    /// highest peak memory.
    Precomputed,
    /// Tables allocated at build, cells filled on first touch.
    Lazy,
    /// Table allocation itself deferred until any cell in it is touched.
    DoubleLazy,
    /// No full tables; a bounded LRU row cache over the whole graph keeps
    /// memory O(positions) at the cost of recomputation on cache misses.
    LinearMemory,
}

impl fmt::Display for GraphPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GraphPolicy::Precomputed => "precomputed",
            GraphPolicy::Lazy => "lazy",
            GraphPolicy::DoubleLazy => "double-lazy",
            GraphPolicy::LinearMemory => "linear-memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartAnnealerOptions {
    /// Heuristic profile name. Only `"standard"` ships; unknown names fall
    /// back to it with a warning.
    pub model: String,
    /// Fraction of recent outer cycles without improvement that triggers the
    /// early-exit heuristic, in `[0, 1]`.
    pub cutoff: f64,
    /// On a stall, reset the current assignment to the best seen and keep
    /// searching instead of terminating.
    pub pick_again: bool,
    /// Suppress the heuristic during the quench phase.
    pub disable_during_quench: bool,
}

impl Default for SmartAnnealerOptions {
    fn default() -> Self {
        Self {
            model: "standard".to_string(),
            cutoff: 0.75,
            pick_again: true,
            disable_during_quench: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnnealerVariant {
    Standard,
    /// Revisit positions whose substitutions were frequently accepted, and
    /// avoid proposing very recently rejected states.
    MultiCool { history: usize },
    /// Standard proposals plus an early-exit / pick-again convergence
    /// heuristic.
    Smart(SmartAnnealerOptions),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphOptions {
    pub policy: GraphPolicy,
    /// LinearMemory row-cache history: recently computed rows kept per
    /// position.
    pub linmem_history: usize,
    /// Byte budget for pairwise storage under the table-backed policies.
    pub memory_limit_bytes: Option<u64>,
    /// Worker threads for the Precomputed parallel build; 0 uses the library
    /// default pool size.
    pub threads: usize,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            policy: GraphPolicy::Precomputed,
            linmem_history: 10,
            memory_limit_bytes: None,
            threads: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealerOptions {
    pub variant: AnnealerVariant,
    /// Starting temperature of the geometric cooling schedule.
    pub hot: f64,
    /// Final temperature of the cooling schedule.
    pub cold: f64,
    pub outer_cycles: usize,
    /// Inner moves per outer cycle, as a multiple of the total rotamer-state
    /// count.
    pub moves_per_cycle_factor: usize,
    /// Skip the greedy zero-temperature finishing phase.
    pub disallow_quench: bool,
    /// Start from the pose's current states where the rotamer sets contain
    /// them, instead of the lowest one-body states.
    pub start_from_current: bool,
}

impl Default for AnnealerOptions {
    fn default() -> Self {
        Self {
            variant: AnnealerVariant::Standard,
            hot: 100.0,
            cold: 0.3,
            outer_cycles: 20,
            moves_per_cycle_factor: 5,
            disallow_quench: false,
            start_from_current: false,
        }
    }
}

/// Per-position packing directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueLevelTask {
    packable: bool,
    designable: bool,
    allowed: Vec<ResidueIdentity>,
    include_current: bool,
}

impl Default for ResidueLevelTask {
    fn default() -> Self {
        Self {
            packable: true,
            designable: false,
            allowed: Vec::new(),
            include_current: false,
        }
    }
}

impl ResidueLevelTask {
    pub fn packable(&self) -> bool {
        self.packable
    }

    pub fn designable(&self) -> bool {
        self.designable
    }

    /// Identities legal at this position beyond the current one. Empty for
    /// repack-only positions.
    pub fn allowed_identities(&self) -> &[ResidueIdentity] {
        &self.allowed
    }

    pub fn include_current(&self) -> bool {
        self.include_current
    }
}

/// Job-scoped packing configuration: per-position flags plus the global
/// optimizer knobs consumed by graph and annealer construction.
///
/// Mutable only before optimization starts; every knob is read-only once
/// packing begins. Changing a task mid-run is a caller contract violation
/// (documented precondition, not enforced internally).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackerTask {
    residues: Vec<ResidueLevelTask>,
    graph: GraphOptions,
    annealer: AnnealerOptions,
    seed: Option<u64>,
    record_history: bool,
}

impl PackerTask {
    /// A task over `num_positions` positions with every position packable
    /// (repack-only) and default optimizer knobs.
    pub fn new(num_positions: usize) -> Self {
        Self {
            residues: vec![ResidueLevelTask::default(); num_positions],
            graph: GraphOptions::default(),
            annealer: AnnealerOptions::default(),
            seed: None,
            record_history: false,
        }
    }

    pub fn builder(num_positions: usize) -> PackerTaskBuilder {
        PackerTaskBuilder::new().num_positions(num_positions)
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn residue(&self, position: usize) -> &ResidueLevelTask {
        &self.residues[position]
    }

    pub fn pack_residue(&self, position: usize) -> bool {
        self.residues[position].packable
    }

    pub fn design_residue(&self, position: usize) -> bool {
        self.residues[position].designable
    }

    pub fn num_to_be_packed(&self) -> usize {
        self.residues.iter().filter(|r| r.packable).count()
    }

    pub fn design_any(&self) -> bool {
        self.residues.iter().any(|r| r.designable)
    }

    pub fn graph(&self) -> &GraphOptions {
        &self.graph
    }

    pub fn annealer(&self) -> &AnnealerOptions {
        &self.annealer
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn record_history(&self) -> bool {
        self.record_history
    }

    /// Fix `position` at its current state: neither repacked nor redesigned.
    pub fn prevent_repacking(&mut self, position: usize) {
        let r = &mut self.residues[position];
        r.packable = false;
        r.designable = false;
        r.allowed.clear();
    }

    /// Keep `position` packable but drop any design freedom.
    pub fn restrict_to_repacking(&mut self, position: usize) {
        let r = &mut self.residues[position];
        r.designable = false;
        r.allowed.clear();
    }

    /// Make `position` designable to `identity` (in addition to any
    /// previously allowed identities). Implies packable.
    pub fn allow_identity(&mut self, position: usize, identity: ResidueIdentity) {
        let r = &mut self.residues[position];
        r.packable = true;
        r.designable = true;
        if !r.allowed.contains(&identity) {
            r.allowed.push(identity);
        }
    }

    /// Include the pose's own conformation as a candidate rotamer at
    /// `position`. Or-semantics: once set it stays set.
    pub fn or_include_current(&mut self, position: usize, setting: bool) {
        let r = &mut self.residues[position];
        r.include_current |= setting;
    }

    /// Consistency checks run by the driver before any optimization work.
    pub fn validate(&self) -> Result<(), TaskError> {
        for (position, r) in self.residues.iter().enumerate() {
            if r.designable && r.allowed.is_empty() {
                return Err(TaskError::DesignWithoutIdentities { position });
            }
        }
        validate_options(&self.graph, &self.annealer)?;
        Ok(())
    }
}

fn validate_options(graph: &GraphOptions, annealer: &AnnealerOptions) -> Result<(), TaskError> {
    if graph.linmem_history == 0 {
        return Err(TaskError::InvalidValue {
            parameter: "linmem_history",
            message: "must be at least 1".to_string(),
        });
    }
    if !(annealer.hot.is_finite() && annealer.cold.is_finite())
        || annealer.cold <= 0.0
        || annealer.hot < annealer.cold
    {
        return Err(TaskError::InvalidValue {
            parameter: "hot/cold",
            message: format!(
                "require hot >= cold > 0, got hot={} cold={}",
                annealer.hot, annealer.cold
            ),
        });
    }
    if annealer.outer_cycles == 0 {
        return Err(TaskError::InvalidValue {
            parameter: "outer_cycles",
            message: "must be at least 1".to_string(),
        });
    }
    if annealer.moves_per_cycle_factor == 0 {
        return Err(TaskError::InvalidValue {
            parameter: "moves_per_cycle_factor",
            message: "must be at least 1".to_string(),
        });
    }
    match &annealer.variant {
        AnnealerVariant::MultiCool { history } if *history == 0 => {
            return Err(TaskError::InvalidValue {
                parameter: "multi_cool_history",
                message: "must be at least 1".to_string(),
            });
        }
        AnnealerVariant::Smart(smart) if !(0.0..=1.0).contains(&smart.cutoff) => {
            return Err(TaskError::InvalidValue {
                parameter: "smart_annealer_cutoff",
                message: format!("must be within [0, 1], got {}", smart.cutoff),
            });
        }
        _ => {}
    }
    Ok(())
}

#[derive(Default)]
pub struct PackerTaskBuilder {
    num_positions: Option<usize>,
    graph: GraphOptions,
    annealer: AnnealerOptions,
    seed: Option<u64>,
    record_history: bool,
}

impl PackerTaskBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_positions(mut self, n: usize) -> Self {
        self.num_positions = Some(n);
        self
    }

    pub fn graph_policy(mut self, policy: GraphPolicy) -> Self {
        self.graph.policy = policy;
        self
    }

    pub fn linmem_history(mut self, history: usize) -> Self {
        self.graph.linmem_history = history;
        self
    }

    pub fn memory_limit_bytes(mut self, limit: u64) -> Self {
        self.graph.memory_limit_bytes = Some(limit);
        self
    }

    pub fn ig_threads(mut self, threads: usize) -> Self {
        self.graph.threads = threads;
        self
    }

    pub fn annealer_variant(mut self, variant: AnnealerVariant) -> Self {
        self.annealer.variant = variant;
        self
    }

    pub fn temperature_range(mut self, hot: f64, cold: f64) -> Self {
        self.annealer.hot = hot;
        self.annealer.cold = cold;
        self
    }

    pub fn outer_cycles(mut self, cycles: usize) -> Self {
        self.annealer.outer_cycles = cycles;
        self
    }

    pub fn moves_per_cycle_factor(mut self, factor: usize) -> Self {
        self.annealer.moves_per_cycle_factor = factor;
        self
    }

    pub fn disallow_quench(mut self, setting: bool) -> Self {
        self.annealer.disallow_quench = setting;
        self
    }

    pub fn start_from_current(mut self, setting: bool) -> Self {
        self.annealer.start_from_current = setting;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn record_history(mut self, setting: bool) -> Self {
        self.record_history = setting;
        self
    }

    pub fn build(self) -> Result<PackerTask, TaskError> {
        let num_positions = self
            .num_positions
            .ok_or(TaskError::MissingParameter("num_positions"))?;
        validate_options(&self.graph, &self.annealer)?;
        Ok(PackerTask {
            residues: vec![ResidueLevelTask::default(); num_positions],
            graph: self.graph,
            annealer: self.annealer,
            seed: self.seed,
            record_history: self.record_history,
        })
    }
}
