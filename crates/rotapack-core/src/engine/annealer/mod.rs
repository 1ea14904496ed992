//! Metropolis simulated annealing over the interaction graph.
//!
//! The annealer owns no energy logic; it proposes single-position
//! substitutions, asks the graph for their deltas, and accepts or rejects
//! them under a geometric cooling schedule. Variants change only how moves
//! are proposed and when the search gives up, never how a move is scored.

mod history;
mod schedule;

pub use history::MoveRecord;

use super::graph::InteractionGraph;
use super::progress::{Progress, ProgressReporter};
use super::task::{AnnealerOptions, AnnealerVariant, SmartAnnealerOptions};
use crate::core::energy::DeltaEnergy;
use history::HistoryRecorder;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::IteratorRandom;
use schedule::CoolingSchedule;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Outer cycles of improvement flags the smart heuristic looks back over.
const SMART_WINDOW: usize = 8;

/// Safety bound on quench sweeps; a sweep with no change ends the quench
/// well before this in practice.
const QUENCH_SWEEP_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Cooling,
    Quenching,
    Terminated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveCounters {
    pub proposed: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub invalid: u64,
}

/// Everything a caller learns from one annealing run. The best assignment is
/// always complete and always the lowest total the search visited, which may
/// differ from wherever the walk happened to end.
#[derive(Debug, Clone)]
pub struct AnnealOutcome {
    pub best_assignment: Vec<usize>,
    pub best_energy: f64,
    pub cycles_run: usize,
    pub counters: MoveCounters,
    /// Pick-again restarts taken by the smart variant.
    pub restarts: usize,
    /// True when the run gave up after sustained invalid proposals.
    pub stalled: bool,
    pub history: Option<Vec<MoveRecord>>,
}

pub struct Annealer<'a> {
    options: &'a AnnealerOptions,
    record_history: bool,
    phase: Phase,
}

impl<'a> Annealer<'a> {
    pub fn new(options: &'a AnnealerOptions, record_history: bool) -> Self {
        Self {
            options,
            record_history,
            phase: Phase::Initializing,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run cooling and (unless disallowed) the greedy quench. All randomness
    /// flows through `rng`, so a fixed seed reproduces the run exactly.
    pub fn run<R: Rng>(
        &mut self,
        graph: &mut InteractionGraph<'_>,
        rng: &mut R,
        reporter: &ProgressReporter,
    ) -> AnnealOutcome {
        let sets = graph.sets();
        let n = sets.len();

        self.phase = Phase::Initializing;
        let mut current: Vec<usize> = (0..n)
            .map(|p| {
                let set = sets.position(p);
                if self.options.start_from_current {
                    set.current_state()
                        .unwrap_or_else(|| set.lowest_one_body_state())
                } else {
                    set.lowest_one_body_state()
                }
            })
            .collect();
        let mut total = graph.set_assignment(&current);
        let mut best = current.clone();
        let mut best_energy = total;

        let pool: Vec<usize> = (0..n)
            .filter(|&p| sets.position(p).packable() && sets.position(p).num_states() > 1)
            .collect();

        let mut counters = MoveCounters::default();
        let mut recorder = HistoryRecorder::new(self.record_history);
        let mut restarts = 0usize;
        let mut stalled = false;
        let mut cycles_run = 0usize;

        if pool.is_empty() {
            debug!("No movable positions; annealing is a no-op");
            self.phase = Phase::Terminated;
            return AnnealOutcome {
                best_assignment: best,
                best_energy,
                cycles_run,
                counters,
                restarts,
                stalled,
                history: recorder.into_records(),
            };
        }

        let total_states = sets.total_states();
        let inner_moves = self.options.moves_per_cycle_factor * total_states;
        let stall_limit = (10 * total_states).max(1000);
        let schedule =
            CoolingSchedule::new(self.options.hot, self.options.cold, self.options.outer_cycles);

        let mut multi_cool = match &self.options.variant {
            AnnealerVariant::MultiCool { history } => Some(MultiCoolState::new(*history, n)),
            _ => None,
        };
        let mut smart = match &self.options.variant {
            AnnealerVariant::Smart(opts) => Some(SmartState::new(opts)),
            _ => None,
        };

        debug!(
            movable = pool.len(),
            inner_moves,
            outer_cycles = self.options.outer_cycles,
            start_energy = total,
            "Annealing started"
        );

        self.phase = Phase::Cooling;
        let mut consecutive_invalid = 0usize;
        'cooling: for cycle in 0..self.options.outer_cycles {
            let temperature = schedule.temperature(cycle);
            let best_at_cycle_start = best_energy;

            for _ in 0..inner_moves {
                let position = match &multi_cool {
                    Some(mc) => mc.choose_position(&pool, rng),
                    None => pool[rng.gen_range(0..pool.len())],
                };
                let cur = current[position];
                let num_states = sets.position(position).num_states();
                let state = match &multi_cool {
                    Some(mc) => mc.choose_state(position, cur, num_states, rng),
                    None => (0..num_states).filter(|&s| s != cur).choose(rng),
                };
                let Some(state) = state else { continue };

                counters.proposed += 1;
                match graph.consider_substitution(position, state) {
                    DeltaEnergy::Invalid => {
                        counters.invalid += 1;
                        consecutive_invalid += 1;
                        recorder.record(MoveRecord {
                            cycle,
                            position,
                            state,
                            delta: f64::NAN,
                            accepted: false,
                            temperature,
                            total_after: total,
                            best_after: best_energy,
                        });
                        if consecutive_invalid >= stall_limit {
                            warn!(
                                consecutive_invalid,
                                "Annealing stalled on invalid moves; returning the best seen"
                            );
                            reporter.report(Progress::Message(format!(
                                "annealing stalled after {consecutive_invalid} \
                                 consecutive invalid moves"
                            )));
                            stalled = true;
                            cycles_run = cycle + 1;
                            break 'cooling;
                        }
                    }
                    DeltaEnergy::Finite(delta) => {
                        consecutive_invalid = 0;
                        // Ties are accepted unconditionally.
                        let accepted =
                            delta <= 0.0 || rng.r#gen::<f64>() < (-delta / temperature).exp();
                        if accepted {
                            total = graph.commit_substitution(position, state);
                            current[position] = state;
                            counters.accepted += 1;
                            if let Some(mc) = &mut multi_cool {
                                mc.note_accept(position);
                            }
                            if total < best_energy {
                                best_energy = total;
                                best.copy_from_slice(&current);
                            }
                        } else {
                            counters.rejected += 1;
                            if let Some(mc) = &mut multi_cool {
                                mc.note_reject(position, state);
                            }
                        }
                        recorder.record(MoveRecord {
                            cycle,
                            position,
                            state,
                            delta,
                            accepted,
                            temperature,
                            total_after: total,
                            best_after: best_energy,
                        });
                    }
                }
            }

            cycles_run = cycle + 1;
            reporter.report(Progress::CycleUpdate {
                cycle,
                temperature,
                best_energy,
            });

            if let Some(smart) = &mut smart {
                smart.note_cycle(best_energy < best_at_cycle_start);
                if smart.should_intervene() {
                    if smart.pick_again && restarts == 0 {
                        info!(cycle, "Convergence heuristic restarting from the best assignment");
                        current.copy_from_slice(&best);
                        total = graph.set_assignment(&current);
                        restarts += 1;
                        smart.reset_window();
                    } else {
                        info!(cycle, "Convergence heuristic ending the cooling phase early");
                        smart.fired = true;
                        break 'cooling;
                    }
                }
            }
        }

        let skip_quench = self.options.disallow_quench
            || stalled
            || smart
                .as_ref()
                .is_some_and(|s| s.fired && !s.disable_during_quench);
        if !skip_quench {
            self.phase = Phase::Quenching;
            // Quench polishes the best assignment, not wherever cooling
            // happened to end. The reseeded total is only read back through
            // the first committed move.
            current.copy_from_slice(&best);
            graph.set_assignment(&current);

            for sweep in 0..QUENCH_SWEEP_LIMIT {
                let mut changed = false;
                for &position in &pool {
                    let cur = current[position];
                    let num_states = sets.position(position).num_states();
                    let mut best_state = cur;
                    let mut best_delta = 0.0;
                    let mut finite_considered = 0u64;
                    for s in (0..num_states).filter(|&s| s != cur) {
                        counters.proposed += 1;
                        match graph.consider_substitution(position, s) {
                            DeltaEnergy::Finite(d) => {
                                finite_considered += 1;
                                if d < best_delta {
                                    best_delta = d;
                                    best_state = s;
                                }
                            }
                            DeltaEnergy::Invalid => counters.invalid += 1,
                        }
                    }
                    if best_state != cur {
                        total = graph.commit_substitution(position, best_state);
                        current[position] = best_state;
                        counters.accepted += 1;
                        counters.rejected += finite_considered - 1;
                        changed = true;
                        if total < best_energy {
                            best_energy = total;
                            best.copy_from_slice(&current);
                        }
                        recorder.record(MoveRecord {
                            cycle: cycles_run,
                            position,
                            state: best_state,
                            delta: best_delta,
                            accepted: true,
                            temperature: 0.0,
                            total_after: total,
                            best_after: best_energy,
                        });
                    } else {
                        counters.rejected += finite_considered;
                    }
                }
                if !changed {
                    break;
                }
                if sweep + 1 == QUENCH_SWEEP_LIMIT {
                    warn!("Quench hit its sweep limit before converging");
                }
            }
        }

        self.phase = Phase::Terminated;
        info!(
            best_energy,
            cycles_run,
            proposed = counters.proposed,
            accepted = counters.accepted,
            restarts,
            stalled,
            "Annealing finished"
        );
        AnnealOutcome {
            best_assignment: best,
            best_energy,
            cycles_run,
            counters,
            restarts,
            stalled,
            history: recorder.into_records(),
        }
    }
}

/// Proposal memory for the multi-cool variant: positions with recently
/// accepted substitutions are revisited more often, and very recently
/// rejected states are skipped while an alternative exists.
struct MultiCoolState {
    history: usize,
    recent_accepts: VecDeque<usize>,
    recent_rejects: Vec<VecDeque<usize>>,
}

impl MultiCoolState {
    fn new(history: usize, positions: usize) -> Self {
        Self {
            history,
            recent_accepts: VecDeque::with_capacity(history),
            recent_rejects: vec![VecDeque::with_capacity(history); positions],
        }
    }

    fn choose_position<R: Rng>(&self, pool: &[usize], rng: &mut R) -> usize {
        let weights: Vec<usize> = pool
            .iter()
            .map(|&p| 1 + self.recent_accepts.iter().filter(|&&q| q == p).count())
            .collect();
        match WeightedIndex::new(&weights) {
            Ok(dist) => pool[dist.sample(rng)],
            Err(_) => pool[rng.gen_range(0..pool.len())],
        }
    }

    fn choose_state<R: Rng>(
        &self,
        position: usize,
        current: usize,
        num_states: usize,
        rng: &mut R,
    ) -> Option<usize> {
        let rejects = &self.recent_rejects[position];
        (0..num_states)
            .filter(|&s| s != current && !rejects.contains(&s))
            .choose(rng)
            .or_else(|| (0..num_states).filter(|&s| s != current).choose(rng))
    }

    fn note_accept(&mut self, position: usize) {
        if self.recent_accepts.len() == self.history {
            self.recent_accepts.pop_front();
        }
        self.recent_accepts.push_back(position);
        self.recent_rejects[position].clear();
    }

    fn note_reject(&mut self, position: usize, state: usize) {
        let ring = &mut self.recent_rejects[position];
        if ring.len() == self.history {
            ring.pop_front();
        }
        ring.push_back(state);
    }
}

/// Convergence heuristic for the smart variant: when most recent outer
/// cycles failed to improve the best energy, restart from the best once
/// (pick-again) and end the cooling phase early the next time.
struct SmartState {
    cutoff: f64,
    pick_again: bool,
    disable_during_quench: bool,
    window: VecDeque<bool>,
    fired: bool,
}

impl SmartState {
    fn new(options: &SmartAnnealerOptions) -> Self {
        if options.model != "standard" {
            warn!(model = %options.model, "Unknown annealer model; using the standard profile");
        }
        Self {
            cutoff: options.cutoff,
            pick_again: options.pick_again,
            disable_during_quench: options.disable_during_quench,
            window: VecDeque::with_capacity(SMART_WINDOW),
            fired: false,
        }
    }

    fn note_cycle(&mut self, improved: bool) {
        if self.window.len() == SMART_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(improved);
    }

    fn should_intervene(&self) -> bool {
        if self.window.len() < SMART_WINDOW {
            return false;
        }
        let unimproved = self.window.iter().filter(|&&improved| !improved).count();
        unimproved as f64 / self.window.len() as f64 >= self.cutoff
    }

    fn reset_window(&mut self) {
        self.window.clear();
    }
}
