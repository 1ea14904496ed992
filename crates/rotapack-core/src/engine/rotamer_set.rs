use super::error::EngineError;
use super::task::PackerTask;
use crate::core::energy::EnergyFunction;
use crate::core::models::pose::{Pose, ResidueIdentity};
use crate::core::rotamers::library::RotamerLibrary;
use crate::core::rotamers::rotamer::{GeometryHandle, Rotamer};
use tracing::{debug, trace};

/// The legal candidate states at one position, with one-body energies cached
/// at construction. Immutable once packing begins.
#[derive(Debug, Clone)]
pub struct RotamerSet {
    position: usize,
    packable: bool,
    rotamers: Vec<Rotamer>,
    /// State matching the pose's input conformation, when the set contains it.
    current_state: Option<usize>,
}

impl RotamerSet {
    /// Enumerate the legal rotamers at `position` according to the task
    /// flags:
    /// - fixed positions yield a singleton set equal to the current state;
    /// - designable positions enumerate candidates across all allowed
    ///   identities;
    /// - packable-only positions enumerate candidates for the current
    ///   identity;
    /// - `include_current` adds the input conformation as an extra candidate.
    ///
    /// An empty set at a packable position is a configuration error, not a
    /// silently trivial position.
    pub fn build(
        position: usize,
        pose: &dyn Pose,
        task: &PackerTask,
        library: &dyn RotamerLibrary,
        energy: &dyn EnergyFunction,
    ) -> Result<Self, EngineError> {
        let directives = task.residue(position);
        let current_identity = pose.identity(position);
        let current_geometry = pose.current_geometry(position);

        let mut entries: Vec<(ResidueIdentity, GeometryHandle)> = Vec::new();
        if !directives.packable() {
            entries.push((current_identity.clone(), current_geometry));
        } else {
            if directives.designable() {
                for identity in directives.allowed_identities() {
                    for geometry in library.candidates(position, identity) {
                        entries.push((identity.clone(), geometry));
                    }
                }
            } else {
                for geometry in library.candidates(position, &current_identity) {
                    entries.push((current_identity.clone(), geometry));
                }
            }

            if directives.include_current()
                && !entries
                    .iter()
                    .any(|(id, g)| *g == current_geometry && *id == current_identity)
            {
                entries.push((current_identity.clone(), current_geometry));
            }

            if entries.is_empty() {
                return Err(EngineError::EmptyRotamerSet { position });
            }
        }

        let mut rotamers = Vec::with_capacity(entries.len());
        for (state, (identity, geometry)) in entries.into_iter().enumerate() {
            let mut rotamer = Rotamer {
                position,
                state,
                identity,
                geometry,
                one_body: 0.0,
            };
            rotamer.one_body = energy.one_body(&rotamer);
            rotamers.push(rotamer);
        }

        let current_state = rotamers
            .iter()
            .position(|r| r.geometry == current_geometry && r.identity == current_identity);

        trace!(
            position,
            states = rotamers.len(),
            packable = directives.packable(),
            "Rotamer set built"
        );

        Ok(Self {
            position,
            packable: directives.packable(),
            rotamers,
            current_state,
        })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn packable(&self) -> bool {
        self.packable
    }

    pub fn num_states(&self) -> usize {
        self.rotamers.len()
    }

    pub fn rotamer(&self, state: usize) -> &Rotamer {
        &self.rotamers[state]
    }

    pub fn rotamers(&self) -> &[Rotamer] {
        &self.rotamers
    }

    pub fn current_state(&self) -> Option<usize> {
        self.current_state
    }

    /// State with the lowest one-body energy; ties break toward the lower
    /// state id.
    pub fn lowest_one_body_state(&self) -> usize {
        self.rotamers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.one_body
                    .partial_cmp(&b.one_body)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(state, _)| state)
            .unwrap_or(0)
    }
}

/// One [`RotamerSet`] per position.
#[derive(Debug, Clone)]
pub struct RotamerSets {
    sets: Vec<RotamerSet>,
}

impl RotamerSets {
    pub fn build(
        pose: &dyn Pose,
        task: &PackerTask,
        library: &dyn RotamerLibrary,
        energy: &dyn EnergyFunction,
    ) -> Result<Self, EngineError> {
        if task.len() != pose.len() {
            return Err(EngineError::TaskMismatch {
                task_len: task.len(),
                pose_len: pose.len(),
            });
        }

        let sets = (0..pose.len())
            .map(|position| RotamerSet::build(position, pose, task, library, energy))
            .collect::<Result<Vec<_>, _>>()?;

        let total: usize = sets.iter().map(RotamerSet::num_states).sum();
        debug!(
            positions = sets.len(),
            total_states = total,
            "Rotamer sets built for all positions"
        );

        Ok(Self { sets })
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn position(&self, position: usize) -> &RotamerSet {
        &self.sets[position]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RotamerSet> {
        self.sets.iter()
    }

    /// Total number of (position, rotamer) pairs across the graph.
    pub fn total_states(&self) -> usize {
        self.sets.iter().map(RotamerSet::num_states).sum()
    }
}
