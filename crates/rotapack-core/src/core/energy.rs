use crate::core::rotamers::rotamer::Rotamer;

/// Black-box pairwise-decomposable energy model.
///
/// The packer calls this many millions of times per run; implementations must
/// be side-effect-free with respect to shared state other than their own
/// internal caches. Values are cached by the interaction graph keyed on
/// `(edge, state, state)`, so a deterministic function sees each tuple
/// computed at most once per stored cell.
pub trait EnergyFunction: Sync {
    /// Intrinsic ("one-body") energy of a rotamer at its position.
    fn one_body(&self, rotamer: &Rotamer) -> f64;

    /// Interaction energy between rotamers at two distinct positions.
    fn two_body(&self, a: &Rotamer, b: &Rotamer) -> f64;

    /// Distance cutoff beyond which positions never interact.
    fn interaction_cutoff(&self) -> f64;

    /// Edge-existence predicate: whether two positions are close enough for
    /// any of their rotamers to interact.
    fn positions_interact(&self, a: usize, b: usize) -> bool;
}

/// Outcome of a proposed substitution's energy change.
///
/// NaN or overflow anywhere in the sum poisons the whole delta: the move is
/// `Invalid`, treated as infinitely unfavorable by the acceptance rule, and
/// never silently treated as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeltaEnergy {
    Finite(f64),
    Invalid,
}

impl DeltaEnergy {
    pub fn from_raw(value: f64) -> Self {
        if value.is_finite() {
            DeltaEnergy::Finite(value)
        } else {
            DeltaEnergy::Invalid
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, DeltaEnergy::Invalid)
    }

    pub fn finite(&self) -> Option<f64> {
        match self {
            DeltaEnergy::Finite(v) => Some(*v),
            DeltaEnergy::Invalid => None,
        }
    }
}
