use serde::{Deserialize, Serialize};

/// One chosen rotamer state per position.
///
/// Slots are `Option<usize>` so that "unassigned" can exist while the graph
/// is being seeded; a finished optimization always produces a complete
/// assignment. Fixed positions carry their sole fixed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    states: Vec<Option<usize>>,
}

impl Assignment {
    pub fn new(num_positions: usize) -> Self {
        Self {
            states: vec![None; num_positions],
        }
    }

    pub fn from_states(states: Vec<usize>) -> Self {
        Self {
            states: states.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, position: usize) -> Option<usize> {
        self.states[position]
    }

    pub fn set(&mut self, position: usize, state: usize) {
        self.states[position] = Some(state);
    }

    pub fn is_complete(&self) -> bool {
        self.states.iter().all(Option::is_some)
    }

    /// The assignment as a dense state vector, if every position is assigned.
    pub fn as_complete(&self) -> Option<Vec<usize>> {
        self.states.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<usize>)> + '_ {
        self.states.iter().copied().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assignment_is_incomplete() {
        let a = Assignment::new(3);
        assert_eq!(a.len(), 3);
        assert!(!a.is_complete());
        assert_eq!(a.as_complete(), None);
    }

    #[test]
    fn filling_every_slot_completes_the_assignment() {
        let mut a = Assignment::new(2);
        a.set(0, 4);
        assert!(!a.is_complete());
        a.set(1, 0);
        assert!(a.is_complete());
        assert_eq!(a.as_complete(), Some(vec![4, 0]));
        assert_eq!(a.state(0), Some(4));
    }

    #[test]
    fn from_states_is_complete() {
        let a = Assignment::from_states(vec![1, 2, 3]);
        assert!(a.is_complete());
        assert_eq!(a.state(2), Some(3));
    }
}
