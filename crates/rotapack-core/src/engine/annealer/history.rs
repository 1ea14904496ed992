use serde::{Deserialize, Serialize};

/// One proposed substitution as the annealer saw it. Recorded only when the
/// task asks for a move history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub cycle: usize,
    pub position: usize,
    pub state: usize,
    /// The considered energy change; NaN when the move was invalid.
    pub delta: f64,
    pub accepted: bool,
    /// Temperature in effect; 0.0 for quench moves.
    pub temperature: f64,
    pub total_after: f64,
    pub best_after: f64,
}

#[derive(Debug, Default)]
pub(crate) struct HistoryRecorder {
    records: Option<Vec<MoveRecord>>,
}

impl HistoryRecorder {
    pub fn new(enabled: bool) -> Self {
        Self {
            records: enabled.then(Vec::new),
        }
    }

    pub fn record(&mut self, record: MoveRecord) {
        if let Some(records) = &mut self.records {
            records.push(record);
        }
    }

    pub fn into_records(self) -> Option<Vec<MoveRecord>> {
        self.records
    }
}
