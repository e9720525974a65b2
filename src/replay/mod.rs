//! Replay subsystem: one recorded (predicted, actual) observation per entry,
//! kept in a bounded in-memory buffer and optionally in a durable SQLite log.

pub mod buffer;
pub mod storage;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Move;

pub use buffer::{ReplayBuffer, ReplayStats};
pub use storage::ReplayStorage;

/// One recorded observation with its derived reward and correctness.
///
/// Created exactly once per observation and never mutated afterwards. The
/// serialized field set is shared verbatim between the SQLite log and JSONL
/// exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayEntry {
    pub state_tensor: Vec<f32>,
    pub predicted_move: Move,
    pub actual_move: Move,
    /// +1.0 when predicted and actual share origin and destination, else -1.0
    pub reward: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    /// Ordinal of the observation within the run
    #[serde(default)]
    pub position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub is_correct: bool,
    pub was_in_top_k: bool,
    /// 1-based rank of the actual move in the candidate list, 0 when absent
    #[serde(default)]
    pub top_k_rank: usize,
}

impl ReplayEntry {
    /// Build an entry with reward and correctness derived from the two moves.
    ///
    /// The timestamp is left unset (epoch); [`ReplayBuffer::add`] stamps it.
    pub fn new(state_tensor: Vec<f32>, predicted_move: Move, actual_move: Move) -> Self {
        let correct = predicted_move.same_squares(&actual_move);
        Self {
            state_tensor,
            predicted_move,
            actual_move,
            reward: if correct { 1.0 } else { -1.0 },
            timestamp: unset_timestamp(),
            game_id: None,
            position: 0,
            confidence: None,
            is_correct: correct,
            was_in_top_k: false,
            top_k_rank: 0,
        }
    }
}

/// Sentinel for "not yet stamped".
pub(crate) fn unset_timestamp() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).unwrap()
}
