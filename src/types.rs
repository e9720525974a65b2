//! Core data types shared across the agent: board states, candidate moves,
//! ranked moves and finished decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A captured board state, ready for inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardState {
    /// Flattened feature tensor of the position
    pub tensor: Vec<f32>,
    /// When the state was captured
    pub timestamp: DateTime<Utc>,
    /// Whether the board changed since the previous capture
    pub changed: bool,
    /// Magnitude of the change relative to the previous capture
    pub diff_score: f64,
}

impl BoardState {
    pub fn new(tensor: Vec<f32>) -> Self {
        Self {
            tensor,
            timestamp: Utc::now(),
            changed: true,
            diff_score: 0.0,
        }
    }
}

/// A single candidate move as produced by the predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// Index into the predictor's move space
    pub index: usize,
    /// Coordinate notation, e.g. "e2e4"
    pub notation: String,
    /// Origin square in algebraic form, e.g. "e2"
    pub from_square: String,
    /// Destination square in algebraic form, e.g. "e4"
    pub to_square: String,
    /// Predictor confidence in [0, 1]
    pub confidence: f64,
}

impl Move {
    /// Build a move from an index, its coordinate notation and a confidence.
    ///
    /// The from/to squares are sliced out of the notation; malformed notations
    /// yield empty squares and simply produce no pattern annotations later.
    pub fn from_notation(index: usize, notation: &str, confidence: f64) -> Self {
        let (from_square, to_square) = if notation.len() >= 4 && notation.is_ascii() {
            (notation[0..2].to_string(), notation[2..4].to_string())
        } else {
            (String::new(), String::new())
        };
        Self {
            index,
            notation: notation.to_string(),
            from_square,
            to_square,
            confidence,
        }
    }

    /// Two moves denote the same action when origin and destination agree.
    pub fn same_squares(&self, other: &Move) -> bool {
        self.from_square == other.from_square && self.to_square == other.to_square
    }
}

/// Parse an algebraic square ("e4") into zero-based (file, rank) coordinates.
pub fn square_coords(square: &str) -> Option<(i32, i32)> {
    let mut chars = square.chars();
    let file = chars.next()?;
    let rank = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    if !('a'..='h').contains(&file) || !('1'..='8').contains(&rank) {
        return None;
    }
    Some((file as i32 - 'a' as i32, rank as i32 - '1' as i32))
}

/// Coarse quality label attached to a ranked move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveCategory {
    Excellent,
    Good,
    Solid,
    Fair,
    Risky,
    Speculative,
    Uncertain,
}

impl std::fmt::Display for MoveCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveCategory::Excellent => write!(f, "excellent"),
            MoveCategory::Good => write!(f, "good"),
            MoveCategory::Solid => write!(f, "solid"),
            MoveCategory::Fair => write!(f, "fair"),
            MoveCategory::Risky => write!(f, "risky"),
            MoveCategory::Speculative => write!(f, "speculative"),
            MoveCategory::Uncertain => write!(f, "uncertain"),
        }
    }
}

/// A move with its rank, category and a human-readable explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMove {
    pub mv: Move,
    /// 1-based position in the ranking
    pub rank: usize,
    pub explanation: String,
    pub category: MoveCategory,
}

/// A finished decision. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub top_move: RankedMove,
    /// Remaining candidates, rank-ascending
    pub alternatives: Vec<RankedMove>,
    pub timestamp: DateTime<Utc>,
    /// Predictor latency for this decision
    pub inference_ms: u64,
    /// The state the decision was made on
    pub state: BoardState,
    /// Size of the raw score vector the ranking drew from
    pub total_candidates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_from_notation() {
        let mv = Move::from_notation(3, "e2e4", 0.8);
        assert_eq!(mv.from_square, "e2");
        assert_eq!(mv.to_square, "e4");
        assert_eq!(mv.index, 3);
    }

    #[test]
    fn test_move_from_malformed_notation() {
        let mv = Move::from_notation(0, "??", 0.5);
        assert!(mv.from_square.is_empty());
        assert!(mv.to_square.is_empty());
    }

    #[test]
    fn test_same_squares() {
        let a = Move::from_notation(1, "g1f3", 0.9);
        let b = Move::from_notation(7, "g1f3", 0.2);
        assert!(a.same_squares(&b));
        let c = Move::from_notation(1, "g1h3", 0.9);
        assert!(!a.same_squares(&c));
    }

    #[test]
    fn test_square_coords() {
        assert_eq!(square_coords("a1"), Some((0, 0)));
        assert_eq!(square_coords("h8"), Some((7, 7)));
        assert_eq!(square_coords("e4"), Some((4, 3)));
        assert_eq!(square_coords("i9"), None);
        assert_eq!(square_coords("e"), None);
        assert_eq!(square_coords("e44"), None);
    }
}
