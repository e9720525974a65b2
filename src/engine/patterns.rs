//! Heuristic move annotation.
//!
//! Pattern tags are derived purely from square arithmetic on the move's origin
//! and destination. This is an annotation layer for explanations, not a
//! legality checker.

use crate::types::{square_coords, Move, MoveCategory};

/// A pattern tag with a flag marking the "strong" patterns that upgrade a
/// move's category in the 0.70 confidence band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternTag {
    pub label: &'static str,
    pub strong: bool,
}

/// Derive pattern tags from the move's geometry.
pub fn pattern_tags(mv: &Move) -> Vec<PatternTag> {
    let (from, to) = match (square_coords(&mv.from_square), square_coords(&mv.to_square)) {
        (Some(f), Some(t)) => (f, t),
        _ => return Vec::new(),
    };
    let (ff, fr) = from;
    let (tf, tr) = to;
    let df = tf - ff;
    let dr = tr - fr;

    let mut tags = Vec::new();

    if df == 0 && dr != 0 {
        tags.push(PatternTag { label: "vertical push", strong: false });
    } else if dr == 0 && df != 0 {
        tags.push(PatternTag { label: "lateral slide", strong: false });
    } else if df.abs() == dr.abs() && df != 0 {
        tags.push(PatternTag { label: "diagonal cut", strong: false });
    }

    if (df.abs() == 1 && dr.abs() == 2) || (df.abs() == 2 && dr.abs() == 1) {
        tags.push(PatternTag { label: "knight pattern", strong: false });
    }

    // d4/d5/e4/e5 destinations
    if (3..=4).contains(&tf) && (3..=4).contains(&tr) {
        tags.push(PatternTag { label: "center control", strong: true });
    }

    // King's two-file shift off the e-file reads as castling
    if ff == 4 && df.abs() == 2 && dr == 0 {
        tags.push(PatternTag { label: "castling shift", strong: true });
    }

    // Double step from a pawn's home rank
    if df == 0 && dr.abs() == 2 && (fr == 1 || fr == 6) {
        tags.push(PatternTag { label: "pawn sprint", strong: false });
    }

    if tr == 0 || tr == 7 {
        tags.push(PatternTag { label: "promotion threat", strong: true });
    }

    tags
}

/// Map a confidence (and the presence of a strong pattern) to a category.
pub fn categorize(confidence: f64, has_strong_pattern: bool) -> MoveCategory {
    if !confidence.is_finite() || confidence <= 0.0 {
        return MoveCategory::Uncertain;
    }
    if confidence >= 0.90 {
        MoveCategory::Excellent
    } else if confidence >= 0.70 {
        if has_strong_pattern {
            MoveCategory::Good
        } else {
            MoveCategory::Solid
        }
    } else if confidence >= 0.50 {
        MoveCategory::Fair
    } else if confidence >= 0.30 {
        MoveCategory::Risky
    } else {
        MoveCategory::Speculative
    }
}

fn confidence_band(confidence: f64) -> &'static str {
    if !confidence.is_finite() || confidence <= 0.0 {
        "unreliable"
    } else if confidence >= 0.90 {
        "very high"
    } else if confidence >= 0.70 {
        "high"
    } else if confidence >= 0.50 {
        "moderate"
    } else if confidence >= 0.30 {
        "low"
    } else {
        "minimal"
    }
}

/// Synthesize the explanation string from rank, confidence band and up to two
/// pattern tags.
pub fn explain(rank: usize, confidence: f64, tags: &[PatternTag]) -> String {
    let band = confidence_band(confidence);
    if tags.is_empty() {
        format!(
            "Rank {} candidate with {} confidence ({:.2}); no notable pattern",
            rank, band, confidence
        )
    } else {
        let labels: Vec<&str> = tags.iter().take(2).map(|t| t.label).collect();
        format!(
            "Rank {} candidate with {} confidence ({:.2}); patterns: {}",
            rank,
            band,
            confidence,
            labels.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Move;

    fn mv(notation: &str) -> Move {
        Move::from_notation(0, notation, 0.5)
    }

    fn labels(notation: &str) -> Vec<&'static str> {
        pattern_tags(&mv(notation)).iter().map(|t| t.label).collect()
    }

    #[test]
    fn test_pawn_double_step() {
        let tags = labels("e2e4");
        assert!(tags.contains(&"vertical push"));
        assert!(tags.contains(&"pawn sprint"));
        assert!(tags.contains(&"center control"));
    }

    #[test]
    fn test_knight_pattern() {
        assert!(labels("g1f3").contains(&"knight pattern"));
        assert!(labels("b8c6").contains(&"knight pattern"));
    }

    #[test]
    fn test_castling_shift() {
        assert!(labels("e1g1").contains(&"castling shift"));
        assert!(labels("e8c8").contains(&"castling shift"));
        // A rook's two-file slide from a1 is not castling
        assert!(!labels("a1c1").contains(&"castling shift"));
    }

    #[test]
    fn test_promotion_threat_on_back_rank() {
        assert!(labels("e7e8").contains(&"promotion threat"));
        assert!(labels("d2d1").contains(&"promotion threat"));
        assert!(!labels("e2e4").contains(&"promotion threat"));
    }

    #[test]
    fn test_diagonal_and_lateral() {
        assert!(labels("c1g5").contains(&"diagonal cut"));
        assert!(labels("a4h4").contains(&"lateral slide"));
    }

    #[test]
    fn test_malformed_squares_have_no_tags() {
        assert!(pattern_tags(&Move::from_notation(0, "??", 0.5)).is_empty());
    }

    #[test]
    fn test_categorize_thresholds() {
        assert_eq!(categorize(0.95, false), MoveCategory::Excellent);
        assert_eq!(categorize(0.75, true), MoveCategory::Good);
        assert_eq!(categorize(0.75, false), MoveCategory::Solid);
        assert_eq!(categorize(0.55, false), MoveCategory::Fair);
        assert_eq!(categorize(0.35, true), MoveCategory::Risky);
        assert_eq!(categorize(0.10, false), MoveCategory::Speculative);
        assert_eq!(categorize(0.0, false), MoveCategory::Uncertain);
        assert_eq!(categorize(f64::NAN, false), MoveCategory::Uncertain);
    }

    #[test]
    fn test_explain_limits_to_two_tags() {
        let tags = pattern_tags(&mv("e2e4"));
        assert!(tags.len() > 2);
        let text = explain(1, 0.8, &tags);
        // two labels joined by one comma after the "patterns:" prefix
        let after = text.split("patterns: ").nth(1).unwrap();
        assert_eq!(after.matches(", ").count(), 1);
    }
}
