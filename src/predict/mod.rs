//! Move predictor interface and score-vector helpers.
//!
//! The network's forward pass lives outside this crate; the engine consumes a
//! raw score vector plus a way to decode move indices into notation.

use anyhow::Result;
use async_trait::async_trait;

/// External collaborator that scores every move in its move space.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Score the full move space for a state tensor. One score per move index.
    async fn predict(&self, state_tensor: &[f32]) -> Result<Vec<f64>>;

    /// Decode a move index into coordinate notation, e.g. "e2e4".
    fn decode_move(&self, index: usize) -> String;
}

/// One entry of a top-K selection over a score vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopKMove {
    pub index: usize,
    pub score: f64,
}

/// Select the top `k` indices by score, descending.
///
/// Ties are broken by original index order so the selection is deterministic
/// for identical score vectors.
pub fn top_k_moves(scores: &[f64], k: usize) -> Vec<TopKMove> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order
        .into_iter()
        .take(k)
        .map(|index| TopKMove {
            index,
            score: scores[index],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_orders_by_score() {
        let scores = [0.1, 0.9, 0.5, 0.7];
        let top = top_k_moves(&scores, 3);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].index, 1);
        assert_eq!(top[1].index, 3);
        assert_eq!(top[2].index, 2);
    }

    #[test]
    fn test_top_k_ties_break_by_index() {
        let scores = [0.5, 0.5, 0.5];
        let top = top_k_moves(&scores, 2);
        assert_eq!(top[0].index, 0);
        assert_eq!(top[1].index, 1);
    }

    #[test]
    fn test_top_k_larger_than_space() {
        let scores = [0.2, 0.4];
        let top = top_k_moves(&scores, 10);
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn test_top_k_empty() {
        assert!(top_k_moves(&[], 5).is_empty());
    }
}
