//! Bounded decision history.
//!
//! Independent of the replay subsystem: this ring keeps full [`Decision`]
//! records for reporting, behind its own lock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::types::Decision;

/// Aggregate view over the resident history.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HistoryStats {
    pub decisions: usize,
    pub avg_confidence: f64,
    pub avg_inference_ms: f64,
    /// Category label -> count
    pub categories: HashMap<String, u64>,
}

/// Bounded ring of recent decisions.
#[derive(Clone)]
pub struct DecisionHistory {
    entries: Arc<RwLock<VecDeque<Decision>>>,
    capacity: usize,
}

impl DecisionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Record a decision, evicting the oldest when full.
    pub async fn record(&self, decision: Decision) {
        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(decision);
    }

    /// The `n` most recent decisions, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<Decision> {
        let entries = self.entries.read().await;
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Aggregate stats over all resident decisions. Zero struct when empty.
    pub async fn stats(&self) -> HistoryStats {
        let entries = self.entries.read().await;
        if entries.is_empty() {
            return HistoryStats::default();
        }

        let n = entries.len() as f64;
        let mut confidence_sum = 0.0;
        let mut latency_sum = 0.0;
        let mut categories: HashMap<String, u64> = HashMap::new();
        for decision in entries.iter() {
            confidence_sum += decision.top_move.mv.confidence;
            latency_sum += decision.inference_ms as f64;
            *categories
                .entry(decision.top_move.category.to_string())
                .or_default() += 1;
        }

        HistoryStats {
            decisions: entries.len(),
            avg_confidence: confidence_sum / n,
            avg_inference_ms: latency_sum / n,
            categories,
        }
    }
}
