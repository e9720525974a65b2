//! Bounded in-memory replay buffer.
//!
//! A FIFO ring of observation entries with lifetime accuracy counters that
//! survive eviction, plus three deterministic sampling strategies.

use serde::Serialize;
use tracing::debug;

use super::{unset_timestamp, ReplayEntry};

/// Derived statistics, recomputed on demand.
///
/// `accuracy` uses the lifetime counters; the remaining rates are computed
/// over the currently resident entries only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayStats {
    pub total_entries: usize,
    pub accuracy: f64,
    /// Accuracy over the last min(100, len) resident entries
    pub recent_accuracy: f64,
    pub average_reward: f64,
    pub top_k_accuracy: f64,
    /// len / capacity
    pub buffer_utilization: f64,
}

/// Bounded FIFO buffer of replay entries.
pub struct ReplayBuffer {
    entries: Vec<ReplayEntry>,
    max_size: usize,
    // Lifetime counters; not reset by eviction or clear()
    total_added: u64,
    total_predictions: u64,
    correct_predictions: u64,
}

impl ReplayBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max_size),
            max_size: max_size.max(1),
            total_added: 0,
            total_predictions: 0,
            correct_predictions: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Resident entries, oldest first.
    pub fn entries(&self) -> &[ReplayEntry] {
        &self.entries
    }

    /// Insert an entry, recomputing reward/correctness from its moves and
    /// stamping the timestamp if unset. Oldest entry is evicted when full.
    pub fn add(&mut self, mut entry: ReplayEntry) {
        let correct = entry.predicted_move.same_squares(&entry.actual_move);
        entry.reward = if correct { 1.0 } else { -1.0 };
        entry.is_correct = correct;
        if entry.timestamp == unset_timestamp() {
            entry.timestamp = chrono::Utc::now();
        }

        self.total_added += 1;
        self.total_predictions += 1;
        if correct {
            self.correct_predictions += 1;
        }

        if self.entries.len() < self.max_size {
            self.entries.push(entry);
        } else {
            // Shift left, overwrite the last slot: strict FIFO eviction
            self.entries.remove(0);
            self.entries.push(entry);
        }
        debug!(
            "Replay add: resident {}/{}, lifetime {}",
            self.entries.len(),
            self.max_size,
            self.total_added
        );
    }

    /// Statistics snapshot. Zero struct on an empty buffer.
    pub fn stats(&self) -> ReplayStats {
        if self.entries.is_empty() {
            return ReplayStats::default();
        }

        let accuracy = if self.total_predictions > 0 {
            self.correct_predictions as f64 / self.total_predictions as f64
        } else {
            0.0
        };

        let recent_n = self.entries.len().min(100);
        let recent = &self.entries[self.entries.len() - recent_n..];
        let recent_correct = recent.iter().filter(|e| e.is_correct).count();

        let reward_sum: f64 = self.entries.iter().map(|e| e.reward).sum();
        let in_top_k = self.entries.iter().filter(|e| e.was_in_top_k).count();

        ReplayStats {
            total_entries: self.entries.len(),
            accuracy,
            recent_accuracy: recent_correct as f64 / recent_n as f64,
            average_reward: reward_sum / self.entries.len() as f64,
            top_k_accuracy: in_top_k as f64 / self.entries.len() as f64,
            buffer_utilization: self.entries.len() as f64 / self.max_size as f64,
        }
    }

    /// Lifetime insertion count (survives eviction and clear).
    pub fn total_added(&self) -> u64 {
        self.total_added
    }

    /// Deterministic selection that over-represents positive-reward entries.
    ///
    /// Builds a pool where every entry appears once and rewarded entries a
    /// second time, then strides through it. Not a random draw.
    pub fn reward_weighted_sample(&self, n: usize) -> Vec<ReplayEntry> {
        if n == 0 || self.entries.is_empty() {
            return Vec::new();
        }
        let mut pool: Vec<&ReplayEntry> = self.entries.iter().collect();
        pool.extend(self.entries.iter().filter(|e| e.reward > 0.0));
        stride_select(&pool, n)
    }

    /// Deterministic selection drawing n/2 each from the correct and
    /// incorrect pools.
    pub fn balanced_sample(&self, n: usize) -> Vec<ReplayEntry> {
        if n == 0 || self.entries.is_empty() {
            return Vec::new();
        }
        let correct: Vec<&ReplayEntry> = self.entries.iter().filter(|e| e.is_correct).collect();
        let incorrect: Vec<&ReplayEntry> = self.entries.iter().filter(|e| !e.is_correct).collect();
        let half = n / 2;
        let mut sample = stride_select(&correct, half);
        sample.extend(stride_select(&incorrect, half));
        sample
    }

    /// The `n` most recent resident entries, oldest first.
    pub fn recent_sample(&self, n: usize) -> Vec<ReplayEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries[skip..].to_vec()
    }

    /// Drop the resident entries. Lifetime counters are untouched so the
    /// long-run accuracy denominator survives.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Stride through `pool` at interval `pool.len() / count`, collecting up to
/// `count` elements.
fn stride_select(pool: &[&ReplayEntry], count: usize) -> Vec<ReplayEntry> {
    if count == 0 || pool.is_empty() {
        return Vec::new();
    }
    let step = (pool.len() / count).max(1);
    (0..count)
        .map(|i| i * step)
        .take_while(|&idx| idx < pool.len())
        .map(|idx| pool[idx].clone())
        .collect()
}
