//! Deterministic simulation collaborators.
//!
//! Stand-ins for the capture, inference and training integrations: seeded,
//! dependency-free, and stable across runs so tests and demo sessions can
//! assert on exact behavior.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::capture::Capturer;
use crate::improver::{TrainOutcome, Trainer};
use crate::predict::Predictor;
use crate::replay::ReplayEntry;
use crate::types::BoardState;

/// Fixed move space shared by the sim predictor and its decoder.
const MOVE_TABLE: [&str; 16] = [
    "e2e4", "d2d4", "g1f3", "c2c4", "b1c3", "e2e3", "g2g3", "f1c4",
    "e1g1", "d1h5", "a2a4", "h2h4", "b2b3", "f2f4", "d2d3", "c1f4",
];

/// Board-state source that replays a seeded pseudo-random position stream.
pub struct SimCapturer {
    seed: u64,
    calls: AtomicU64,
    /// Captures left to fail before the stream starts succeeding
    failures: AtomicU64,
}

impl SimCapturer {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Fail the first `n` capture calls, then succeed.
    pub fn with_failures(self, n: u64) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl Capturer for SimCapturer {
    async fn extract_board_state(&self) -> Result<BoardState> {
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(anyhow!("simulated capture failure"));
        }

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(call));
        let tensor: Vec<f32> = (0..64).map(|_| rng.random_range(0.0..1.0)).collect();

        let mut state = BoardState::new(tensor);
        state.diff_score = rng.random_range(0.0..1.0);
        Ok(state)
    }
}

/// Scorer that derives a stable score vector from the seed and the tensor.
///
/// Same tensor, same scores. All scores land in (0, 1) so every ranked move
/// carries a usable confidence.
pub struct SimPredictor {
    seed: u64,
}

impl SimPredictor {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn tensor_fingerprint(tensor: &[f32]) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for v in tensor {
            hash ^= v.to_bits() as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }
}

#[async_trait]
impl Predictor for SimPredictor {
    async fn predict(&self, state_tensor: &[f32]) -> Result<Vec<f64>> {
        let fingerprint = Self::tensor_fingerprint(state_tensor);
        let mut rng = StdRng::seed_from_u64(self.seed ^ fingerprint);
        let scores = (0..MOVE_TABLE.len())
            .map(|_| rng.random_range(0.01..0.99))
            .collect();
        Ok(scores)
    }

    fn decode_move(&self, index: usize) -> String {
        MOVE_TABLE[index % MOVE_TABLE.len()].to_string()
    }
}

/// Trainer stand-in: deterministic loss from the batch, no model behind it.
pub struct SimTrainer {
    cycles: u64,
    fail: bool,
}

impl SimTrainer {
    pub fn new() -> Self {
        Self {
            cycles: 0,
            fail: false,
        }
    }

    /// Make every training call fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Default for SimTrainer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Trainer for SimTrainer {
    async fn train_on_batch(
        &mut self,
        batch: &[ReplayEntry],
        learning_rate: f64,
    ) -> Result<TrainOutcome> {
        if self.fail {
            return Err(anyhow!("simulated training failure"));
        }
        self.cycles += 1;

        let correct = batch.iter().filter(|e| e.is_correct).count();
        let accuracy = correct as f64 / batch.len() as f64;
        // loss shrinks with batch accuracy and with accumulated updates
        let loss = (1.0 - accuracy) / (1.0 + self.cycles as f64 * learning_rate * 100.0);
        Ok(TrainOutcome { loss, correct })
    }
}
