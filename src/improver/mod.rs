//! Self-improvement orchestrator.
//!
//! Every observation updates the replay buffer (and optionally the durable
//! log), then a two-gate predicate decides whether to run one synchronous
//! training cycle inline: enough buffered samples AND enough time since the
//! last successful cycle.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ImproverConfig;
use crate::error::AgentError;
use crate::replay::{buffer::ReplayBuffer, storage::ReplayStorage, ReplayEntry};
use crate::types::{BoardState, Move, RankedMove};

/// Result of one external training call.
#[derive(Debug, Clone, Copy)]
pub struct TrainOutcome {
    pub loss: f64,
    /// Entries of the batch the (re)trained predictor now gets right
    pub correct: usize,
}

/// External collaborator that updates the predictor from a replay batch.
///
/// Not assumed safe for concurrent mutation; the improver only ever calls it
/// from within a single `observe_prediction` call chain.
#[async_trait]
pub trait Trainer: Send + Sync {
    async fn train_on_batch(
        &mut self,
        batch: &[ReplayEntry],
        learning_rate: f64,
    ) -> Result<TrainOutcome>;
}

/// Orchestrator state. `Training` only ever holds for the duration of the
/// inline cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImproverState {
    Idle,
    Training,
}

/// Cumulative self-improvement statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImproverStats {
    pub total_cycles: u64,
    pub total_samples: u64,
    /// Set once, at the first non-empty evaluation
    pub baseline_accuracy: Option<f64>,
    pub current_accuracy: f64,
    pub best_accuracy: f64,
    /// current - baseline
    pub improvement_delta: f64,
    /// One point per completed cycle
    pub accuracy_history: Vec<f64>,
    /// Buffer average reward per completed cycle
    pub reward_history: Vec<f64>,
    /// Running mean over completed cycles
    pub avg_train_duration_ms: f64,
}

/// Derived improvement report. Total function: zero struct when there is no
/// history yet.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImprovementReport {
    pub relative_improvement: f64,
    pub absolute_improvement: f64,
    /// Difference of the last two accuracy history points
    pub recent_trend: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub is_improving: bool,
}

/// The observe → remember → retrain loop.
///
/// Exclusively owns its replay buffer and storage; callers serialize access
/// by holding the `&mut self` methods.
pub struct SelfImprover {
    config: ImproverConfig,
    buffer: ReplayBuffer,
    storage: Option<ReplayStorage>,
    trainer: Option<Box<dyn Trainer>>,
    stats: ImproverStats,
    state: ImproverState,
    /// None until the first successful cycle: the time gate starts open
    last_train: Option<Instant>,
    /// Attached to every recorded entry, usually one UUID per session
    game_id: Option<String>,
}

impl SelfImprover {
    /// Build the improver. Storage is opened when `auto_save` is on; a
    /// storage that fails to open degrades to buffer-only operation.
    pub async fn new(config: ImproverConfig, trainer: Box<dyn Trainer>) -> Result<Self> {
        let storage = if config.auto_save {
            match ReplayStorage::open(&config.db_path, &config.jsonl_dir).await {
                Ok(storage) => Some(storage),
                Err(e) => {
                    warn!("Replay storage unavailable, continuing in-memory only: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            buffer: ReplayBuffer::new(config.buffer_size),
            storage,
            trainer: Some(trainer),
            stats: ImproverStats::default(),
            state: ImproverState::Idle,
            last_train: None,
            game_id: None,
            config,
        })
    }

    /// Record one (predicted, actual) observation, then train if both gates
    /// hold. Returns whether a training cycle ran.
    pub async fn observe_prediction(
        &mut self,
        state: &BoardState,
        predicted: Move,
        actual: Move,
        top_k: &[RankedMove],
        confidence: Option<f64>,
    ) -> Result<bool, AgentError> {
        let mut entry = ReplayEntry::new(state.tensor.clone(), predicted, actual);
        if let Some(hit) = top_k.iter().find(|rm| rm.mv.index == entry.actual_move.index) {
            entry.was_in_top_k = true;
            entry.top_k_rank = hit.rank;
        }
        entry.confidence = confidence;
        entry.position = self.stats.total_samples as u32;
        entry.game_id = self.game_id.clone();

        self.buffer.add(entry.clone());
        self.stats.total_samples += 1;

        // First non-empty evaluation pins the baseline
        if self.stats.baseline_accuracy.is_none() {
            let accuracy = self.buffer.stats().accuracy;
            self.stats.baseline_accuracy = Some(accuracy);
            self.stats.best_accuracy = accuracy;
        }

        // Persistence failures never block the buffer insertion
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.store(&entry).await {
                warn!("Failed to persist replay entry: {}", e);
            }
        }

        self.check_and_train().await
    }

    /// Evaluate both gates; train when they hold. Returns whether a cycle ran.
    pub async fn check_and_train(&mut self) -> Result<bool, AgentError> {
        if self.buffer.len() < self.config.min_samples_for_train {
            return Ok(false);
        }
        if let Some(last) = self.last_train {
            if last.elapsed().as_secs() < self.config.train_interval_secs {
                return Ok(false);
            }
        }
        self.train().await?;
        Ok(true)
    }

    /// Run one training cycle: batch selection, external training call,
    /// statistics update. A failed cycle leaves `last_train` untouched so the
    /// next observation may retry immediately.
    ///
    /// Post-cycle accuracy is evaluated over the most recent `eval_batch_size`
    /// resident entries, not the buffer's fixed 100-entry recent window.
    pub async fn train(&mut self) -> Result<(), AgentError> {
        let batch = self.select_batch();
        if batch.is_empty() {
            return Err(AgentError::EmptyBatch);
        }

        self.state = ImproverState::Training;
        let started = Instant::now();

        let result = match self.trainer.as_mut() {
            Some(trainer) => trainer.train_on_batch(&batch, self.config.learning_rate).await,
            None => Err(anyhow::anyhow!("trainer handle released")),
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                // every failed cycle ends back in Idle
                self.state = ImproverState::Idle;
                return Err(AgentError::TrainingFailed(e.to_string()));
            }
        };

        let duration_ms = started.elapsed().as_millis() as f64;
        let buffer_stats = self.buffer.stats();
        let old_accuracy = self.stats.current_accuracy;
        // evaluate over the most recent eval window, not the whole buffer
        let eval = self.buffer.recent_sample(self.config.eval_batch_size.max(1));
        let new_accuracy =
            eval.iter().filter(|e| e.is_correct).count() as f64 / eval.len() as f64;

        let baseline = *self
            .stats
            .baseline_accuracy
            .get_or_insert(new_accuracy);
        self.stats.current_accuracy = new_accuracy;
        self.stats.improvement_delta = new_accuracy - baseline;
        self.stats.best_accuracy = self.stats.best_accuracy.max(new_accuracy).max(baseline);
        self.stats.accuracy_history.push(new_accuracy);
        self.stats.reward_history.push(buffer_stats.average_reward);

        let n = self.stats.total_cycles as f64;
        self.stats.avg_train_duration_ms =
            (self.stats.avg_train_duration_ms * n + duration_ms) / (n + 1.0);
        self.stats.total_cycles += 1;
        self.last_train = Some(Instant::now());
        self.state = ImproverState::Idle;

        info!(
            "Training cycle {}: batch {}, loss {:.4}, correct {}/{}, accuracy {:.3} -> {:.3}",
            self.stats.total_cycles,
            batch.len(),
            outcome.loss,
            outcome.correct,
            batch.len(),
            old_accuracy,
            new_accuracy
        );
        Ok(())
    }

    /// Batch selection priority: reward-weighted, balanced, most-recent-N.
    fn select_batch(&self) -> Vec<ReplayEntry> {
        let n = self.config.batch_size;
        if self.config.use_reward_weighting {
            self.buffer.reward_weighted_sample(n)
        } else if self.config.use_balanced_sample {
            self.buffer.balanced_sample(n)
        } else {
            self.buffer.recent_sample(n)
        }
    }

    /// Derived improvement trend report.
    pub fn calculate_improvement(&self) -> ImprovementReport {
        let history = &self.stats.accuracy_history;
        if history.is_empty() {
            return ImprovementReport::default();
        }

        let baseline = self.stats.baseline_accuracy.unwrap_or(0.0);
        let current = self.stats.current_accuracy;
        let absolute = current - baseline;
        let relative = if baseline.abs() > f64::EPSILON {
            absolute / baseline
        } else {
            0.0
        };

        let recent_trend = if history.len() >= 2 {
            history[history.len() - 1] - history[history.len() - 2]
        } else {
            0.0
        };

        let mean = history.iter().sum::<f64>() / history.len() as f64;
        let variance =
            history.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / history.len() as f64;

        ImprovementReport {
            relative_improvement: relative,
            absolute_improvement: absolute,
            recent_trend,
            variance,
            std_dev: variance.sqrt(),
            is_improving: recent_trend > 0.0,
        }
    }

    /// Serialize the run's statistics into the metadata store under `name`.
    pub async fn export_metrics(&self, name: &str) -> Result<()> {
        let storage = match &self.storage {
            Some(storage) => storage,
            None => {
                warn!("No replay storage configured; metrics export skipped");
                return Ok(());
            }
        };

        let cycles: Vec<serde_json::Value> = self
            .stats
            .accuracy_history
            .iter()
            .zip(self.stats.reward_history.iter())
            .enumerate()
            .map(|(cycle, (accuracy, reward))| {
                serde_json::json!({ "cycle": cycle, "accuracy": accuracy, "reward": reward })
            })
            .collect();

        let payload = serde_json::json!({
            "stats": self.stats,
            "buffer": self.buffer.stats(),
            "config": self.config,
            "timestamp": Utc::now().to_rfc3339(),
            "cycles": cycles,
        });
        storage.set_metadata(name, &payload.to_string()).await?;
        debug!("Exported metrics under metadata key '{}'", name);
        Ok(())
    }

    /// Export final statistics, then release the trainer and storage handles.
    pub async fn close(&mut self) -> Result<()> {
        if self.storage.is_some() {
            if let Err(e) = self.export_metrics("final_run_stats").await {
                warn!("Final metrics export failed: {}", e);
            }
        }
        self.trainer = None;
        self.storage = None;
        info!(
            "Self-improver closed after {} cycles, {} samples",
            self.stats.total_cycles, self.stats.total_samples
        );
        Ok(())
    }

    /// Tag subsequent observations with a game identifier.
    pub fn set_game_id(&mut self, game_id: Option<String>) {
        self.game_id = game_id;
    }

    pub fn stats(&self) -> &ImproverStats {
        &self.stats
    }

    pub fn state(&self) -> ImproverState {
        self.state
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn storage(&self) -> Option<&ReplayStorage> {
        self.storage.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTrainer;
    use crate::types::Move;

    fn config(min_samples: usize, interval_secs: u64) -> ImproverConfig {
        ImproverConfig {
            buffer_size: 200,
            min_samples_for_train: min_samples,
            batch_size: 8,
            train_interval_secs: interval_secs,
            auto_save: false,
            ..Default::default()
        }
    }

    async fn observe(improver: &mut SelfImprover, correct: bool) -> bool {
        let state = BoardState::new(vec![0.1; 4]);
        let predicted = Move::from_notation(0, "e2e4", 0.8);
        let actual = if correct {
            Move::from_notation(0, "e2e4", 1.0)
        } else {
            Move::from_notation(1, "d2d4", 1.0)
        };
        improver
            .observe_prediction(&state, predicted, actual, &[], Some(0.8))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_count_gate_scenario() {
        // 49 observations: no cycle; the 50th triggers exactly one
        let mut improver = SelfImprover::new(config(50, 300), Box::new(SimTrainer::new()))
            .await
            .unwrap();
        for _ in 0..49 {
            assert!(!observe(&mut improver, true).await);
        }
        assert_eq!(improver.stats().total_cycles, 0);
        assert!(observe(&mut improver, true).await);
        assert_eq!(improver.stats().total_cycles, 1);
    }

    #[tokio::test]
    async fn test_time_gate_blocks_second_cycle() {
        let mut improver = SelfImprover::new(config(2, 3600), Box::new(SimTrainer::new()))
            .await
            .unwrap();
        observe(&mut improver, true).await;
        assert!(observe(&mut improver, true).await);
        // buffer stays above the count gate, but the interval has not elapsed
        for _ in 0..10 {
            assert!(!observe(&mut improver, true).await);
        }
        assert_eq!(improver.stats().total_cycles, 1);
    }

    #[tokio::test]
    async fn test_zero_interval_retrains_each_gate_crossing() {
        let mut improver = SelfImprover::new(config(2, 0), Box::new(SimTrainer::new()))
            .await
            .unwrap();
        for _ in 0..5 {
            observe(&mut improver, true).await;
        }
        assert_eq!(improver.stats().total_cycles, 4);
    }

    #[tokio::test]
    async fn test_training_failure_leaves_state_intact() {
        let mut improver =
            SelfImprover::new(config(2, 3600), Box::new(SimTrainer::new().failing()))
                .await
                .unwrap();
        observe(&mut improver, true).await;
        let state = BoardState::new(vec![0.1; 4]);
        let err = improver
            .observe_prediction(
                &state,
                Move::from_notation(0, "e2e4", 0.8),
                Move::from_notation(0, "e2e4", 1.0),
                &[],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::TrainingFailed(_)));
        // buffer kept both observations, no cycle recorded, still idle
        assert_eq!(improver.buffer().len(), 2);
        assert_eq!(improver.stats().total_cycles, 0);
        assert_eq!(improver.state(), ImproverState::Idle);
        assert!(improver.last_train.is_none());
    }

    #[tokio::test]
    async fn test_empty_batch_is_an_error() {
        let mut improver = SelfImprover::new(config(2, 0), Box::new(SimTrainer::new()))
            .await
            .unwrap();
        let err = improver.train().await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyBatch));
        assert_eq!(improver.stats().total_cycles, 0);
    }

    #[tokio::test]
    async fn test_accuracy_evaluated_over_eval_window() {
        let mut cfg = config(6, 3600);
        cfg.eval_batch_size = 4;
        let mut improver = SelfImprover::new(cfg, Box::new(SimTrainer::new()))
            .await
            .unwrap();
        for _ in 0..2 {
            observe(&mut improver, false).await;
        }
        for _ in 0..3 {
            observe(&mut improver, true).await;
        }
        // the 6th observation crosses the gate; the eval window holds only
        // the four most recent (all correct) entries
        assert!(observe(&mut improver, true).await);
        assert_eq!(improver.stats().current_accuracy, 1.0);
    }

    #[tokio::test]
    async fn test_top_k_scan_sets_rank() {
        let mut improver = SelfImprover::new(config(100, 300), Box::new(SimTrainer::new()))
            .await
            .unwrap();
        let state = BoardState::new(vec![0.1; 4]);
        let actual = Move::from_notation(7, "g1f3", 1.0);
        let top_k = vec![
            RankedMove {
                mv: Move::from_notation(3, "e2e4", 0.9),
                rank: 1,
                explanation: String::new(),
                category: crate::types::MoveCategory::Excellent,
            },
            RankedMove {
                mv: Move::from_notation(7, "g1f3", 0.6),
                rank: 2,
                explanation: String::new(),
                category: crate::types::MoveCategory::Fair,
            },
        ];
        improver
            .observe_prediction(
                &state,
                Move::from_notation(3, "e2e4", 0.9),
                actual,
                &top_k,
                Some(0.9),
            )
            .await
            .unwrap();
        let entry = &improver.buffer().entries()[0];
        assert!(entry.was_in_top_k);
        assert_eq!(entry.top_k_rank, 2);
        assert!(!entry.is_correct);
    }

    #[tokio::test]
    async fn test_best_accuracy_invariant() {
        let mut improver = SelfImprover::new(config(2, 0), Box::new(SimTrainer::new()))
            .await
            .unwrap();
        for i in 0..20 {
            observe(&mut improver, i % 3 != 0).await;
        }
        let stats = improver.stats();
        let mut expected = stats.baseline_accuracy.unwrap_or(0.0);
        for a in &stats.accuracy_history {
            expected = expected.max(*a);
        }
        assert!((stats.best_accuracy - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_improvement_report() {
        let mut improver = SelfImprover::new(config(2, 0), Box::new(SimTrainer::new()))
            .await
            .unwrap();
        // empty history: zero struct
        let report = improver.calculate_improvement();
        assert_eq!(report.recent_trend, 0.0);
        assert!(!report.is_improving);

        // mostly incorrect first, then correct: accuracy trends upward
        for _ in 0..4 {
            observe(&mut improver, false).await;
        }
        for _ in 0..12 {
            observe(&mut improver, true).await;
        }
        let report = improver.calculate_improvement();
        assert!(report.recent_trend >= 0.0);
        assert!(report.std_dev >= 0.0);
        assert!((report.std_dev.powi(2) - report.variance).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_close_releases_handles() {
        let mut improver = SelfImprover::new(config(3, 0), Box::new(SimTrainer::new()))
            .await
            .unwrap();
        observe(&mut improver, true).await;
        improver.close().await.unwrap();
        assert!(improver.storage().is_none());
        // below the count gate, so the observation itself still succeeds
        assert!(!observe(&mut improver, true).await);
        // a direct training attempt reports the released trainer and ends Idle
        let err = improver.train().await.unwrap_err();
        assert!(matches!(err, AgentError::TrainingFailed(_)));
        assert_eq!(improver.state(), ImproverState::Idle);
    }
}
