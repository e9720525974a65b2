//! Decision engine: capture with retry, predictor invocation, top-K ranking
//! and rolling performance counters.

pub mod history;
pub mod patterns;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::capture::Capturer;
use crate::config::EngineConfig;
use crate::error::AgentError;
use crate::predict::{top_k_moves, Predictor};
use crate::types::{BoardState, Decision, Move, RankedMove};

pub use history::{DecisionHistory, HistoryStats};

/// Rolling counters, all mutated under one lock.
#[derive(Debug, Default)]
struct EngineCounters {
    total_decisions: u64,
    successful_captures: u64,
    failed_captures: u64,
    low_confidence_decisions: u64,
    total_inference_ms: u64,
}

/// Snapshot of the engine's rolling statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct EngineStatistics {
    pub total_decisions: u64,
    pub successful_captures: u64,
    pub failed_captures: u64,
    pub low_confidence_decisions: u64,
    pub capture_success_rate: f64,
    pub avg_inference_ms: f64,
}

/// Ranks predictor output into explained decisions.
pub struct DecisionEngine {
    capturer: Arc<dyn Capturer>,
    predictor: Arc<dyn Predictor>,
    config: EngineConfig,
    counters: Arc<RwLock<EngineCounters>>,
    history: DecisionHistory,
}

impl DecisionEngine {
    pub fn new(
        capturer: Arc<dyn Capturer>,
        predictor: Arc<dyn Predictor>,
        config: EngineConfig,
    ) -> Self {
        let history = DecisionHistory::new(config.history_size);
        Self {
            capturer,
            predictor,
            config,
            counters: Arc::new(RwLock::new(EngineCounters::default())),
            history,
        }
    }

    /// Capture a state and decide on it.
    ///
    /// Capture is attempted up to `capture_attempts` times with a fixed delay
    /// in between. Only retry exhaustion counts as a terminal capture failure.
    pub async fn make_decision(&self) -> Result<Decision, AgentError> {
        let state = self.capture_with_retry().await?;
        self.decide(&state).await
    }

    /// Decide on a pre-existing state, skipping capture entirely.
    pub async fn decision_with_context(&self, state: &BoardState) -> Result<Decision, AgentError> {
        self.decide(state).await
    }

    /// Decide on each state, tolerating per-item failures.
    ///
    /// Fails only when every input fails.
    pub async fn batch_decisions(&self, states: &[BoardState]) -> Result<Vec<Decision>, AgentError> {
        let mut decisions = Vec::with_capacity(states.len());
        let mut last_err = None;
        for (i, state) in states.iter().enumerate() {
            match self.decide(state).await {
                Ok(decision) => decisions.push(decision),
                Err(e) => {
                    warn!("Batch decision {} failed: {}", i, e);
                    last_err = Some(e);
                }
            }
        }
        if decisions.is_empty() {
            if let Some(e) = last_err {
                return Err(e);
            }
        }
        Ok(decisions)
    }

    async fn capture_with_retry(&self) -> Result<BoardState, AgentError> {
        let attempts = self.config.capture_attempts.max(1);
        for attempt in 1..=attempts {
            match self.capturer.extract_board_state().await {
                Ok(state) => {
                    self.counters.write().await.successful_captures += 1;
                    return Ok(state);
                }
                Err(e) => {
                    warn!("Capture attempt {}/{} failed: {}", attempt, attempts, e);
                    if attempt < attempts {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            self.config.capture_retry_delay_ms,
                        ))
                        .await;
                    }
                }
            }
        }
        self.counters.write().await.failed_captures += 1;
        Err(AgentError::CaptureFailed(attempts))
    }

    async fn decide(&self, state: &BoardState) -> Result<Decision, AgentError> {
        let start = Instant::now();
        let scores = self
            .predictor
            .predict(&state.tensor)
            .await
            .map_err(|e| AgentError::InferenceFailed(e.to_string()))?;
        let inference_ms = start.elapsed().as_millis() as u64;

        let mut ranked = self.rank_candidates(&scores);
        if ranked.is_empty() {
            return Err(AgentError::NoValidMoves);
        }

        let top_move = ranked.remove(0);
        if top_move.mv.confidence < self.config.confidence_threshold {
            warn!(
                "Top move {} below confidence threshold ({:.3} < {:.3})",
                top_move.mv.notation, top_move.mv.confidence, self.config.confidence_threshold
            );
            self.counters.write().await.low_confidence_decisions += 1;
        }

        let decision = Decision {
            top_move,
            alternatives: ranked,
            timestamp: Utc::now(),
            inference_ms,
            state: state.clone(),
            total_candidates: scores.len(),
        };

        {
            let mut counters = self.counters.write().await;
            counters.total_decisions += 1;
            counters.total_inference_ms += inference_ms;
        }
        self.history.record(decision.clone()).await;

        debug!(
            "Decision: {} ({:.3}) from {} candidates in {}ms",
            decision.top_move.mv.notation,
            decision.top_move.mv.confidence,
            decision.total_candidates,
            inference_ms
        );
        Ok(decision)
    }

    /// Rank the top-K candidates from a raw score vector.
    fn rank_candidates(&self, scores: &[f64]) -> Vec<RankedMove> {
        top_k_moves(scores, self.config.top_k)
            .into_iter()
            .enumerate()
            .map(|(position, candidate)| {
                let notation = self.predictor.decode_move(candidate.index);
                let mv = Move::from_notation(candidate.index, &notation, candidate.score);
                let tags = patterns::pattern_tags(&mv);
                let has_strong = tags.iter().any(|t| t.strong);
                let rank = position + 1;
                RankedMove {
                    explanation: patterns::explain(rank, mv.confidence, &tags),
                    category: patterns::categorize(mv.confidence, has_strong),
                    mv,
                    rank,
                }
            })
            .collect()
    }

    /// Snapshot of the rolling counters.
    pub async fn statistics(&self) -> EngineStatistics {
        let counters = self.counters.read().await;
        let capture_total = counters.successful_captures + counters.failed_captures;
        EngineStatistics {
            total_decisions: counters.total_decisions,
            successful_captures: counters.successful_captures,
            failed_captures: counters.failed_captures,
            low_confidence_decisions: counters.low_confidence_decisions,
            capture_success_rate: if capture_total > 0 {
                counters.successful_captures as f64 / capture_total as f64
            } else {
                0.0
            },
            avg_inference_ms: if counters.total_decisions > 0 {
                counters.total_inference_ms as f64 / counters.total_decisions as f64
            } else {
                0.0
            },
        }
    }

    /// The engine's bounded decision history.
    pub fn history(&self) -> &DecisionHistory {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCapturer, SimPredictor};
    use crate::types::MoveCategory;

    fn engine_with(capturer: SimCapturer) -> DecisionEngine {
        let config = EngineConfig {
            capture_retry_delay_ms: 1,
            ..Default::default()
        };
        DecisionEngine::new(
            Arc::new(capturer),
            Arc::new(SimPredictor::new(7)),
            config,
        )
    }

    #[tokio::test]
    async fn test_make_decision_ranks_top_k() {
        let engine = engine_with(SimCapturer::new(42));
        let decision = engine.make_decision().await.unwrap();
        assert_eq!(decision.top_move.rank, 1);
        assert_eq!(decision.alternatives.len(), 4);
        for (i, alt) in decision.alternatives.iter().enumerate() {
            assert_eq!(alt.rank, i + 2);
            assert!(alt.mv.confidence <= decision.top_move.mv.confidence);
        }
        assert!(!decision.top_move.explanation.is_empty());
    }

    #[tokio::test]
    async fn test_capture_retry_recovers() {
        // Fails twice, succeeds on attempt 3: no terminal failure recorded
        let engine = engine_with(SimCapturer::new(42).with_failures(2));
        let decision = engine.make_decision().await;
        assert!(decision.is_ok());
        let stats = engine.statistics().await;
        assert_eq!(stats.successful_captures, 1);
        assert_eq!(stats.failed_captures, 0);
    }

    #[tokio::test]
    async fn test_capture_retry_exhaustion() {
        let engine = engine_with(SimCapturer::new(42).with_failures(99));
        let err = engine.make_decision().await.unwrap_err();
        assert!(matches!(err, AgentError::CaptureFailed(3)));
        let stats = engine.statistics().await;
        assert_eq!(stats.failed_captures, 1);
        assert_eq!(stats.successful_captures, 0);
        assert_eq!(stats.total_decisions, 0);
    }

    #[tokio::test]
    async fn test_decision_with_context_skips_capture() {
        let engine = engine_with(SimCapturer::new(42).with_failures(99));
        let state = BoardState::new(vec![0.5; 8]);
        let decision = engine.decision_with_context(&state).await.unwrap();
        assert!(decision.total_candidates > 0);
        // no capture happened at all
        let stats = engine.statistics().await;
        assert_eq!(stats.successful_captures + stats.failed_captures, 0);
        assert_eq!(stats.total_decisions, 1);
    }

    #[tokio::test]
    async fn test_batch_decisions_tolerates_failures() {
        let engine = engine_with(SimCapturer::new(42));
        let states = vec![
            BoardState::new(vec![0.1; 8]),
            BoardState::new(vec![0.9; 8]),
        ];
        let decisions = engine.batch_decisions(&states).await.unwrap();
        assert_eq!(decisions.len(), 2);
    }

    #[tokio::test]
    async fn test_history_records_decisions() {
        let engine = engine_with(SimCapturer::new(42));
        let state = BoardState::new(vec![0.5; 8]);
        for _ in 0..3 {
            engine.decision_with_context(&state).await.unwrap();
        }
        assert_eq!(engine.history().len().await, 3);
        let hist_stats = engine.history().stats().await;
        assert_eq!(hist_stats.decisions, 3);
        assert!(hist_stats.avg_confidence > 0.0);
    }

    #[tokio::test]
    async fn test_categories_follow_confidence() {
        let engine = engine_with(SimCapturer::new(42));
        let decision = engine
            .decision_with_context(&BoardState::new(vec![0.5; 8]))
            .await
            .unwrap();
        // every ranked move carries a category consistent with its band
        for rm in std::iter::once(&decision.top_move).chain(decision.alternatives.iter()) {
            if rm.mv.confidence >= 0.90 {
                assert_eq!(rm.category, MoveCategory::Excellent);
            } else if rm.mv.confidence < 0.30 && rm.mv.confidence > 0.0 {
                assert_eq!(rm.category, MoveCategory::Speculative);
            }
        }
    }
}
