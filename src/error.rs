//! Error taxonomy for the decision and self-improvement pipeline.

use thiserror::Error;

/// Errors surfaced by the decision engine and the self-improver.
///
/// Collaborator traits (capturer, predictor, trainer) report `anyhow::Error`;
/// the core maps those into this taxonomy at the call sites where the failure
/// mode matters to the caller.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Board capture kept failing until the retry budget ran out
    #[error("board capture failed after {0} attempts")]
    CaptureFailed(u32),

    /// The predictor returned an error
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// Ranking produced zero candidates
    #[error("no valid moves ranked from predictor output")]
    NoValidMoves,

    /// Batch selection yielded nothing to train on
    #[error("empty training batch")]
    EmptyBatch,

    /// Persistence failure in the replay storage layer
    #[error("replay storage error: {0}")]
    StorageIo(String),

    /// The trainer rejected or failed the batch
    #[error("training failed: {0}")]
    TrainingFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AgentError::CaptureFailed(3).to_string(),
            "board capture failed after 3 attempts"
        );
        assert_eq!(AgentError::EmptyBatch.to_string(), "empty training batch");
        assert!(AgentError::TrainingFailed("loss diverged".into())
            .to_string()
            .contains("loss diverged"));
    }
}
