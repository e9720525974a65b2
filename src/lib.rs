//! Chess Scout - Self-Improving Move-Suggestion Agent Library
//!
//! An online "observe → decide → remember → retrain" loop:
//! - Decision engine with capture retry, top-K ranking and heuristic move annotation
//! - Bounded replay buffer with rolling statistics and deterministic sampling
//! - Durable SQLite replay log with JSONL export/import and a metadata store
//! - Self-improver that gates incremental retraining on sample count and time
//!
//! # Example
//!
//! ```ignore
//! use chess_scout::config::Config;
//! use chess_scout::improver::SelfImprover;
//! use chess_scout::sim::SimTrainer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let mut improver =
//!         SelfImprover::new(config.improver, Box::new(SimTrainer::new())).await?;
//!     // feed observations via improver.observe_prediction(...)
//!     improver.close().await?;
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod error;
pub mod config;
pub mod capture;
pub mod predict;
pub mod engine;
pub mod replay;  // Must come before improver since improver owns the replay subsystem
pub mod improver;
pub mod sim;
pub mod cli;

// Re-export commonly used types for convenience
pub use types::{BoardState, Decision, Move, MoveCategory, RankedMove};

pub use error::AgentError;

pub use capture::Capturer;
pub use predict::{top_k_moves, Predictor, TopKMove};

pub use engine::{DecisionEngine, EngineStatistics};

pub use replay::{
    buffer::{ReplayBuffer, ReplayStats},
    storage::ReplayStorage,
    ReplayEntry,
};

pub use improver::{ImproverStats, SelfImprover, TrainOutcome, Trainer};

pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Self-Improving Move-Suggestion Agent", NAME, VERSION)
}
