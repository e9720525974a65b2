//! Configuration management
//!
//! Manages engine and self-improver settings, persisted as TOML in the
//! platform config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Decision engine settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Self-improvement loop settings
    #[serde(default)]
    pub improver: ImproverConfig,
}

/// Decision engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of candidates to rank per decision
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Top moves below this confidence are returned but flagged
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Capture attempts before giving up
    #[serde(default = "default_capture_attempts")]
    pub capture_attempts: u32,
    /// Fixed delay between capture attempts
    #[serde(default = "default_capture_retry_delay_ms")]
    pub capture_retry_delay_ms: u64,
    /// Bounded decision history capacity
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

fn default_top_k() -> usize {
    5
}

fn default_confidence_threshold() -> f64 {
    0.3
}

fn default_capture_attempts() -> u32 {
    3
}

fn default_capture_retry_delay_ms() -> u64 {
    250
}

fn default_history_size() -> usize {
    200
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            confidence_threshold: default_confidence_threshold(),
            capture_attempts: default_capture_attempts(),
            capture_retry_delay_ms: default_capture_retry_delay_ms(),
            history_size: default_history_size(),
        }
    }
}

/// Self-improvement loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImproverConfig {
    /// Replay buffer capacity
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Minimum buffered samples before a training cycle may start
    #[serde(default = "default_min_samples_for_train")]
    pub min_samples_for_train: usize,
    /// Samples per training batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Learning rate handed to the trainer
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Minimum seconds between successful training cycles
    #[serde(default = "default_train_interval_secs")]
    pub train_interval_secs: u64,
    /// Prefer reward-weighted batch selection
    #[serde(default)]
    pub use_reward_weighting: bool,
    /// Fall back to balanced correct/incorrect batch selection
    #[serde(default)]
    pub use_balanced_sample: bool,
    /// Samples used when evaluating accuracy
    #[serde(default = "default_eval_batch_size")]
    pub eval_batch_size: usize,
    /// Accuracy considered "good enough" in reports
    #[serde(default = "default_accuracy_threshold")]
    pub accuracy_threshold: f64,
    /// SQLite database path for the durable replay log
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Directory for JSONL exports/imports
    #[serde(default = "default_jsonl_dir")]
    pub jsonl_dir: PathBuf,
    /// Persist every observation to the replay log
    #[serde(default = "default_true")]
    pub auto_save: bool,
}

fn default_buffer_size() -> usize {
    1000
}

fn default_min_samples_for_train() -> usize {
    50
}

fn default_batch_size() -> usize {
    32
}

fn default_learning_rate() -> f64 {
    0.001
}

fn default_train_interval_secs() -> u64 {
    300
}

fn default_eval_batch_size() -> usize {
    100
}

fn default_accuracy_threshold() -> f64 {
    0.6
}

fn default_db_path() -> PathBuf {
    data_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("replays.db")
}

fn default_jsonl_dir() -> PathBuf {
    data_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("exports")
}

fn default_true() -> bool {
    true
}

impl Default for ImproverConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            min_samples_for_train: default_min_samples_for_train(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            train_interval_secs: default_train_interval_secs(),
            use_reward_weighting: false,
            use_balanced_sample: false,
            eval_batch_size: default_eval_batch_size(),
            accuracy_threshold: default_accuracy_threshold(),
            db_path: default_db_path(),
            jsonl_dir: default_jsonl_dir(),
            auto_save: default_true(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            improver: ImproverConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "chess-scout", "chess-scout")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "chess-scout", "chess-scout")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Get default configuration as TOML string
pub fn default_config_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| "# Default configuration\n".to_string())
}
