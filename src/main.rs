//! Chess Scout - Self-Improving Move-Suggestion Agent
//!
//! Observes board states, suggests moves, and retrains itself from the
//! outcomes it records.

// Use the library crate for all modules
use chess_scout::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (WARN level by default, use RUST_LOG=info for debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    // Run CLI
    cli::run().await
}
