//! Board capture interface.
//!
//! Raw board capture and piece recognition live outside this crate; the engine
//! only needs something that can hand it a [`BoardState`].

use anyhow::Result;
use async_trait::async_trait;

use crate::types::BoardState;

/// External collaborator that produces board states on demand.
#[async_trait]
pub trait Capturer: Send + Sync {
    /// Capture the current board and return its feature tensor.
    async fn extract_board_state(&self) -> Result<BoardState>;
}
