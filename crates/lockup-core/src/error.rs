use thiserror::Error;

use crate::types::{LockId, Timestamp};

#[derive(Debug, Error)]
pub enum LockupError {
    // ── Caller errors (rejected before any state change) ─────────────────────
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid coins: {0}")]
    InvalidCoins(String),

    #[error("lock not found: {0}")]
    NotFound(LockId),

    #[error("lock {id} is {status}; operation not permitted in this state")]
    InvalidState { id: LockId, status: String },

    #[error("lock {id} not releasable until {end_time} (now {now})")]
    NotReady {
        id: LockId,
        end_time: Timestamp,
        now: Timestamp,
    },

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    // ── Genesis ──────────────────────────────────────────────────────────────
    #[error("genesis rejected: {0}")]
    Genesis(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl LockupError {
    /// True for failures that may succeed later without any change by the
    /// caller other than time advancing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockupError::NotReady { .. })
    }
}
