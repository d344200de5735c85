use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coins::Coins;
use crate::types::{AccountId, DurationSecs, LockId, Timestamp};

// ── LockStatus ────────────────────────────────────────────────────────────────

/// Lifecycle of a lock. The end time lives inside `Unlocking`, so a lock has
/// an end time exactly when it is unlocking.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LockStatus {
    /// Unlocking has not been requested; no end time yet.
    Active,
    /// Unlocking requested; releasable once `now >= end_time`.
    Unlocking { end_time: Timestamp },
}

impl LockStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LockStatus::Active => "active",
            LockStatus::Unlocking { .. } => "unlocking",
        }
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStatus::Active => f.write_str("active"),
            LockStatus::Unlocking { end_time } => write!(f, "unlocking until {end_time}"),
        }
    }
}

// ── Lock ──────────────────────────────────────────────────────────────────────

/// Coins held on behalf of `owner` until the lock is released.
///
/// `owner`, `coins`, and `duration` never change after creation; only
/// `status` moves forward from `Active` to `Unlocking`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lock {
    pub id: LockId,
    pub owner: AccountId,
    pub coins: Coins,
    pub duration: DurationSecs,
    pub status: LockStatus,
}

impl Lock {
    pub fn new(id: LockId, owner: AccountId, coins: Coins, duration: DurationSecs) -> Self {
        Self {
            id,
            owner,
            coins,
            duration,
            status: LockStatus::Active,
        }
    }

    pub fn end_time(&self) -> Option<Timestamp> {
        match self.status {
            LockStatus::Active => None,
            LockStatus::Unlocking { end_time } => Some(end_time),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == LockStatus::Active
    }

    pub fn is_unlocking(&self) -> bool {
        matches!(self.status, LockStatus::Unlocking { .. })
    }

    /// Releasable at `now`: unlocking and the end time has been reached.
    pub fn is_releasable(&self, now: Timestamp) -> bool {
        matches!(self.end_time(), Some(end) if now >= end)
    }

    /// Still locked at `t`: active, or unlocking with an end time after `t`.
    pub fn is_locked_at(&self, t: Timestamp) -> bool {
        match self.end_time() {
            None => true,
            Some(end) => end > t,
        }
    }
}
