use lockup_core::constants::{DEFAULT_MAX_DENOMS_PER_LOCK, DEFAULT_MAX_LOCK_DURATION_SECS};
use lockup_core::types::DurationSecs;

/// Limits enforced by the engine on new deposits.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Longest duration a deposit may request (seconds).
    pub max_lock_duration: DurationSecs,
    /// Maximum number of distinct denominations in a single lock.
    pub max_denoms_per_lock: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_lock_duration: DEFAULT_MAX_LOCK_DURATION_SECS,
            max_denoms_per_lock: DEFAULT_MAX_DENOMS_PER_LOCK,
        }
    }
}
