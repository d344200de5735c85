/// ─── Lockup Ledger Constants ────────────────────────────────────────────────

// ── Query endpoints ──────────────────────────────────────────────────────────

pub const QUERY_MODULE_BALANCE: &str = "module_balance";
pub const QUERY_MODULE_LOCKED_AMOUNT: &str = "module_locked_amount";
pub const QUERY_ACCOUNT_UNLOCKABLE_COINS: &str = "account_unlockable_coins";
pub const QUERY_ACCOUNT_LOCKED_COINS: &str = "account_locked_coins";
pub const QUERY_ACCOUNT_LOCKED_PAST_TIME: &str = "account_locked_pasttime";
pub const QUERY_ACCOUNT_UNLOCKED_BEFORE_TIME: &str = "account_unlocked_beforetime";
pub const QUERY_ACCOUNT_LOCKED_PAST_TIME_DENOM: &str = "account_locked_denom_pasttime";
pub const QUERY_LOCKED_BY_ID: &str = "locked_by_id";
pub const QUERY_ACCOUNT_LOCKED_LONGER_THAN_DURATION: &str = "account_locked_longer_than_duration";
pub const QUERY_ACCOUNT_LOCKED_LONGER_THAN_DURATION_DENOM: &str =
    "account_locked_longer_than_duration_denom";

// ── Limits ───────────────────────────────────────────────────────────────────

/// Longest owner identifier accepted (bytes). Index keys carry a u16 length.
pub const MAX_ACCOUNT_ID_LEN: usize = 255;

/// Longest denomination accepted (bytes).
pub const MAX_DENOM_LEN: usize = 128;

/// Default upper bound on a deposit's duration: 10 years.
pub const DEFAULT_MAX_LOCK_DURATION_SECS: i64 = 10 * 365 * 24 * 3600;

/// Default maximum number of distinct denominations in one lock.
pub const DEFAULT_MAX_DENOMS_PER_LOCK: usize = 16;
