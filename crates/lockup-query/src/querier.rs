use lockup_core::error::LockupError;
use lockup_core::lock::LockStatus;
use lockup_core::query::{QueryRequest, QueryResponse};
use lockup_core::types::{LockId, Timestamp};
use lockup_state::LockupEngine;
use tracing::debug;

/// Read-only query dispatch for the lockup ledger.
pub struct LockupQuerier<'a> {
    engine: &'a LockupEngine,
}

impl<'a> LockupQuerier<'a> {
    pub fn new(engine: &'a LockupEngine) -> Self {
        Self { engine }
    }

    /// Answer a single query.
    pub fn query(&self, req: &QueryRequest) -> Result<QueryResponse, LockupError> {
        debug!(endpoint = req.endpoint(), "lockup query");
        let e = self.engine;
        let resp = match req {
            QueryRequest::ModuleBalance => QueryResponse::Coins(e.module_balance()?),
            QueryRequest::ModuleLockedAmount { denom } => QueryResponse::Amount {
                denom: denom.clone(),
                amount: e.module_locked_amount(denom)?,
            },
            QueryRequest::AccountUnlockableCoins { owner, now } => {
                QueryResponse::Coins(e.account_unlockable_coins(owner, *now)?)
            }
            QueryRequest::AccountLockedCoins { owner, now } => {
                QueryResponse::Coins(e.account_locked_coins(owner, *now)?)
            }
            QueryRequest::AccountLockedPastTime { owner, timestamp } => {
                QueryResponse::Locks(e.account_locked_past_time(owner, *timestamp)?)
            }
            QueryRequest::AccountUnlockedBeforeTime { owner, timestamp } => {
                QueryResponse::Locks(e.account_unlocked_before_time(owner, *timestamp)?)
            }
            QueryRequest::AccountLockedPastTimeDenom { owner, denom, timestamp } => {
                QueryResponse::Locks(e.account_locked_past_time_denom(owner, denom, *timestamp)?)
            }
            QueryRequest::LockedById { lock_id } => QueryResponse::Lock(e.locked_by_id(*lock_id)?),
            QueryRequest::AccountLockedLongerThanDuration { owner, duration } => {
                QueryResponse::Locks(e.account_locked_longer_than_duration(owner, *duration)?)
            }
            QueryRequest::AccountLockedLongerThanDurationDenom { owner, denom, duration } => {
                QueryResponse::Locks(
                    e.account_locked_longer_than_duration_denom(owner, denom, *duration)?,
                )
            }
        };
        Ok(resp)
    }

    /// Answer a query given as endpoint name plus JSON params, returning the
    /// encoded response. Encoded straight to text: `serde_json::Value` cannot
    /// hold amounts above `u64::MAX`.
    pub fn query_json(
        &self,
        endpoint: &str,
        params: serde_json::Value,
    ) -> Result<String, LockupError> {
        let req = QueryRequest::from_endpoint(endpoint, params)?;
        let resp = self.query(&req)?;
        serde_json::to_string_pretty(&resp).map_err(|e| LockupError::Serialization(e.to_string()))
    }

    /// Human-readable summary of a lock's state at `now`.
    pub fn describe(&self, id: LockId, now: Timestamp) -> Result<String, LockupError> {
        let lock = self.engine.locked_by_id(id)?;

        let status_str = match lock.status {
            LockStatus::Active => format!("Active — unlocks {}s after unlocking begins", lock.duration),
            LockStatus::Unlocking { end_time } => {
                let secs_remaining = end_time.saturating_sub(now);
                if secs_remaining > 0 {
                    format!("Unlocking — releasable in {}s (at {})", secs_remaining, end_time)
                } else {
                    format!("Unlocking — releasable since {}", end_time)
                }
            }
        };

        Ok(format!(
            "Lock {} | {} | owner: {} | {}",
            lock.id, lock.coins, lock.owner, status_str
        ))
    }
}
