//! Closed set of read queries served by the ledger.
//!
//! Each variant's serde tag is the endpoint name from [`crate::constants`],
//! so a JSON request is `{"query": "<endpoint>", ...params}`.

use serde::{Deserialize, Serialize};

use crate::coins::Coins;
use crate::constants::*;
use crate::error::LockupError;
use crate::lock::Lock;
use crate::types::{AccountId, Amount, DurationSecs, LockId, Timestamp};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "query")]
pub enum QueryRequest {
    #[serde(rename = "module_balance")]
    ModuleBalance,

    #[serde(rename = "module_locked_amount")]
    ModuleLockedAmount { denom: String },

    #[serde(rename = "account_unlockable_coins")]
    AccountUnlockableCoins { owner: AccountId, now: Timestamp },

    #[serde(rename = "account_locked_coins")]
    AccountLockedCoins { owner: AccountId, now: Timestamp },

    #[serde(rename = "account_locked_pasttime")]
    AccountLockedPastTime { owner: AccountId, timestamp: Timestamp },

    #[serde(rename = "account_unlocked_beforetime")]
    AccountUnlockedBeforeTime { owner: AccountId, timestamp: Timestamp },

    #[serde(rename = "account_locked_denom_pasttime")]
    AccountLockedPastTimeDenom {
        owner: AccountId,
        denom: String,
        timestamp: Timestamp,
    },

    #[serde(rename = "locked_by_id")]
    LockedById { lock_id: LockId },

    #[serde(rename = "account_locked_longer_than_duration")]
    AccountLockedLongerThanDuration {
        owner: AccountId,
        duration: DurationSecs,
    },

    #[serde(rename = "account_locked_longer_than_duration_denom")]
    AccountLockedLongerThanDurationDenom {
        owner: AccountId,
        denom: String,
        duration: DurationSecs,
    },
}

impl QueryRequest {
    /// Every endpoint name, in declaration order.
    pub const ENDPOINTS: [&'static str; 10] = [
        QUERY_MODULE_BALANCE,
        QUERY_MODULE_LOCKED_AMOUNT,
        QUERY_ACCOUNT_UNLOCKABLE_COINS,
        QUERY_ACCOUNT_LOCKED_COINS,
        QUERY_ACCOUNT_LOCKED_PAST_TIME,
        QUERY_ACCOUNT_UNLOCKED_BEFORE_TIME,
        QUERY_ACCOUNT_LOCKED_PAST_TIME_DENOM,
        QUERY_LOCKED_BY_ID,
        QUERY_ACCOUNT_LOCKED_LONGER_THAN_DURATION,
        QUERY_ACCOUNT_LOCKED_LONGER_THAN_DURATION_DENOM,
    ];

    pub fn endpoint(&self) -> &'static str {
        match self {
            QueryRequest::ModuleBalance => QUERY_MODULE_BALANCE,
            QueryRequest::ModuleLockedAmount { .. } => QUERY_MODULE_LOCKED_AMOUNT,
            QueryRequest::AccountUnlockableCoins { .. } => QUERY_ACCOUNT_UNLOCKABLE_COINS,
            QueryRequest::AccountLockedCoins { .. } => QUERY_ACCOUNT_LOCKED_COINS,
            QueryRequest::AccountLockedPastTime { .. } => QUERY_ACCOUNT_LOCKED_PAST_TIME,
            QueryRequest::AccountUnlockedBeforeTime { .. } => QUERY_ACCOUNT_UNLOCKED_BEFORE_TIME,
            QueryRequest::AccountLockedPastTimeDenom { .. } => QUERY_ACCOUNT_LOCKED_PAST_TIME_DENOM,
            QueryRequest::LockedById { .. } => QUERY_LOCKED_BY_ID,
            QueryRequest::AccountLockedLongerThanDuration { .. } => {
                QUERY_ACCOUNT_LOCKED_LONGER_THAN_DURATION
            }
            QueryRequest::AccountLockedLongerThanDurationDenom { .. } => {
                QUERY_ACCOUNT_LOCKED_LONGER_THAN_DURATION_DENOM
            }
        }
    }

    /// Build a request from an endpoint name and a JSON object of parameters.
    pub fn from_endpoint(endpoint: &str, params: serde_json::Value) -> Result<Self, LockupError> {
        if !Self::ENDPOINTS.contains(&endpoint) {
            return Err(LockupError::InvalidArgument(format!(
                "unknown query endpoint: {endpoint}"
            )));
        }
        let mut obj = match params {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(LockupError::InvalidArgument(format!(
                    "query params must be a JSON object, got {other}"
                )))
            }
        };
        obj.insert("query".into(), serde_json::Value::String(endpoint.into()));
        serde_json::from_value(serde_json::Value::Object(obj))
            .map_err(|e| LockupError::InvalidArgument(format!("{endpoint}: {e}")))
    }
}

/// Result of a [`QueryRequest`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryResponse {
    Coins(Coins),
    Amount { denom: String, amount: Amount },
    Lock(Lock),
    Locks(Vec<Lock>),
}
