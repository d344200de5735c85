use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LockupError;

/// Amount of a single denomination, in base units.
pub type Amount = u128;

/// Unix timestamp (seconds, UTC). Always supplied by the host, never read
/// from a local clock inside the ledger.
pub type Timestamp = i64;

/// Lock duration in seconds. Signed so that negative input can be rejected
/// with `InvalidArgument` instead of silently wrapping.
pub type DurationSecs = i64;

// ── LockId ───────────────────────────────────────────────────────────────────

/// Sequential lock identifier. Assigned from 1 upwards and never reused.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(pub u64);

impl LockId {
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(b: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(b))
    }

    /// The identifier that follows this one, or `None` once the sequence is
    /// exhausted. Ids are never reused, so there is no wrap-around.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockId({})", self.0)
    }
}

// ── AccountId ────────────────────────────────────────────────────────────────

/// Opaque account identifier of a lock owner (an address string on the host
/// chain). The ledger only needs equality, ordering, and a byte encoding.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn new(s: impl Into<String>) -> Result<Self, LockupError> {
        let s = s.into();
        if s.is_empty() {
            return Err(LockupError::InvalidArgument("owner must not be empty".into()));
        }
        if s.len() > crate::constants::MAX_ACCOUNT_ID_LEN {
            return Err(LockupError::InvalidArgument(format!(
                "owner exceeds {} bytes",
                crate::constants::MAX_ACCOUNT_ID_LEN
            )));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for AccountId {
    type Error = LockupError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl std::str::FromStr for AccountId {
    type Err = LockupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}
