use lockup_core::lock::Lock;
use lockup_core::types::LockId;
use serde::{Deserialize, Serialize};

/// Snapshot of the lockup ledger, as written to and read from genesis JSON.
///
/// The module balance is not stored: it is recomputed from `locks` on
/// import so a snapshot can never carry an inconsistent accumulator.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockupGenesis {
    /// Highest lock id ever assigned. New deposits continue from here, so ids
    /// of locks released before the snapshot are never reissued.
    pub last_lock_id: LockId,
    /// Locks in ascending id order.
    pub locks: Vec<Lock>,
}
