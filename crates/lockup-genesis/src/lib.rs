//! lockup-genesis
//!
//! Seeds a `StateDb` from a genesis snapshot, and exports the current state
//! back into one. Import writes directly into the store (no engine calls),
//! so every lock is validated here against the rules a deposit obeys,
//! including the `EngineConfig` limits the node runs with.

pub mod params;

pub use params::LockupGenesis;

use std::collections::BTreeSet;
use std::path::Path;

use lockup_core::coins::Coins;
use lockup_core::error::LockupError;
use lockup_core::types::LockId;
use lockup_state::{EngineConfig, StateBatch, StateDb};
use tracing::info;

/// Apply `genesis` to an empty `StateDb`.
///
/// Rejects a non-fresh store, duplicate or zero ids, ids above
/// `last_lock_id`, empty bundles, negative durations, and locks outside the
/// `config` limits. Locks, all index entries, the recomputed module balance,
/// and the id sequence are committed in a single batch.
pub fn import_genesis(
    db: &StateDb,
    genesis: &LockupGenesis,
    config: &EngineConfig,
) -> Result<Coins, LockupError> {
    info!(locks = genesis.locks.len(), "importing lockup genesis");

    if !db.is_fresh()? {
        return Err(LockupError::Genesis("state database is not empty".into()));
    }

    let mut seen = BTreeSet::new();
    for lock in &genesis.locks {
        if lock.id == LockId(0) {
            return Err(LockupError::Genesis("lock id 0 is reserved".into()));
        }
        if lock.id > genesis.last_lock_id {
            return Err(LockupError::Genesis(format!(
                "lock {} exceeds last_lock_id {}",
                lock.id, genesis.last_lock_id
            )));
        }
        if !seen.insert(lock.id) {
            return Err(LockupError::Genesis(format!("duplicate lock id {}", lock.id)));
        }
        if lock.coins.is_empty() {
            return Err(LockupError::Genesis(format!("lock {} holds no coins", lock.id)));
        }
        if lock.duration < 0 {
            return Err(LockupError::Genesis(format!(
                "lock {} has negative duration {}",
                lock.id, lock.duration
            )));
        }
        if lock.duration > config.max_lock_duration {
            return Err(LockupError::Genesis(format!(
                "lock {} duration {}s exceeds maximum of {}s",
                lock.id, lock.duration, config.max_lock_duration
            )));
        }
        if lock.coins.len() > config.max_denoms_per_lock {
            return Err(LockupError::Genesis(format!(
                "lock {} holds {} denoms; maximum is {}",
                lock.id,
                lock.coins.len(),
                config.max_denoms_per_lock
            )));
        }
    }

    let balance = Coins::sum(genesis.locks.iter().map(|l| &l.coins))?;

    let mut batch = StateBatch::default();
    for lock in &genesis.locks {
        batch.insert_lock(lock.clone());
    }
    batch.set_module_balance(balance.clone());
    batch.set_last_lock_id(genesis.last_lock_id);
    db.commit(&batch)?;

    verify_module_balance(db, &balance)?;

    db.flush()?;
    info!(
        locks = genesis.locks.len(),
        last_lock_id = %genesis.last_lock_id,
        module_balance = %balance,
        "genesis state committed to disk"
    );
    Ok(balance)
}

/// Re-read the accumulator after commit and compare with the recomputed sum.
fn verify_module_balance(db: &StateDb, expected: &Coins) -> Result<(), LockupError> {
    let stored = db.module_balance()?;
    if &stored != expected {
        return Err(LockupError::Genesis(format!(
            "module balance mismatch: expected {expected}, stored {stored}"
        )));
    }
    Ok(())
}

/// Snapshot every lock and the id sequence.
pub fn export_genesis(db: &StateDb) -> Result<LockupGenesis, LockupError> {
    let genesis = LockupGenesis {
        last_lock_id: db.last_lock_id()?,
        locks: db.iter_locks()?,
    };
    info!(locks = genesis.locks.len(), "exported lockup genesis");
    Ok(genesis)
}

/// Read a genesis snapshot from a JSON file.
pub fn load_genesis(path: &Path) -> Result<LockupGenesis, LockupError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| LockupError::Genesis(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&json).map_err(|e| LockupError::Serialization(e.to_string()))
}

/// Write a genesis snapshot to a JSON file.
pub fn save_genesis(path: &Path, genesis: &LockupGenesis) -> Result<(), LockupError> {
    let json = serde_json::to_string_pretty(genesis)
        .map_err(|e| LockupError::Serialization(e.to_string()))?;
    std::fs::write(path, json)
        .map_err(|e| LockupError::Genesis(format!("writing {}: {e}", path.display())))
}
