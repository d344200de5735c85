use lockup_core::coins::Coins;
use lockup_core::error::LockupError;
use lockup_core::lock::Lock;
use lockup_core::types::{DurationSecs, LockId, Timestamp};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::path::Path;
use tracing::debug;

use crate::keys::{
    self, id_from_index_key, lock_key, ordinal_lower_bound, ordinal_upper_bound, scope_end,
    IndexEntries,
};

const META_LAST_LOCK_ID: &str = "last_lock_id";
const META_MODULE_BALANCE: &str = "module_balance";
const EMPTY: &[u8] = &[];

fn storage(e: sled::Error) -> LockupError {
    LockupError::Storage(e.to_string())
}

/// Which index tree to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Active,
    EndTime,
    Duration,
}

// ── Staged writes ─────────────────────────────────────────────────────────────

/// Lock and accumulator changes committed together by [`StateDb::commit`].
///
/// Index maintenance is derived from the staged locks: an update removes the
/// entries of the previous version and inserts those of the new one.
#[derive(Debug, Default)]
pub struct StateBatch {
    upserts: Vec<(Option<Lock>, Lock)>,
    deletes: Vec<Lock>,
    module_balance: Option<Coins>,
    last_lock_id: Option<LockId>,
}

impl StateBatch {
    pub fn insert_lock(&mut self, lock: Lock) {
        self.upserts.push((None, lock));
    }

    pub fn update_lock(&mut self, previous: Lock, lock: Lock) {
        self.upserts.push((Some(previous), lock));
    }

    pub fn delete_lock(&mut self, lock: Lock) {
        self.deletes.push(lock);
    }

    pub fn set_module_balance(&mut self, balance: Coins) {
        self.module_balance = Some(balance);
    }

    pub fn set_last_lock_id(&mut self, id: LockId) {
        self.last_lock_id = Some(id);
    }
}

/// A batch flattened into raw key/value operations, serialized up front so
/// the transaction body itself cannot fail on encoding.
#[derive(Default)]
struct WritePlan {
    lock_puts: Vec<([u8; 8], Vec<u8>)>,
    lock_removes: Vec<[u8; 8]>,
    index_removes: IndexEntries,
    index_inserts: IndexEntries,
    meta_puts: Vec<(&'static str, Vec<u8>)>,
}

fn extend_entries(into: &mut IndexEntries, from: IndexEntries) {
    into.active.extend(from.active);
    into.end_time.extend(from.end_time);
    into.duration.extend(from.duration);
}

impl WritePlan {
    fn build(batch: &StateBatch) -> Result<Self, LockupError> {
        let mut plan = WritePlan::default();
        for (previous, lock) in &batch.upserts {
            if let Some(prev) = previous {
                extend_entries(&mut plan.index_removes, IndexEntries::for_lock(prev));
            }
            extend_entries(&mut plan.index_inserts, IndexEntries::for_lock(lock));
            let bytes = bincode::serialize(lock)
                .map_err(|e| LockupError::Serialization(e.to_string()))?;
            plan.lock_puts.push((lock_key(lock.id), bytes));
        }
        for lock in &batch.deletes {
            extend_entries(&mut plan.index_removes, IndexEntries::for_lock(lock));
            plan.lock_removes.push(lock_key(lock.id));
        }
        if let Some(balance) = &batch.module_balance {
            let bytes = bincode::serialize(balance)
                .map_err(|e| LockupError::Serialization(e.to_string()))?;
            plan.meta_puts.push((META_MODULE_BALANCE, bytes));
        }
        if let Some(id) = batch.last_lock_id {
            plan.meta_puts.push((META_LAST_LOCK_ID, id.to_be_bytes().to_vec()));
        }
        Ok(plan)
    }
}

// ── StateDb ───────────────────────────────────────────────────────────────────

/// Persistent lockup state backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   locks           — LockId BE bytes               → bincode(Lock)
///   active_index    — scope ‖ id                    → [] (Active locks)
///   end_time_index  — scope ‖ end_time ‖ id         → [] (Unlocking locks)
///   duration_index  — scope ‖ duration ‖ id         → [] (all locks)
///   meta            — utf8 key bytes                → raw bytes
pub struct StateDb {
    _db: sled::Db,
    locks: sled::Tree,
    active_index: sled::Tree,
    end_time_index: sled::Tree,
    duration_index: sled::Tree,
    meta: sled::Tree,
}

impl StateDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LockupError> {
        let db = sled::open(path).map_err(storage)?;
        let locks          = db.open_tree("locks").map_err(storage)?;
        let active_index   = db.open_tree("active_index").map_err(storage)?;
        let end_time_index = db.open_tree("end_time_index").map_err(storage)?;
        let duration_index = db.open_tree("duration_index").map_err(storage)?;
        let meta           = db.open_tree("meta").map_err(storage)?;
        Ok(Self { _db: db, locks, active_index, end_time_index, duration_index, meta })
    }

    // ── Lock store ────────────────────────────────────────────────────────────

    pub fn get_lock(&self, id: LockId) -> Result<Option<Lock>, LockupError> {
        match self.locks.get(lock_key(id)).map_err(storage)? {
            Some(bytes) => {
                let lock = bincode::deserialize(&bytes)
                    .map_err(|e| LockupError::Serialization(e.to_string()))?;
                Ok(Some(lock))
            }
            None => Ok(None),
        }
    }

    /// Every stored lock, in ascending id order.
    pub fn iter_locks(&self) -> Result<Vec<Lock>, LockupError> {
        let mut out = Vec::new();
        for item in self.locks.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let lock = bincode::deserialize(&bytes)
                .map_err(|e| LockupError::Serialization(e.to_string()))?;
            out.push(lock);
        }
        Ok(out)
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    // ── Meta ──────────────────────────────────────────────────────────────────

    /// Highest lock id ever assigned (`LockId(0)` on a fresh store).
    pub fn last_lock_id(&self) -> Result<LockId, LockupError> {
        match self.meta.get(META_LAST_LOCK_ID.as_bytes()).map_err(storage)? {
            Some(bytes) => {
                let arr = <[u8; 8]>::try_from(&bytes[..]).map_err(|_| {
                    LockupError::Serialization("last_lock_id must be 8 bytes".into())
                })?;
                Ok(LockId::from_be_bytes(arr))
            }
            None => Ok(LockId(0)),
        }
    }

    /// The module balance accumulator.
    pub fn module_balance(&self) -> Result<Coins, LockupError> {
        match self.meta.get(META_MODULE_BALANCE.as_bytes()).map_err(storage)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| LockupError::Serialization(e.to_string())),
            None => Ok(Coins::new()),
        }
    }

    /// True if no lock has ever been created in this store.
    pub fn is_fresh(&self) -> Result<bool, LockupError> {
        Ok(self.locks.is_empty() && self.last_lock_id()? == LockId(0))
    }

    // ── Index scans ───────────────────────────────────────────────────────────

    fn collect_ids<I>(iter: I) -> Result<Vec<LockId>, LockupError>
    where
        I: Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>,
    {
        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(storage)?;
            let id = id_from_index_key(&key)
                .ok_or_else(|| LockupError::Storage("truncated index key".into()))?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Active locks in `scope`, by id.
    pub fn active_ids(&self, scope: &[u8]) -> Result<Vec<LockId>, LockupError> {
        Self::collect_ids(self.active_index.scan_prefix(scope))
    }

    /// Unlocking locks in `scope` with `end_time <= t`, by end time.
    pub fn end_time_ids_at_most(
        &self,
        scope: &[u8],
        t: Timestamp,
    ) -> Result<Vec<LockId>, LockupError> {
        let start = ordinal_lower_bound(scope, Timestamp::MIN);
        let end = ordinal_upper_bound(scope, t);
        Self::collect_ids(self.end_time_index.range(start..=end))
    }

    /// Unlocking locks in `scope` with `end_time > t`, by end time.
    pub fn end_time_ids_after(
        &self,
        scope: &[u8],
        t: Timestamp,
    ) -> Result<Vec<LockId>, LockupError> {
        let Some(next) = t.checked_add(1) else {
            return Ok(Vec::new());
        };
        let start = ordinal_lower_bound(scope, next);
        let end = scope_end(scope);
        Self::collect_ids(self.end_time_index.range(start..=end))
    }

    /// Locks of any status in `scope` with `duration >= d`, by duration.
    pub fn duration_ids_at_least(
        &self,
        scope: &[u8],
        d: DurationSecs,
    ) -> Result<Vec<LockId>, LockupError> {
        let start = ordinal_lower_bound(scope, d);
        let end = scope_end(scope);
        Self::collect_ids(self.duration_index.range(start..=end))
    }

    fn index_tree(&self, kind: IndexKind) -> &sled::Tree {
        match kind {
            IndexKind::Active => &self.active_index,
            IndexKind::EndTime => &self.end_time_index,
            IndexKind::Duration => &self.duration_index,
        }
    }

    pub fn index_contains(&self, kind: IndexKind, key: &[u8]) -> Result<bool, LockupError> {
        self.index_tree(kind).contains_key(key).map_err(storage)
    }

    pub fn index_len(&self, kind: IndexKind) -> usize {
        self.index_tree(kind).len()
    }

    // ── Commit ────────────────────────────────────────────────────────────────

    /// Apply a batch to the store, every index, and the meta tree in one
    /// multi-tree transaction. Either everything lands or nothing does.
    pub fn commit(&self, batch: &StateBatch) -> Result<(), LockupError> {
        let plan = WritePlan::build(batch)?;

        (
            &self.locks,
            &self.active_index,
            &self.end_time_index,
            &self.duration_index,
            &self.meta,
        )
            .transaction(|(locks, active, end_time, duration, meta)| {
                for key in &plan.lock_removes {
                    locks.remove(&key[..])?;
                }
                for (key, bytes) in &plan.lock_puts {
                    locks.insert(&key[..], bytes.as_slice())?;
                }

                for key in &plan.index_removes.active {
                    active.remove(key.as_slice())?;
                }
                for key in &plan.index_removes.end_time {
                    end_time.remove(key.as_slice())?;
                }
                for key in &plan.index_removes.duration {
                    duration.remove(key.as_slice())?;
                }
                for key in &plan.index_inserts.active {
                    active.insert(key.as_slice(), EMPTY)?;
                }
                for key in &plan.index_inserts.end_time {
                    end_time.insert(key.as_slice(), EMPTY)?;
                }
                for key in &plan.index_inserts.duration {
                    duration.insert(key.as_slice(), EMPTY)?;
                }

                for (key, bytes) in &plan.meta_puts {
                    meta.insert(key.as_bytes(), bytes.as_slice())?;
                }
                Ok::<(), ConflictableTransactionError<LockupError>>(())
            })
            .map_err(|e: TransactionError<LockupError>| match e {
                TransactionError::Abort(inner) => inner,
                TransactionError::Storage(e) => storage(e),
            })?;

        debug!(
            puts = plan.lock_puts.len(),
            removes = plan.lock_removes.len(),
            index_inserts = plan.index_inserts.active.len()
                + plan.index_inserts.end_time.len()
                + plan.index_inserts.duration.len(),
            "committed state batch"
        );
        Ok(())
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), LockupError> {
        self._db.flush().map_err(storage)?;
        Ok(())
    }
}

/// Index keys for `lock` — re-exported for invariant checks.
pub fn index_entries(lock: &Lock) -> IndexEntries {
    keys::IndexEntries::for_lock(lock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockup_core::lock::LockStatus;
    use lockup_core::types::AccountId;

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("lockup_db_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    fn lock(id: u64, owner: &str, coins: &str, duration: i64) -> Lock {
        Lock::new(
            LockId(id),
            AccountId::new(owner).unwrap(),
            coins.parse().unwrap(),
            duration,
        )
    }

    #[test]
    fn fresh_store_defaults() {
        let db = temp_db("fresh");
        assert!(db.is_fresh().unwrap());
        assert_eq!(db.last_lock_id().unwrap(), LockId(0));
        assert!(db.module_balance().unwrap().is_empty());
        assert!(db.get_lock(LockId(1)).unwrap().is_none());
    }

    #[test]
    fn commit_writes_lock_indexes_and_meta() {
        let db = temp_db("commit");
        let l = lock(1, "osmo1a", "100uosmo", 60);
        let mut batch = StateBatch::default();
        batch.insert_lock(l.clone());
        batch.set_module_balance(l.coins.clone());
        batch.set_last_lock_id(LockId(1));
        db.commit(&batch).unwrap();

        assert_eq!(db.get_lock(LockId(1)).unwrap(), Some(l.clone()));
        assert_eq!(db.last_lock_id().unwrap(), LockId(1));
        assert_eq!(db.module_balance().unwrap(), l.coins);
        // owner scope + one denom scope
        assert_eq!(db.index_len(IndexKind::Active), 2);
        assert_eq!(db.index_len(IndexKind::Duration), 2);
        assert_eq!(db.index_len(IndexKind::EndTime), 0);
    }

    #[test]
    fn update_moves_entries_between_indexes() {
        let db = temp_db("update");
        let l = lock(1, "osmo1a", "100uosmo", 60);
        let mut batch = StateBatch::default();
        batch.insert_lock(l.clone());
        db.commit(&batch).unwrap();

        let mut unlocking = l.clone();
        unlocking.status = LockStatus::Unlocking { end_time: 500 };
        let mut batch = StateBatch::default();
        batch.update_lock(l, unlocking.clone());
        db.commit(&batch).unwrap();

        assert_eq!(db.index_len(IndexKind::Active), 0);
        assert_eq!(db.index_len(IndexKind::EndTime), 2);
        assert_eq!(db.index_len(IndexKind::Duration), 2);
        for key in index_entries(&unlocking).end_time {
            assert!(db.index_contains(IndexKind::EndTime, &key).unwrap());
        }
    }

    #[test]
    fn range_scans_respect_bounds_and_scope() {
        let db = temp_db("ranges");
        let mut batch = StateBatch::default();
        for (id, owner, end) in [(1, "osmo1a", 100), (2, "osmo1a", 200), (3, "osmo1b", 150)] {
            let mut l = lock(id, owner, "1uosmo", 10 * id as i64);
            l.status = LockStatus::Unlocking { end_time: end };
            batch.insert_lock(l);
        }
        db.commit(&batch).unwrap();

        let a = keys::owner_scope(&AccountId::new("osmo1a").unwrap());
        assert_eq!(db.end_time_ids_at_most(&a, 99).unwrap(), Vec::<LockId>::new());
        assert_eq!(db.end_time_ids_at_most(&a, 100).unwrap(), vec![LockId(1)]);
        assert_eq!(db.end_time_ids_after(&a, 100).unwrap(), vec![LockId(2)]);
        assert_eq!(db.end_time_ids_after(&a, i64::MAX).unwrap(), Vec::<LockId>::new());
        assert_eq!(db.duration_ids_at_least(&a, 15).unwrap(), vec![LockId(2)]);
        assert_eq!(
            db.duration_ids_at_least(&a, 0).unwrap(),
            vec![LockId(1), LockId(2)]
        );
    }

    #[test]
    fn delete_clears_every_index() {
        let db = temp_db("delete");
        let l = lock(1, "osmo1a", "1uatom,1uosmo", 5);
        let mut batch = StateBatch::default();
        batch.insert_lock(l.clone());
        db.commit(&batch).unwrap();

        let mut batch = StateBatch::default();
        batch.delete_lock(l);
        db.commit(&batch).unwrap();

        assert!(db.get_lock(LockId(1)).unwrap().is_none());
        assert_eq!(db.index_len(IndexKind::Active), 0);
        assert_eq!(db.index_len(IndexKind::Duration), 0);
    }
}
