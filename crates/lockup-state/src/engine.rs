use std::sync::Arc;

use lockup_core::coins::Coins;
use lockup_core::error::LockupError;
use lockup_core::lock::{Lock, LockStatus};
use lockup_core::types::{AccountId, Amount, DurationSecs, LockId, Timestamp};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::db::{index_entries, IndexKind, StateBatch, StateDb};
use crate::keys::{owner_denom_scope, owner_scope};

// ── LockupEngine ──────────────────────────────────────────────────────────────

/// The lockup ledger.
///
/// Mutations validate first and then commit the lock store, all three
/// indices, and the module balance in a single transaction. The host must
/// apply mutations one at a time; reads may run concurrently with each other.
pub struct LockupEngine {
    pub db: Arc<StateDb>,
    config: EngineConfig,
}

impl LockupEngine {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self::with_config(db, EngineConfig::default())
    }

    pub fn with_config(db: Arc<StateDb>, config: EngineConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Mutations ─────────────────────────────────────────────────────────────

    /// Lock `coins` for `owner`. The new lock is Active; its `duration`
    /// starts counting only once unlocking begins.
    pub fn deposit(
        &self,
        owner: &AccountId,
        coins: Coins,
        duration: DurationSecs,
    ) -> Result<LockId, LockupError> {
        if coins.is_empty() {
            return Err(LockupError::InvalidArgument("coins must not be empty".into()));
        }
        if coins.len() > self.config.max_denoms_per_lock {
            return Err(LockupError::InvalidArgument(format!(
                "lock holds {} denoms; maximum is {}",
                coins.len(),
                self.config.max_denoms_per_lock
            )));
        }
        if duration < 0 {
            return Err(LockupError::InvalidArgument(format!(
                "duration must be non-negative, got {duration}"
            )));
        }
        if duration > self.config.max_lock_duration {
            return Err(LockupError::InvalidArgument(format!(
                "duration {duration}s exceeds maximum of {}s",
                self.config.max_lock_duration
            )));
        }

        let last = self.db.last_lock_id()?;
        let id = last.next().ok_or_else(|| {
            LockupError::Invariant(format!("lock id sequence exhausted at {last}"))
        })?;
        let balance = self.db.module_balance()?.checked_add(&coins)?;
        let lock = Lock::new(id, owner.clone(), coins, duration);

        let mut batch = StateBatch::default();
        batch.insert_lock(lock.clone());
        batch.set_module_balance(balance);
        batch.set_last_lock_id(id);
        self.db.commit(&batch)?;

        info!(lock_id = %id, owner = %owner, coins = %lock.coins, duration, "deposited lock");
        Ok(id)
    }

    /// Start the unlock countdown. Returns the end time, `now + duration`.
    pub fn begin_unlock(&self, id: LockId, now: Timestamp) -> Result<Timestamp, LockupError> {
        let lock = self.load(id)?;
        if !lock.is_active() {
            return Err(LockupError::InvalidState {
                id,
                status: lock.status.label().to_string(),
            });
        }
        let end_time = now.checked_add(lock.duration).ok_or_else(|| {
            LockupError::InvalidArgument(format!(
                "end time overflows: {now} + {}",
                lock.duration
            ))
        })?;

        let mut unlocking = lock.clone();
        unlocking.status = LockStatus::Unlocking { end_time };

        let mut batch = StateBatch::default();
        batch.update_lock(lock, unlocking);
        self.db.commit(&batch)?;

        info!(lock_id = %id, end_time, "began unlocking");
        Ok(end_time)
    }

    /// Release a lock whose end time has been reached. Returns the coins for
    /// the caller to transfer back to the owner.
    pub fn finish_unlock(&self, id: LockId, now: Timestamp) -> Result<Coins, LockupError> {
        let lock = self.load(id)?;
        let end_time = match lock.status {
            LockStatus::Active => {
                return Err(LockupError::InvalidState {
                    id,
                    status: lock.status.label().to_string(),
                })
            }
            LockStatus::Unlocking { end_time } => end_time,
        };
        if now < end_time {
            return Err(LockupError::NotReady { id, end_time, now });
        }

        let coins = self.release(lock)?;
        info!(lock_id = %id, coins = %coins, "finished unlocking");
        Ok(coins)
    }

    /// Release a lock immediately regardless of status or end time.
    /// Authorization is the caller's responsibility.
    pub fn force_unlock(&self, id: LockId) -> Result<Coins, LockupError> {
        let lock = self.load(id)?;
        let status = lock.status;
        let coins = self.release(lock)?;
        warn!(lock_id = %id, %status, coins = %coins, "force unlocked");
        Ok(coins)
    }

    fn release(&self, lock: Lock) -> Result<Coins, LockupError> {
        let balance = self
            .db
            .module_balance()?
            .checked_sub(&lock.coins)
            .map_err(|e| {
                LockupError::Invariant(format!("module balance short for lock {}: {e}", lock.id))
            })?;
        let coins = lock.coins.clone();

        let mut batch = StateBatch::default();
        batch.delete_lock(lock);
        batch.set_module_balance(balance);
        self.db.commit(&batch)?;
        Ok(coins)
    }

    // ── Lookups ───────────────────────────────────────────────────────────────

    fn load(&self, id: LockId) -> Result<Lock, LockupError> {
        self.db.get_lock(id)?.ok_or(LockupError::NotFound(id))
    }

    /// Fetch locks named by an index scan, ordered by id.
    fn load_all(&self, mut ids: Vec<LockId>) -> Result<Vec<Lock>, LockupError> {
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .map(|id| {
                self.db.get_lock(id)?.ok_or_else(|| {
                    LockupError::Invariant(format!("index references missing lock {id}"))
                })
            })
            .collect()
    }

    fn sum_coins(locks: &[Lock]) -> Result<Coins, LockupError> {
        Coins::sum(locks.iter().map(|l| &l.coins))
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Total coins held across every lock.
    pub fn module_balance(&self) -> Result<Coins, LockupError> {
        self.db.module_balance()
    }

    pub fn module_locked_amount(&self, denom: &str) -> Result<Amount, LockupError> {
        Ok(self.db.module_balance()?.amount_of(denom))
    }

    pub fn locked_by_id(&self, id: LockId) -> Result<Lock, LockupError> {
        self.load(id)
    }

    /// Every lock held by `owner`, any status.
    pub fn account_locks(&self, owner: &AccountId) -> Result<Vec<Lock>, LockupError> {
        let ids = self
            .db
            .duration_ids_at_least(&owner_scope(owner), DurationSecs::MIN)?;
        self.load_all(ids)
    }

    /// Sum over the owner's unlocking locks with `end_time <= now`.
    pub fn account_unlockable_coins(
        &self,
        owner: &AccountId,
        now: Timestamp,
    ) -> Result<Coins, LockupError> {
        Self::sum_coins(&self.account_unlocked_before_time(owner, now)?)
    }

    /// Sum over the owner's active locks and unlocking locks not yet
    /// releasable at `now`.
    pub fn account_locked_coins(
        &self,
        owner: &AccountId,
        now: Timestamp,
    ) -> Result<Coins, LockupError> {
        Self::sum_coins(&self.account_locked_past_time(owner, now)?)
    }

    /// Locks still held after `t`: all active locks plus unlocking locks
    /// with `end_time > t`.
    pub fn account_locked_past_time(
        &self,
        owner: &AccountId,
        t: Timestamp,
    ) -> Result<Vec<Lock>, LockupError> {
        self.locked_past_time_in(&owner_scope(owner), t)
    }

    /// Unlocking locks with `end_time <= t`.
    pub fn account_unlocked_before_time(
        &self,
        owner: &AccountId,
        t: Timestamp,
    ) -> Result<Vec<Lock>, LockupError> {
        let ids = self.db.end_time_ids_at_most(&owner_scope(owner), t)?;
        self.load_all(ids)
    }

    pub fn account_locked_past_time_denom(
        &self,
        owner: &AccountId,
        denom: &str,
        t: Timestamp,
    ) -> Result<Vec<Lock>, LockupError> {
        self.locked_past_time_in(&owner_denom_scope(owner, denom), t)
    }

    fn locked_past_time_in(&self, scope: &[u8], t: Timestamp) -> Result<Vec<Lock>, LockupError> {
        let mut ids = self.db.active_ids(scope)?;
        ids.extend(self.db.end_time_ids_after(scope, t)?);
        self.load_all(ids)
    }

    /// Locks of any status whose configured duration is at least `d`.
    pub fn account_locked_longer_than_duration(
        &self,
        owner: &AccountId,
        d: DurationSecs,
    ) -> Result<Vec<Lock>, LockupError> {
        let ids = self.db.duration_ids_at_least(&owner_scope(owner), d)?;
        self.load_all(ids)
    }

    pub fn account_locked_longer_than_duration_denom(
        &self,
        owner: &AccountId,
        denom: &str,
        d: DurationSecs,
    ) -> Result<Vec<Lock>, LockupError> {
        let ids = self
            .db
            .duration_ids_at_least(&owner_denom_scope(owner, denom), d)?;
        self.load_all(ids)
    }

    pub fn last_lock_id(&self) -> Result<LockId, LockupError> {
        self.db.last_lock_id()
    }

    // ── Audit ─────────────────────────────────────────────────────────────────

    /// Recompute the module balance from the store and verify that every lock
    /// sits in exactly the index entries its status calls for.
    pub fn check_invariants(&self) -> Result<(), LockupError> {
        let locks = self.db.iter_locks()?;
        let last = self.db.last_lock_id()?;

        let mut expected = (0usize, 0usize, 0usize);
        for lock in &locks {
            if lock.coins.is_empty() {
                return Err(LockupError::Invariant(format!("lock {} holds no coins", lock.id)));
            }
            if lock.id > last {
                return Err(LockupError::Invariant(format!(
                    "lock {} above last assigned id {last}",
                    lock.id
                )));
            }
            let entries = index_entries(lock);
            for (kind, keys) in [
                (IndexKind::Active, &entries.active),
                (IndexKind::EndTime, &entries.end_time),
                (IndexKind::Duration, &entries.duration),
            ] {
                for key in keys {
                    if !self.db.index_contains(kind, key)? {
                        return Err(LockupError::Invariant(format!(
                            "lock {} missing from {kind:?} index",
                            lock.id
                        )));
                    }
                }
            }
            expected.0 += entries.active.len();
            expected.1 += entries.end_time.len();
            expected.2 += entries.duration.len();
        }

        let actual = (
            self.db.index_len(IndexKind::Active),
            self.db.index_len(IndexKind::EndTime),
            self.db.index_len(IndexKind::Duration),
        );
        if actual != expected {
            return Err(LockupError::Invariant(format!(
                "index sizes {actual:?} do not match locks {expected:?}"
            )));
        }

        let recomputed = Self::sum_coins(&locks)?;
        let balance = self.db.module_balance()?;
        if recomputed != balance {
            return Err(LockupError::Invariant(format!(
                "module balance {balance} != sum of locks {recomputed}"
            )));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const T: Timestamp = 1_700_000_000;

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("lockup_engine_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    fn engine(name: &str) -> LockupEngine {
        LockupEngine::new(Arc::new(temp_db(name)))
    }

    fn owner(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn coins(s: &str) -> Coins {
        s.parse().unwrap()
    }

    fn ids(locks: &[Lock]) -> Vec<u64> {
        locks.iter().map(|l| l.id.0).collect()
    }

    // ── Deposit ───────────────────────────────────────────────────────────────

    #[test]
    fn deposit_assigns_sequential_ids() {
        let e = engine("dep_seq");
        let a = owner("osmo1a");
        assert_eq!(e.deposit(&a, coins("1uosmo"), 10).unwrap(), LockId(1));
        assert_eq!(e.deposit(&a, coins("1uosmo"), 10).unwrap(), LockId(2));
        assert_eq!(e.last_lock_id().unwrap(), LockId(2));
    }

    #[test]
    fn deposit_rejects_empty_coins() {
        let e = engine("dep_empty");
        let err = e.deposit(&owner("osmo1a"), Coins::new(), 10).unwrap_err();
        assert!(matches!(err, LockupError::InvalidArgument(_)));
        assert_eq!(e.last_lock_id().unwrap(), LockId(0));
    }

    #[test]
    fn deposit_rejects_negative_duration() {
        let e = engine("dep_neg");
        let err = e.deposit(&owner("osmo1a"), coins("1uosmo"), -1).unwrap_err();
        assert!(matches!(err, LockupError::InvalidArgument(_)));
        assert!(e.module_balance().unwrap().is_empty());
    }

    #[test]
    fn deposit_rejects_excessive_duration_and_denoms() {
        let db = Arc::new(temp_db("dep_limits"));
        let e = LockupEngine::with_config(
            db,
            EngineConfig { max_lock_duration: 100, max_denoms_per_lock: 1 },
        );
        let a = owner("osmo1a");
        assert!(matches!(
            e.deposit(&a, coins("1uosmo"), 101).unwrap_err(),
            LockupError::InvalidArgument(_)
        ));
        assert!(matches!(
            e.deposit(&a, coins("1uosmo,1uatom"), 10).unwrap_err(),
            LockupError::InvalidArgument(_)
        ));
        e.deposit(&a, coins("1uosmo"), 100).unwrap();
    }

    #[test]
    fn deposit_then_lookup_is_active() {
        let e = engine("dep_lookup");
        let id = e.deposit(&owner("osmo1a"), coins("100uosmo"), 3600).unwrap();
        let lock = e.locked_by_id(id).unwrap();
        assert_eq!(lock.status, LockStatus::Active);
        assert_eq!(lock.end_time(), None);
        assert_eq!(lock.coins, coins("100uosmo"));
    }

    // ── BeginUnlock ───────────────────────────────────────────────────────────

    #[test]
    fn begin_unlock_sets_end_time() {
        let e = engine("begin");
        let id = e.deposit(&owner("osmo1a"), coins("100uosmo"), 3600).unwrap();
        assert_eq!(e.begin_unlock(id, T).unwrap(), T + 3600);
        let lock = e.locked_by_id(id).unwrap();
        assert_eq!(lock.status, LockStatus::Unlocking { end_time: T + 3600 });
        e.check_invariants().unwrap();
    }

    #[test]
    fn begin_unlock_twice_is_invalid_state() {
        let e = engine("begin_twice");
        let id = e.deposit(&owner("osmo1a"), coins("1uosmo"), 10).unwrap();
        e.begin_unlock(id, T).unwrap();
        let err = e.begin_unlock(id, T + 1).unwrap_err();
        assert!(matches!(err, LockupError::InvalidState { .. }));
        assert_eq!(e.locked_by_id(id).unwrap().end_time(), Some(T + 10));
    }

    #[test]
    fn begin_unlock_unknown_lock() {
        let e = engine("begin_missing");
        assert!(matches!(
            e.begin_unlock(LockId(9), T).unwrap_err(),
            LockupError::NotFound(LockId(9))
        ));
    }

    #[test]
    fn begin_unlock_overflow_rejected() {
        let e = engine("begin_overflow");
        let id = e.deposit(&owner("osmo1a"), coins("1uosmo"), 10).unwrap();
        assert!(matches!(
            e.begin_unlock(id, i64::MAX - 5).unwrap_err(),
            LockupError::InvalidArgument(_)
        ));
        assert!(e.locked_by_id(id).unwrap().is_active());
    }

    // ── FinishUnlock / ForceUnlock ────────────────────────────────────────────

    #[test]
    fn finish_unlock_boundary() {
        let e = engine("finish_boundary");
        let id = e.deposit(&owner("osmo1a"), coins("100uosmo"), 3600).unwrap();
        assert_eq!(e.module_balance().unwrap(), coins("100uosmo"));
        let end = e.begin_unlock(id, T).unwrap();

        let err = e.finish_unlock(id, end - 1).unwrap_err();
        assert!(matches!(err, LockupError::NotReady { .. }));
        assert!(err.is_retryable());

        assert_eq!(e.finish_unlock(id, end).unwrap(), coins("100uosmo"));
        assert!(e.module_balance().unwrap().is_empty());
        assert!(matches!(e.locked_by_id(id).unwrap_err(), LockupError::NotFound(_)));
        e.check_invariants().unwrap();
    }

    #[test]
    fn finish_unlock_active_lock_rejected() {
        let e = engine("finish_active");
        let id = e.deposit(&owner("osmo1a"), coins("1uosmo"), 0).unwrap();
        assert!(matches!(
            e.finish_unlock(id, T).unwrap_err(),
            LockupError::InvalidState { .. }
        ));
    }

    #[test]
    fn zero_duration_releasable_immediately() {
        let e = engine("zero_duration");
        let id = e.deposit(&owner("osmo1a"), coins("1uosmo"), 0).unwrap();
        let end = e.begin_unlock(id, T).unwrap();
        assert_eq!(end, T);
        assert_eq!(e.finish_unlock(id, T).unwrap(), coins("1uosmo"));
    }

    #[test]
    fn force_unlock_any_status() {
        let e = engine("force");
        let a = owner("osmo1a");
        let active = e.deposit(&a, coins("5uosmo"), 100).unwrap();
        let unlocking = e.deposit(&a, coins("7uatom"), 100).unwrap();
        e.begin_unlock(unlocking, T).unwrap();

        assert_eq!(e.force_unlock(active).unwrap(), coins("5uosmo"));
        assert_eq!(e.force_unlock(unlocking).unwrap(), coins("7uatom"));
        assert!(e.module_balance().unwrap().is_empty());
        assert!(matches!(
            e.force_unlock(active).unwrap_err(),
            LockupError::NotFound(_)
        ));
        e.check_invariants().unwrap();
    }

    #[test]
    fn ids_not_reused_after_release() {
        let e = engine("no_reuse");
        let a = owner("osmo1a");
        let first = e.deposit(&a, coins("1uosmo"), 0).unwrap();
        e.force_unlock(first).unwrap();
        assert_eq!(e.deposit(&a, coins("1uosmo"), 0).unwrap(), LockId(2));
    }

    #[test]
    fn deposit_fails_cleanly_when_ids_exhausted() {
        let db = Arc::new(temp_db("dep_exhausted"));
        let mut batch = StateBatch::default();
        batch.set_last_lock_id(LockId(u64::MAX));
        db.commit(&batch).unwrap();
        let e = LockupEngine::new(Arc::clone(&db));

        let err = e.deposit(&owner("osmo1a"), coins("1uosmo"), 1).unwrap_err();
        assert!(matches!(err, LockupError::Invariant(_)));
        assert_eq!(e.last_lock_id().unwrap(), LockId(u64::MAX));
        assert!(e.module_balance().unwrap().is_empty());
        assert_eq!(db.lock_count(), 0);
        e.check_invariants().unwrap();
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    #[test]
    fn longer_than_duration_filters() {
        let e = engine("q_duration");
        let a = owner("osmo1a");
        e.deposit(&a, coins("1uosmo"), 10).unwrap();
        let long = e.deposit(&a, coins("2uosmo"), 20).unwrap();
        e.deposit(&owner("osmo1b"), coins("3uosmo"), 30).unwrap();

        assert_eq!(ids(&e.account_locked_longer_than_duration(&a, 15).unwrap()), vec![long.0]);
        assert_eq!(ids(&e.account_locked_longer_than_duration(&a, 0).unwrap()), vec![1, 2]);
        assert!(e.account_locked_longer_than_duration(&a, 21).unwrap().is_empty());

        // unlocking keeps its configured duration in the index
        e.begin_unlock(long, T).unwrap();
        assert_eq!(ids(&e.account_locked_longer_than_duration(&a, 20).unwrap()), vec![2]);
    }

    #[test]
    fn time_queries_split_locks() {
        let e = engine("q_time");
        let a = owner("osmo1a");
        let active = e.deposit(&a, coins("1uosmo"), 100).unwrap();
        let early = e.deposit(&a, coins("2uosmo"), 10).unwrap();
        let late = e.deposit(&a, coins("4uatom"), 50).unwrap();
        e.begin_unlock(early, T).unwrap();
        e.begin_unlock(late, T).unwrap();

        let at = T + 10;
        assert_eq!(ids(&e.account_unlocked_before_time(&a, at).unwrap()), vec![early.0]);
        assert_eq!(
            ids(&e.account_locked_past_time(&a, at).unwrap()),
            vec![active.0, late.0]
        );
        assert_eq!(e.account_unlockable_coins(&a, at).unwrap(), coins("2uosmo"));
        assert_eq!(e.account_locked_coins(&a, at).unwrap(), coins("1uosmo,4uatom"));
        assert_eq!(
            ids(&e.account_locked_past_time_denom(&a, "uosmo", at).unwrap()),
            vec![active.0]
        );
        assert_eq!(
            ids(&e.account_locked_past_time_denom(&a, "uatom", at).unwrap()),
            vec![late.0]
        );
    }

    #[test]
    fn denom_duration_query() {
        let e = engine("q_denom_duration");
        let a = owner("osmo1a");
        e.deposit(&a, coins("1uosmo"), 10).unwrap();
        let mixed = e.deposit(&a, coins("1uosmo,1uatom"), 20).unwrap();
        e.deposit(&a, coins("1uatom"), 5).unwrap();

        assert_eq!(
            ids(&e.account_locked_longer_than_duration_denom(&a, "uatom", 10).unwrap()),
            vec![mixed.0]
        );
        assert_eq!(
            ids(&e.account_locked_longer_than_duration_denom(&a, "uosmo", 0).unwrap()),
            vec![1, 2]
        );
        assert!(e
            .account_locked_longer_than_duration_denom(&a, "uion", 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn module_locked_amount_by_denom() {
        let e = engine("q_module");
        e.deposit(&owner("osmo1a"), coins("10uosmo"), 1).unwrap();
        e.deposit(&owner("osmo1b"), coins("5uosmo,3uatom"), 1).unwrap();
        assert_eq!(e.module_locked_amount("uosmo").unwrap(), 15);
        assert_eq!(e.module_locked_amount("uatom").unwrap(), 3);
        assert_eq!(e.module_locked_amount("uion").unwrap(), 0);
        assert_eq!(e.module_balance().unwrap(), coins("15uosmo,3uatom"));
    }

    #[test]
    fn account_locks_lists_owner_only() {
        let e = engine("q_list");
        let a = owner("osmo1a");
        e.deposit(&a, coins("1uosmo"), 1).unwrap();
        e.deposit(&owner("osmo1ab"), coins("1uosmo"), 1).unwrap();
        e.deposit(&a, coins("1uatom"), 1).unwrap();
        assert_eq!(ids(&e.account_locks(&a).unwrap()), vec![1, 3]);
    }
}
