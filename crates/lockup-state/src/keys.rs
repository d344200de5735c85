//! Composite key encoding for the index trees.
//!
//! Every index key starts with a *scope*: either the owner alone or the
//! owner plus one denomination. Length prefixes keep scopes prefix-free, and
//! fixed-width big-endian suffixes keep sled's byte order equal to the
//! numeric order of (time, id).
//!
//!   active_index    scope ‖ id
//!   end_time_index  scope ‖ end_time ‖ id
//!   duration_index  scope ‖ duration ‖ id

use lockup_core::lock::Lock;
use lockup_core::types::{AccountId, LockId};

const SCOPE_OWNER: u8 = 0x01;
const SCOPE_OWNER_DENOM: u8 = 0x02;

/// Width of the (ordinal, id) suffix on time-ordered keys.
pub const TIME_SUFFIX_LEN: usize = 16;

pub fn lock_key(id: LockId) -> [u8; 8] {
    id.to_be_bytes()
}

/// Order-preserving encoding of a signed value: flip the sign bit.
pub fn encode_ordinal(v: i64) -> [u8; 8] {
    ((v as u64) ^ (1 << 63)).to_be_bytes()
}

fn push_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    // Owners and denoms are capped well below u16::MAX on construction.
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
}

pub fn owner_scope(owner: &AccountId) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + owner.as_bytes().len());
    out.push(SCOPE_OWNER);
    push_len_prefixed(&mut out, owner.as_bytes());
    out
}

pub fn owner_denom_scope(owner: &AccountId, denom: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + owner.as_bytes().len() + denom.len());
    out.push(SCOPE_OWNER_DENOM);
    push_len_prefixed(&mut out, owner.as_bytes());
    push_len_prefixed(&mut out, denom.as_bytes());
    out
}

/// All scopes a lock is indexed under: its owner, and owner+denom for each
/// denomination it holds.
pub fn scopes_for(lock: &Lock) -> Vec<Vec<u8>> {
    let mut scopes = Vec::with_capacity(1 + lock.coins.len());
    scopes.push(owner_scope(&lock.owner));
    for denom in lock.coins.denoms() {
        scopes.push(owner_denom_scope(&lock.owner, denom));
    }
    scopes
}

pub fn active_key(scope: &[u8], id: LockId) -> Vec<u8> {
    let mut k = Vec::with_capacity(scope.len() + 8);
    k.extend_from_slice(scope);
    k.extend_from_slice(&id.to_be_bytes());
    k
}

pub fn ordinal_key(scope: &[u8], ordinal: i64, id: LockId) -> Vec<u8> {
    let mut k = Vec::with_capacity(scope.len() + TIME_SUFFIX_LEN);
    k.extend_from_slice(scope);
    k.extend_from_slice(&encode_ordinal(ordinal));
    k.extend_from_slice(&id.to_be_bytes());
    k
}

/// Smallest key in `scope` whose ordinal is `>= ordinal`.
pub fn ordinal_lower_bound(scope: &[u8], ordinal: i64) -> Vec<u8> {
    ordinal_key(scope, ordinal, LockId(0))
}

/// Largest key in `scope` whose ordinal is `<= ordinal`.
pub fn ordinal_upper_bound(scope: &[u8], ordinal: i64) -> Vec<u8> {
    ordinal_key(scope, ordinal, LockId(u64::MAX))
}

/// Largest possible key in `scope`.
pub fn scope_end(scope: &[u8]) -> Vec<u8> {
    let mut k = scope.to_vec();
    k.extend_from_slice(&[0xff; TIME_SUFFIX_LEN]);
    k
}

/// The lock id carried in the last eight bytes of any index key.
pub fn id_from_index_key(key: &[u8]) -> Option<LockId> {
    let tail = key.len().checked_sub(8).map(|start| &key[start..])?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(tail);
    Some(LockId::from_be_bytes(arr))
}

/// Index keys a lock occupies in its current status.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexEntries {
    pub active: Vec<Vec<u8>>,
    pub end_time: Vec<Vec<u8>>,
    pub duration: Vec<Vec<u8>>,
}

impl IndexEntries {
    pub fn for_lock(lock: &Lock) -> Self {
        let mut entries = IndexEntries::default();
        for scope in scopes_for(lock) {
            match lock.end_time() {
                None => entries.active.push(active_key(&scope, lock.id)),
                Some(end) => entries.end_time.push(ordinal_key(&scope, end, lock.id)),
            }
            entries
                .duration
                .push(ordinal_key(&scope, lock.duration, lock.id));
        }
        entries
    }
}
