//! Coin bundles: a sorted mapping from denomination to a positive amount.
//!
//! A `Coins` value never stores a zero amount, so two bundles holding the
//! same coins always compare (and serialize) identically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::MAX_DENOM_LEN;
use crate::error::LockupError;
use crate::types::Amount;

#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Amount>", into = "BTreeMap<String, Amount>")]
pub struct Coins(BTreeMap<String, Amount>);

/// Checks a denomination against `[a-zA-Z][a-zA-Z0-9/:._-]{2,127}`.
pub fn validate_denom(denom: &str) -> Result<(), LockupError> {
    let bytes = denom.as_bytes();
    if bytes.len() < 3 || bytes.len() > MAX_DENOM_LEN {
        return Err(LockupError::InvalidCoins(format!(
            "denom {denom:?} must be 3..={MAX_DENOM_LEN} characters"
        )));
    }
    if !bytes[0].is_ascii_alphabetic() {
        return Err(LockupError::InvalidCoins(format!(
            "denom {denom:?} must start with a letter"
        )));
    }
    let ok = bytes[1..]
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b':' | b'.' | b'_' | b'-'));
    if !ok {
        return Err(LockupError::InvalidCoins(format!(
            "denom {denom:?} contains an invalid character"
        )));
    }
    Ok(())
}

impl Coins {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a bundle from `(denom, amount)` pairs. Repeated denoms are
    /// merged; zero amounts and malformed denoms are rejected.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, LockupError>
    where
        I: IntoIterator<Item = (S, Amount)>,
        S: Into<String>,
    {
        let mut map: BTreeMap<String, Amount> = BTreeMap::new();
        for (denom, amount) in pairs {
            let denom = denom.into();
            validate_denom(&denom)?;
            if amount == 0 {
                return Err(LockupError::InvalidCoins(format!(
                    "amount of {denom} must be positive"
                )));
            }
            let slot = map.entry(denom).or_insert(0);
            *slot = slot
                .checked_add(amount)
                .ok_or_else(|| LockupError::InvalidCoins("amount overflow".into()))?;
        }
        Ok(Self(map))
    }

    pub fn single(denom: impl Into<String>, amount: Amount) -> Result<Self, LockupError> {
        Self::from_pairs([(denom.into(), amount)])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct denominations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Amount)> {
        self.0.iter().map(|(d, a)| (d.as_str(), *a))
    }

    pub fn amount_of(&self, denom: &str) -> Amount {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn contains_denom(&self, denom: &str) -> bool {
        self.0.contains_key(denom)
    }

    /// The sub-bundle holding only `denom` (empty if absent).
    pub fn filter_denom(&self, denom: &str) -> Coins {
        match self.0.get_key_value(denom) {
            Some((d, a)) => Coins(BTreeMap::from([(d.clone(), *a)])),
            None => Coins::new(),
        }
    }

    pub fn checked_add(&self, other: &Coins) -> Result<Coins, LockupError> {
        let mut out = self.0.clone();
        for (denom, amount) in &other.0 {
            let slot = out.entry(denom.clone()).or_insert(0);
            *slot = slot
                .checked_add(*amount)
                .ok_or_else(|| LockupError::InvalidCoins(format!("{denom} amount overflow")))?;
        }
        Ok(Coins(out))
    }

    /// Subtract `other`, failing if any denomination would go negative.
    pub fn checked_sub(&self, other: &Coins) -> Result<Coins, LockupError> {
        let mut out = self.0.clone();
        for (denom, amount) in &other.0 {
            let have = out.get(denom).copied().unwrap_or(0);
            let left = have.checked_sub(*amount).ok_or_else(|| {
                LockupError::InvalidCoins(format!(
                    "insufficient {denom}: have {have}, need {amount}"
                ))
            })?;
            if left == 0 {
                out.remove(denom);
            } else {
                out.insert(denom.clone(), left);
            }
        }
        Ok(Coins(out))
    }

    /// True if every denomination in `other` is held in at least that amount.
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other.iter().all(|(d, a)| self.amount_of(d) >= a)
    }

    /// Sum a sequence of bundles.
    pub fn sum<'a, I>(bundles: I) -> Result<Coins, LockupError>
    where
        I: IntoIterator<Item = &'a Coins>,
    {
        bundles
            .into_iter()
            .try_fold(Coins::new(), |acc, c| acc.checked_add(c))
    }
}

impl TryFrom<BTreeMap<String, Amount>> for Coins {
    type Error = LockupError;

    fn try_from(map: BTreeMap<String, Amount>) -> Result<Self, Self::Error> {
        Coins::from_pairs(map)
    }
}

impl From<Coins> for BTreeMap<String, Amount> {
    fn from(c: Coins) -> Self {
        c.0
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (denom, amount) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{amount}{denom}")?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Debug for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coins({self})")
    }
}

/// Parses the `100uosmo,5uatom` form produced by `Display`.
impl FromStr for Coins {
    type Err = LockupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Coins::new());
        }
        let mut pairs = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            let split = part
                .find(|c: char| !c.is_ascii_digit())
                .ok_or_else(|| LockupError::InvalidCoins(format!("missing denom in {part:?}")))?;
            let (num, denom) = part.split_at(split);
            let amount: Amount = num
                .parse()
                .map_err(|e| LockupError::InvalidCoins(format!("bad amount in {part:?}: {e}")))?;
            pairs.push((denom.to_string(), amount));
        }
        Coins::from_pairs(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(s: &str) -> Coins {
        s.parse().unwrap()
    }

    #[test]
    fn parse_merges_and_sorts() {
        let c = coins("5uosmo,10uatom,5uosmo");
        assert_eq!(c.amount_of("uosmo"), 10);
        assert_eq!(c.amount_of("uatom"), 10);
        assert_eq!(c.to_string(), "10uatom,10uosmo");
    }

    #[test]
    fn zero_amount_rejected() {
        assert!(matches!(
            Coins::single("uosmo", 0).unwrap_err(),
            LockupError::InvalidCoins(_)
        ));
    }

    #[test]
    fn bad_denoms_rejected() {
        assert!(validate_denom("u").is_err());
        assert!(validate_denom("1abc").is_err());
        assert!(validate_denom("uo smo").is_err());
        assert!(validate_denom("ibc/27394FB092D2ECCD").is_ok());
        assert!(validate_denom("gamm/pool/1").is_ok());
    }

    #[test]
    fn sub_removes_exhausted_denoms() {
        let left = coins("100uosmo,7uatom").checked_sub(&coins("100uosmo")).unwrap();
        assert_eq!(left, coins("7uatom"));
        assert!(!left.contains_denom("uosmo"));
    }

    #[test]
    fn sub_below_zero_fails() {
        let err = coins("5uosmo").checked_sub(&coins("6uosmo")).unwrap_err();
        assert!(matches!(err, LockupError::InvalidCoins(_)));
        let err = coins("5uosmo").checked_sub(&coins("1uatom")).unwrap_err();
        assert!(matches!(err, LockupError::InvalidCoins(_)));
    }

    #[test]
    fn add_overflow_fails() {
        let max = Coins::single("uosmo", Amount::MAX).unwrap();
        assert!(max.checked_add(&coins("1uosmo")).is_err());
    }

    #[test]
    fn filter_and_gte() {
        let c = coins("3uatom,9uosmo");
        assert_eq!(c.filter_denom("uosmo"), coins("9uosmo"));
        assert!(c.filter_denom("uion").is_empty());
        assert!(c.is_all_gte(&coins("9uosmo,1uatom")));
        assert!(!c.is_all_gte(&coins("10uosmo")));
    }

    #[test]
    fn empty_string_is_empty_bundle() {
        assert!(coins("").is_empty());
        assert_eq!(Coins::new().to_string(), "");
    }

    #[test]
    fn bincode_rejects_zero_entry() {
        let mut raw: BTreeMap<String, Amount> = BTreeMap::new();
        raw.insert("uosmo".into(), 0);
        let bytes = bincode::serialize(&raw).unwrap();
        assert!(bincode::deserialize::<Coins>(&bytes).is_err());
    }

    #[test]
    fn sum_of_bundles() {
        let all = [coins("1uosmo"), coins("2uosmo,3uatom")];
        assert_eq!(Coins::sum(all.iter()).unwrap(), coins("3uosmo,3uatom"));
    }
}
