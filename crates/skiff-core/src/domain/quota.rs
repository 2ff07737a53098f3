//! Capacity ledger values.
//!
//! A `Quota` is a limit plus an in-use counter. The arithmetic lives here so
//! every store backend applies the same conditional-increment rule inside its
//! own atomic section.

use serde::{Deserialize, Serialize};

/// Limit value meaning "no limit".
pub const UNLIMITED: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub limit: i64,
    #[serde(rename = "inuse")]
    pub in_use: i64,
}

/// A reservation that would overflow the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exceeded {
    pub available: u64,
    pub requested: u64,
}

impl Quota {
    pub fn unlimited() -> Self {
        Self {
            limit: UNLIMITED,
            in_use: 0,
        }
    }

    pub fn limited(limit: i64) -> Self {
        Self { limit, in_use: 0 }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit < 0
    }

    /// Remaining capacity, `None` when unlimited.
    pub fn available(&self) -> Option<u64> {
        if self.is_unlimited() {
            None
        } else {
            Some((self.limit - self.in_use).max(0) as u64)
        }
    }

    /// Increment `in_use` by `n` only if the result stays within the limit.
    ///
    /// Unlimited quotas always succeed and still count usage, so a later
    /// switch to a finite limit starts from the real number.
    pub fn try_reserve(&mut self, n: u64) -> Result<(), Exceeded> {
        let exceeded = Exceeded {
            available: self.available().unwrap_or(0),
            requested: n,
        };
        let next = i64::try_from(n)
            .ok()
            .and_then(|requested| self.in_use.checked_add(requested))
            .ok_or(exceeded)?;
        if !self.is_unlimited() && next > self.limit {
            return Err(exceeded);
        }
        self.in_use = next;
        Ok(())
    }

    /// Decrement `in_use` by `n`, floored at zero.
    pub fn release(&mut self, n: u64) {
        self.in_use = i64::try_from(n)
            .ok()
            .and_then(|released| self.in_use.checked_sub(released))
            .map_or(0, |left| left.max(0));
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_within_limit_increments() {
        let mut quota = Quota::limited(5);
        quota.try_reserve(3).unwrap();
        quota.try_reserve(2).unwrap();
        assert_eq!(quota.in_use, 5);
        assert_eq!(quota.available(), Some(0));
    }

    #[test]
    fn reserve_over_limit_leaves_counter_untouched() {
        let mut quota = Quota::limited(5);
        quota.try_reserve(4).unwrap();

        let err = quota.try_reserve(2).unwrap_err();
        assert_eq!(
            err,
            Exceeded {
                available: 1,
                requested: 2
            }
        );
        assert_eq!(quota.in_use, 4);
    }

    #[test]
    fn unlimited_always_succeeds() {
        let mut quota = Quota::unlimited();
        quota.try_reserve(1_000).unwrap();
        assert_eq!(quota.available(), None);
        assert_eq!(quota.in_use, 1_000);
    }

    #[test]
    fn release_floors_at_zero() {
        let mut quota = Quota::limited(3);
        quota.try_reserve(1).unwrap();
        quota.release(4);
        assert_eq!(quota.in_use, 0);
    }

    #[test]
    fn huge_reservation_is_refused_without_touching_the_counter() {
        let mut quota = Quota::limited(2);
        let err = quota.try_reserve(u64::MAX).unwrap_err();
        assert_eq!(
            err,
            Exceeded {
                available: 2,
                requested: u64::MAX
            }
        );
        assert_eq!(quota.in_use, 0);
    }

    #[test]
    fn reservation_that_would_overflow_is_refused() {
        let mut quota = Quota::limited(5);
        quota.try_reserve(1).unwrap();
        let err = quota.try_reserve(i64::MAX as u64).unwrap_err();
        assert_eq!(err.available, 4);
        assert_eq!(quota.in_use, 1);

        let mut open = Quota::unlimited();
        open.try_reserve(1).unwrap();
        assert!(open.try_reserve(i64::MAX as u64).is_err());
        assert!(open.try_reserve(u64::MAX).is_err());
        assert_eq!(open.in_use, 1);
    }

    #[test]
    fn huge_release_floors_at_zero() {
        let mut quota = Quota::limited(5);
        quota.try_reserve(3).unwrap();
        quota.release(u64::MAX);
        assert_eq!(quota.in_use, 0);

        quota.try_reserve(3).unwrap();
        quota.release(i64::MAX as u64);
        assert_eq!(quota.in_use, 0);
    }
}
