//! Quota ledger: reserve/release on top of the store's atomic counter.

use std::sync::Arc;

use tracing::error;

use crate::domain::{CoreError, Quota};
use crate::ports::{QuotaStore, QuotaSubject};

#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn QuotaStore>,
    /// Limit for owners seen for the first time.
    owner_limit: i64,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn QuotaStore>, owner_limit: i64) -> Self {
        Self { store, owner_limit }
    }

    /// Atomically take `n` from the subject's capacity.
    pub async fn reserve(&self, subject: &QuotaSubject, n: u64) -> Result<(), CoreError> {
        if n == 0 {
            return Err(CoreError::validation("Cannot reserve zero units."));
        }
        if let QuotaSubject::Owner(email) = subject {
            self.store.ensure_owner(email, self.owner_limit).await?;
        }
        self.store.reserve(subject, n).await?;
        Ok(())
    }

    /// Give back `n`. In-use never drops below zero.
    pub async fn release(&self, subject: &QuotaSubject, n: u64) -> Result<(), CoreError> {
        if n == 0 {
            return Err(CoreError::validation("Cannot release zero units."));
        }
        self.store.release(subject, n).await?;
        Ok(())
    }

    pub async fn quota(&self, subject: &QuotaSubject) -> Result<Quota, CoreError> {
        Ok(self.store.quota(subject).await?)
    }

    pub async fn set_limit(&self, subject: &QuotaSubject, limit: i64) -> Result<(), CoreError> {
        Ok(self.store.set_limit(subject, limit).await?)
    }

    /// Undo a reservation after a failed side effect. Failures are logged and
    /// swallowed so the original error reaches the caller.
    pub(crate) async fn compensate(&self, subject: &QuotaSubject, n: u64) {
        if let Err(err) = self.release(subject, n).await {
            error!(subject = %subject, units = n, error = %err, "failed to release quota reservation");
        }
    }
}
