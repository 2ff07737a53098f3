//! QuotaStore port.

use std::fmt;

use async_trait::async_trait;

use crate::domain::Quota;
use crate::ports::StoreError;

/// Whose capacity is being counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuotaSubject {
    /// Units of one app. Stored inside the app document.
    App(String),
    /// Apps of one owner, keyed by email.
    Owner(String),
}

impl fmt::Display for QuotaSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App(name) => write!(f, "app:{name}"),
            Self::Owner(email) => write!(f, "owner:{email}"),
        }
    }
}

#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// One atomic conditional increment: succeeds only if
    /// `in_use + n <= limit`, otherwise `StoreError::QuotaExceeded`.
    async fn reserve(&self, subject: &QuotaSubject, n: u64) -> Result<(), StoreError>;

    /// Decrement floored at zero.
    async fn release(&self, subject: &QuotaSubject, n: u64) -> Result<(), StoreError>;

    async fn quota(&self, subject: &QuotaSubject) -> Result<Quota, StoreError>;

    async fn set_limit(&self, subject: &QuotaSubject, limit: i64) -> Result<(), StoreError>;

    /// Create an owner entry with `limit` unless one exists.
    async fn ensure_owner(&self, email: &str, limit: i64) -> Result<(), StoreError>;
}
