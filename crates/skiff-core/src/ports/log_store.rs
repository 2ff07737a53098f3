//! LogStore port: append-only per-app log collection.

use async_trait::async_trait;

use crate::domain::{Applog, LogFilter};
use crate::ports::StoreError;

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append records in the given order.
    async fn append(&self, app: &str, records: Vec<Applog>) -> Result<(), StoreError>;

    /// Up to `limit` most recent matching records, oldest first. Empty when
    /// the app has none.
    async fn last(
        &self,
        app: &str,
        limit: usize,
        filter: &LogFilter,
    ) -> Result<Vec<Applog>, StoreError>;

    async fn remove_all(&self, app: &str) -> Result<(), StoreError>;
}
