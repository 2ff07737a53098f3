//! In-memory log collection, one append-only vector per app.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Applog, LogFilter};
use crate::ports::{LogStore, StoreError};

#[derive(Clone, Default)]
pub struct InMemoryLogStore {
    logs: Arc<Mutex<HashMap<String, Vec<Applog>>>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored for `app`.
    pub async fn count(&self, app: &str) -> usize {
        self.logs.lock().await.get(app).map_or(0, Vec::len)
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn append(&self, app: &str, records: Vec<Applog>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut logs = self.logs.lock().await;
        logs.entry(app.to_string()).or_default().extend(records);
        Ok(())
    }

    async fn last(
        &self,
        app: &str,
        limit: usize,
        filter: &LogFilter,
    ) -> Result<Vec<Applog>, StoreError> {
        let logs = self.logs.lock().await;
        let Some(all) = logs.get(app) else {
            return Ok(Vec::new());
        };
        let mut window: Vec<Applog> = all
            .iter()
            .rev()
            .filter(|log| filter.matches(log))
            .take(limit)
            .cloned()
            .collect();
        window.reverse();
        Ok(window)
    }

    async fn remove_all(&self, app: &str) -> Result<(), StoreError> {
        self.logs.lock().await.remove(app);
        Ok(())
    }
}
