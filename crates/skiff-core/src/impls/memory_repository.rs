//! In-memory repository host.
//!
//! Tracks repository names and their allowed users. A single armed error
//! can be injected with `fail_next` to exercise rollback paths.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::{RepositoryError, RepositoryManager};

#[derive(Clone, Default)]
pub struct InMemoryRepositoryManager {
    repos: Arc<Mutex<HashMap<String, Vec<String>>>>,
    failing: Arc<Mutex<Option<RepositoryError>>>,
}

impl InMemoryRepositoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next create or remove call fail with `err`.
    pub async fn fail_next(&self, err: RepositoryError) {
        *self.failing.lock().await = Some(err);
    }

    pub async fn exists(&self, name: &str) -> bool {
        self.repos.lock().await.contains_key(name)
    }

    /// Users granted access to repository `name`.
    pub async fn users(&self, name: &str) -> Vec<String> {
        self.repos
            .lock()
            .await
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RepositoryManager for InMemoryRepositoryManager {
    async fn create_repository(&self, name: &str, users: &[String]) -> Result<(), RepositoryError> {
        if let Some(err) = self.failing.lock().await.take() {
            return Err(err);
        }
        let mut repos = self.repos.lock().await;
        if repos.contains_key(name) {
            return Err(RepositoryError::AlreadyExists);
        }
        repos.insert(name.to_string(), users.to_vec());
        Ok(())
    }

    async fn remove_repository(&self, name: &str) -> Result<(), RepositoryError> {
        if let Some(err) = self.failing.lock().await.take() {
            return Err(err);
        }
        self.repos
            .lock()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}
