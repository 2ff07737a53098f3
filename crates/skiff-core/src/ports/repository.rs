//! RepositoryManager port: source repositories keyed by app name.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("repository already exists")]
    AlreadyExists,

    #[error("repository not found")]
    NotFound,

    #[error("repository backend: {0}")]
    Backend(String),
}

#[async_trait]
pub trait RepositoryManager: Send + Sync {
    async fn create_repository(&self, name: &str, users: &[String]) -> Result<(), RepositoryError>;

    async fn remove_repository(&self, name: &str) -> Result<(), RepositoryError>;
}
