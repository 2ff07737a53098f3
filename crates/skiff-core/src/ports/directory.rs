//! Directory port: read-only lookups of teams, platforms and plans.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Plan, Team};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("directory backend: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn teams_for_user(&self, email: &str) -> Result<Vec<Team>, DirectoryError>;

    async fn find_team(&self, name: &str) -> Result<Option<Team>, DirectoryError>;

    async fn platforms(&self) -> Result<Vec<String>, DirectoryError>;

    async fn find_plan(&self, name: &str) -> Result<Option<Plan>, DirectoryError>;

    async fn default_plan(&self) -> Result<Option<Plan>, DirectoryError>;
}
