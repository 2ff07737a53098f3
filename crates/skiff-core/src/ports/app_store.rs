//! AppStore port: the per-app document collection.
//!
//! Backends only promise single-document atomicity. Every method here is
//! one conditional update against one app document; nothing spans two apps
//! except the cname uniqueness check, which backends enforce with a unique
//! index.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{App, AppLock, AutoScaleConfig, EnvMap};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("quota exceeded: available {available}, requested {requested}")]
    QuotaExceeded { available: u64, requested: u64 },

    #[error("cname {0} is already in use")]
    CNameTaken(String),

    #[error("store backend: {0}")]
    Backend(String),
}

/// Field-level partial updates. Each variant touches exactly one field.
#[derive(Debug, Clone, PartialEq)]
pub enum AppUpdate {
    State(String),
    UpdatePlatform(bool),
    CustomData(serde_json::Value),
    Ip(String),
    AutoScale(Option<AutoScaleConfig>),
    IncrementDeploys,
}

#[async_trait]
pub trait AppStore: Send + Sync {
    /// Fails with `AlreadyExists` if the name is taken.
    async fn insert(&self, app: App) -> Result<(), StoreError>;

    async fn get(&self, name: &str) -> Result<App, StoreError>;

    async fn list(&self) -> Result<Vec<App>, StoreError>;

    async fn remove(&self, name: &str) -> Result<(), StoreError>;

    async fn update(&self, name: &str, update: AppUpdate) -> Result<(), StoreError>;

    /// Replace the env map only if the document is still at
    /// `expected_revision`. Returns false on a revision mismatch.
    async fn replace_env(
        &self,
        name: &str,
        expected_revision: u64,
        env: EnvMap,
    ) -> Result<bool, StoreError>;

    /// Returns false if the team already had access.
    async fn add_team(&self, name: &str, team: &str) -> Result<bool, StoreError>;

    /// Returns false if the team had no access.
    async fn remove_team(&self, name: &str, team: &str) -> Result<bool, StoreError>;

    /// All-or-nothing append. Fails with `CNameTaken` if any non-empty name
    /// is held by any app, this one included.
    async fn add_cnames(&self, name: &str, cnames: &[String]) -> Result<(), StoreError>;

    async fn remove_cnames(&self, name: &str, cnames: &[String]) -> Result<(), StoreError>;

    /// Returns true only if the app exists and was unlocked.
    async fn acquire_lock(&self, name: &str, lock: AppLock) -> Result<bool, StoreError>;

    /// Unconditional and idempotent.
    async fn release_lock(&self, name: &str) -> Result<(), StoreError>;
}
