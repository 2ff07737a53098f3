//! Provisioner port: whatever actually runs the units.
//!
//! The core never knows which backend is behind this trait. Timeouts and
//! retries against the backend are the implementation's business and show
//! up here as plain `ProvisionError`s.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::domain::{App, Unit, UnitStatus};
use crate::ports::OutputSink;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("App is not provisioned.")]
    NotProvisioned,

    #[error("unit not found")]
    UnitNotFound,

    #[error("{0}")]
    Failed(String),
}

/// Bidirectional byte stream for interactive shells.
pub trait ShellConn: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ShellConn for T {}

#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self, app: &App) -> Result<(), ProvisionError>;

    async fn destroy(&self, app: &App) -> Result<(), ProvisionError>;

    /// Create `n` units of `process`. Returned units may not yet carry the
    /// app name; the caller tags them.
    async fn add_units(
        &self,
        app: &App,
        n: u64,
        process: &str,
        sink: &dyn OutputSink,
    ) -> Result<Vec<Unit>, ProvisionError>;

    async fn remove_units(&self, app: &App, n: u64, process: &str) -> Result<(), ProvisionError>;

    async fn units(&self, app: &App) -> Result<Vec<Unit>, ProvisionError>;

    async fn restart(
        &self,
        app: &App,
        process: &str,
        sink: &dyn OutputSink,
    ) -> Result<(), ProvisionError>;

    async fn start(&self, app: &App, process: &str) -> Result<(), ProvisionError>;

    async fn stop(&self, app: &App, process: &str) -> Result<(), ProvisionError>;

    /// Run `cmd` in every unit, or in a single unit when `once`.
    async fn execute_command(
        &self,
        app: &App,
        cmd: &str,
        sink: &dyn OutputSink,
        once: bool,
    ) -> Result<(), ProvisionError>;

    /// Primary address routed to the app.
    async fn addr(&self, app: &App) -> Result<String, ProvisionError>;

    async fn set_cname(&self, app: &App, cname: &str) -> Result<(), ProvisionError>;

    async fn unset_cname(&self, app: &App, cname: &str) -> Result<(), ProvisionError>;

    async fn shell(
        &self,
        app: &App,
        conn: &mut dyn ShellConn,
        width: u16,
        height: u16,
    ) -> Result<(), ProvisionError>;

    /// Record a unit the backend discovered on its own.
    async fn register_unit(
        &self,
        app: &App,
        unit_name: &str,
        custom_data: serde_json::Value,
    ) -> Result<(), ProvisionError>;

    async fn set_unit_status(&self, unit: &Unit, status: UnitStatus)
    -> Result<(), ProvisionError>;
}
