//! Orchestration layer: `AppManager` and the operations built on the ports.
//!
//! - **builder**: wiring of ports into an `AppManager`
//! - **quota**: reserve/release ledger with compensation
//! - **lock**: application lock and the scoped `with_lock` helper
//! - **env**: environment and service-binding rewrites
//! - **logs**: log persistence and live listener fan-out
//! - **units**: scaling, unit binding and unit status
//! - **lifecycle**: create, delete, restart/stop/start, run, flags
//! - **access**: teams, cnames and visibility

pub mod access;
pub mod builder;
pub mod env;
pub mod lifecycle;
pub mod lock;
pub mod logs;
pub mod manager;
pub mod quota;
pub mod units;

#[cfg(test)]
pub(crate) mod testing;

pub use self::builder::{BuildError, CoreBuilder};
pub use self::lifecycle::{APPRC_PREFIX, NewApp, validate_app_name};
pub use self::logs::{LogListener, LogPipeline};
pub use self::manager::AppManager;
pub use self::quota::QuotaLedger;
pub use self::units::{BindReport, InstanceOutcome};
