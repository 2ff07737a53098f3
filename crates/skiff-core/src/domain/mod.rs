//! Domain model: the app record and the pure rules around it.

pub mod actor;
pub mod app;
pub mod applog;
pub mod cname;
pub mod env;
pub mod errors;
pub mod ids;
pub mod manifest;
pub mod quota;
pub mod unit;

pub use self::actor::{Team, User};
pub use self::app::{App, AppLock, AppView, AutoScaleAction, AutoScaleConfig, Plan};
pub use self::applog::{Applog, LogFilter};
pub use self::env::{BoundInstance, EnvMap, EnvVar, ServiceBindings};
pub use self::errors::{CoreError, ErrorKind};
pub use self::ids::{LogId, UnitId};
pub use self::manifest::{Healthcheck, Hooks, Manifest, RestartHooks};
pub use self::quota::Quota;
pub use self::unit::{Unit, UnitStatus};
