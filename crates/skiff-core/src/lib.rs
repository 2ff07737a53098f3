//! skiff-core
//!
//! Coordination core of the Skiff application platform: the app record and
//! everything that keeps it consistent while units, env vars, service
//! bindings, cnames and logs change around it.
//!
//! # Modules
//! - **domain**: app model and pure rules (names, cnames, env merging, quota)
//! - **ports**: traits for the store, provisioner, services, repositories, directory
//! - **app**: `AppManager` and its operations
//! - **impls**: in-memory port implementations
//! - **config**: `CoreConfig`, loaded from `SKIFF_*` environment variables

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use self::app::{AppManager, CoreBuilder, NewApp};
pub use self::config::CoreConfig;
pub use self::domain::{CoreError, ErrorKind};
