//! Ports: the capabilities the core consumes.
//!
//! Each trait hides one external system (document store, log collection,
//! provisioner backend, service endpoints, repository host, user directory).
//! `impls` has in-memory versions of all of them.

pub mod app_store;
pub mod clock;
pub mod directory;
pub mod id_generator;
pub mod log_store;
pub mod output;
pub mod provisioner;
pub mod quota_store;
pub mod repository;
pub mod service_client;

pub use self::app_store::{AppStore, AppUpdate, StoreError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::directory::{Directory, DirectoryError};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::log_store::LogStore;
pub use self::output::{BufferSink, NullSink, OutputSink};
pub use self::provisioner::{ProvisionError, Provisioner, ShellConn};
pub use self::quota_store::{QuotaStore, QuotaSubject};
pub use self::repository::{RepositoryError, RepositoryManager};
pub use self::service_client::{ServiceClient, ServiceError};
