//! In-memory implementations of every port, for tests and the demo binary.

pub mod fake_provisioner;
pub mod memory_directory;
pub mod memory_logs;
pub mod memory_repository;
pub mod memory_store;
pub mod recording_service;

pub use self::fake_provisioner::{ExecutedCommand, FakeProvisioner, ShellSession};
pub use self::memory_directory::InMemoryDirectory;
pub use self::memory_logs::InMemoryLogStore;
pub use self::memory_repository::InMemoryRepositoryManager;
pub use self::memory_store::InMemoryStore;
pub use self::recording_service::{BindAction, BindCall, RecordingServiceClient};
