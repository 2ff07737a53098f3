//! Error types for the coordination core.
//!
//! Ports have their own small error enums; `CoreError` is what every
//! `AppManager` operation returns. `ErrorKind` is the stable classification a
//! calling layer maps to a status code.

use thiserror::Error;

use crate::ports::{DirectoryError, ProvisionError, RepositoryError, ServiceError, StoreError};

/// Message returned for any app name that fails validation.
pub const INVALID_APP_NAME: &str = "Invalid app name, your app should have at most 63 \
characters, containing only lower case letters, numbers or dashes, starting with a letter.";

/// Operational classification of a `CoreError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input shape (name, cname, unit count, reserved variable).
    Validation,
    /// Capacity reservation refused.
    QuotaExceeded,
    /// App, unit, team, cname or variable does not exist.
    NotFound,
    /// Uniqueness violations and lost compare-and-swap races.
    Conflict,
    /// The app lock is held by someone else.
    Locked,
    /// The actor may not perform the requested change.
    Forbidden,
    /// A backend (store, provisioner, repository, service) failed.
    Backend,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("Quota exceeded. Available: {available}, Requested: {requested}.")]
    QuotaExceeded { available: u64, requested: u64 },

    #[error("Cannot create app without teams.")]
    NoTeams,

    #[error("You belong to more than one team, choose one to be owner for this app.")]
    ManyTeams,

    #[error("team not found")]
    TeamNotFound,

    #[error(
        "You can not set {team} team as app's owner. Please set one of your teams as app's owner."
    )]
    TeamOwnerNotAllowed { team: String },

    #[error("failed to create the app \"{app}\": {source}")]
    AppCreation {
        app: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("there is already an app with this name")]
    AppAlreadyExists,

    #[error("App not found.")]
    AppNotFound,

    #[error("unit not found")]
    UnitNotFound,

    #[error("plan not found")]
    PlanNotFound,

    #[error("Invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("Environment variable not declared for this app.")]
    EnvNotFound,

    #[error("cname already exists!")]
    CNameExists,

    #[error("cname not exists!")]
    CNameNotFound,

    #[error("This team already has access to this app")]
    TeamAlreadyHasAccess,

    #[error("This team does not have access to this app")]
    TeamHasNoAccess,

    #[error("App must be available to run commands")]
    AppUnavailable,

    #[error("{0}")]
    AppLocked(String),

    #[error("concurrent modification of app {app}, gave up after {attempts} attempts")]
    Conflict { app: String, attempts: u32 },

    #[error("failed to fully delete app {app}: {}", failures.join("; "))]
    PartialDelete { app: String, failures: Vec<String> },

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidPlatform(_) => ErrorKind::Validation,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::NoTeams | Self::ManyTeams | Self::AppUnavailable => ErrorKind::Validation,
            Self::TeamNotFound
            | Self::AppNotFound
            | Self::UnitNotFound
            | Self::PlanNotFound
            | Self::EnvNotFound
            | Self::CNameNotFound
            | Self::TeamHasNoAccess => ErrorKind::NotFound,
            Self::TeamOwnerNotAllowed { .. } => ErrorKind::Forbidden,
            Self::AppAlreadyExists
            | Self::CNameExists
            | Self::TeamAlreadyHasAccess
            | Self::Conflict { .. } => ErrorKind::Conflict,
            Self::AppLocked(_) => ErrorKind::Locked,
            Self::AppCreation { source, .. } => source.kind(),
            Self::Provision(ProvisionError::NotProvisioned | ProvisionError::UnitNotFound) => {
                ErrorKind::NotFound
            }
            Self::PartialDelete { .. }
            | Self::Provision(_)
            | Self::Repository(_)
            | Self::Service(_)
            | Self::Directory(_)
            | Self::Storage(_) => ErrorKind::Backend,
        }
    }

    /// The stored binding aggregate did not decode.
    pub(crate) fn corrupt_bindings(err: serde_json::Error) -> Self {
        Self::Storage(format!("corrupt service bindings: {err}"))
    }

    /// Wrap a failure that happened during the multi-step create sequence.
    pub(crate) fn creating(app: &str, source: CoreError) -> Self {
        Self::AppCreation {
            app: app.to_string(),
            source: Box::new(source),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => CoreError::AppNotFound,
            StoreError::AlreadyExists => CoreError::AppAlreadyExists,
            StoreError::QuotaExceeded {
                available,
                requested,
            } => CoreError::QuotaExceeded {
                available,
                requested,
            },
            StoreError::CNameTaken(_) => CoreError::CNameExists,
            StoreError::Backend(msg) => CoreError::Storage(msg),
        }
    }
}
