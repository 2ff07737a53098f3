//! ServiceClient port: per-instance bind/unbind calls to service endpoints.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{App, Unit};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("service {service} is unavailable: {message}")]
    Unavailable { service: String, message: String },

    #[error("instance {instance} rejected the request: {message}")]
    Rejected { instance: String, message: String },
}

#[async_trait]
pub trait ServiceClient: Send + Sync {
    async fn bind_unit(
        &self,
        service: &str,
        instance: &str,
        app: &App,
        unit: &Unit,
    ) -> Result<(), ServiceError>;

    async fn unbind_unit(
        &self,
        service: &str,
        instance: &str,
        app: &App,
        unit: &Unit,
    ) -> Result<(), ServiceError>;
}
