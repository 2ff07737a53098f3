//! Service client that records calls instead of making HTTP requests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{App, Unit};
use crate::ports::{ServiceClient, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindAction {
    Bind,
    Unbind,
}

/// One unit bind or unbind, as seen by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindCall {
    pub action: BindAction,
    pub service: String,
    pub instance: String,
    pub app: String,
    pub unit: String,
}

#[derive(Default)]
struct Recorded {
    calls: Vec<BindCall>,
    rejecting: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct RecordingServiceClient {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingServiceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call against `instance` fails with `message`.
    pub async fn reject(&self, instance: &str, message: &str) {
        self.inner
            .lock()
            .await
            .rejecting
            .insert(instance.to_string(), message.to_string());
    }

    /// Every call so far, rejected ones included.
    pub async fn calls(&self) -> Vec<BindCall> {
        self.inner.lock().await.calls.clone()
    }

    async fn record(
        &self,
        action: BindAction,
        service: &str,
        instance: &str,
        app: &App,
        unit: &Unit,
    ) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(BindCall {
            action,
            service: service.to_string(),
            instance: instance.to_string(),
            app: app.name.clone(),
            unit: unit.name.clone(),
        });
        match inner.rejecting.get(instance) {
            Some(message) => Err(ServiceError::Rejected {
                instance: instance.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ServiceClient for RecordingServiceClient {
    async fn bind_unit(
        &self,
        service: &str,
        instance: &str,
        app: &App,
        unit: &Unit,
    ) -> Result<(), ServiceError> {
        self.record(BindAction::Bind, service, instance, app, unit)
            .await
    }

    async fn unbind_unit(
        &self,
        service: &str,
        instance: &str,
        app: &App,
        unit: &Unit,
    ) -> Result<(), ServiceError> {
        self.record(BindAction::Unbind, service, instance, app, unit)
            .await
    }
}
