//! Unit scaling, unit-level service binding, and unit status.
//!
//! Scaling goes through the app's quota: units are reserved before the
//! provisioner is asked for them and released after they are gone. Binding a
//! unit fans out to every bound service instance and never stops at the
//! first failure; the caller gets a [`BindReport`] instead.

use tracing::{info, warn};

use crate::app::manager::AppManager;
use crate::domain::{CoreError, ServiceBindings, Unit, UnitStatus};
use crate::ports::{OutputSink, QuotaSubject};

/// Result of one bind or unbind call against one service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOutcome {
    pub service: String,
    pub instance: String,
    /// `None` when the service accepted the call.
    pub error: Option<String>,
}

/// Per-instance results of a unit-level bind or unbind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    pub outcomes: Vec<InstanceOutcome>,
}

impl BindReport {
    /// True if every instance accepted the call.
    pub fn is_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.error.is_none())
    }

    /// Outcomes that carry an error, in binding order.
    pub fn failures(&self) -> impl Iterator<Item = &InstanceOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

#[derive(Clone, Copy)]
enum BindAction {
    Bind,
    Unbind,
}

impl AppManager {
    /// Reserve `n` units of quota, then ask the provisioner for them. A
    /// failed provisioner call gives the reservation back.
    pub async fn add_units(
        &self,
        app: &str,
        n: u64,
        process: &str,
        sink: &dyn OutputSink,
    ) -> Result<Vec<Unit>, CoreError> {
        if n == 0 {
            return Err(CoreError::validation("Cannot add zero units."));
        }
        let snapshot = self.get(app).await?;
        let subject = QuotaSubject::App(snapshot.name.clone());
        self.ledger.reserve(&subject, n).await?;

        let mut units = match self
            .provisioner
            .add_units(&snapshot, n, process, sink)
            .await
        {
            Ok(units) => units,
            Err(err) => {
                self.ledger.compensate(&subject, n).await;
                return Err(err.into());
            }
        };
        for unit in &mut units {
            unit.app_name = snapshot.name.clone();
        }
        sink.write_str(&format!("added {n} units\n"));
        info!(app, units = n, process, "units added");
        Ok(units)
    }

    /// Remove `n` units of `process` (every process when empty) and give the
    /// quota back. Asking for more units than the process has is a
    /// validation error and touches nothing.
    pub async fn remove_units(
        &self,
        app: &str,
        n: u64,
        process: &str,
        sink: &dyn OutputSink,
    ) -> Result<(), CoreError> {
        if n == 0 {
            return Err(CoreError::validation("Cannot remove zero units."));
        }
        let snapshot = self.get(app).await?;
        let current = self
            .provisioner
            .units(&snapshot)
            .await?
            .into_iter()
            .filter(|u| process.is_empty() || u.process == process)
            .count() as u64;
        if n > current {
            return Err(CoreError::validation(format!(
                "Cannot remove {n} units from this app, it has only {current} units."
            )));
        }
        self.provisioner
            .remove_units(&snapshot, n, process)
            .await?;
        self.ledger
            .release(&QuotaSubject::App(snapshot.name.clone()), n)
            .await?;
        sink.write_str(&format!("removed {n} units\n"));
        info!(app, units = n, process, "units removed");
        Ok(())
    }

    /// Current units, tagged with the app name.
    pub async fn units(&self, app: &str) -> Result<Vec<Unit>, CoreError> {
        let snapshot = self.get(app).await?;
        let mut units = self.provisioner.units(&snapshot).await?;
        for unit in &mut units {
            unit.app_name = snapshot.name.clone();
        }
        Ok(units)
    }

    /// True if at least one unit can serve requests.
    pub async fn available(&self, app: &str) -> Result<bool, CoreError> {
        Ok(self.units(app).await?.iter().any(Unit::available))
    }

    /// Tell every bound service instance about `unit`.
    pub async fn bind_unit(&self, app: &str, unit: &Unit) -> Result<BindReport, CoreError> {
        self.fan_bind(app, unit, BindAction::Bind).await
    }

    /// Counterpart of [`AppManager::bind_unit`].
    pub async fn unbind_unit(&self, app: &str, unit: &Unit) -> Result<BindReport, CoreError> {
        self.fan_bind(app, unit, BindAction::Unbind).await
    }

    async fn fan_bind(
        &self,
        app: &str,
        unit: &Unit,
        action: BindAction,
    ) -> Result<BindReport, CoreError> {
        let snapshot = self.get(app).await?;
        let bindings =
            ServiceBindings::from_env(&snapshot.env).map_err(CoreError::corrupt_bindings)?;

        let mut report = BindReport::default();
        for (service, instance) in bindings.iter() {
            let result = match action {
                BindAction::Bind => {
                    self.services
                        .bind_unit(service, &instance.name, &snapshot, unit)
                        .await
                }
                BindAction::Unbind => {
                    self.services
                        .unbind_unit(service, &instance.name, &snapshot, unit)
                        .await
                }
            };
            if let Err(err) = &result {
                warn!(app, service, instance = %instance.name, unit = %unit.name, error = %err, "service call failed");
            }
            report.outcomes.push(InstanceOutcome {
                service: service.to_string(),
                instance: instance.name.clone(),
                error: result.err().map(|e| e.to_string()),
            });
        }
        Ok(report)
    }

    /// Update the first unit whose name starts with `unit_prefix`.
    pub async fn set_unit_status(
        &self,
        app: &str,
        unit_prefix: &str,
        status: UnitStatus,
    ) -> Result<(), CoreError> {
        let unit = self
            .units(app)
            .await?
            .into_iter()
            .find(|u| u.name.starts_with(unit_prefix))
            .ok_or(CoreError::UnitNotFound)?;
        self.provisioner.set_unit_status(&unit, status).await?;
        info!(app, unit = %unit.name, status = %status, "unit status changed");
        Ok(())
    }

    /// Attach provisioner-specific data to a running unit.
    pub async fn register_unit(
        &self,
        app: &str,
        unit_name: &str,
        custom_data: serde_json::Value,
    ) -> Result<(), CoreError> {
        let snapshot = self.get(app).await?;
        self.provisioner
            .register_unit(&snapshot, unit_name, custom_data)
            .await?;
        Ok(())
    }
}
