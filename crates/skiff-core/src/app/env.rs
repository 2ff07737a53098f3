//! Environment and service-binding writes.
//!
//! Every path reads a snapshot, computes the next env map with the pure
//! rules in `domain::env`, and writes it back with `replace_env` against the
//! snapshot's revision. A lost race retries from a fresh read.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::app::manager::AppManager;
use crate::domain::env::{self, SERVICES_ENV};
use crate::domain::{App, BoundInstance, CoreError, EnvMap, EnvVar};
use crate::ports::{NullSink, OutputSink};

impl AppManager {
    /// Set a single variable, overwriting any previous value.
    pub async fn set_env(&self, app: &str, var: EnvVar) -> Result<(), CoreError> {
        self.set_envs(app, vec![var], false, false, &NullSink).await
    }

    pub async fn set_envs(
        &self,
        app: &str,
        vars: Vec<EnvVar>,
        public_only: bool,
        should_restart: bool,
        sink: &dyn OutputSink,
    ) -> Result<(), CoreError> {
        if vars.iter().any(|v| v.name == SERVICES_ENV) {
            return Err(reserved_variable());
        }
        sink.write_str(&format!(
            "---- Setting {} new environment variables ----\n",
            vars.len()
        ));
        let updated = self
            .rewrite_env(app, |current| {
                Ok(Some(env::merge_envs(current, &vars, public_only)))
            })
            .await?;
        if let Some(updated) = updated {
            self.restart_for_env(&updated, should_restart, sink).await?;
        }
        Ok(())
    }

    pub async fn unset_envs(
        &self,
        app: &str,
        names: Vec<String>,
        public_only: bool,
        should_restart: bool,
        sink: &dyn OutputSink,
    ) -> Result<(), CoreError> {
        if names.iter().any(|n| n == SERVICES_ENV) {
            return Err(reserved_variable());
        }
        sink.write_str(&format!(
            "---- Unsetting {} environment variables ----\n",
            names.len()
        ));
        let updated = self
            .rewrite_env(app, |current| {
                Ok(Some(env::unset_envs(current, &names, public_only)))
            })
            .await?;
        if let Some(updated) = updated {
            self.restart_for_env(&updated, should_restart, sink).await?;
        }
        Ok(())
    }

    /// Bind `instance` of `service`: record it in the aggregate and export
    /// its variables, in one write.
    pub async fn add_instance(
        &self,
        app: &str,
        service: &str,
        instance: BoundInstance,
        should_restart: bool,
        sink: &dyn OutputSink,
    ) -> Result<(), CoreError> {
        sink.write_str(&format!(
            "---- Setting {} new environment variables ----\n",
            instance.envs.len()
        ));
        let updated = self
            .rewrite_env(app, |current| {
                env::add_instance(current, service, &instance)
                    .map(Some)
                    .map_err(CoreError::corrupt_bindings)
            })
            .await?;
        info!(app, service, instance = %instance.name, "service instance bound");
        if let Some(updated) = updated {
            self.restart_for_env(&updated, should_restart, sink).await?;
        }
        Ok(())
    }

    /// Unbind the first instance of `service` named like `instance`. Unknown
    /// services or instances are a no-op.
    pub async fn remove_instance(
        &self,
        app: &str,
        service: &str,
        instance: &BoundInstance,
        should_restart: bool,
        sink: &dyn OutputSink,
    ) -> Result<(), CoreError> {
        let updated = self
            .rewrite_env(app, |current| {
                env::remove_instance(current, service, &instance.name)
                    .map_err(CoreError::corrupt_bindings)
            })
            .await?;
        let Some(updated) = updated else {
            return Ok(());
        };
        sink.write_str(&format!(
            "---- Unsetting {} environment variables ----\n",
            instance.envs.len()
        ));
        info!(app, service, instance = %instance.name, "service instance unbound");
        self.restart_for_env(&updated, should_restart, sink).await
    }

    pub async fn env(&self, app: &str, name: &str) -> Result<EnvVar, CoreError> {
        self.get(app)
            .await?
            .env
            .remove(name)
            .ok_or(CoreError::EnvNotFound)
    }

    pub async fn envs(&self, app: &str) -> Result<EnvMap, CoreError> {
        Ok(self.get(app).await?.env)
    }

    /// Variables contributed by one bound instance.
    pub async fn instance_env(
        &self,
        app: &str,
        instance: &str,
    ) -> Result<BTreeMap<String, EnvVar>, CoreError> {
        Ok(env::instance_envs(&self.get(app).await?.env, instance))
    }

    /// Compare-and-swap loop. `compute` returns `None` for "nothing to do",
    /// which ends the loop without a write. Returns the snapshot the winning
    /// write was based on, with the new env applied.
    pub(crate) async fn rewrite_env<F>(
        &self,
        app: &str,
        compute: F,
    ) -> Result<Option<App>, CoreError>
    where
        F: Fn(&EnvMap) -> Result<Option<EnvMap>, CoreError>,
    {
        let attempts = self.config.env_update_retries.max(1);
        for attempt in 1..=attempts {
            let mut snapshot = self.apps.get(app).await?;
            let Some(next) = compute(&snapshot.env)? else {
                return Ok(None);
            };
            if self
                .apps
                .replace_env(app, snapshot.revision, next.clone())
                .await?
            {
                snapshot.env = next;
                snapshot.revision += 1;
                return Ok(Some(snapshot));
            }
            warn!(app, attempt, "env rewrite lost a race, retrying");
        }
        Err(CoreError::Conflict {
            app: app.to_string(),
            attempts,
        })
    }

    async fn restart_for_env(
        &self,
        app: &App,
        should_restart: bool,
        sink: &dyn OutputSink,
    ) -> Result<(), CoreError> {
        if !should_restart {
            return Ok(());
        }
        let units = self.provisioner.units(app).await?;
        if units.is_empty() {
            return Ok(());
        }
        sink.write_str("restarting app\n");
        self.provisioner.restart(app, "", sink).await?;
        info!(app = %app.name, "app restarted after env change");
        Ok(())
    }
}

fn reserved_variable() -> CoreError {
    CoreError::validation(format!(
        "{SERVICES_ENV} is managed by service bindings and cannot be changed directly"
    ))
}
