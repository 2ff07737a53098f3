//! App lifecycle: creation, deletion, process control and lifecycle flags.
//!
//! Creation is all or nothing: each completed side effect is recorded as a
//! [`Created`] step and undone in reverse when a later one fails. Deletion
//! goes the other way and keeps going past failures. Process control runs
//! under the app lock.

use tracing::{error, info};

use crate::app::manager::AppManager;
use crate::domain::app::{INTERNAL_APP_NAME, STATE_READY, is_valid_name};
use crate::domain::errors::INVALID_APP_NAME;
use crate::domain::{
    App, AutoScaleConfig, CoreError, EnvVar, Manifest, Plan, Quota, Team, User,
};
use crate::ports::{AppUpdate, OutputSink, ProvisionError, QuotaSubject, RepositoryError, ShellConn};

/// Prefix that loads the app environment before a `run` command.
pub const APPRC_PREFIX: &str = "[ -f /home/application/apprc ] && source /home/application/apprc; [ -d /home/application/current ] && cd /home/application/current;";

/// Caller-supplied fields of a new app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewApp {
    pub name: String,
    pub platform: String,
    /// Falls back to the default plan, or an autogenerated one.
    pub plan: Option<String>,
    /// Falls back to the user's only team.
    pub team_owner: Option<String>,
}

impl NewApp {
    pub fn new(name: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: platform.into(),
            ..Self::default()
        }
    }
}

/// Side effects completed so far, undone in reverse on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Created {
    OwnerQuota,
    Record,
    Repository,
    Provisioned,
}

impl AppManager {
    /// Create an app on behalf of `user`.
    ///
    /// Input checks run before any side effect and fail without a trace.
    /// From the owner-quota reservation onwards every failure is wrapped in
    /// `AppCreation` and the completed steps are undone in reverse order.
    pub async fn create_app(&self, request: NewApp, user: &User) -> Result<App, CoreError> {
        let plan = self.resolve_plan(request.plan.as_deref()).await?;
        let user_teams = self.user_teams(user).await?;
        let team_owner = self
            .resolve_team_owner(&user_teams, request.team_owner.as_deref())
            .await?;

        let platforms = self.directory.platforms().await?;
        if !platforms.iter().any(|p| p == &request.platform) {
            return Err(CoreError::InvalidPlatform(request.platform));
        }
        validate_app_name(&request.name, &platforms)?;

        let mut app = App::new(&request.name, &request.platform);
        app.owner = user.email.clone();
        app.plan = plan;
        app.quota = Quota::limited(self.config.units_per_app);
        for team in &user_teams {
            app.grant(&team.name);
        }
        app.grant(&team_owner);
        app.team_owner = team_owner;

        let mut done = Vec::new();
        match self.run_create(&mut app, &mut done).await {
            Ok(()) => {
                info!(app = %app.name, owner = %app.owner, team = %app.team_owner, "app created");
                self.get(&app.name).await
            }
            Err(err) => {
                self.undo_create(&app, &done).await;
                Err(CoreError::creating(&app.name, err))
            }
        }
    }

    async fn run_create(&self, app: &mut App, done: &mut Vec<Created>) -> Result<(), CoreError> {
        self.ledger
            .reserve(&QuotaSubject::Owner(app.owner.clone()), 1)
            .await?;
        done.push(Created::OwnerQuota);

        self.apps.insert(app.clone()).await?;
        done.push(Created::Record);

        let exported = [
            EnvVar::new("SKIFF_APPNAME", &app.name, false),
            EnvVar::new("SKIFF_HOST", &self.config.host, false),
        ];
        self.rewrite_env(&app.name, |current| {
            Ok(Some(crate::domain::env::merge_envs(current, &exported, false)))
        })
        .await?;

        self.repositories
            .create_repository(&app.name, std::slice::from_ref(&app.owner))
            .await?;
        done.push(Created::Repository);

        self.provisioner.provision(app).await?;
        done.push(Created::Provisioned);

        let ip = self.provisioner.addr(app).await?;
        self.apps.update(&app.name, AppUpdate::Ip(ip.clone())).await?;
        app.ip = ip;
        Ok(())
    }

    async fn undo_create(&self, app: &App, done: &[Created]) {
        for step in done.iter().rev() {
            let result = match step {
                Created::Provisioned => self.provisioner.destroy(app).await.map_err(CoreError::from),
                Created::Repository => self
                    .repositories
                    .remove_repository(&app.name)
                    .await
                    .map_err(CoreError::from),
                Created::Record => self.apps.remove(&app.name).await.map_err(CoreError::from),
                Created::OwnerQuota => {
                    self.ledger
                        .compensate(&QuotaSubject::Owner(app.owner.clone()), 1)
                        .await;
                    Ok(())
                }
            };
            if let Err(err) = result {
                error!(app = %app.name, step = ?step, error = %err, "failed to roll back app creation");
            }
        }
    }

    async fn resolve_plan(&self, name: Option<&str>) -> Result<Plan, CoreError> {
        if let Some(name) = name {
            return self
                .directory
                .find_plan(name)
                .await?
                .ok_or(CoreError::PlanNotFound);
        }
        Ok(self
            .directory
            .default_plan()
            .await?
            .unwrap_or_else(Plan::autogenerated))
    }

    /// Pick the owning team: the requested one if the user may use it,
    /// otherwise the user's only team.
    pub(crate) async fn resolve_team_owner(
        &self,
        user_teams: &[Team],
        requested: Option<&str>,
    ) -> Result<String, CoreError> {
        match requested {
            Some(name) => {
                let team = self
                    .directory
                    .find_team(name)
                    .await?
                    .ok_or(CoreError::TeamNotFound)?;
                if !self.is_admin(user_teams) && !user_teams.iter().any(|t| t.name == team.name) {
                    return Err(CoreError::TeamOwnerNotAllowed { team: team.name });
                }
                Ok(team.name)
            }
            None => match user_teams {
                [] => Err(CoreError::NoTeams),
                [only] => Ok(only.name.clone()),
                _ => Err(CoreError::ManyTeams),
            },
        }
    }

    /// Tear the app down. Every step is attempted even if an earlier one
    /// failed; the failures come back together.
    pub async fn delete_app(&self, name: &str, sink: &dyn OutputSink) -> Result<(), CoreError> {
        let app = self.get(name).await?;
        sink.write_str(&format!("---- Removing application \"{name}\"...\n"));
        let mut failures = Vec::new();

        match self.provisioner.destroy(&app).await {
            Ok(()) | Err(ProvisionError::NotProvisioned) => {}
            Err(err) => failures.push(format!("destroy units: {err}")),
        }
        match self.repositories.remove_repository(name).await {
            Ok(()) | Err(RepositoryError::NotFound) => {}
            Err(err) => failures.push(format!("remove repository: {err}")),
        }
        if let Err(err) = self
            .ledger
            .release(&QuotaSubject::Owner(app.owner.clone()), 1)
            .await
        {
            failures.push(format!("release owner quota: {err}"));
        }
        if let Err(err) = self.logs.forget(name).await {
            failures.push(format!("remove logs: {err}"));
        }
        if let Err(err) = self.apps.remove(name).await {
            failures.push(format!("remove app record: {err}"));
        }

        if failures.is_empty() {
            sink.write_str("---- Done removing application.\n");
            info!(app = name, "app deleted");
            Ok(())
        } else {
            for failure in &failures {
                error!(app = name, failure = %failure, "app deletion step failed");
            }
            Err(CoreError::PartialDelete {
                app: name.to_string(),
                failures,
            })
        }
    }

    /// Restart `process` (every process when empty) under the app lock.
    pub async fn restart(
        &self,
        app: &str,
        process: &str,
        actor: &str,
        sink: &dyn OutputSink,
    ) -> Result<(), CoreError> {
        self.with_lock(app, actor, "restart", move || async move {
            let snapshot = self.get(app).await?;
            sink.write_str("---- Restarting your app ----\n");
            self.provisioner.restart(&snapshot, process, sink).await?;
            info!(app, process, "app restarted");
            Ok(())
        })
        .await
    }

    /// Stop `process` under the app lock. Units stay allocated.
    pub async fn stop(
        &self,
        app: &str,
        process: &str,
        actor: &str,
        sink: &dyn OutputSink,
    ) -> Result<(), CoreError> {
        self.with_lock(app, actor, "stop", move || async move {
            let snapshot = self.get(app).await?;
            sink.write_str("---- Stopping your app ----\n");
            self.provisioner.stop(&snapshot, process).await?;
            info!(app, process, "app stopped");
            Ok(())
        })
        .await
    }

    pub async fn start(
        &self,
        app: &str,
        process: &str,
        actor: &str,
        sink: &dyn OutputSink,
    ) -> Result<(), CoreError> {
        self.with_lock(app, actor, "start", move || async move {
            let snapshot = self.get(app).await?;
            sink.write_str("---- Starting your app ----\n");
            self.provisioner.start(&snapshot, process).await?;
            info!(app, process, "app started");
            Ok(())
        })
        .await
    }

    /// Run `cmd` inside the app environment. Needs at least one available unit.
    pub async fn run(
        &self,
        app: &str,
        cmd: &str,
        once: bool,
        sink: &dyn OutputSink,
    ) -> Result<(), CoreError> {
        if !self.available(app).await? {
            return Err(CoreError::AppUnavailable);
        }
        let snapshot = self.get(app).await?;
        self.logs
            .log(app, &format!("running '{cmd}'"), "skiff", "api")
            .await?;
        let wrapped = format!("{APPRC_PREFIX} {cmd}");
        self.provisioner
            .execute_command(&snapshot, &wrapped, sink, once)
            .await?;
        Ok(())
    }

    /// Hand `conn` to the provisioner's interactive shell for the app.
    pub async fn shell(
        &self,
        app: &str,
        conn: &mut dyn ShellConn,
        width: u16,
        height: u16,
    ) -> Result<(), CoreError> {
        let snapshot = self.get(app).await?;
        self.provisioner
            .shell(&snapshot, conn, width, height)
            .await?;
        Ok(())
    }

    /// Mark the app as having completed its first deploy.
    pub async fn ready(&self, app: &str) -> Result<(), CoreError> {
        self.apps
            .update(app, AppUpdate::State(STATE_READY.to_string()))
            .await?;
        Ok(())
    }

    /// Count a finished deploy and mark the app ready.
    pub async fn record_deploy(&self, app: &str) -> Result<(), CoreError> {
        self.apps.update(app, AppUpdate::IncrementDeploys).await?;
        self.ready(app).await
    }

    /// Flag the app for a platform update on its next deploy.
    pub async fn set_update_platform(&self, app: &str, flag: bool) -> Result<(), CoreError> {
        self.apps
            .update(app, AppUpdate::UpdatePlatform(flag))
            .await?;
        Ok(())
    }

    /// Replace the app's custom data wholesale.
    pub async fn update_custom_data(
        &self,
        app: &str,
        data: serde_json::Value,
    ) -> Result<(), CoreError> {
        self.apps.update(app, AppUpdate::CustomData(data)).await?;
        Ok(())
    }

    /// The process manifest read out of the app's custom data.
    pub async fn manifest(&self, app: &str) -> Result<Manifest, CoreError> {
        let snapshot = self.get(app).await?;
        Manifest::from_custom_data(&snapshot.custom_data)
            .map_err(|e| CoreError::validation(format!("invalid custom data: {e}")))
    }

    /// `None` removes the policy.
    pub async fn set_autoscale_config(
        &self,
        app: &str,
        config: Option<AutoScaleConfig>,
    ) -> Result<(), CoreError> {
        if let Some(config) = &config
            && config.min_units > config.max_units
        {
            return Err(CoreError::validation(
                "minimum units must not exceed maximum units",
            ));
        }
        self.apps.update(app, AppUpdate::AutoScale(config)).await?;
        Ok(())
    }
}

/// Name check used by callers that want to validate before submitting.
pub fn validate_app_name(name: &str, platforms: &[String]) -> Result<(), CoreError> {
    if name == INTERNAL_APP_NAME || !is_valid_name(name) || platforms.iter().any(|p| p == name) {
        return Err(CoreError::validation(INVALID_APP_NAME));
    }
    Ok(())
}
