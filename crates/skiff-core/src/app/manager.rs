//! `AppManager`: the entry point every caller goes through.
//!
//! Holds explicit handles to every port; there is no global connection
//! state. Operations live in the sibling modules as `impl AppManager`
//! blocks, grouped by concern.

use std::sync::Arc;

use crate::app::logs::LogPipeline;
use crate::app::quota::QuotaLedger;
use crate::config::CoreConfig;
use crate::domain::{App, CoreError, Team, User};
use crate::ports::{AppStore, Clock, Directory, Provisioner, RepositoryManager, ServiceClient};

pub struct AppManager {
    pub(crate) apps: Arc<dyn AppStore>,
    pub(crate) ledger: QuotaLedger,
    pub(crate) logs: LogPipeline,
    pub(crate) provisioner: Arc<dyn Provisioner>,
    pub(crate) services: Arc<dyn ServiceClient>,
    pub(crate) repositories: Arc<dyn RepositoryManager>,
    pub(crate) directory: Arc<dyn Directory>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: CoreConfig,
}

impl AppManager {
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub fn logs(&self) -> &LogPipeline {
        &self.logs
    }

    /// Fresh snapshot of `name`.
    pub async fn get(&self, name: &str) -> Result<App, CoreError> {
        Ok(self.apps.get(name).await?)
    }

    pub(crate) async fn user_teams(&self, user: &User) -> Result<Vec<Team>, CoreError> {
        Ok(self.directory.teams_for_user(&user.email).await?)
    }

    pub(crate) fn is_admin(&self, teams: &[Team]) -> bool {
        teams.iter().any(|t| t.name == self.config.admin_team)
    }
}
