//! Static directory of teams, platforms and plans.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Plan, Team};
use crate::ports::{Directory, DirectoryError};

#[derive(Default)]
struct Catalog {
    teams: Vec<Team>,
    platforms: Vec<String>,
    plans: Vec<(Plan, bool)>,
}

/// Filled by the caller up front; lookups never fail.
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    catalog: Arc<RwLock<Catalog>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_team(&self, team: Team) {
        self.catalog.write().await.teams.push(team);
    }

    /// Platform names double as reserved app names.
    pub async fn add_platform(&self, name: &str) {
        self.catalog.write().await.platforms.push(name.to_string());
    }

    /// At most one plan should be the default; the first flagged one wins.
    pub async fn add_plan(&self, plan: Plan, default: bool) {
        self.catalog.write().await.plans.push((plan, default));
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn teams_for_user(&self, email: &str) -> Result<Vec<Team>, DirectoryError> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .teams
            .iter()
            .filter(|t| t.contains(email))
            .cloned()
            .collect())
    }

    async fn find_team(&self, name: &str) -> Result<Option<Team>, DirectoryError> {
        let catalog = self.catalog.read().await;
        Ok(catalog.teams.iter().find(|t| t.name == name).cloned())
    }

    async fn platforms(&self) -> Result<Vec<String>, DirectoryError> {
        Ok(self.catalog.read().await.platforms.clone())
    }

    async fn find_plan(&self, name: &str) -> Result<Option<Plan>, DirectoryError> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .plans
            .iter()
            .find(|(p, _)| p.name == name)
            .map(|(p, _)| p.clone()))
    }

    async fn default_plan(&self) -> Result<Option<Plan>, DirectoryError> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .plans
            .iter()
            .find(|(_, default)| *default)
            .map(|(p, _)| p.clone()))
    }
}
