//! In-memory app document store.
//!
//! One `tokio::sync::Mutex` guards every document, so each trait method is
//! trivially a single atomic conditional update. Every mutation bumps the
//! document's `revision`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{App, AppLock, EnvMap, Quota};
use crate::ports::{AppStore, AppUpdate, QuotaStore, QuotaSubject, StoreError};

#[derive(Default)]
struct StoreState {
    apps: HashMap<String, App>,
    owners: HashMap<String, Quota>,
}

impl StoreState {
    fn app_mut(&mut self, name: &str) -> Result<&mut App, StoreError> {
        self.apps.get_mut(name).ok_or(StoreError::NotFound)
    }

    fn quota_mut(&mut self, subject: &QuotaSubject) -> Result<&mut Quota, StoreError> {
        match subject {
            QuotaSubject::App(name) => {
                let app = self.app_mut(name)?;
                app.revision += 1;
                Ok(&mut app.quota)
            }
            QuotaSubject::Owner(email) => self.owners.get_mut(email).ok_or(StoreError::NotFound),
        }
    }

    fn cname_owner(&self, cname: &str) -> Option<&str> {
        self.apps
            .values()
            .find(|app| app.cname.iter().any(|c| c == cname))
            .map(|app| app.name.as_str())
    }
}

/// Shared handle; clones see the same documents.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppStore for InMemoryStore {
    async fn insert(&self, app: App) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.apps.contains_key(&app.name) {
            return Err(StoreError::AlreadyExists);
        }
        state.apps.insert(app.name.clone(), app);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<App, StoreError> {
        let state = self.state.lock().await;
        state.apps.get(name).cloned().ok_or(StoreError::NotFound)
    }

    async fn list(&self) -> Result<Vec<App>, StoreError> {
        let state = self.state.lock().await;
        let mut apps: Vec<App> = state.apps.values().cloned().collect();
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apps)
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.apps.remove(name).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn update(&self, name: &str, update: AppUpdate) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let app = state.app_mut(name)?;
        match update {
            AppUpdate::State(s) => app.state = s,
            AppUpdate::UpdatePlatform(flag) => app.update_platform = flag,
            AppUpdate::CustomData(data) => app.custom_data = data,
            AppUpdate::Ip(ip) => app.ip = ip,
            AppUpdate::AutoScale(config) => app.autoscale = config,
            AppUpdate::IncrementDeploys => app.deploys += 1,
        }
        app.revision += 1;
        Ok(())
    }

    async fn replace_env(
        &self,
        name: &str,
        expected_revision: u64,
        env: EnvMap,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let app = state.app_mut(name)?;
        if app.revision != expected_revision {
            return Ok(false);
        }
        app.env = env;
        app.revision += 1;
        Ok(true)
    }

    async fn add_team(&self, name: &str, team: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let app = state.app_mut(name)?;
        let added = app.grant(team);
        if added {
            app.revision += 1;
        }
        Ok(added)
    }

    async fn remove_team(&self, name: &str, team: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let app = state.app_mut(name)?;
        let removed = app.revoke(team);
        if removed {
            app.revision += 1;
        }
        Ok(removed)
    }

    async fn add_cnames(&self, name: &str, cnames: &[String]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.apps.contains_key(name) {
            return Err(StoreError::NotFound);
        }
        for (i, cname) in cnames.iter().enumerate() {
            if cname.is_empty() {
                continue;
            }
            if state.cname_owner(cname).is_some() || cnames[..i].contains(cname) {
                return Err(StoreError::CNameTaken(cname.clone()));
            }
        }
        let app = state.app_mut(name)?;
        app.cname
            .extend(cnames.iter().filter(|c| !c.is_empty()).cloned());
        app.revision += 1;
        Ok(())
    }

    async fn remove_cnames(&self, name: &str, cnames: &[String]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let app = state.app_mut(name)?;
        app.cname.retain(|c| !cnames.contains(c));
        app.revision += 1;
        Ok(())
    }

    async fn acquire_lock(&self, name: &str, lock: AppLock) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(app) = state.apps.get_mut(name) else {
            return Ok(false);
        };
        if app.lock.locked {
            return Ok(false);
        }
        app.lock = lock;
        app.revision += 1;
        Ok(true)
    }

    async fn release_lock(&self, name: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(app) = state.apps.get_mut(name)
            && app.lock.locked
        {
            app.lock = AppLock::default();
            app.revision += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl QuotaStore for InMemoryStore {
    async fn reserve(&self, subject: &QuotaSubject, n: u64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let quota = state.quota_mut(subject)?;
        quota
            .try_reserve(n)
            .map_err(|e| StoreError::QuotaExceeded {
                available: e.available,
                requested: e.requested,
            })
    }

    async fn release(&self, subject: &QuotaSubject, n: u64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.quota_mut(subject)?.release(n);
        Ok(())
    }

    async fn quota(&self, subject: &QuotaSubject) -> Result<Quota, StoreError> {
        let state = self.state.lock().await;
        match subject {
            QuotaSubject::App(name) => state
                .apps
                .get(name)
                .map(|app| app.quota)
                .ok_or(StoreError::NotFound),
            QuotaSubject::Owner(email) => {
                state.owners.get(email).copied().ok_or(StoreError::NotFound)
            }
        }
    }

    async fn set_limit(&self, subject: &QuotaSubject, limit: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match subject {
            QuotaSubject::Owner(email) => {
                state
                    .owners
                    .entry(email.clone())
                    .or_insert_with(|| Quota::limited(limit))
                    .limit = limit;
            }
            QuotaSubject::App(_) => state.quota_mut(subject)?.limit = limit,
        }
        Ok(())
    }

    async fn ensure_owner(&self, email: &str, limit: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .owners
            .entry(email.to_string())
            .or_insert_with(|| Quota::limited(limit));
        Ok(())
    }
}
