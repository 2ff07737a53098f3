//! The App aggregate record.
//!
//! `App` is what the store persists, one document per app name. Callers
//! only ever hold snapshots of it; every mutation goes back through the
//! store's field-level updates.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::env::EnvMap;
use crate::domain::quota::Quota;

/// Name reserved for the platform's own administrative app.
pub const INTERNAL_APP_NAME: &str = "skiff-admin";

/// `state` value after the first successful deploy.
pub const STATE_READY: &str = "ready";

static APP_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z][a-z0-9-]{0,62}$").expect("valid regex")
});

/// Shape check only. Platform-name collisions are checked by the caller,
/// which knows the platform catalog.
pub fn is_valid_name(name: &str) -> bool {
    name != INTERNAL_APP_NAME && APP_NAME_RE.is_match(name)
}

// ========================================
// Plan
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    pub memory: i64,
    pub swap: i64,
    #[serde(rename = "cpushare")]
    pub cpu_share: i64,
}

impl Plan {
    /// Fallback when the catalog has neither the requested nor a default plan.
    pub fn autogenerated() -> Self {
        Self {
            name: "autogenerated".to_string(),
            memory: 0,
            swap: 0,
            cpu_share: 100,
        }
    }
}

// ========================================
// Lock
// ========================================

/// Per-app mutual-exclusion token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppLock {
    pub locked: bool,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub reason: String,
    #[serde(rename = "acquireDate", default)]
    pub acquire_date: Option<DateTime<Utc>>,
}

impl AppLock {
    pub fn held_by(
        owner: impl Into<String>,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            locked: true,
            owner: owner.into(),
            reason: reason.into(),
            acquire_date: Some(at),
        }
    }
}

impl fmt::Display for AppLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.locked {
            return f.write_str("Not locked");
        }
        let date = self
            .acquire_date
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        write!(
            f,
            "App locked by {}, running {}. Acquired in {}",
            self.owner, self.reason, date
        )
    }
}

// ========================================
// Autoscale
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScaleAction {
    pub units: u32,
    pub expression: String,
    /// Seconds to wait after acting before evaluating again.
    pub wait: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoScaleConfig {
    pub increase: AutoScaleAction,
    pub decrease: AutoScaleAction,
    pub min_units: u32,
    pub max_units: u32,
    pub enabled: bool,
}

// ========================================
// App
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    pub platform: String,
    pub owner: String,
    pub team_owner: String,
    /// Kept in lexical order.
    pub teams: Vec<String>,
    pub plan: Plan,
    pub quota: Quota,
    pub ip: String,
    pub cname: Vec<String>,
    pub env: EnvMap,
    pub custom_data: serde_json::Value,
    pub state: String,
    pub update_platform: bool,
    pub deploys: u64,
    pub lock: AppLock,
    pub autoscale: Option<AutoScaleConfig>,
    /// Bumped by the store on every mutation; the compare token for env writes.
    pub revision: u64,
}

impl App {
    pub fn new(name: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: platform.into(),
            owner: String::new(),
            team_owner: String::new(),
            teams: Vec::new(),
            plan: Plan::autogenerated(),
            quota: Quota::unlimited(),
            ip: String::new(),
            cname: Vec::new(),
            env: EnvMap::new(),
            custom_data: serde_json::Value::Null,
            state: String::new(),
            update_platform: false,
            deploys: 0,
            lock: AppLock::default(),
            autoscale: None,
            revision: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == STATE_READY
    }

    pub fn has_team(&self, team: &str) -> bool {
        self.teams.binary_search_by(|t| t.as_str().cmp(team)).is_ok()
    }

    /// Insert `team` keeping order. Returns false if already present.
    pub fn grant(&mut self, team: &str) -> bool {
        match self.teams.binary_search_by(|t| t.as_str().cmp(team)) {
            Ok(_) => false,
            Err(pos) => {
                self.teams.insert(pos, team.to_string());
                true
            }
        }
    }

    /// Returns false if `team` had no access.
    pub fn revoke(&mut self, team: &str) -> bool {
        match self.teams.binary_search_by(|t| t.as_str().cmp(team)) {
            Ok(pos) => {
                self.teams.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn view(&self) -> AppView<'_> {
        AppView {
            name: &self.name,
            platform: &self.platform,
            teams: &self.teams,
            ip: &self.ip,
            cname: &self.cname,
            owner: &self.owner,
            deploys: self.deploys,
            plan: &self.plan,
            team_owner: &self.team_owner,
            ready: self.is_ready(),
            autoscale: self.autoscale.as_ref(),
        }
    }
}

/// Public JSON rendering of an app.
#[derive(Debug, Serialize)]
pub struct AppView<'a> {
    pub name: &'a str,
    pub platform: &'a str,
    pub teams: &'a [String],
    pub ip: &'a str,
    pub cname: &'a [String],
    pub owner: &'a str,
    pub deploys: u64,
    pub plan: &'a Plan,
    #[serde(rename = "teamowner")]
    pub team_owner: &'a str,
    pub ready: bool,
    #[serde(rename = "autoScaleConfig", skip_serializing_if = "Option::is_none")]
    pub autoscale: Option<&'a AutoScaleConfig>,
}
