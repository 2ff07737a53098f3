//! Core configuration.
//!
//! Loaded from `SKIFF_`-prefixed environment variables via `envy`:
//!   - `SKIFF_HOST`                (default `localhost`)
//!   - `SKIFF_UNITS_PER_APP`       (default `-1`, unlimited)
//!   - `SKIFF_APPS_PER_USER`       (default `-1`, unlimited)
//!   - `SKIFF_ADMIN_TEAM`          (default `admin`)
//!   - `SKIFF_LOG_LISTENER_BUFFER` (default `1000`)
//!   - `SKIFF_ENV_UPDATE_RETRIES`  (default `16`)

use serde::Deserialize;

pub const ENV_PREFIX: &str = "SKIFF_";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CoreConfig {
    /// API host exported to every app as `SKIFF_HOST`.
    #[serde(default = "default_host")]
    pub host: String,

    /// Unit quota limit given to new apps.
    #[serde(default = "unlimited")]
    pub units_per_app: i64,

    /// App quota limit for owners the ledger has not seen yet.
    #[serde(default = "unlimited")]
    pub apps_per_user: i64,

    /// Members of this team see and may own every app.
    #[serde(default = "default_admin_team")]
    pub admin_team: String,

    /// Capacity of each live log listener's channel.
    #[serde(default = "default_log_listener_buffer")]
    pub log_listener_buffer: usize,

    /// Compare-and-swap attempts for one env or binding rewrite.
    #[serde(default = "default_env_update_retries")]
    pub env_update_retries: u32,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn unlimited() -> i64 {
    -1
}

fn default_admin_team() -> String {
    "admin".to_string()
}

fn default_log_listener_buffer() -> usize {
    1000
}

fn default_env_update_retries() -> u32 {
    16
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            units_per_app: unlimited(),
            apps_per_user: unlimited(),
            admin_team: default_admin_team(),
            log_listener_buffer: default_log_listener_buffer(),
            env_update_retries: default_env_update_retries(),
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_env()
    }

    /// Same as `from_env` over an explicit variable list.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX).from_iter(vars)
    }
}
