//! Typed view of an app's custom data.
//!
//! Deploys store the parsed app manifest as opaque JSON in `customData`.
//! This module reads the two parts the core cares about.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartHooks {
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(default)]
    pub restart: RestartHooks,
    #[serde(default)]
    pub build: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Healthcheck {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default, rename = "match")]
    pub matches: String,
    #[serde(default)]
    pub allowed_failures: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub hooks: Hooks,
    #[serde(default)]
    pub healthcheck: Healthcheck,
}

impl Manifest {
    /// `null` custom data is an empty manifest.
    pub fn from_custom_data(data: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if data.is_null() {
            return Ok(Self::default());
        }
        Manifest::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_hooks_and_healthcheck() {
        let data = json!({
            "hooks": {
                "restart": {"before": ["migrate"], "after": ["notify"]},
                "build": ["make assets"]
            },
            "healthcheck": {
                "path": "/health",
                "method": "GET",
                "status": 200,
                "match": ".*OK",
                "allowed_failures": 3
            },
            "procfile": "web: ./run"
        });

        let manifest = Manifest::from_custom_data(&data).unwrap();
        assert_eq!(manifest.hooks.restart.before, vec!["migrate"]);
        assert_eq!(manifest.hooks.restart.after, vec!["notify"]);
        assert_eq!(manifest.hooks.build, vec!["make assets"]);
        assert_eq!(manifest.healthcheck.path, "/health");
        assert_eq!(manifest.healthcheck.status, 200);
        assert_eq!(manifest.healthcheck.matches, ".*OK");
        assert_eq!(manifest.healthcheck.allowed_failures, 3);
    }

    #[test]
    fn missing_sections_default() {
        let manifest = Manifest::from_custom_data(&json!({"hooks": {"build": []}})).unwrap();
        assert_eq!(manifest, Manifest::default());
        assert_eq!(
            Manifest::from_custom_data(&serde_json::Value::Null).unwrap(),
            Manifest::default()
        );
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(Manifest::from_custom_data(&json!({"hooks": {"build": "oops"}})).is_err());
    }
}
