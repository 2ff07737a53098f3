//! Persisted log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::LogId;

/// One immutable log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applog {
    pub id: LogId,
    pub date: DateTime<Utc>,
    pub message: String,
    pub source: String,
    #[serde(rename = "appname")]
    pub app_name: String,
    pub unit: String,
}

/// Optional source/unit match. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub source: Option<String>,
    pub unit: Option<String>,
}

impl LogFilter {
    pub fn source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            unit: None,
        }
    }

    pub fn unit(unit: impl Into<String>) -> Self {
        Self {
            source: None,
            unit: Some(unit.into()),
        }
    }

    pub fn matches(&self, log: &Applog) -> bool {
        self.source.as_deref().is_none_or(|s| s == log.source)
            && self.unit.as_deref().is_none_or(|u| u == log.unit)
    }
}

/// Split a message into its non-blank lines.
pub fn split_lines(message: &str) -> impl Iterator<Item = &str> {
    message.lines().filter(|l| !l.trim().is_empty())
}
