//! Provisioned execution units.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::ids::UnitId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Created,
    Building,
    Starting,
    Started,
    Stopped,
    Error,
}

impl UnitStatus {
    /// A unit in this state can serve commands.
    pub fn is_available(self) -> bool {
        matches!(self, Self::Started | Self::Starting)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Building => "building",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    /// Backend-assigned name; status updates match on a prefix of it.
    pub name: String,
    pub app_name: String,
    pub process: String,
    pub ip: String,
    pub status: UnitStatus,
}

impl Unit {
    pub fn available(&self) -> bool {
        self.status.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_running_units_are_available() {
        assert!(UnitStatus::Started.is_available());
        assert!(UnitStatus::Starting.is_available());
        assert!(!UnitStatus::Building.is_available());
        assert!(!UnitStatus::Stopped.is_available());
        assert!(!UnitStatus::Error.is_available());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&UnitStatus::Started).unwrap(),
            "\"started\""
        );
        assert_eq!(UnitStatus::Building.to_string(), "building");
    }
}
