//! Users and teams, as the directory reports them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub users: Vec<String>,
}

impl Team {
    pub fn new(name: impl Into<String>, users: &[&str]) -> Self {
        Self {
            name: name.into(),
            users: users.iter().map(|u| u.to_string()).collect(),
        }
    }

    pub fn contains(&self, email: &str) -> bool {
        self.users.iter().any(|u| u == email)
    }
}
