//! Profile model - the business-level user record attached to a session.

use serde::{Deserialize, Serialize};

/// Application role codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Auditor,
    Viewer,
    SupervisorIt,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Auditor => "auditor",
            Role::Viewer => "viewer",
            Role::SupervisorIt => "supervisor_it",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User profile entity. Immutable once published: refreshes replace the
/// whole value, they never mutate it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    pub role: Role,
    pub active: bool,
}

impl Profile {
    /// Create a profile for a known user.
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            role,
            active: true,
        }
    }

    /// Least-privilege profile served when the backend is unreachable and no
    /// cached entry exists. Keeps the application usable in read-only mode
    /// during an outage instead of forcing the user out.
    pub fn fallback(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: String::new(),
            role: Role::Auditor,
            active: true,
        }
    }
}
