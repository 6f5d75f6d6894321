//! Published session state and its derived role predicates.

use crate::models::{Profile, Role, Session};

/// Read-only tuple published by the lifecycle controller. Consumers receive
/// it through a watch channel; every transition replaces the whole value.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub loading: bool,
    pub auth_error: Option<String>,
}

impl Snapshot {
    /// State published before the startup protocol has finished.
    pub fn initial() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn is_auditor(&self) -> bool {
        self.role() == Some(Role::Auditor)
    }

    pub fn is_viewer(&self) -> bool {
        self.role() == Some(Role::Viewer)
    }

    pub fn is_supervisor_it(&self) -> bool {
        self.role() == Some(Role::SupervisorIt)
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        self.role().is_some_and(|role| roles.contains(&role))
    }
}
