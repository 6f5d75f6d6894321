//! Identity-provider event types consumed by the lifecycle controller.

use crate::models::Session;

/// Event kinds the controller reacts to. Providers emit kinds we do not
/// know about; those arrive as `Other` and the controller logs and ignores
/// them rather than the subscription dropping them on the floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    TokenRefreshed,
    SignedOut,
    UserUpdated,
    Other(String),
}

impl std::fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthEventKind::SignedIn => f.write_str("signed_in"),
            AuthEventKind::TokenRefreshed => f.write_str("token_refreshed"),
            AuthEventKind::SignedOut => f.write_str("signed_out"),
            AuthEventKind::UserUpdated => f.write_str("user_updated"),
            AuthEventKind::Other(kind) => f.write_str(kind),
        }
    }
}

/// One provider notification: the event kind plus the updated session, if
/// the provider still has one.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }
}
