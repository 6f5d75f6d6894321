use thiserror::Error;

/// Resolution outcomes that must end the session. Everything else the
/// resolution engine absorbs by retrying or degrading to cached or
/// least-privilege data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HardFailure {
    #[error("profile access denied by backend policy")]
    PolicyDenied,

    #[error("profile record not found")]
    NotFound,
}

impl HardFailure {
    /// Message surfaced to the user on the forced sign-out that follows.
    pub fn user_message(&self) -> &'static str {
        match self {
            HardFailure::PolicyDenied => {
                "Security error: your user profile could not be loaded. Contact an administrator."
            }
            HardFailure::NotFound => {
                "No user profile exists for this account. Contact an administrator."
            }
        }
    }
}

/// Error taxonomy reported by the profile backend. `PolicyDenied` and
/// `NotFound` are permanent; `Network` and `Other` are transient and
/// eligible for retry. A backend that sees "no row" where an access policy
/// is the likely cause reports `PolicyDenied`, not `NotFound`.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("access denied by policy")]
    PolicyDenied,

    #[error("profile row does not exist")]
    NotFound,

    #[error("network error: {0}")]
    Network(String),

    #[error("backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// True for the two failure kinds that terminate the session.
    pub fn is_permanent(&self) -> bool {
        matches!(self, BackendError::PolicyDenied | BackendError::NotFound)
    }
}
