//! Session model - the provider-issued proof of authentication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token bundle issued by the identity provider. The token material is
/// opaque to this crate; validity is implied by provider events. Replaced
/// wholesale on every provider event, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }
}
