use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// The authenticated user as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: Option<String>,
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Principal {}

/// An active sign-in held by the identity provider.
#[derive(Clone)]
pub struct AuthSession {
    pub access_token: Zeroizing<String>,
    pub refresh_token: Option<Zeroizing<String>>,
    /// Unix seconds.
    pub expires_at: i64,
    pub user: Principal,
}

impl AuthSession {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Where the user has to be sent to start a provider sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignInRedirect {
    pub url: String,
}
