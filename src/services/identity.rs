//! Identity provider interface.

use async_trait::async_trait;

use crate::types::errors::AuthError;
use crate::types::principal::{AuthSession, Principal, SignInRedirect};

/// Trait defining what the crate consumes from the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The current session, or `None` when nobody is signed in.
    async fn get_session(&self) -> Result<Option<AuthSession>, AuthError>;

    /// The user behind the current session, or `None` when nobody is signed in.
    async fn get_user(&self) -> Result<Option<Principal>, AuthError> {
        Ok(self.get_session().await?.map(|session| session.user))
    }

    /// Starts the redirect-based Google sign-in; the caller sends the browser to the returned URL.
    async fn sign_in_with_google(&self) -> Result<SignInRedirect, AuthError>;

    /// Finishes a sign-in with the authorization code handed to the redirect URL.
    async fn complete_sign_in(&self, code: &str) -> Result<AuthSession, AuthError>;

    /// Ends the current session. Signing out while signed out is not an error.
    async fn sign_out(&self) -> Result<(), AuthError>;
}
