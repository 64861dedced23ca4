//! Session Accessor.
//!
//! Resolves the signed-in principal for each data operation. The principal is
//! looked up per call and never cached.

use std::sync::Arc;

use crate::services::identity::IdentityProvider;
use crate::services::observer::{SyncEvent, SyncObserver};
use crate::types::principal::{AuthSession, Principal};

#[derive(Clone)]
pub struct SessionAccessor {
    identity: Arc<dyn IdentityProvider>,
    observer: Arc<dyn SyncObserver>,
}

impl SessionAccessor {
    pub fn new(identity: Arc<dyn IdentityProvider>, observer: Arc<dyn SyncObserver>) -> Self {
        Self { identity, observer }
    }

    /// The signed-in principal, or `None`.
    ///
    /// Absence is a normal answer. A provider failure is reported to the
    /// observer and also answered with `None`.
    pub async fn current_principal(&self) -> Option<Principal> {
        match self.identity.get_user().await {
            Ok(user) => user,
            Err(error) => {
                self.observer.on_event(&SyncEvent::SessionLookupFailed { error });
                None
            }
        }
    }

    /// The full session, for callers that need more than the principal.
    pub async fn current_session(&self) -> Option<AuthSession> {
        match self.identity.get_session().await {
            Ok(session) => session,
            Err(error) => {
                self.observer.on_event(&SyncEvent::SessionLookupFailed { error });
                None
            }
        }
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }
}
