//! Unit tests for `SessionAccessor`.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use bookmark_sync::managers::session_accessor::SessionAccessor;
use bookmark_sync::services::observer::{NoopObserver, RecordingObserver, SyncEvent};
use bookmark_sync::types::errors::AuthError;

use common::FakeIdentity;

#[tokio::test]
async fn test_signed_in_user_is_returned() {
    let sessions = SessionAccessor::new(FakeIdentity::signed_in("u1"), Arc::new(NoopObserver));
    let principal = sessions.current_principal().await.expect("expected a principal");
    assert_eq!(principal.id, "u1");
    assert_eq!(principal.email.as_deref(), Some("u1@example.com"));
}

#[tokio::test]
async fn test_signed_out_is_none() {
    let sessions = SessionAccessor::new(FakeIdentity::signed_out(), Arc::new(NoopObserver));
    assert!(sessions.current_principal().await.is_none());
    assert!(sessions.current_session().await.is_none());
}

#[tokio::test]
async fn test_principal_is_not_cached() {
    let identity = FakeIdentity::signed_in("u1");
    let sessions = SessionAccessor::new(identity.clone(), Arc::new(NoopObserver));

    assert_eq!(sessions.current_principal().await.unwrap().id, "u1");
    identity.set_user(Some(common::principal("u2")));
    assert_eq!(sessions.current_principal().await.unwrap().id, "u2");
    identity.set_user(None);
    assert!(sessions.current_principal().await.is_none());
}

#[tokio::test]
async fn test_provider_failure_is_reported_and_treated_as_absent() {
    let identity = FakeIdentity::signed_in("u1");
    identity.set_failing(true);
    let observer = Arc::new(RecordingObserver::new());
    let sessions = SessionAccessor::new(identity, observer.clone());

    assert!(sessions.current_principal().await.is_none());
    assert_eq!(
        observer.events(),
        vec![SyncEvent::SessionLookupFailed {
            error: AuthError::Network("connection refused".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_current_session_exposes_user() {
    let sessions = SessionAccessor::new(FakeIdentity::signed_in("u9"), Arc::new(NoopObserver));
    let session = sessions.current_session().await.unwrap();
    assert_eq!(session.user.id, "u9");
    assert!(!session.is_expired(0));
}
