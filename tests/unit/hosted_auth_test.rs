//! Unit tests for `HostedAuthClient`: the authorize URL, configuration errors,
//! the session key file, and the sealed local session. Token refresh runs
//! against a throwaway HTTP listener on localhost.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use zeroize::Zeroizing;

use bookmark_sync::database::Database;
use bookmark_sync::services::hosted_auth::{HostedAuthClient, SESSION_KEY_LENGTH};
use bookmark_sync::services::identity::IdentityProvider;
use bookmark_sync::types::errors::AuthError;
use bookmark_sync::types::principal::{AuthSession, Principal};
use bookmark_sync::types::settings::BackendSettings;

fn configured() -> BackendSettings {
    BackendSettings {
        url: "https://proj.example.test/".to_string(),
        anon_key: "anon-key".to_string(),
        redirect_url: "http://localhost:3000/auth/callback".to_string(),
    }
}

struct Fixture {
    client: HostedAuthClient,
    db: Arc<Database>,
    dir: TempDir,
}

impl Fixture {
    fn key_path(&self) -> PathBuf {
        self.dir.path().join("session.key")
    }
}

fn client(backend: BackendSettings) -> Fixture {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    let client = HostedAuthClient::new(db.clone(), backend, &dir.path().join("session.key")).unwrap();
    Fixture { client, db, dir }
}

fn session(expires_at: i64, refresh: Option<&str>) -> AuthSession {
    AuthSession {
        access_token: Zeroizing::new("access-secret".to_string()),
        refresh_token: refresh.map(|t| Zeroizing::new(t.to_string())),
        expires_at,
        user: Principal {
            id: "user-1".to_string(),
            email: Some("user@example.com".to_string()),
        },
    }
}

fn far_future() -> i64 {
    i64::MAX / 2
}

// ─── Authorize URL ───

#[test]
fn test_authorize_url_carries_pkce_parameters() {
    let Fixture { client, .. } = client(configured());
    let url = client.authorize_url("challenge-value").unwrap();

    assert_eq!(url.host_str(), Some("proj.example.test"));
    assert_eq!(url.path(), "/auth/v1/authorize");

    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(query["provider"], "google");
    assert_eq!(query["redirect_to"], "http://localhost:3000/auth/callback");
    assert_eq!(query["code_challenge"], "challenge-value");
    assert_eq!(query["code_challenge_method"], "s256");
}

#[test]
fn test_authorize_url_requires_configuration() {
    let Fixture { client, .. } = client(BackendSettings::default());
    assert_eq!(client.authorize_url("c"), Err(AuthError::NotConfigured));
}

#[tokio::test]
async fn test_sign_in_starts_pending_flow() {
    let Fixture { client, .. } = client(configured());
    assert!(!client.has_pending_sign_in());

    let redirect = client.sign_in_with_google().await.unwrap();
    assert!(redirect.url.starts_with("https://proj.example.test/auth/v1/authorize?"));
    assert!(client.has_pending_sign_in());

    let url = url::Url::parse(&redirect.url).unwrap();
    let challenge = url
        .query_pairs()
        .find(|(k, _)| k == "code_challenge")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert_eq!(challenge.len(), 43, "S256 challenge is 32 bytes base64url without padding");
}

#[tokio::test]
async fn test_sign_in_unconfigured_fails() {
    let Fixture { client, .. } = client(BackendSettings::default());
    assert_eq!(
        client.sign_in_with_google().await.unwrap_err(),
        AuthError::NotConfigured
    );
    assert!(!client.has_pending_sign_in());
}

#[tokio::test]
async fn test_complete_without_pending_sign_in() {
    let Fixture { client, .. } = client(configured());
    assert_eq!(
        client.complete_sign_in("code").await.unwrap_err(),
        AuthError::NoPendingSignIn
    );
}

#[tokio::test]
async fn test_complete_unconfigured_fails_first() {
    let Fixture { client, .. } = client(BackendSettings::default());
    assert_eq!(
        client.complete_sign_in("code").await.unwrap_err(),
        AuthError::NotConfigured
    );
}

// ─── Local session ───

#[tokio::test]
async fn test_session_store_load_round_trip() {
    let Fixture { client, .. } = client(BackendSettings::default());
    assert!(client.load_session().await.unwrap().is_none());

    client.store_session(&session(1234, Some("refresh-secret"))).await.unwrap();
    let loaded = client.load_session().await.unwrap().expect("session stored");

    assert_eq!(loaded.access_token.as_str(), "access-secret");
    assert_eq!(loaded.refresh_token.as_deref().map(String::as_str), Some("refresh-secret"));
    assert_eq!(loaded.expires_at, 1234);
    assert_eq!(loaded.user.id, "user-1");
    assert_eq!(loaded.user.email.as_deref(), Some("user@example.com"));
}

#[tokio::test]
async fn test_tokens_are_not_stored_in_plaintext() {
    let Fixture { client, db, .. } = client(BackendSettings::default());
    client.store_session(&session(1, Some("refresh-secret"))).await.unwrap();

    let sealed: Vec<u8> = db
        .connection()
        .query_row("SELECT sealed_tokens FROM auth_session", [], |row| row.get(0))
        .unwrap();
    let as_text = String::from_utf8_lossy(&sealed);
    assert!(!as_text.contains("access-secret"));
    assert!(!as_text.contains("refresh-secret"));
}

#[tokio::test]
async fn test_session_survives_a_new_client() {
    let first = client(BackendSettings::default());
    first.client.store_session(&session(99, None)).await.unwrap();

    let reopened = HostedAuthClient::new(first.db.clone(), BackendSettings::default(), &first.key_path()).unwrap();
    assert_eq!(reopened.load_session().await.unwrap().unwrap().expires_at, 99);
}

#[tokio::test]
async fn test_session_sealed_under_another_key_does_not_open() {
    let first = client(BackendSettings::default());
    first.client.store_session(&session(99, None)).await.unwrap();

    // Same database, different installation key.
    let other_dir = TempDir::new().unwrap();
    let stranger = HostedAuthClient::new(
        first.db.clone(),
        BackendSettings::default(),
        &other_dir.path().join("session.key"),
    )
    .unwrap();
    assert!(matches!(stranger.load_session().await, Err(AuthError::Crypto(_))));
}

// ─── Session key file ───

#[test]
fn test_key_file_is_created_with_random_bytes() {
    let fixture = client(BackendSettings::default());
    let key = std::fs::read(fixture.key_path()).unwrap();
    assert_eq!(key.len(), SESSION_KEY_LENGTH);

    let other = client(BackendSettings::default());
    assert_ne!(key, std::fs::read(other.key_path()).unwrap(), "each installation gets its own key");
}

#[cfg(unix)]
#[test]
fn test_key_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = client(BackendSettings::default());
    let mode = std::fs::metadata(fixture.key_path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_key_file_in_missing_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("session.key");
    let db = Arc::new(Database::open_in_memory().unwrap());

    HostedAuthClient::new(db, BackendSettings::default(), &path).unwrap();
    assert!(path.exists());
}

#[test]
fn test_key_file_of_wrong_length_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.key");
    std::fs::write(&path, b"too short").unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());

    let result = HostedAuthClient::new(db, BackendSettings::default(), &path);
    assert!(matches!(result, Err(AuthError::Crypto(_))));
    assert_eq!(std::fs::read(&path).unwrap(), b"too short", "damaged key is left alone");
}

#[tokio::test]
async fn test_store_replaces_previous_session() {
    let Fixture { client, db, .. } = client(BackendSettings::default());
    client.store_session(&session(1, None)).await.unwrap();
    client.store_session(&session(2, None)).await.unwrap();

    let rows: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM auth_session", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(client.load_session().await.unwrap().unwrap().expires_at, 2);
}

#[tokio::test]
async fn test_live_session_is_returned_without_network() {
    let Fixture { client, .. } = client(BackendSettings::default());
    client.store_session(&session(far_future(), None)).await.unwrap();

    let current = client.get_session().await.unwrap().expect("session is live");
    assert_eq!(current.user.id, "user-1");

    let user = client.get_user().await.unwrap().expect("user is signed in");
    assert_eq!(user.id, "user-1");
}

#[tokio::test]
async fn test_expired_session_without_refresh_token_signs_out() {
    let Fixture { client, .. } = client(configured());
    client.store_session(&session(1, None)).await.unwrap();

    assert!(client.get_session().await.unwrap().is_none());
    assert!(client.load_session().await.unwrap().is_none(), "stale session is cleared");
}

#[tokio::test]
async fn test_expired_session_refresh_needs_backend() {
    let Fixture { client, .. } = client(BackendSettings::default());
    client.store_session(&session(1, Some("refresh-secret"))).await.unwrap();

    assert_eq!(client.get_session().await.unwrap_err(), AuthError::NotConfigured);
    assert!(client.load_session().await.unwrap().is_some(), "session kept for a later refresh");
}

#[tokio::test]
async fn test_sign_out_clears_local_session() {
    let Fixture { client, .. } = client(BackendSettings::default());
    client.store_session(&session(far_future(), None)).await.unwrap();

    client.sign_out().await.unwrap();
    assert!(client.get_session().await.unwrap().is_none());

    // Signing out twice is fine.
    client.sign_out().await.unwrap();
}

// ─── Token refresh ───

/// Serves `/auth/v1/token`: the first request succeeds after `delay`, every
/// later one is refused the way a reused refresh token would be.
async fn token_server(delay: Duration) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                let header_end = loop {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    request.extend_from_slice(&buf[..n]);
                    if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };
                let head = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
                let length: usize = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .map(|v| v.trim().parse().unwrap())
                    .unwrap_or(0);
                while request.len() < header_end + length {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }

                let (status, body) = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    tokio::time::sleep(delay).await;
                    (
                        "200 OK",
                        r#"{"access_token":"fresh-access","refresh_token":"fresh-refresh","expires_in":3600,"user":{"id":"user-1","email":"user@example.com"}}"#,
                    )
                } else {
                    ("400 Bad Request", r#"{"error":"invalid_grant"}"#)
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), hits)
}

fn backend_at(url: String) -> BackendSettings {
    BackendSettings {
        url,
        anon_key: "anon-key".to_string(),
        redirect_url: "http://localhost:3000/auth/callback".to_string(),
    }
}

#[tokio::test]
async fn test_expired_session_is_refreshed_and_stored() {
    let (url, hits) = token_server(Duration::ZERO).await;
    let Fixture { client, .. } = client(backend_at(url));
    client.store_session(&session(1, Some("refresh-secret"))).await.unwrap();

    let refreshed = client.get_session().await.unwrap().expect("refresh succeeded");
    assert_eq!(refreshed.access_token.as_str(), "fresh-access");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let stored = client.load_session().await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref().map(String::as_str), Some("fresh-refresh"));
}

#[tokio::test]
async fn test_concurrent_reads_refresh_once() {
    let (url, hits) = token_server(Duration::from_millis(100)).await;
    let Fixture { client, .. } = client(backend_at(url));
    client.store_session(&session(1, Some("refresh-secret"))).await.unwrap();

    let (a, b) = tokio::join!(client.get_session(), client.get_session());

    assert_eq!(a.unwrap().expect("first reader signed in").user.id, "user-1");
    assert_eq!(b.unwrap().expect("second reader signed in").user.id, "user-1");
    assert_eq!(hits.load(Ordering::SeqCst), 1, "refresh token spent exactly once");
    assert!(client.load_session().await.unwrap().is_some());
}

#[tokio::test]
async fn test_rejected_refresh_signs_out_locally() {
    let (url, hits) = token_server(Duration::ZERO).await;
    hits.store(1, Ordering::SeqCst);
    let Fixture { client, .. } = client(backend_at(url));
    client.store_session(&session(1, Some("spent-token"))).await.unwrap();

    assert!(client.get_session().await.unwrap().is_none());
    assert!(client.load_session().await.unwrap().is_none());
}
