//! Hosted auth client.
//!
//! Implements [`IdentityProvider`] against a hosted auth REST API using the
//! OAuth authorization-code flow with PKCE:
//!
//! 1. `sign_in_with_google` builds `/auth/v1/authorize?provider=google&...`
//!    and keeps the PKCE verifier in memory.
//! 2. The provider redirects back with `?code=...`; `complete_sign_in`
//!    exchanges it at `/auth/v1/token?grant_type=pkce`.
//! 3. The session is persisted in the `auth_session` table with its tokens
//!    sealed under AES-256-GCM, and refreshed on read once it expires.
//!
//! The sealing key is 32 random bytes kept in a per-installation key file
//! (owner read/write only on Unix), never inside the database itself.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;
use zeroize::Zeroizing;

use crate::database::connection::Database;
use crate::services::crypto_service::{CryptoService, SealedData};
use crate::services::identity::IdentityProvider;
use crate::types::errors::AuthError;
use crate::types::principal::{AuthSession, Principal, SignInRedirect};
use crate::types::settings::BackendSettings;

/// Length of the session sealing key in bytes (AES-256).
pub const SESSION_KEY_LENGTH: usize = 32;

/// Lifetime assumed when the token endpoint reports neither `expires_at` nor `expires_in`.
const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

/// Token material as sealed on disk.
#[derive(Serialize, Deserialize)]
struct StoredTokens {
    access_token: String,
    refresh_token: Option<String>,
}

/// Reads the session key at `path`, creating it with fresh random bytes on first use.
///
/// A file of the wrong length is an error rather than being overwritten, so a
/// damaged key never silently orphans a stored session.
pub fn load_or_create_session_key(
    path: &Path,
    crypto: &CryptoService,
) -> Result<Zeroizing<Vec<u8>>, AuthError> {
    match fs::read(path) {
        Ok(bytes) => return checked_key(Zeroizing::new(bytes), path),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(AuthError::Storage(format!("read {}: {}", path.display(), e))),
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AuthError::Storage(format!("create {}: {}", parent.display(), e)))?;
    }

    let key = Zeroizing::new(crypto.random_bytes(SESSION_KEY_LENGTH)?);
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    match options.open(path) {
        Ok(mut file) => {
            file.write_all(&key)
                .and_then(|_| file.sync_all())
                .map_err(|e| AuthError::Storage(format!("write {}: {}", path.display(), e)))?;
            tracing::info!(path = %path.display(), "created session key");
            Ok(key)
        }
        // Another process created it first; use theirs.
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let bytes = fs::read(path)
                .map_err(|e| AuthError::Storage(format!("read {}: {}", path.display(), e)))?;
            checked_key(Zeroizing::new(bytes), path)
        }
        Err(e) => Err(AuthError::Storage(format!("create {}: {}", path.display(), e))),
    }
}

fn checked_key(bytes: Zeroizing<Vec<u8>>, path: &Path) -> Result<Zeroizing<Vec<u8>>, AuthError> {
    if bytes.len() != SESSION_KEY_LENGTH {
        return Err(AuthError::Crypto(format!(
            "session key {} must be {} bytes, got {}",
            path.display(),
            SESSION_KEY_LENGTH,
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Identity provider backed by a hosted auth service and a local SQLite session.
pub struct HostedAuthClient {
    db: Arc<Database>,
    http: reqwest::Client,
    backend: BackendSettings,
    crypto: CryptoService,
    session_key: Zeroizing<Vec<u8>>,
    pending_verifier: Mutex<Option<Zeroizing<String>>>,
    /// Held from reading an expired session until the refreshed one is stored.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl HostedAuthClient {
    /// Creates a client sealing sessions with the key file at `key_path`
    /// (created on first use). An unconfigured backend is accepted; network
    /// calls then fail with [`AuthError::NotConfigured`] while local reads keep working.
    pub fn new(db: Arc<Database>, backend: BackendSettings, key_path: &Path) -> Result<Self, AuthError> {
        let crypto = CryptoService::new();
        let session_key = load_or_create_session_key(key_path, &crypto)?;

        Ok(Self {
            db,
            http: reqwest::Client::new(),
            backend,
            crypto,
            session_key,
            pending_verifier: Mutex::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        if !self.backend.is_configured() {
            return Err(AuthError::NotConfigured);
        }
        let base = self.backend.url.trim().trim_end_matches('/');
        Url::parse(&format!("{}/auth/v1/{}", base, path))
            .map_err(|e| AuthError::Rejected(format!("invalid backend url: {}", e)))
    }

    /// Runs a blocking SQLite closure off the async executor.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, AuthError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, AuthError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let conn = db.connection();
            f(&conn)
        })
        .await
        .map_err(|e| AuthError::Storage(e.to_string()))?
    }

    /// Builds the provider authorization URL for a PKCE challenge.
    pub fn authorize_url(&self, challenge: &str) -> Result<Url, AuthError> {
        let mut url = self.endpoint("authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", "google")
            .append_pair("redirect_to", &self.backend.redirect_url)
            .append_pair("code_challenge", challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url)
    }

    async fn request_token(&self, grant_type: &str, body: serde_json::Value) -> Result<AuthSession, AuthError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .http
            .post(url)
            .header("apikey", &self.backend.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!("{}: {}", status, detail)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Rejected(format!("malformed token response: {}", e)))?;

        let expires_at = token
            .expires_at
            .unwrap_or_else(|| Self::now() + token.expires_in.unwrap_or(DEFAULT_SESSION_TTL_SECS));

        Ok(AuthSession {
            access_token: Zeroizing::new(token.access_token),
            refresh_token: token.refresh_token.map(Zeroizing::new),
            expires_at,
            user: Principal {
                id: token.user.id,
                email: token.user.email,
            },
        })
    }

    /// Persists `session` as the current session, replacing any previous one.
    pub async fn store_session(&self, session: &AuthSession) -> Result<(), AuthError> {
        let tokens = StoredTokens {
            access_token: session.access_token.to_string(),
            refresh_token: session.refresh_token.as_ref().map(|t| t.to_string()),
        };
        let plaintext = Zeroizing::new(
            serde_json::to_vec(&tokens).map_err(|e| AuthError::Storage(e.to_string()))?,
        );
        let sealed = self.crypto.seal(&plaintext, &self.session_key)?;
        let user = session.user.clone();
        let expires_at = session.expires_at;
        let now = Self::now();

        self.with_connection(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO auth_session \
                 (id, sealed_tokens, iv, auth_tag, user_id, email, expires_at, updated_at) \
                 VALUES ('default', ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    sealed.ciphertext,
                    sealed.iv,
                    sealed.auth_tag,
                    user.id,
                    user.email,
                    expires_at,
                    now
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Reads the persisted session without checking its expiry.
    pub async fn load_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let row = self
            .with_connection(|conn| {
                let row = conn.query_row(
                    "SELECT sealed_tokens, iv, auth_tag, user_id, email, expires_at \
                     FROM auth_session WHERE id = 'default'",
                    [],
                    |row| {
                        Ok((
                            SealedData {
                                ciphertext: row.get(0)?,
                                iv: row.get(1)?,
                                auth_tag: row.get(2)?,
                            },
                            Principal {
                                id: row.get(3)?,
                                email: row.get(4)?,
                            },
                            row.get::<_, i64>(5)?,
                        ))
                    },
                );
                match row {
                    Ok(found) => Ok(Some(found)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        let (sealed, user, expires_at) = match row {
            Some(found) => found,
            None => return Ok(None),
        };

        let plaintext = self.crypto.open(&sealed, &self.session_key)?;
        let tokens: StoredTokens =
            serde_json::from_slice(&plaintext).map_err(|e| AuthError::Storage(e.to_string()))?;

        Ok(Some(AuthSession {
            access_token: Zeroizing::new(tokens.access_token),
            refresh_token: tokens.refresh_token.map(Zeroizing::new),
            expires_at,
            user,
        }))
    }

    pub async fn clear_session(&self) -> Result<(), AuthError> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM auth_session", [])?;
            Ok(())
        })
        .await
    }

    /// Whether a sign-in has been started and not yet completed.
    pub fn has_pending_sign_in(&self) -> bool {
        self.pending_verifier
            .lock()
            .map(|pending| pending.is_some())
            .unwrap_or(false)
    }
}

#[async_trait]
impl IdentityProvider for HostedAuthClient {
    async fn get_session(&self) -> Result<Option<AuthSession>, AuthError> {
        match self.load_session().await? {
            Some(session) if !session.is_expired(Self::now()) => return Ok(Some(session)),
            Some(_) => {}
            None => return Ok(None),
        }

        // One refresh at a time: a rotated refresh token is only valid once.
        let _refreshing = self.refresh_lock.lock().await;

        // Whoever held the lock before us may already have refreshed.
        let session = match self.load_session().await? {
            Some(session) => session,
            None => return Ok(None),
        };
        if !session.is_expired(Self::now()) {
            return Ok(Some(session));
        }

        let refresh_token = match &session.refresh_token {
            Some(token) => token.to_string(),
            None => {
                self.clear_session().await?;
                return Ok(None);
            }
        };

        match self
            .request_token("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(refreshed) => {
                self.store_session(&refreshed).await?;
                tracing::debug!(user = %refreshed.user.id, "session refreshed");
                Ok(Some(refreshed))
            }
            Err(AuthError::Rejected(reason)) => {
                tracing::info!(%reason, "refresh rejected, signing out locally");
                self.clear_session().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_google(&self) -> Result<SignInRedirect, AuthError> {
        let pair = self.crypto.pkce_pair()?;
        let url = self.authorize_url(&pair.challenge)?;

        let mut pending = self
            .pending_verifier
            .lock()
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        *pending = Some(pair.verifier);

        Ok(SignInRedirect { url: url.into() })
    }

    async fn complete_sign_in(&self, code: &str) -> Result<AuthSession, AuthError> {
        self.endpoint("token")?;
        let verifier = self
            .pending_verifier
            .lock()
            .map_err(|e| AuthError::Storage(e.to_string()))?
            .take()
            .ok_or(AuthError::NoPendingSignIn)?;

        let session = self
            .request_token(
                "pkce",
                json!({ "auth_code": code, "code_verifier": verifier.as_str() }),
            )
            .await?;
        self.store_session(&session).await?;
        tracing::info!(user = %session.user.id, "signed in");
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.load_session().await.ok().flatten();

        if let (Some(session), Ok(url)) = (session, self.endpoint("logout")) {
            let revoked = self
                .http
                .post(url)
                .header("apikey", &self.backend.anon_key)
                .bearer_auth(session.access_token.as_str())
                .send()
                .await;
            if let Err(e) = revoked {
                tracing::warn!(error = %e, "remote sign-out failed, clearing local session anyway");
            }
        }

        self.clear_session().await
    }
}
