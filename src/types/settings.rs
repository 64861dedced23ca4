use serde::{Deserialize, Serialize};

/// Top-level application settings container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub backend: BackendSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

/// Hosted backend endpoints and credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL of the hosted backend, e.g. `https://project.example.co`.
    /// Empty means not configured.
    pub url: String,
    /// Public (anon) API key sent with every auth request.
    pub anon_key: String,
    /// Where the provider sends the browser back after sign-in.
    pub redirect_url: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            redirect_url: "http://localhost:3000/auth/callback".to_string(),
        }
    }
}

impl BackendSettings {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Local persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// Explicit SQLite path. Falls back to `<data_dir>/bookmarks.db`.
    pub database_path: Option<String>,
    /// Key file sealing the stored session. Falls back to `<config_dir>/session.key`.
    pub session_key_path: Option<String>,
}

/// Diagnostic output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "bookmark_sync=info,warn".to_string(),
        }
    }
}
