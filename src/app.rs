//! App Core.
//!
//! Composition root: builds the database, store, identity provider, session
//! accessor and synchronizer once, and owns the live subscriptions created
//! through the RPC surface.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::database::connection::Database;
use crate::managers::bookmark_sync::{BookmarkSynchronizer, Subscription};
use crate::managers::session_accessor::SessionAccessor;
use crate::platform;
use crate::services::bookmark_store::{BookmarkStore, SqliteBookmarkStore};
use crate::services::hosted_auth::HostedAuthClient;
use crate::services::identity::IdentityProvider;
use crate::services::observer::{SyncObserver, TracingObserver};
use crate::types::settings::AppSettings;

/// Central application struct holding the wired components.
pub struct App {
    pub sessions: SessionAccessor,
    pub bookmarks: BookmarkSynchronizer,
    subscriptions: HashMap<String, Subscription>,
    notifier: Option<UnboundedSender<Value>>,
}

impl App {
    /// Opens the database named by `settings` (or the default data dir) and
    /// wires the hosted auth client, sealing its session with the configured
    /// key file, and the SQLite store.
    pub fn new(settings: AppSettings) -> Result<Self, Box<dyn std::error::Error>> {
        let db_path = settings
            .storage
            .database_path
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| platform::get_data_dir().join("bookmarks.db"));
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let key_path = settings
            .storage
            .session_key_path
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| platform::get_config_dir().join("session.key"));

        let db = Arc::new(Database::open(&db_path)?);
        let identity = Arc::new(HostedAuthClient::new(db.clone(), settings.backend, &key_path)?);
        let store = Arc::new(SqliteBookmarkStore::new(db));
        tracing::info!(database = %db_path.display(), "app initialized");

        Ok(Self::with_components(identity, store, Arc::new(TracingObserver)))
    }

    /// Wires caller-supplied components.
    pub fn with_components(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn BookmarkStore>,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        let sessions = SessionAccessor::new(identity, observer.clone());
        let bookmarks = BookmarkSynchronizer::new(sessions.clone(), store, observer);

        Self {
            sessions,
            bookmarks,
            subscriptions: HashMap::new(),
            notifier: None,
        }
    }

    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        self.sessions.identity().clone()
    }

    /// Sets where pushed events (`bookmarks.changed`) are delivered.
    pub fn set_notifier(&mut self, notifier: UnboundedSender<Value>) {
        self.notifier = Some(notifier);
    }

    pub fn notifier(&self) -> Option<UnboundedSender<Value>> {
        self.notifier.clone()
    }

    pub fn new_subscription_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Keeps `subscription` alive under `id` until it is cancelled.
    pub fn track_subscription(&mut self, id: &str, subscription: Subscription) {
        if let Some(previous) = self.subscriptions.insert(id.to_string(), subscription) {
            previous.cancel();
        }
    }

    /// Cancels and forgets one subscription. Returns whether it existed.
    pub fn cancel_subscription(&mut self, id: &str) -> bool {
        match self.subscriptions.remove(id) {
            Some(subscription) => {
                subscription.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all_subscriptions(&mut self) {
        for (_, subscription) in self.subscriptions.drain() {
            subscription.cancel();
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions
            .values()
            .filter(|subscription| subscription.is_active())
            .count()
    }

    /// Shutdown sequence: stop every change subscription.
    pub fn shutdown(&mut self) {
        self.cancel_all_subscriptions();
        tracing::info!("app shut down");
    }
}
