//! Diagnostics hook for the data-access layer.
//!
//! The synchronizer and session accessor never log on their own; they report
//! what happened to an injected [`SyncObserver`]. [`TracingObserver`] turns
//! those reports into `tracing` events, [`NoopObserver`] drops them.

use std::sync::Mutex;

use crate::types::errors::{AuthError, StoreError};

/// Something worth knowing about that happened inside the data-access layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    BookmarkAdded { owner: String, id: String },
    BookmarkDeleted { owner: String, id: String, removed: u64 },
    CollectionFetched { owner: String, count: usize },
    StoreFailed { operation: &'static str, error: StoreError },
    SessionLookupFailed { error: AuthError },
    SubscriptionOpened { channel: String },
    SubscriptionClosed { channel: String },
    RefetchFailed { channel: String, error: StoreError },
}

pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn on_event(&self, _event: &SyncEvent) {}
}

/// Emits every event as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::BookmarkAdded { owner, id } => {
                tracing::info!(%owner, %id, "bookmark added");
            }
            SyncEvent::BookmarkDeleted { owner, id, removed } => {
                tracing::info!(%owner, %id, removed, "bookmark delete applied");
            }
            SyncEvent::CollectionFetched { owner, count } => {
                tracing::debug!(%owner, count, "bookmarks fetched");
            }
            SyncEvent::StoreFailed { operation, error } => {
                tracing::error!(operation, %error, "bookmark store request failed");
            }
            SyncEvent::SessionLookupFailed { error } => {
                tracing::warn!(%error, "session lookup failed, treating as signed out");
            }
            SyncEvent::SubscriptionOpened { channel } => {
                tracing::debug!(%channel, "subscription opened");
            }
            SyncEvent::SubscriptionClosed { channel } => {
                tracing::debug!(%channel, "subscription closed");
            }
            SyncEvent::RefetchFailed { channel, error } => {
                tracing::warn!(%channel, %error, "re-fetch after change failed");
            }
        }
    }
}

/// Keeps every event in memory, for assertions and debugging.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl SyncObserver for RecordingObserver {
    fn on_event(&self, event: &SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
