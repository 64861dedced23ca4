//! Bookmark Synchronizer.
//!
//! Implements `BookmarkSyncTrait`: owner-scoped add/list/delete against a
//! [`BookmarkStore`], and a subscription that re-fetches the whole collection
//! whenever the store reports a change to the owner's rows. The synchronizer
//! keeps no state of its own; every answer comes fresh from the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::managers::session_accessor::SessionAccessor;
use crate::services::bookmark_store::{BookmarkStore, ChangeFeed};
use crate::services::observer::{SyncEvent, SyncObserver};
use crate::types::bookmark::{Bookmark, BookmarkFilter, NewBookmark};
use crate::types::errors::{BookmarkError, StoreError, ValidationError};

/// Receives the complete, newest-first collection after every change.
pub type ChangeCallback = Arc<dyn Fn(Vec<Bookmark>) + Send + Sync>;

/// Trait defining the bookmark operations offered to the presentation layer.
#[async_trait]
pub trait BookmarkSyncTrait {
    /// Validates input, then inserts one bookmark owned by the signed-in user.
    async fn add(&self, title: &str, url: &str) -> Result<Bookmark, BookmarkError>;
    /// The signed-in user's bookmarks, newest first; empty when signed out.
    async fn list(&self) -> Result<Vec<Bookmark>, BookmarkError>;
    /// Removes the bookmark if the signed-in user owns it. Missing ids are not an error.
    async fn delete(&self, id: &str) -> Result<(), BookmarkError>;
    /// Calls `on_change` with the refreshed collection after each change to the user's rows.
    async fn subscribe(&self, on_change: ChangeCallback) -> Subscription;
}

#[derive(Clone)]
pub struct BookmarkSynchronizer {
    sessions: SessionAccessor,
    store: Arc<dyn BookmarkStore>,
    observer: Arc<dyn SyncObserver>,
}

impl BookmarkSynchronizer {
    pub fn new(
        sessions: SessionAccessor,
        store: Arc<dyn BookmarkStore>,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        Self {
            sessions,
            store,
            observer,
        }
    }

    pub fn sessions(&self) -> &SessionAccessor {
        &self.sessions
    }

    fn store_failed(&self, operation: &'static str, error: StoreError) -> BookmarkError {
        self.observer.on_event(&SyncEvent::StoreFailed {
            operation,
            error: error.clone(),
        });
        BookmarkError::Store(error)
    }

    async fn watch(
        self,
        mut feed: ChangeFeed,
        active: Arc<AtomicBool>,
        delivery: Arc<Mutex<()>>,
        on_change: ChangeCallback,
        channel: String,
    ) {
        while feed.next().await.is_some() {
            if !active.load(Ordering::SeqCst) {
                break;
            }
            match self.list().await {
                Ok(bookmarks) => {
                    // `cancel` takes the same lock, so it waits out a running callback.
                    let _delivering = delivery.lock().unwrap_or_else(PoisonError::into_inner);
                    if active.load(Ordering::SeqCst) {
                        on_change(bookmarks);
                    }
                }
                Err(BookmarkError::Store(error)) => {
                    self.observer.on_event(&SyncEvent::RefetchFailed {
                        channel: channel.clone(),
                        error,
                    });
                }
                Err(_) => {}
            }
        }

        if active.swap(false, Ordering::SeqCst) {
            self.observer
                .on_event(&SyncEvent::SubscriptionClosed { channel });
        }
    }
}

#[async_trait]
impl BookmarkSyncTrait for BookmarkSynchronizer {
    async fn add(&self, title: &str, url: &str) -> Result<Bookmark, BookmarkError> {
        let bookmark = NewBookmark::parse(title, url)?;
        let principal = self
            .sessions
            .current_principal()
            .await
            .ok_or(BookmarkError::AuthenticationRequired)?;

        let created = self
            .store
            .insert(&principal.id, &bookmark)
            .await
            .map_err(|e| self.store_failed("add", e))?;

        self.observer.on_event(&SyncEvent::BookmarkAdded {
            owner: created.owner.clone(),
            id: created.id.clone(),
        });
        Ok(created)
    }

    async fn list(&self) -> Result<Vec<Bookmark>, BookmarkError> {
        let principal = match self.sessions.current_principal().await {
            Some(principal) => principal,
            None => return Ok(Vec::new()),
        };

        let bookmarks = self
            .store
            .select(&BookmarkFilter::owned_by(&principal.id))
            .await
            .map_err(|e| self.store_failed("list", e))?;

        self.observer.on_event(&SyncEvent::CollectionFetched {
            owner: principal.id,
            count: bookmarks.len(),
        });
        Ok(bookmarks)
    }

    async fn delete(&self, id: &str) -> Result<(), BookmarkError> {
        if id.trim().is_empty() {
            return Err(ValidationError::InvalidId(id.to_string()).into());
        }
        let principal = self
            .sessions
            .current_principal()
            .await
            .ok_or(BookmarkError::AuthenticationRequired)?;

        let removed = self
            .store
            .delete(&BookmarkFilter::single(&principal.id, id))
            .await
            .map_err(|e| self.store_failed("delete", e))?;

        self.observer.on_event(&SyncEvent::BookmarkDeleted {
            owner: principal.id,
            id: id.to_string(),
            removed,
        });
        Ok(())
    }

    async fn subscribe(&self, on_change: ChangeCallback) -> Subscription {
        let principal = match self.sessions.current_principal().await {
            Some(principal) => principal,
            None => return Subscription::inert(),
        };

        let channel = format!("bookmarks-{}", principal.id);
        // Registered before returning so no change after this call is missed.
        let feed = self.store.subscribe(&principal.id);
        let active = Arc::new(AtomicBool::new(true));
        let delivery = Arc::new(Mutex::new(()));

        self.observer.on_event(&SyncEvent::SubscriptionOpened {
            channel: channel.clone(),
        });
        let task = tokio::spawn(self.clone().watch(
            feed,
            Arc::clone(&active),
            Arc::clone(&delivery),
            on_change,
            channel.clone(),
        ));

        Subscription {
            inner: Some(ActiveSubscription {
                channel,
                active,
                delivery,
                task,
                observer: Arc::clone(&self.observer),
            }),
        }
    }
}

struct ActiveSubscription {
    channel: String,
    active: Arc<AtomicBool>,
    delivery: Arc<Mutex<()>>,
    task: JoinHandle<()>,
    observer: Arc<dyn SyncObserver>,
}

/// Handle to a live change subscription. Dropping it cancels the subscription.
pub struct Subscription {
    inner: Option<ActiveSubscription>,
}

impl Subscription {
    /// A handle that never fires, returned when nobody is signed in.
    pub fn inert() -> Self {
        Self { inner: None }
    }

    pub fn is_active(&self) -> bool {
        self.inner
            .as_ref()
            .map(|sub| sub.active.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// `bookmarks-<owner>`, or `None` for an inert handle.
    pub fn channel(&self) -> Option<&str> {
        self.inner.as_ref().map(|sub| sub.channel.as_str())
    }

    /// Stops delivery. Blocks until a callback already running has returned;
    /// no callback runs after this returns. Safe to call repeatedly, but not
    /// from inside this subscription's own callback.
    pub fn cancel(&self) {
        if let Some(sub) = &self.inner {
            let _delivering = sub.delivery.lock().unwrap_or_else(PoisonError::into_inner);
            if sub.active.swap(false, Ordering::SeqCst) {
                sub.task.abort();
                sub.observer.on_event(&SyncEvent::SubscriptionClosed {
                    channel: sub.channel.clone(),
                });
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
