//! Persistent store for bookmarks.
//!
//! [`BookmarkStore`] is the seam the synchronizer talks to: owner-filtered
//! insert/select/delete plus a change feed keyed by owner.
//! [`SqliteBookmarkStore`] implements it over `rusqlite`, publishing a
//! [`ChangeEvent`] on a process-wide broadcast channel after every write that
//! touched a row. Every synchronizer sharing one store instance therefore sees
//! the writes of every other one.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::database::connection::Database;
use crate::types::bookmark::{Bookmark, BookmarkFilter, NewBookmark};
use crate::types::errors::StoreError;

/// Buffered change events per subscriber before it is considered lagging.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// What happened to the owner's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Delete,
    /// The subscriber fell behind and missed events; its view must be rebuilt.
    Resync,
}

/// A notification that rows owned by `owner` changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub owner: String,
    pub id: Option<String>,
}

/// Change notifications for a single owner.
pub struct ChangeFeed {
    owner: String,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(owner: &str, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            owner: owner.to_string(),
            rx,
        }
    }

    /// Waits for the next change to this owner's rows.
    ///
    /// Events for other owners are skipped. Missed events collapse into a
    /// single [`ChangeKind::Resync`]. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.owner == self.owner => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => {
                    return Some(ChangeEvent {
                        kind: ChangeKind::Resync,
                        owner: self.owner.clone(),
                        id: None,
                    })
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Trait defining the persistent store consumed by the synchronizer.
///
/// Each call is a single atomic store operation.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Inserts one record owned by `owner`; the store assigns `id` and `created_at`.
    async fn insert(&self, owner: &str, bookmark: &NewBookmark) -> Result<Bookmark, StoreError>;

    /// Returns the rows matching `filter`, newest first.
    async fn select(&self, filter: &BookmarkFilter) -> Result<Vec<Bookmark>, StoreError>;

    /// Removes the rows matching `filter`. Returns how many were removed.
    async fn delete(&self, filter: &BookmarkFilter) -> Result<u64, StoreError>;

    /// Opens a change feed for rows owned by `owner`.
    fn subscribe(&self, owner: &str) -> ChangeFeed;
}

/// Bookmark store backed by a SQLite database.
pub struct SqliteBookmarkStore {
    db: Arc<Database>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteBookmarkStore {
    pub fn new(db: Arc<Database>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { db, changes }
    }

    /// Returns the current UNIX timestamp in milliseconds.
    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }

    /// Reads a single `Bookmark` row into a struct.
    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        Ok(Bookmark {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            owner: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn publish(&self, kind: ChangeKind, owner: &str, id: Option<&str>) {
        // No receivers is not an error: nobody is subscribed right now.
        let _ = self.changes.send(ChangeEvent {
            kind,
            owner: owner.to_string(),
            id: id.map(str::to_string),
        });
    }

    /// Runs a blocking SQLite closure off the async executor.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db.connection();
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

#[async_trait]
impl BookmarkStore for SqliteBookmarkStore {
    async fn insert(&self, owner: &str, bookmark: &NewBookmark) -> Result<Bookmark, StoreError> {
        let record = Bookmark {
            id: Uuid::new_v4().to_string(),
            title: bookmark.title().to_string(),
            url: bookmark.url().to_string(),
            owner: owner.to_string(),
            created_at: 0,
        };

        let inserted = self
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                // created_at is strictly increasing so newest-first is a total order.
                let latest: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(created_at), 0) FROM bookmarks",
                    [],
                    |row| row.get(0),
                )?;
                let record = Bookmark {
                    created_at: Self::now_millis().max(latest + 1),
                    ..record
                };
                tx.execute(
                    "INSERT INTO bookmarks (id, user_id, title, url, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![record.id, record.owner, record.title, record.url, record.created_at],
                )?;
                tx.commit()?;
                Ok(record)
            })
            .await?;

        self.publish(ChangeKind::Insert, &inserted.owner, Some(&inserted.id));
        Ok(inserted)
    }

    async fn select(&self, filter: &BookmarkFilter) -> Result<Vec<Bookmark>, StoreError> {
        let filter = filter.clone();
        self.with_connection(move |conn| {
            let mut stmt = match filter.id {
                Some(_) => conn.prepare(
                    "SELECT id, title, url, user_id, created_at FROM bookmarks \
                     WHERE user_id = ?1 AND id = ?2 ORDER BY created_at DESC, id DESC",
                ),
                None => conn.prepare(
                    "SELECT id, title, url, user_id, created_at FROM bookmarks \
                     WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
                ),
            }?;

            let rows = match &filter.id {
                Some(id) => stmt.query_map(params![filter.owner, id], Self::row_to_bookmark),
                None => stmt.query_map(params![filter.owner], Self::row_to_bookmark),
            }?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row?);
            }
            Ok(results)
        })
        .await
    }

    async fn delete(&self, filter: &BookmarkFilter) -> Result<u64, StoreError> {
        let owned = filter.clone();
        let affected = self
            .with_connection(move |conn| {
                let affected = match &owned.id {
                    Some(id) => conn.execute(
                        "DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2",
                        params![id, owned.owner],
                    ),
                    None => conn.execute(
                        "DELETE FROM bookmarks WHERE user_id = ?1",
                        params![owned.owner],
                    ),
                }?;
                Ok(affected as u64)
            })
            .await?;

        if affected > 0 {
            self.publish(ChangeKind::Delete, &filter.owner, filter.id.as_deref());
        }
        Ok(affected)
    }

    fn subscribe(&self, owner: &str) -> ChangeFeed {
        ChangeFeed::new(owner, self.changes.subscribe())
    }
}
