//! Database layer.
//!
//! Provides SQLite connection management and schema migrations.
//!
//! # Usage
//!
//! ```no_run
//! use bookmark_sync::database::Database;
//!
//! // Open a persistent database
//! let db = Database::open("bookmarks.db").expect("failed to open database");
//!
//! // Or use an in-memory database for testing
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//!
//! let count: i64 = db
//!     .connection()
//!     .query_row("SELECT COUNT(*) FROM bookmarks", [], |row| row.get(0))
//!     .expect("query failed");
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
