//! bookmark-sync: per-user bookmark collections backed by a hosted identity
//! service and a SQLite store with a live change feed.
//!
//! This library crate exposes all modules for use by the binary and integration tests.

pub mod app;
pub mod database;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod telemetry;
pub mod types;
