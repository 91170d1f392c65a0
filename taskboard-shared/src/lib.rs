//! # Taskboard Shared Library
//!
//! Core of the Taskboard task tracker: persistence, lifecycle rules and
//! backups, used by the API server.
//!
//! ## Module Organization
//!
//! - `db`: connection pool and schema bootstrap
//! - `models`: task, category and attachment records with their SQL
//! - `store`: the `TaskStore` persistence seam (PostgreSQL and in-memory)
//! - `lifecycle`: validation, forward-only status transitions, listing order,
//!   attachment upload and cleanup
//! - `storage`: blob store clients and the backup exporter
//! - `error`: typed persistence errors

pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod storage;
pub mod store;

/// Current version of the Taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
