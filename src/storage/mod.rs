//! `SQLite` storage layer for bugtrack.
//!
//! This module provides the persistence layer using `SQLite` with:
//! - WAL mode and a busy timeout for concurrent CLI invocations
//! - Transactions around multi-step writes (delete cascade, crawl upserts)
//! - A unique `(bug, url)` index entry per bug
//! - Unique `(provider, project, cycle_id)` test cycles
//!
//! # Submodules
//!
//! - [`schema`] - Table definitions
//! - [`sqlite`] - [`SqliteStorage`] and its operations

pub mod schema;
pub mod sqlite;

pub use bugtrack_core::query::BugFilters;
pub use sqlite::SqliteStorage;
