//! `bugtrack` - bug dashboard backend library
//!
//! This crate provides the functionality behind the `bt` CLI: a local
//! `SQLite` bug store fed by pluggable providers, plus a JSON router that
//! mirrors the dashboard's HTTP routes.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`storage`] - `SQLite` database layer
//! - [`providers`] - Crawl, index and push services per provider
//! - [`api`] - Transport-agnostic request router
//! - [`config`] - Workspace discovery and configuration
//! - [`validation`] - Bug and test cycle validation
//! - [`format`] - Output formatting (text, JSON)
//! - [`build_flags`] - Flag normalization for the build script
//!
//! The shared model, error and JSONL modules live in `bugtrack-core` and
//! are re-exported here.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod build_flags;
pub mod cli;
pub mod config;
pub mod format;
pub mod logging;
pub mod providers;
pub mod storage;
pub mod validation;

pub use bugtrack_core::{error, jsonl, model, query, util};
pub use bugtrack_core::{BugError, Result};

pub use cli::run;
