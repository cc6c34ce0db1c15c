//! Command implementations.
//!
//! Each command returns the core `Result`; `cli::run` turns failures into
//! the process exit status.

pub mod api;
pub mod build;
pub mod create;
pub mod cycle;
pub mod delete;
pub mod init;
pub mod list;
pub mod services;
pub mod show;
pub mod state;
pub mod update;
pub mod urls;
pub mod version;
