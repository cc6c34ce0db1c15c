//! Output formatting for bugtrack.
//!
//! Commands print either human-readable text or, with `--json`, pretty
//! JSON on stdout. Diagnostics never go to stdout.
//!
//! # JSON Output Types
//!
//! - [`BugDetails`] - Bug with its URL mappings (show)
//! - [`BugList`] - Filtered bug listing (list, urls)

mod output;
mod text;

pub use output::{BugDetails, BugList, print_json};
pub use text::{format_bug_line, format_crawl_report, format_cycle_line, format_state_icon};
