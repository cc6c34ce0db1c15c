use bugtrack_core::error::Result;
use bugtrack_core::model::{Bug, UrlBugMap};
use serde::Serialize;

/// Bug with its URL mappings for the show view.
#[derive(Debug, Clone, Serialize)]
pub struct BugDetails {
    #[serde(flatten)]
    pub bug: Bug,
    pub mappings: Vec<UrlBugMap>,
}

/// A listing, with the count up front for scripts.
#[derive(Debug, Clone, Serialize)]
pub struct BugList {
    pub count: usize,
    pub bugs: Vec<Bug>,
}

impl BugList {
    #[must_use]
    pub fn new(bugs: Vec<Bug>) -> Self {
        Self {
            count: bugs.len(),
            bugs,
        }
    }
}

/// Pretty-print `value` as JSON on stdout.
///
/// # Errors
///
/// Returns `Json` if serialization fails.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
