//! Show command implementation.

use bugtrack_core::error::{BugError, Result};

use crate::cli::CommandContext;
use crate::format::{BugDetails, format_bug_line, print_json};

/// Execute the show command.
///
/// # Errors
///
/// Returns an error if no id is given, an id is malformed, or a bug is not
/// found.
pub fn execute(ids: &[String], ctx: &CommandContext) -> Result<()> {
    if ids.is_empty() {
        return Err(BugError::validation("ids", "no bug ids provided"));
    }
    let session = ctx.open()?;

    let mut details = Vec::with_capacity(ids.len());
    for key in ids {
        let bug = session.storage.get_bug_by_key(key)?;
        let mappings = session.storage.mappings_for_bug(bug.id)?;
        details.push(BugDetails { bug, mappings });
    }

    if ctx.json {
        return print_json(&details);
    }
    for BugDetails { bug, mappings } in &details {
        println!("{}", format_bug_line(bug));
        println!("  state:    {}", bug.state);
        if !bug.project.is_empty() {
            println!("  project:  {}", bug.project);
        }
        let optional = [
            ("url", bug.url.as_deref()),
            ("priority", bug.priority.as_deref()),
            ("author", bug.author.as_deref()),
            ("updater", bug.last_updater.as_deref()),
            ("details", bug.details_link.as_deref()),
            ("expected", bug.expected.as_deref()),
            ("result", bug.result.as_deref()),
        ];
        for (label, value) in optional {
            if let Some(value) = value {
                println!("  {:<9} {value}", format!("{label}:"));
            }
        }
        for (key, value) in &bug.metadata {
            println!("  meta:     {key}={value}");
        }
        for mapping in mappings {
            println!("  mapped:   {} ({})", mapping.url, mapping.host);
        }
        println!("  added:    {}", bug.added.format("%Y-%m-%d %H:%M"));
        println!("  modified: {}", bug.modified.format("%Y-%m-%d %H:%M"));
        println!("----------------------------------------");
    }
    Ok(())
}
