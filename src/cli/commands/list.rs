//! List command implementation.

use bugtrack_core::error::Result;
use bugtrack_core::query::BugFilters;

use crate::cli::{CommandContext, ListArgs};
use crate::format::{BugList, format_bug_line, print_json};

/// Execute the list command.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or queried.
pub fn execute(args: &ListArgs, ctx: &CommandContext) -> Result<()> {
    let session = ctx.open()?;
    let filters = BugFilters {
        provider: args.provider,
        project: args.project.clone(),
        state: args.state,
        limit: args.limit,
    };
    let bugs = session.storage.list_bugs(&filters)?;
    print_bugs(bugs, ctx)
}

/// Print bugs as JSON or one line each.
///
/// # Errors
///
/// Returns `Json` if serialization fails.
pub fn print_bugs(bugs: Vec<bugtrack_core::model::Bug>, ctx: &CommandContext) -> Result<()> {
    if ctx.json {
        return print_json(&BugList::new(bugs));
    }
    if bugs.is_empty() {
        if !ctx.quiet {
            println!("No bugs found.");
        }
        return Ok(());
    }
    for bug in &bugs {
        println!("{}", format_bug_line(bug));
    }
    Ok(())
}
