use bugtrack_core::error::Result;

use crate::cli::CommandContext;
use crate::format::{format_bug_line, print_json};

/// Execute the delete command.
///
/// # Errors
///
/// Returns an error if the id is malformed, the bug does not exist, or the
/// delete fails.
pub fn execute(key: &str, ctx: &CommandContext) -> Result<()> {
    let mut session = ctx.open()?;
    let bug = session.storage.get_bug_by_key(key)?;
    let removed = session.storage.delete_bug(bug.id)?;
    tracing::info!(id = bug.id, mappings = removed, "Deleted bug");

    if ctx.json {
        return print_json(&serde_json::json!({
            "id": bug.id,
            "deleted_mappings": removed,
        }));
    }
    if !ctx.quiet {
        println!("Deleted {} ({removed} URL mappings)", format_bug_line(&bug));
    }
    Ok(())
}
