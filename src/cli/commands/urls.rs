use bugtrack_core::error::Result;

use crate::cli::CommandContext;

/// Execute the urls command: bugs mapped to `url`, falling back from the
/// full URL to host+path and then host.
///
/// # Errors
///
/// Returns an error if the URL cannot be decomposed or the query fails.
pub fn execute(url: &str, ctx: &CommandContext) -> Result<()> {
    let session = ctx.open()?;
    let bugs = session.storage.bugs_for_url(url)?;
    tracing::debug!(url, matches = bugs.len(), "Looked up URL");
    super::list::print_bugs(bugs, ctx)
}
