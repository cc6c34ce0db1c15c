//! Provider service commands: crawl, index and push.

use bugtrack_core::error::Result;
use bugtrack_core::model::Provider;

use crate::cli::CommandContext;
use crate::format::{format_bug_line, format_crawl_report, print_json};

/// Crawl one provider into the local store.
///
/// # Errors
///
/// Returns `InvalidProvider` for an unknown name, or a wrapped crawl
/// failure.
pub fn crawl(provider: &str, ctx: &CommandContext) -> Result<()> {
    let provider: Provider = provider.parse()?;
    let mut session = ctx.open()?;
    let report = session.registry.crawl(&mut session.storage, provider)?;

    if ctx.json {
        return print_json(&report);
    }
    if !ctx.quiet {
        println!("{}", format_crawl_report(&report));
    }
    Ok(())
}

/// Index the URL of one bug.
///
/// # Errors
///
/// Returns an error if the bug is missing or indexing fails.
pub fn index(key: &str, ctx: &CommandContext) -> Result<()> {
    let mut session = ctx.open()?;
    let bug = session.storage.get_bug_by_key(key)?;
    let mapping = session.registry.index(&mut session.storage, bug.id)?;

    if ctx.json {
        return print_json(&serde_json::json!({ "id": bug.id, "mapping": mapping }));
    }
    if !ctx.quiet {
        match mapping {
            Some(mapping) => println!("Indexed #{} (mapping {mapping})", bug.id),
            None => println!("#{} has no URL to index", bug.id),
        }
    }
    Ok(())
}

/// Push one bug back to its provider as the acting user.
///
/// # Errors
///
/// Returns an error if the bug is missing or the push fails.
pub fn push(key: &str, ctx: &CommandContext) -> Result<()> {
    let mut session = ctx.open()?;
    let bug = session.storage.get_bug_by_key(key)?;
    let pushed = session
        .registry
        .push(&mut session.storage, bug.id, &session.actor)?;

    if ctx.json {
        return print_json(&pushed);
    }
    if !ctx.quiet {
        println!("Pushed {}", format_bug_line(&pushed));
    }
    Ok(())
}
