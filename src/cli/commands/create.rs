use bugtrack_core::error::{BugError, Result};
use bugtrack_core::query::NewBug;

use crate::cli::{CommandContext, CreateArgs, parse_pairs};
use crate::format::{format_bug_line, print_json};

/// Execute the create command.
///
/// # Errors
///
/// Returns an error if the title is missing, validation fails, or the bug
/// cannot be stored or indexed.
pub fn execute(args: CreateArgs, ctx: &CommandContext) -> Result<()> {
    // 1. Resolve title
    let title = args
        .title
        .or(args.title_flag)
        .ok_or_else(|| BugError::validation("title", "cannot be empty"))?;

    if title.trim().is_empty() {
        return Err(BugError::validation("title", "cannot be empty"));
    }

    // 2. Open the workspace
    let mut session = ctx.open()?;
    let default_provider = session.workspace.config.default_provider();

    // 3. Build and store the bug
    let new_bug = NewBug {
        provider: args.provider,
        bug_id: args.bug_id,
        project: args.project,
        title,
        status: args.status,
        url: args.url,
        priority: args.priority,
        author: args.author,
        details_link: args.details_link,
        expected: args.expected,
        result: args.result,
        metadata: parse_pairs("meta", &args.meta)?,
        ..Default::default()
    };
    let bug = session
        .storage
        .create_bug(&new_bug.into_bug(default_provider))?;

    // 4. Optionally index right away
    let mapping = if args.index && bug.url.is_some() {
        session.registry.index(&mut session.storage, bug.id)?
    } else {
        None
    };

    if ctx.json {
        return print_json(&bug);
    }
    if !ctx.quiet {
        println!("Created {}", format_bug_line(&bug));
        if let Some(mapping) = mapping {
            println!("Indexed URL (mapping {mapping})");
        }
    }
    Ok(())
}
