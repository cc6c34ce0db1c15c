use bugtrack_core::error::{BugError, Result};
use bugtrack_core::query::BugUpdate;

use crate::cli::{CommandContext, UpdateArgs, parse_pairs};
use crate::format::{format_bug_line, print_json};

/// Optional fields `--clear` accepts.
const CLEARABLE: &[&str] = &[
    "bug_id",
    "url",
    "priority",
    "author",
    "last_updater",
    "details_link",
    "expected",
    "result",
    "metadata",
];

/// Build a partial update from flags.
///
/// Setting and clearing the same field is rejected.
///
/// # Errors
///
/// Returns `Validation` for an unknown `--clear` field, a conflict, or a
/// malformed `--meta` entry.
pub fn build_update(args: UpdateArgs) -> Result<BugUpdate> {
    let mut update = BugUpdate {
        title: args.title,
        project: args.project,
        status: args.status,
        bug_id: args.bug_id.map(Some),
        url: args.url.map(Some),
        priority: args.priority.map(Some),
        author: args.author.map(Some),
        details_link: args.details_link.map(Some),
        expected: args.expected.map(Some),
        result: args.result.map(Some),
        metadata: if args.meta.is_empty() {
            None
        } else {
            Some(parse_pairs("meta", &args.meta)?)
        },
        ..Default::default()
    };

    for field in &args.clear {
        let slot = match field.as_str() {
            "bug_id" => &mut update.bug_id,
            "url" => &mut update.url,
            "priority" => &mut update.priority,
            "author" => &mut update.author,
            "last_updater" => &mut update.last_updater,
            "details_link" => &mut update.details_link,
            "expected" => &mut update.expected,
            "result" => &mut update.result,
            "metadata" => {
                if update.metadata.is_some() {
                    return Err(conflict(field));
                }
                update.metadata = Some(Default::default());
                continue;
            }
            other => {
                return Err(BugError::validation(
                    "clear",
                    format!("'{other}' is not clearable (expected one of {})", CLEARABLE.join(", ")),
                ));
            }
        };
        if slot.is_some() {
            return Err(conflict(field));
        }
        *slot = Some(None);
    }
    Ok(update)
}

fn conflict(field: &str) -> BugError {
    BugError::validation("clear", format!("'{field}' is both set and cleared"))
}

/// Execute the update command.
///
/// # Errors
///
/// Returns an error if the id is malformed, the bug does not exist, or the
/// update fails validation or storage.
pub fn execute(args: UpdateArgs, ctx: &CommandContext) -> Result<()> {
    let key = args.id.clone();
    let update = build_update(args)?;
    let mut session = ctx.open()?;
    let current = session.storage.get_bug_by_key(&key)?;

    if update.is_empty() {
        tracing::debug!(id = current.id, "Nothing to update");
    }
    let bug = session.storage.update_bug(current.id, &update)?;

    if ctx.json {
        return print_json(&bug);
    }
    if !ctx.quiet {
        if bug.modified == current.modified {
            println!("No changes to {}", format_bug_line(&bug));
        } else {
            println!("Updated {}", format_bug_line(&bug));
        }
    }
    Ok(())
}
