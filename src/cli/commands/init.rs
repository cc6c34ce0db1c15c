use bugtrack_core::error::Result;

use crate::cli::CommandContext;
use crate::config::{Workspace, process_env};
use crate::format::print_json;
use crate::storage::SqliteStorage;

/// Execute the init command.
///
/// Creates `.bugs/` in the current directory with a default config and an
/// empty database. Running it again is harmless.
///
/// # Errors
///
/// Returns an error if the directory, config or database cannot be created.
pub fn execute(ctx: &CommandContext) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let (workspace, fresh) = Workspace::init(&cwd)?;
    let db_path = workspace.db_path(&ctx.overrides, &process_env);
    let storage = SqliteStorage::open(&db_path)?;
    tracing::info!(db = %db_path.display(), fresh, "Workspace ready");

    if ctx.json {
        return print_json(&serde_json::json!({
            "path": workspace.bugs_dir,
            "created": fresh,
            "schema_version": storage.schema_version()?,
        }));
    }
    if !ctx.quiet {
        if fresh {
            println!("Initialized bugtrack workspace in {}", workspace.bugs_dir.display());
        } else {
            println!("Workspace already initialized at {}", workspace.bugs_dir.display());
        }
    }
    Ok(())
}
