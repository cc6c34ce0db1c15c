use bugtrack_core::error::Result;
use bugtrack_core::model::state_from_status;

use crate::cli::CommandContext;
use crate::format::{format_state_icon, print_json};

/// Execute the state command. Needs no workspace.
///
/// # Errors
///
/// Returns `InvalidProvider` for an unknown provider name.
pub fn execute(status: &str, provider: &str, ctx: &CommandContext) -> Result<()> {
    let state = state_from_status(status, provider)?;
    if ctx.json {
        return print_json(&serde_json::json!({
            "provider": provider,
            "status": status,
            "state": state,
        }));
    }
    println!("{} {state}", format_state_icon(state));
    Ok(())
}
