use bugtrack_core::error::Result;

use crate::build_flags::{BuildArgs, BuildOptions};
use crate::cli::CommandContext;
use crate::format::print_json;

/// Execute the build command: print the normalized flag map as JSON.
///
/// Always JSON, since the build script is the only consumer.
///
/// # Errors
///
/// Returns `Validation` for conflicting flags.
pub fn execute(args: &BuildArgs, ctx: &CommandContext) -> Result<()> {
    let options = BuildOptions::from_args(args, ctx.quiet)?;
    tracing::debug!(?options, "Normalized build flags");
    print_json(&options.to_map())
}
