//! Version command implementation.

use bugtrack_core::error::Result;
use bugtrack_core::model::Provider;
use serde::Serialize;

use crate::cli::CommandContext;
use crate::format::print_json;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    providers: Vec<&'a str>,
    schema_version: i64,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(ctx: &CommandContext) -> Result<()> {
    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        build: if cfg!(debug_assertions) {
            "dev"
        } else {
            "release"
        },
        providers: Provider::ALL.iter().map(|p| p.as_str()).collect(),
        schema_version: crate::storage::schema::SCHEMA_VERSION,
    };

    if ctx.json {
        return print_json(&output);
    }
    println!("bt version {} ({})", output.version, output.build);
    println!("providers: {}", output.providers.join(", "));
    Ok(())
}
