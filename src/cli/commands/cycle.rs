//! Test cycle commands.

use bugtrack_core::error::Result;
use bugtrack_core::model::TestCycle;
use chrono::Utc;

use crate::cli::{CommandContext, CycleSubcommand};
use crate::format::{format_cycle_line, print_json};

/// Execute a cycle subcommand.
///
/// # Errors
///
/// Returns `Create` for an invalid or duplicate cycle, `NotFound` for a
/// missing one, or a storage error.
pub fn execute(command: CycleSubcommand, ctx: &CommandContext) -> Result<()> {
    let mut session = ctx.open()?;
    match command {
        CycleSubcommand::Create {
            project,
            cycle_id,
            provider,
            name,
        } => {
            let cycle = TestCycle {
                id: 0,
                provider: provider.unwrap_or_else(|| session.workspace.config.default_provider()),
                project,
                cycle_id,
                name,
                created_at: Utc::now(),
            };
            let cycle = session.storage.create_test_cycle(&cycle)?;
            if ctx.json {
                return print_json(&cycle);
            }
            if !ctx.quiet {
                println!("Created test cycle {}", format_cycle_line(&cycle));
            }
        }
        CycleSubcommand::Show {
            provider,
            project,
            cycle_id,
        } => {
            let cycle = session
                .storage
                .get_test_cycle(provider, &project, &cycle_id)?;
            if ctx.json {
                return print_json(&cycle);
            }
            println!("{}", format_cycle_line(&cycle));
            println!("  created: {}", cycle.created_at.format("%Y-%m-%d %H:%M"));
        }
        CycleSubcommand::List { provider, project } => {
            let cycles = session
                .storage
                .list_test_cycles(provider, project.as_deref())?;
            if ctx.json {
                return print_json(&cycles);
            }
            if cycles.is_empty() && !ctx.quiet {
                println!("No test cycles found.");
            }
            for cycle in &cycles {
                println!("{}", format_cycle_line(cycle));
            }
        }
    }
    Ok(())
}
