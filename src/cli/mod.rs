//! Command-line interface for bugtrack.
//!
//! This module provides the CLI parsing and command routing using clap.

pub mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use bugtrack_core::model::{BugState, Provider};

use crate::build_flags::BuildArgs;
use crate::config::{self, CliOverrides, Workspace};
use crate::logging;
use crate::providers::ProviderRegistry;
use crate::storage::SqliteStorage;

/// bugtrack (bt) - bug dashboard backend.
#[derive(Parser, Debug)]
#[command(name = "bt")]
#[command(
    author,
    version,
    about = "Bug dashboard backend: provider crawl/index/push over SQLite",
    long_about = None,
    after_help = "Non-invasive: no daemon, no network listener. Use `bt api` for the JSON routes."
)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Output format: text (default) or json
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit diagnostics on stderr as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Database path (default: .bugs/bugs.db)
    #[arg(long, global = true, env = "BT_DB")]
    pub db: Option<PathBuf>,

    /// Acting user (default: config actor, then USER)
    #[arg(long, global = true, env = "BT_ACTOR")]
    pub actor: Option<String>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a bugtrack workspace
    Init,

    /// Create a new bug
    Create(CreateArgs),

    /// Show bug details
    Show {
        /// Bug ids
        ids: Vec<String>,
    },

    /// Update an existing bug
    Update(UpdateArgs),

    /// Delete a bug and its URL mappings
    Delete {
        /// Bug id
        id: String,
    },

    /// List bugs
    List(ListArgs),

    /// List bugs mapped to a URL
    Urls {
        /// URL to look up (full URL, host+path or host)
        url: String,
    },

    /// Map a provider status to its canonical state
    State {
        /// Provider status string
        status: String,

        /// Provider name
        #[arg(long, short = 'p')]
        provider: String,
    },

    /// Crawl a provider into the local store
    Crawl {
        /// Provider name
        provider: String,
    },

    /// Index a bug's URL
    Index {
        /// Bug id
        id: String,
    },

    /// Push a bug back to its provider
    Push {
        /// Bug id
        id: String,
    },

    /// Manage test cycles
    Cycle(CycleCommand),

    /// Send a request to the JSON router
    Api(ApiArgs),

    /// Normalize build flags for the build script
    Build(BuildArgs),

    /// Show version information
    Version,
}

#[derive(Args, Debug, Default)]
pub struct CreateArgs {
    /// Bug title
    pub title: Option<String>,

    /// Title (alternative to positional argument)
    #[arg(long = "title", hide = true)]
    pub title_flag: Option<String>,

    /// Provider (defaults to config default_provider)
    #[arg(long, short = 'p')]
    pub provider: Option<Provider>,

    /// Provider-side key
    #[arg(long)]
    pub bug_id: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    /// Provider status string
    #[arg(long, short = 's')]
    pub status: Option<String>,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long)]
    pub details_link: Option<String>,

    /// Expected behaviour
    #[arg(long)]
    pub expected: Option<String>,

    /// Observed behaviour
    #[arg(long)]
    pub result: Option<String>,

    /// Metadata entry (key=value, repeatable)
    #[arg(long = "meta", value_name = "KEY=VALUE")]
    pub meta: Vec<String>,

    /// Index the URL right after creating
    #[arg(long)]
    pub index: bool,
}

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Bug id
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long, short = 's')]
    pub status: Option<String>,

    #[arg(long)]
    pub bug_id: Option<String>,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long)]
    pub details_link: Option<String>,

    #[arg(long)]
    pub expected: Option<String>,

    #[arg(long)]
    pub result: Option<String>,

    /// Replace metadata with these entries (key=value, repeatable)
    #[arg(long = "meta", value_name = "KEY=VALUE")]
    pub meta: Vec<String>,

    /// Clear an optional field (repeatable)
    #[arg(long, value_name = "FIELD")]
    pub clear: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    #[arg(long, short = 'p')]
    pub provider: Option<Provider>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub state: Option<BugState>,

    /// Maximum number of bugs
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct CycleCommand {
    /// Cycle subcommand
    #[command(subcommand)]
    pub command: CycleSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CycleSubcommand {
    /// Create a test cycle
    Create {
        #[arg(long)]
        project: String,

        #[arg(long)]
        cycle_id: String,

        #[arg(long, short = 'p')]
        provider: Option<Provider>,

        #[arg(long)]
        name: Option<String>,
    },

    /// Show a test cycle
    Show {
        provider: Provider,
        project: String,
        cycle_id: String,
    },

    /// List test cycles
    List {
        #[arg(long, short = 'p')]
        provider: Option<Provider>,

        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct ApiArgs {
    /// HTTP method (GET, POST, PUT, DELETE)
    pub method: String,

    /// Request path, optionally with a ?query string
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub body: Option<String>,

    /// Query parameter (key=value, repeatable)
    #[arg(long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,
}

/// Shared per-invocation settings.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub json: bool,
    pub quiet: bool,
    pub overrides: CliOverrides,
}

/// An opened workspace: store, providers and acting user.
pub struct Session {
    pub storage: SqliteStorage,
    pub workspace: Workspace,
    pub registry: ProviderRegistry,
    pub actor: String,
}

impl CommandContext {
    /// Open the workspace for a command.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized`, or a config or storage error.
    pub fn open(&self) -> bugtrack_core::Result<Session> {
        let (storage, workspace) = config::open_storage_with_cli(&self.overrides)?;
        let registry = ProviderRegistry::from_workspace(&workspace);
        let actor = workspace.actor(&self.overrides, &config::process_env);
        Ok(Session {
            storage,
            workspace,
            registry,
            actor,
        })
    }
}

/// Run the CLI.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet, cli.log_json)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    let ctx = CommandContext {
        json: cli.json,
        quiet: cli.quiet,
        overrides: CliOverrides {
            db: cli.db,
            actor: cli.actor,
        },
    };

    let Some(command) = cli.command else {
        println!("bt - bug dashboard backend. Use --help for usage.");
        return Ok(());
    };

    tracing::debug!(command = command.name(), "Dispatching command");
    match command {
        Commands::Init => commands::init::execute(&ctx)?,
        Commands::Create(args) => commands::create::execute(args, &ctx)?,
        Commands::Show { ids } => commands::show::execute(&ids, &ctx)?,
        Commands::Update(args) => commands::update::execute(args, &ctx)?,
        Commands::Delete { id } => commands::delete::execute(&id, &ctx)?,
        Commands::List(args) => commands::list::execute(&args, &ctx)?,
        Commands::Urls { url } => commands::urls::execute(&url, &ctx)?,
        Commands::State { status, provider } => {
            commands::state::execute(&status, &provider, &ctx)?;
        }
        Commands::Crawl { provider } => commands::services::crawl(&provider, &ctx)?,
        Commands::Index { id } => commands::services::index(&id, &ctx)?,
        Commands::Push { id } => commands::services::push(&id, &ctx)?,
        Commands::Cycle(cycle) => commands::cycle::execute(cycle.command, &ctx)?,
        Commands::Api(args) => {
            let response = commands::api::execute(&args, &ctx)?;
            if !response.is_success() {
                anyhow::bail!("{} {} returned {}", args.method, args.path, response.status);
            }
        }
        Commands::Build(args) => commands::build::execute(&args, &ctx)?,
        Commands::Version => commands::version::execute(&ctx)?,
    }

    Ok(())
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Create(_) => "create",
            Self::Show { .. } => "show",
            Self::Update(_) => "update",
            Self::Delete { .. } => "delete",
            Self::List(_) => "list",
            Self::Urls { .. } => "urls",
            Self::State { .. } => "state",
            Self::Crawl { .. } => "crawl",
            Self::Index { .. } => "index",
            Self::Push { .. } => "push",
            Self::Cycle(cycle) => match cycle.command {
                CycleSubcommand::Create { .. } => "cycle create",
                CycleSubcommand::Show { .. } => "cycle show",
                CycleSubcommand::List { .. } => "cycle list",
            },
            Self::Api(_) => "api",
            Self::Build(_) => "build",
            Self::Version => "version",
        }
    }
}

/// Split `key=value` pairs.
///
/// # Errors
///
/// Returns `Validation` naming `field` for an entry without `=` or with an
/// empty key.
pub fn parse_pairs(
    field: &str,
    raw: &[String],
) -> bugtrack_core::Result<std::collections::BTreeMap<String, String>> {
    raw.iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(bugtrack_core::BugError::validation(
                field,
                format!("expected KEY=VALUE, got '{entry}'"),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs("meta", &["a=1".to_string(), "b=x=y".to_string()]).unwrap();
        assert_eq!(pairs.get("a").map(String::as_str), Some("1"));
        assert_eq!(pairs.get("b").map(String::as_str), Some("x=y"));
        assert!(parse_pairs("meta", &["novalue".to_string()]).is_err());
        assert!(parse_pairs("meta", &["=v".to_string()]).is_err());
    }

    #[test]
    fn test_provider_value_parser() {
        let cli = Cli::try_parse_from(["bt", "list", "--provider", "issuetracker"]).unwrap();
        match cli.command {
            Some(Commands::List(args)) => assert_eq!(args.provider, Some(Provider::IssueTracker)),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["bt", "list", "--provider", "jira"]).is_err());
    }

    #[test]
    fn test_build_quiet_is_global() {
        let cli = Cli::try_parse_from(["bt", "build", "--quiet", "--expunge"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Some(Commands::Build(ref b)) if b.expunge));
    }
}
