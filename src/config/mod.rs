//! Configuration management for bugtrack.
//!
//! Configuration is loaded from the workspace file `.bugs/config.yaml`.
//! Values resolve in this order, first match wins:
//! - CLI flags (`--db`, `--actor`)
//! - Environment (`BT_DB`, `BT_ACTOR`, then `USER` for the actor)
//! - The config file
//! - Built-in defaults

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use bugtrack_core::error::{BugError, Result};
use bugtrack_core::model::Provider;

use crate::storage::SqliteStorage;

pub const BUGS_DIR: &str = ".bugs";
pub const DB_FILE: &str = "bugs.db";
pub const CONFIG_FILE: &str = "config.yaml";

pub const ENV_DB: &str = "BT_DB";
pub const ENV_ACTOR: &str = "BT_ACTOR";

const DEFAULT_MAX_RETRIES: u32 = 3;

/// Template written by `bt init`.
pub const DEFAULT_CONFIG_YAML: &str = "\
# bugtrack workspace configuration
default_provider: datastore
# actor: alice
issuetracker:
  feed: .bugs/issuetracker/feed.jsonl
  outbox: .bugs/issuetracker/outbox.jsonl
  max_retries: 3
datastore:
  max_retries: 3
";

/// Parsed `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider for bugs created without one.
    pub default_provider: Option<Provider>,
    pub actor: Option<String>,
    pub issuetracker: IssueTrackerConfig,
    pub datastore: DatastoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueTrackerConfig {
    /// JSONL feed read by the crawler.
    pub feed: Option<PathBuf>,
    /// JSONL file the pusher appends to.
    pub outbox: Option<PathBuf>,
    pub max_retries: u32,
}

impl Default for IssueTrackerConfig {
    fn default() -> Self {
        Self {
            feed: None,
            outbox: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    pub max_retries: u32,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Config {
    /// Parse YAML config text. Blank input yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the YAML is malformed.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| BugError::Config(format!("invalid config: {e}")))
    }

    /// Load a config file; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be read, or `Config` if it
    /// cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
            .map_err(|e| BugError::Config(format!("{}: {e}", path.display())))
    }

    #[must_use]
    pub fn default_provider(&self) -> Provider {
        self.default_provider.unwrap_or(Provider::Datastore)
    }

    #[must_use]
    pub fn max_retries(&self, provider: Provider) -> u32 {
        match provider {
            Provider::Datastore => self.datastore.max_retries,
            Provider::IssueTracker => self.issuetracker.max_retries,
        }
    }
}

/// Overrides passed on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub db: Option<PathBuf>,
    pub actor: Option<String>,
}

/// A located `.bugs` workspace and its loaded config.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory containing `.bugs`.
    pub root: PathBuf,
    pub bugs_dir: PathBuf,
    pub config: Config,
}

impl Workspace {
    /// Walk up from `start` to the nearest directory holding `.bugs`.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if no workspace is found, or a config error.
    pub fn discover(start: &Path) -> Result<Self> {
        let bugs_dir = discover_bugs_dir(start).ok_or(BugError::NotInitialized)?;
        let root = bugs_dir
            .parent()
            .map_or_else(|| start.to_path_buf(), Path::to_path_buf);
        let config = Config::load(&bugs_dir.join(CONFIG_FILE))?;
        Ok(Self {
            root,
            bugs_dir,
            config,
        })
    }

    /// A workspace rooted at `root` with default config and no `.bugs`
    /// directory on disk. Used when `--db` points elsewhere.
    #[must_use]
    pub fn detached(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            bugs_dir: root.join(BUGS_DIR),
            config: Config::default(),
        }
    }

    /// Create `.bugs/` under `root` with a default config file.
    ///
    /// Returns `false` if the workspace already existed.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory or config file cannot be written.
    pub fn init(root: &Path) -> Result<(Self, bool)> {
        let bugs_dir = root.join(BUGS_DIR);
        let existed = bugs_dir.join(CONFIG_FILE).exists();
        fs::create_dir_all(&bugs_dir)?;
        if !existed {
            fs::write(bugs_dir.join(CONFIG_FILE), DEFAULT_CONFIG_YAML)?;
        }
        let workspace = Self::discover(root)?;
        Ok((workspace, !existed))
    }

    /// Resolve a configured path against the workspace root.
    fn resolve(&self, configured: Option<&PathBuf>, fallback: &str) -> PathBuf {
        match configured {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.root.join(path),
            None => self.bugs_dir.join(fallback),
        }
    }

    #[must_use]
    pub fn feed_path(&self) -> PathBuf {
        self.resolve(
            self.config.issuetracker.feed.as_ref(),
            "issuetracker/feed.jsonl",
        )
    }

    #[must_use]
    pub fn outbox_path(&self) -> PathBuf {
        self.resolve(
            self.config.issuetracker.outbox.as_ref(),
            "issuetracker/outbox.jsonl",
        )
    }

    /// Database path: `--db`, then `BT_DB`, then `.bugs/bugs.db`.
    #[must_use]
    pub fn db_path(&self, cli: &CliOverrides, env: &dyn Fn(&str) -> Option<String>) -> PathBuf {
        cli.db
            .clone()
            .or_else(|| non_empty(env(ENV_DB)).map(PathBuf::from))
            .unwrap_or_else(|| self.bugs_dir.join(DB_FILE))
    }

    /// Acting user: `--actor`, `BT_ACTOR`, config `actor`, `USER`, then
    /// `"unknown"`.
    #[must_use]
    pub fn actor(&self, cli: &CliOverrides, env: &dyn Fn(&str) -> Option<String>) -> String {
        cli.actor
            .clone()
            .or_else(|| non_empty(env(ENV_ACTOR)))
            .or_else(|| self.config.actor.clone())
            .or_else(|| non_empty(env("USER")))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Process environment lookup.
#[must_use]
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Find the nearest `.bugs` directory at or above `start`.
#[must_use]
pub fn discover_bugs_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(BUGS_DIR))
        .find(|candidate| candidate.is_dir())
}

/// Locate the workspace from the current directory and open its database.
///
/// With an explicit database (`--db` or `BT_DB`) no `.bugs` directory is
/// required; defaults stand in for the config.
///
/// # Errors
///
/// Returns `NotInitialized` when no workspace or database override exists,
/// or a config or storage error.
pub fn open_storage_with_cli(cli: &CliOverrides) -> Result<(SqliteStorage, Workspace)> {
    let cwd = std::env::current_dir()?;
    let workspace = match Workspace::discover(&cwd) {
        Ok(workspace) => workspace,
        Err(BugError::NotInitialized)
            if cli.db.is_some() || non_empty(process_env(ENV_DB)).is_some() =>
        {
            Workspace::detached(&cwd)
        }
        Err(err) => return Err(err),
    };

    let db_path = workspace.db_path(cli, &process_env);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    debug!(db = %db_path.display(), root = %workspace.root.display(), "Opening workspace");
    let storage = SqliteStorage::open(&db_path)?;
    Ok((storage, workspace))
}
