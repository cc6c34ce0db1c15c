//! Core data types for bugtrack.
//!
//! Serde formats here are shared by the SQLite store, the JSONL feeds and
//! the JSON request router.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BugError, Result};

/// Bug-tracking backend a bug belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Bugs filed directly into the local store.
    Datastore,
    /// External issue tracker, synced through its feed and outbox.
    IssueTracker,
}

impl Provider {
    pub const ALL: [Self; 2] = [Self::Datastore, Self::IssueTracker];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Datastore => "datastore",
            Self::IssueTracker => "issuetracker",
        }
    }

    /// Map a provider-specific status string to a canonical state.
    ///
    /// Matching is case-insensitive; anything not in the provider's table
    /// is `Unknown`.
    #[must_use]
    pub fn state_for(self, status: &str) -> BugState {
        let status = status.trim().to_lowercase();
        let table: &[(&str, BugState)] = match self {
            Self::Datastore => DATASTORE_STATUSES,
            Self::IssueTracker => ISSUETRACKER_STATUSES,
        };
        table
            .iter()
            .find(|(name, _)| *name == status)
            .map_or(BugState::Unknown, |(_, state)| *state)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = BugError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "datastore" => Ok(Self::Datastore),
            "issuetracker" | "issue_tracker" => Ok(Self::IssueTracker),
            other => Err(BugError::InvalidProvider {
                provider: other.to_string(),
            }),
        }
    }
}

/// Per-provider operation kinds used as dispatch keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Crawl,
    Index,
    Push,
}

impl Service {
    pub const ALL: [Self; 3] = [Self::Crawl, Self::Index, Self::Push];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::Index => "index",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = BugError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "crawl" | "crawler" => Ok(Self::Crawl),
            "index" | "indexer" => Ok(Self::Index),
            "push" | "pusher" => Ok(Self::Push),
            other => Err(BugError::UnsupportedService {
                provider: String::new(),
                service: other.to_string(),
            }),
        }
    }
}

/// Canonical lifecycle state, independent of provider vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BugState {
    Active,
    Resolved,
    Closed,
    #[default]
    Unknown,
}

impl BugState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BugState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BugState {
    type Err = BugError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            "unknown" => Ok(Self::Unknown),
            other => Err(BugError::validation(
                "state",
                format!("unknown state '{other}'"),
            )),
        }
    }
}

const DATASTORE_STATUSES: &[(&str, BugState)] = &[
    ("active", BugState::Active),
    ("open", BugState::Active),
    ("resolved", BugState::Resolved),
    ("closed", BugState::Closed),
];

const ISSUETRACKER_STATUSES: &[(&str, BugState)] = &[
    ("new", BugState::Active),
    ("unconfirmed", BugState::Active),
    ("untriaged", BugState::Active),
    ("available", BugState::Active),
    ("assigned", BugState::Active),
    ("accepted", BugState::Active),
    ("started", BugState::Active),
    ("fixed", BugState::Resolved),
    ("verified", BugState::Resolved),
    ("fixedunreleased", BugState::Resolved),
    ("duplicate", BugState::Closed),
    ("wontfix", BugState::Closed),
    ("invalid", BugState::Closed),
    ("worksforme", BugState::Closed),
    ("obsolete", BugState::Closed),
    ("archived", BugState::Closed),
    ("done", BugState::Closed),
];

/// Map `status` to a canonical state for the named provider.
///
/// # Errors
///
/// Returns `InvalidProvider` if `provider` is not a known provider name.
pub fn state_from_status(status: &str, provider: &str) -> Result<BugState> {
    let provider: Provider = provider.parse()?;
    Ok(provider.state_for(status))
}

/// The primary bug entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bug {
    /// Store-assigned key (0 until created).
    #[serde(default)]
    pub id: i64,

    pub provider: Provider,

    /// Key of the bug inside its provider, if it came from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bug_id: Option<String>,

    #[serde(default)]
    pub project: String,

    pub title: String,

    /// Provider-specific status string.
    #[serde(default)]
    pub status: String,

    /// Derived from `status`; never set directly.
    #[serde(default)]
    pub state: BugState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_on: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updater: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_link: Option<String>,

    /// Expected behaviour, as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    /// Observed behaviour, as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    pub added: DateTime<Utc>,
    pub modified: DateTime<Utc>,

    /// Hash of the provider-visible fields, for change detection.
    #[serde(skip)]
    pub content_hash: Option<String>,
}

impl Default for Bug {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            provider: Provider::Datastore,
            bug_id: None,
            project: String::new(),
            title: String::new(),
            status: String::new(),
            state: BugState::Unknown,
            url: None,
            priority: None,
            author: None,
            reported_on: None,
            last_update: None,
            last_updater: None,
            details_link: None,
            expected: None,
            result: None,
            metadata: BTreeMap::new(),
            added: now,
            modified: now,
            content_hash: None,
        }
    }
}

impl Bug {
    /// Recompute `state` from `status` and `provider`.
    pub fn refresh_state(&mut self) {
        self.state = self.provider.state_for(&self.status);
    }

    #[must_use]
    pub fn compute_content_hash(&self) -> String {
        crate::util::content_hash(self)
    }
}

/// Association between a URL and a bug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrlBugMap {
    pub id: i64,
    pub bug: i64,
    /// Full normalized URL.
    pub url: String,
    /// Host plus path, without scheme or query.
    pub host_path: String,
    pub host: String,
    pub added: DateTime<Utc>,
}

/// A test cycle within a provider project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCycle {
    #[serde(default)]
    pub id: i64,
    pub provider: Provider,
    pub project: String,
    pub cycle_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}
