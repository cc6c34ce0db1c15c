//! Create, update and filter types for bug operations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{Bug, BugState, Provider};

/// Distinguish an absent field (`None`) from an explicit `null`
/// (`Some(None)`) when deserializing partial updates.
#[allow(clippy::option_option)]
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Input for creating a bug. Only `title` is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBug {
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub bug_id: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub reported_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updater: Option<String>,
    #[serde(default)]
    pub details_link: Option<String>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl NewBug {
    /// Build an unsaved bug, falling back to `default_provider`.
    #[must_use]
    pub fn into_bug(self, default_provider: Provider) -> Bug {
        let mut bug = Bug {
            provider: self.provider.unwrap_or(default_provider),
            bug_id: self.bug_id,
            project: self.project.unwrap_or_default(),
            title: self.title,
            status: self.status.unwrap_or_default(),
            url: self.url,
            priority: self.priority,
            author: self.author,
            reported_on: self.reported_on,
            last_update: self.last_update,
            last_updater: self.last_updater,
            details_link: self.details_link,
            expected: self.expected,
            result: self.result,
            metadata: self.metadata,
            ..Default::default()
        };
        bug.refresh_state();
        bug
    }
}

/// Fields to update on a bug.
///
/// `None` leaves a field alone; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::option_option)]
pub struct BugUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub bug_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub priority: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub author: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub reported_on: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub last_updater: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub details_link: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub expected: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub result: Option<Option<String>>,
    /// Replaces the whole metadata map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

macro_rules! diff_field {
    ($update:ident, $current:ident, $incoming:ident, $field:ident) => {
        if $current.$field != $incoming.$field {
            $update.$field = Some($incoming.$field.clone());
        }
    };
}

macro_rules! apply_field {
    ($changed:ident, $bug:ident, $update:ident, $field:ident) => {
        if let Some(ref value) = $update.$field {
            if $bug.$field != *value {
                $bug.$field.clone_from(value);
                $changed = true;
            }
        }
    };
}

impl BugUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.project.is_none()
            && self.status.is_none()
            && self.bug_id.is_none()
            && self.url.is_none()
            && self.priority.is_none()
            && self.author.is_none()
            && self.reported_on.is_none()
            && self.last_update.is_none()
            && self.last_updater.is_none()
            && self.details_link.is_none()
            && self.expected.is_none()
            && self.result.is_none()
            && self.metadata.is_none()
    }

    /// The minimal update that turns `current` into `incoming`.
    ///
    /// Store-owned fields (`id`, `provider`, `state`, `added`, `modified`)
    /// are not compared. Equal bugs yield an empty update.
    #[must_use]
    pub fn between(current: &Bug, incoming: &Bug) -> Self {
        let mut update = Self::default();
        if current.title != incoming.title {
            update.title = Some(incoming.title.clone());
        }
        if current.project != incoming.project {
            update.project = Some(incoming.project.clone());
        }
        if current.status != incoming.status {
            update.status = Some(incoming.status.clone());
        }
        diff_field!(update, current, incoming, bug_id);
        diff_field!(update, current, incoming, url);
        diff_field!(update, current, incoming, priority);
        diff_field!(update, current, incoming, author);
        diff_field!(update, current, incoming, reported_on);
        diff_field!(update, current, incoming, last_update);
        diff_field!(update, current, incoming, last_updater);
        diff_field!(update, current, incoming, details_link);
        diff_field!(update, current, incoming, expected);
        diff_field!(update, current, incoming, result);
        if current.metadata != incoming.metadata {
            update.metadata = Some(incoming.metadata.clone());
        }
        update
    }

    /// Apply to `bug` in place, returning whether any field changed.
    ///
    /// A status change re-derives `state`. Timestamps are left to the
    /// caller.
    pub fn apply_to(&self, bug: &mut Bug) -> bool {
        let update = self;
        let mut changed = false;
        apply_field!(changed, bug, update, title);
        apply_field!(changed, bug, update, project);
        apply_field!(changed, bug, update, status);
        apply_field!(changed, bug, update, bug_id);
        apply_field!(changed, bug, update, url);
        apply_field!(changed, bug, update, priority);
        apply_field!(changed, bug, update, author);
        apply_field!(changed, bug, update, reported_on);
        apply_field!(changed, bug, update, last_update);
        apply_field!(changed, bug, update, last_updater);
        apply_field!(changed, bug, update, details_link);
        apply_field!(changed, bug, update, expected);
        apply_field!(changed, bug, update, result);
        apply_field!(changed, bug, update, metadata);
        if update.status.is_some() {
            bug.refresh_state();
        }
        changed
    }
}

/// Filter options for listing bugs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BugFilters {
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub state: Option<BugState>,
    #[serde(default)]
    pub limit: Option<usize>,
}
