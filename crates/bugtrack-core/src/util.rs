//! Key parsing, URL decomposition and content hashing utilities.

use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{BugError, Result};
use crate::model::Bug;

// ============================================================================
// Keys
// ============================================================================

/// Parse a textual bug key.
///
/// # Errors
///
/// Returns `InvalidId` unless the input is a positive integer.
pub fn parse_bug_id(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    match trimmed.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(BugError::InvalidId {
            id: trimmed.to_string(),
        }),
    }
}

// ============================================================================
// URL Decomposition
// ============================================================================

/// The lookup components of a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    /// Normalized full URL (no fragment).
    pub url: String,
    /// `host` + path, trailing slash trimmed.
    pub host_path: String,
    pub host: String,
}

/// Split a URL into the components used by the URL index.
///
/// Scheme-less input is treated as `http://`. Hosts are lowercased by the
/// parser, fragments are dropped.
///
/// # Errors
///
/// Returns `Validation` if the URL cannot be parsed or has no host.
pub fn decompose_url(raw: &str) -> Result<UrlParts> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let mut parsed = Url::parse(&candidate)
        .map_err(|e| BugError::validation("url", format!("'{raw}': {e}")))?;
    parsed.set_fragment(None);

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| BugError::validation("url", format!("'{raw}' has no host")))?
        .to_string();

    let host_with_port = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.clone(),
    };
    let path = parsed.path().trim_end_matches('/');
    let host_path = format!("{host_with_port}{path}");

    Ok(UrlParts {
        url: parsed.to_string(),
        host_path,
        host,
    })
}

// ============================================================================
// Content Hashing
// ============================================================================

/// Compute the SHA256 content hash for a bug.
///
/// Covers the provider-visible fields. Store-owned fields (id, state,
/// added, modified) are excluded.
#[must_use]
pub fn content_hash(bug: &Bug) -> String {
    let mut hasher = Sha256::new();

    let mut hash_field = |value: &str| {
        if value.contains('\0') {
            hasher.update(value.replace('\0', " ").as_bytes());
        } else {
            hasher.update(value.as_bytes());
        }
        hasher.update(b"\x00");
    };

    let reported_on = bug.reported_on.map(|t| t.to_rfc3339());
    let last_update = bug.last_update.map(|t| t.to_rfc3339());

    hash_field(bug.provider.as_str());
    hash_field(bug.bug_id.as_deref().unwrap_or(""));
    hash_field(&bug.project);
    hash_field(&bug.title);
    hash_field(&bug.status);
    hash_field(bug.url.as_deref().unwrap_or(""));
    hash_field(bug.priority.as_deref().unwrap_or(""));
    hash_field(bug.author.as_deref().unwrap_or(""));
    hash_field(reported_on.as_deref().unwrap_or(""));
    hash_field(last_update.as_deref().unwrap_or(""));
    hash_field(bug.last_updater.as_deref().unwrap_or(""));
    hash_field(bug.details_link.as_deref().unwrap_or(""));
    hash_field(bug.expected.as_deref().unwrap_or(""));
    hash_field(bug.result.as_deref().unwrap_or(""));
    for (key, value) in &bug.metadata {
        hash_field(key);
        hash_field(value);
    }

    format!("{:x}", hasher.finalize())
}
