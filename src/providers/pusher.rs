//! Metadata-stamping pusher with bounded retries.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use bugtrack_core::error::{ErrorKind, Result};
use bugtrack_core::jsonl;
use bugtrack_core::model::Bug;
use bugtrack_core::query::BugUpdate;

use super::Pusher;
use crate::storage::SqliteStorage;

pub const PUSHED_BY: &str = "pushed_by";
pub const PUSHED_AT: &str = "pushed_at";

const DEFAULT_BACKOFF: Duration = Duration::from_millis(50);

/// Stamps `last_updater`, `last_update` and push metadata on a bug through
/// the regular update path, then optionally appends it to an outbox. The
/// stamp only commits once the outbox write succeeded.
#[derive(Debug, Clone)]
pub struct StampPusher {
    max_retries: u32,
    backoff: Duration,
    outbox: Option<PathBuf>,
}

impl StampPusher {
    #[must_use]
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: DEFAULT_BACKOFF,
            outbox: None,
        }
    }

    /// Append every pushed bug to `path` as JSONL.
    #[must_use]
    pub fn with_outbox(mut self, path: PathBuf) -> Self {
        self.outbox = Some(path);
        self
    }
}

impl Pusher for StampPusher {
    fn push(&self, storage: &mut SqliteStorage, id: i64, actor: &str) -> Result<Bug> {
        let bug = storage.get_bug(id)?;
        let now = Utc::now();

        let mut metadata = bug.metadata;
        metadata.insert(PUSHED_BY.to_string(), actor.to_string());
        metadata.insert(PUSHED_AT.to_string(), now.to_rfc3339());
        let update = BugUpdate {
            last_updater: Some(Some(actor.to_string())),
            last_update: Some(Some(now)),
            metadata: Some(metadata),
            ..Default::default()
        };

        let outbox = self.outbox.as_deref();
        let pushed = retry_storage(self.max_retries, self.backoff, || {
            storage.with_transaction(|store| {
                let pushed = store.update_bug(id, &update)?;
                if let Some(outbox) = outbox {
                    jsonl::append(outbox, std::slice::from_ref(&pushed))?;
                    info!(id, outbox = %outbox.display(), "Appended bug to outbox");
                }
                Ok(pushed)
            })
        })?;
        info!(id, actor, "Pushed bug");
        Ok(pushed)
    }
}

/// Run `op`, retrying up to `max_retries` more times while it fails with a
/// storage-kind error. Other errors return immediately.
///
/// # Errors
///
/// Returns the last error once retries are exhausted.
pub fn retry_storage<T>(
    max_retries: u32,
    backoff: Duration,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt: u32 = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.root_kind() == ErrorKind::Storage && attempt < max_retries => {
                attempt += 1;
                warn!(attempt, max_retries, error = %err, "Storage busy, retrying");
                thread::sleep(backoff * attempt);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bugtrack_core::BugError;
    use tempfile::TempDir;

    fn busy() -> BugError {
        BugError::storage("write bug", std::io::Error::other("database is locked"))
    }

    #[test]
    fn test_retry_until_success() {
        let mut calls = 0;
        let value = retry_storage(3, Duration::ZERO, || {
            calls += 1;
            if calls < 3 { Err(busy()) } else { Ok(calls) }
        })
        .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_retry_gives_up() {
        let mut calls = 0;
        let err = retry_storage(2, Duration::ZERO, || -> Result<()> {
            calls += 1;
            Err(BugError::Update {
                id: 1,
                source: Box::new(busy()),
            })
        })
        .unwrap_err();
        assert_eq!(calls, 3);
        assert_eq!(err.kind(), ErrorKind::Update);
    }

    #[test]
    fn test_no_retry_for_other_errors() {
        let mut calls = 0;
        let err = retry_storage(5, Duration::ZERO, || -> Result<()> {
            calls += 1;
            Err(BugError::BugNotFound { id: 9 })
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_push_stamps_and_records_outbox() {
        let dir = TempDir::new().unwrap();
        let outbox = dir.path().join("out").join("outbox.jsonl");
        let mut storage = SqliteStorage::open_memory().unwrap();
        let bug = storage
            .create_bug(&Bug {
                title: "Street names overlap".to_string(),
                ..Default::default()
            })
            .unwrap();

        let pusher = StampPusher::new(1).with_outbox(outbox.clone());
        let pushed = pusher.push(&mut storage, bug.id, "alice").unwrap();
        assert_eq!(pushed.last_updater.as_deref(), Some("alice"));
        assert!(pushed.last_update.is_some());
        assert_eq!(pushed.metadata.get(PUSHED_BY).map(String::as_str), Some("alice"));
        assert!(pushed.metadata.contains_key(PUSHED_AT));

        let written: Vec<Bug> = jsonl::load(&outbox).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].id, bug.id);

        pusher.push(&mut storage, bug.id, "bob").unwrap();
        let written: Vec<Bug> = jsonl::load(&outbox).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[1].last_updater.as_deref(), Some("bob"));
    }

    #[test]
    fn test_push_rolls_back_when_outbox_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let bug = storage
            .create_bug(&Bug {
                title: "Street names overlap".to_string(),
                ..Default::default()
            })
            .unwrap();

        let pusher = StampPusher::new(0).with_outbox(blocker.join("outbox.jsonl"));
        assert!(pusher.push(&mut storage, bug.id, "alice").is_err());

        let stored = storage.get_bug(bug.id).unwrap();
        assert!(stored.last_updater.is_none());
        assert!(!stored.metadata.contains_key(PUSHED_BY));
        assert!(!stored.metadata.contains_key(PUSHED_AT));
        assert_eq!(stored.content_hash, bug.content_hash);
    }
}
