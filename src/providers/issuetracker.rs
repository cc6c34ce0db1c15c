//! Issue tracker provider.
//!
//! The tracker is reached through two JSONL files: a feed of
//! [`TrackerRecord`]s that the crawler pulls from, and an outbox the pusher
//! appends stamped bugs to.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bugtrack_core::error::Result;
use bugtrack_core::jsonl;
use bugtrack_core::model::{Bug, Provider};
use bugtrack_core::query::BugUpdate;

use super::{CrawlReport, Crawled, Crawler, ProviderServices, StampPusher, UrlIndexer};
use crate::config::Config;
use crate::storage::SqliteStorage;

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Key {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Key::deserialize(deserializer)? {
        Key::Text(text) => text,
        Key::Number(number) => number.to_string(),
    })
}

/// One issue as exported by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerRecord {
    /// Tracker-side issue key. Numeric keys are kept as their decimal text.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "summary")]
    pub title: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, alias = "reporter")]
    pub author: Option<String>,
    #[serde(default, alias = "opened")]
    pub reported_on: Option<DateTime<Utc>>,
    #[serde(default, alias = "modified")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default, alias = "modified_by")]
    pub last_updater: Option<String>,
    #[serde(default)]
    pub details_link: Option<String>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default, alias = "actual")]
    pub result: Option<String>,
    #[serde(default, alias = "fields")]
    pub metadata: BTreeMap<String, String>,
}

macro_rules! overlay {
    ($bug:ident, $record:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $record.$field.as_ref() {
                $bug.$field = Some(value.clone());
            }
        )+
    };
}

impl TrackerRecord {
    /// Lay this record over `base`.
    ///
    /// Fields the record leaves unset keep the base value, so local push
    /// stamps survive a re-crawl. Metadata keys are merged, record wins.
    #[must_use]
    pub fn overlay(&self, base: &Bug) -> Bug {
        let record = self;
        let mut bug = base.clone();
        bug.provider = Provider::IssueTracker;
        bug.bug_id = Some(record.id.clone());
        bug.title.clone_from(&record.title);
        if let Some(project) = record.project.as_ref() {
            bug.project.clone_from(project);
        }
        if let Some(status) = record.status.as_ref() {
            bug.status.clone_from(status);
        }
        overlay!(
            bug,
            record,
            url,
            priority,
            author,
            reported_on,
            last_update,
            last_updater,
            details_link,
            expected,
            result,
        );
        for (key, value) in &record.metadata {
            bug.metadata.insert(key.clone(), value.clone());
        }
        bug.refresh_state();
        bug
    }

    /// A fresh, unsaved bug for this record.
    #[must_use]
    pub fn to_bug(&self) -> Bug {
        self.overlay(&Bug::default())
    }
}

/// Upserts the tracker feed into the local store by `(provider, bug_id)`.
#[derive(Debug, Clone)]
pub struct FeedCrawler {
    feed: PathBuf,
}

impl FeedCrawler {
    #[must_use]
    pub const fn new(feed: PathBuf) -> Self {
        Self { feed }
    }

    fn upsert(
        storage: &mut SqliteStorage,
        record: &TrackerRecord,
        crawled: &mut Crawled,
    ) -> Result<()> {
        match storage.find_by_provider_key(Provider::IssueTracker, &record.id)? {
            None => {
                let bug = storage.create_bug(&record.to_bug())?;
                debug!(id = bug.id, key = %record.id, "Crawled new issue");
                crawled.report.created += 1;
                crawled.changed.push(bug);
            }
            Some(current) => {
                let incoming = record.overlay(&current);
                let hash = incoming.compute_content_hash();
                if current.content_hash.as_deref() == Some(hash.as_str()) {
                    crawled.report.unchanged += 1;
                    return Ok(());
                }
                let update = BugUpdate::between(&current, &incoming);
                if update.is_empty() {
                    crawled.report.unchanged += 1;
                } else {
                    let bug = storage.update_bug(current.id, &update)?;
                    debug!(id = bug.id, key = %record.id, "Crawled changed issue");
                    crawled.report.updated += 1;
                    crawled.changed.push(bug);
                }
            }
        }
        Ok(())
    }
}

impl Crawler for FeedCrawler {
    fn crawl(&self, storage: &mut SqliteStorage) -> Result<Crawled> {
        if !self.feed.exists() {
            warn!(feed = %self.feed.display(), "Issue tracker feed not found, nothing to crawl");
            return Ok(Crawled::default());
        }

        let records: Vec<TrackerRecord> = jsonl::load(&self.feed)?;
        let mut crawled = Crawled {
            report: CrawlReport {
                fetched: records.len(),
                ..Default::default()
            },
            changed: Vec::new(),
        };
        for record in &records {
            storage.with_transaction(|store| Self::upsert(store, record, &mut crawled))?;
        }
        Ok(crawled)
    }
}

/// Issue tracker handlers for every service.
#[must_use]
pub fn services(feed: PathBuf, outbox: PathBuf, config: &Config) -> ProviderServices {
    ProviderServices {
        crawler: Some(Box::new(FeedCrawler::new(feed))),
        indexer: Some(Box::new(UrlIndexer)),
        pusher: Some(Box::new(
            StampPusher::new(config.issuetracker.max_retries).with_outbox(outbox),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bugtrack_core::model::BugState;
    use tempfile::TempDir;

    fn record(id: &str, status: &str) -> TrackerRecord {
        TrackerRecord {
            id: id.to_string(),
            title: format!("Issue {id}"),
            project: Some("maps".to_string()),
            status: Some(status.to_string()),
            url: Some(format!("https://maps.example.com/issue/{id}")),
            priority: None,
            author: Some("reporter@example.com".to_string()),
            reported_on: None,
            last_update: None,
            last_updater: None,
            details_link: None,
            expected: None,
            result: None,
            metadata: BTreeMap::new(),
        }
    }

    fn write_feed(dir: &TempDir, records: &[TrackerRecord]) -> PathBuf {
        let path = dir.path().join("feed.jsonl");
        jsonl::save(&path, records).unwrap();
        path
    }

    #[test]
    fn test_record_aliases() {
        let line = r#"{"id":"77","summary":"Blank tiles","reporter":"sam","actual":"grey squares"}"#;
        let record: TrackerRecord = serde_json::from_str(line).unwrap();
        let bug = record.to_bug();
        assert_eq!(bug.provider, Provider::IssueTracker);
        assert_eq!(bug.bug_id.as_deref(), Some("77"));
        assert_eq!(bug.title, "Blank tiles");
        assert_eq!(bug.author.as_deref(), Some("sam"));
        assert_eq!(bug.result.as_deref(), Some("grey squares"));
        assert_eq!(bug.state, BugState::Unknown);
    }

    #[test]
    fn test_record_numeric_id() {
        let record: TrackerRecord = serde_json::from_str(r#"{"id":884,"title":"x"}"#).unwrap();
        assert_eq!(record.id, "884");
        assert_eq!(record.to_bug().bug_id.as_deref(), Some("884"));

        let bad = serde_json::from_str::<TrackerRecord>(r#"{"id":true,"title":"x"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_unchanged_record_matches_stored_hash() {
        let dir = TempDir::new().unwrap();
        let feed = record("3", "new");
        let crawler = FeedCrawler::new(write_feed(&dir, std::slice::from_ref(&feed)));
        let mut storage = SqliteStorage::open_memory().unwrap();
        let created = crawler.crawl(&mut storage).unwrap().changed.remove(0);

        let incoming = feed.overlay(&created);
        assert_eq!(
            created.content_hash.as_deref(),
            Some(incoming.compute_content_hash().as_str())
        );
        let again = crawler.crawl(&mut storage).unwrap();
        assert_eq!(again.report.unchanged, 1);
        assert_eq!(storage.get_bug(created.id).unwrap().modified, created.modified);

        let moved = record("3", "fixed");
        let updated = FeedCrawler::new(write_feed(&dir, std::slice::from_ref(&moved)))
            .crawl(&mut storage)
            .unwrap()
            .changed
            .remove(0);
        assert_ne!(updated.content_hash, created.content_hash);
        assert_eq!(
            updated.content_hash.as_deref(),
            Some(moved.overlay(&updated).compute_content_hash().as_str())
        );
    }

    #[test]
    fn test_crawl_creates_then_skips_unchanged() {
        let dir = TempDir::new().unwrap();
        let feed = write_feed(&dir, &[record("1", "new"), record("2", "fixed")]);
        let crawler = FeedCrawler::new(feed);
        let mut storage = SqliteStorage::open_memory().unwrap();

        let first = crawler.crawl(&mut storage).unwrap();
        assert_eq!(first.report.fetched, 2);
        assert_eq!(first.report.created, 2);
        assert_eq!(first.changed.len(), 2);
        assert_eq!(first.changed[1].state, BugState::Resolved);

        let second = crawler.crawl(&mut storage).unwrap();
        assert_eq!(second.report.created, 0);
        assert_eq!(second.report.updated, 0);
        assert_eq!(second.report.unchanged, 2);
        assert!(second.changed.is_empty());
        assert_eq!(storage.count_bugs().unwrap(), 2);
    }

    #[test]
    fn test_crawl_updates_changed_record() {
        let dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        FeedCrawler::new(write_feed(&dir, &[record("9", "assigned")]))
            .crawl(&mut storage)
            .unwrap();

        let crawled = FeedCrawler::new(write_feed(&dir, &[record("9", "wontfix")]))
            .crawl(&mut storage)
            .unwrap();
        assert_eq!(crawled.report.updated, 1);
        assert_eq!(crawled.changed[0].state, BugState::Closed);
        assert_eq!(storage.count_bugs().unwrap(), 1);
    }

    #[test]
    fn test_recrawl_keeps_local_stamps() {
        let dir = TempDir::new().unwrap();
        let crawler = FeedCrawler::new(write_feed(&dir, &[record("5", "new")]));
        let mut storage = SqliteStorage::open_memory().unwrap();
        let created = crawler.crawl(&mut storage).unwrap().changed.remove(0);

        let stamp = BugUpdate {
            last_updater: Some(Some("alice".to_string())),
            ..Default::default()
        };
        storage.update_bug(created.id, &stamp).unwrap();

        let again = crawler.crawl(&mut storage).unwrap();
        assert_eq!(again.report.unchanged, 1);
        let bug = storage.get_bug(created.id).unwrap();
        assert_eq!(bug.last_updater.as_deref(), Some("alice"));
    }

    #[test]
    fn test_missing_feed_is_empty_crawl() {
        let dir = TempDir::new().unwrap();
        let crawler = FeedCrawler::new(dir.path().join("absent.jsonl"));
        let mut storage = SqliteStorage::open_memory().unwrap();
        let crawled = crawler.crawl(&mut storage).unwrap();
        assert_eq!(crawled.report, CrawlReport::default());
    }

    #[test]
    fn test_bad_feed_line_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feed.jsonl");
        std::fs::write(&path, "{\"id\":\"1\",\"title\":\"ok\"}\nnot json\n").unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let err = FeedCrawler::new(path).crawl(&mut storage).unwrap_err();
        assert!(matches!(
            err,
            bugtrack_core::BugError::JsonlParse { line: 2, .. }
        ));
    }
}
