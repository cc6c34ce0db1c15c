//! The default provider: bugs filed straight into the local store.

use tracing::debug;

use bugtrack_core::error::Result;

use super::{Crawled, Crawler, ProviderServices, StampPusher, UrlIndexer};
use crate::config::Config;
use crate::storage::SqliteStorage;

/// Nothing to pull: the local store is the datastore's native store.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatastoreCrawler;

impl Crawler for DatastoreCrawler {
    fn crawl(&self, _storage: &mut SqliteStorage) -> Result<Crawled> {
        debug!("Datastore crawl is a no-op");
        Ok(Crawled::default())
    }
}

/// Datastore handlers for every service.
#[must_use]
pub fn services(config: &Config) -> ProviderServices {
    ProviderServices {
        crawler: Some(Box::new(DatastoreCrawler)),
        indexer: Some(Box::new(UrlIndexer)),
        pusher: Some(Box::new(StampPusher::new(config.datastore.max_retries))),
    }
}
