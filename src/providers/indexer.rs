//! URL indexer shared by the built-in providers.

use tracing::debug;

use bugtrack_core::error::Result;
use bugtrack_core::model::Bug;
use bugtrack_core::util::decompose_url;

use super::Indexer;
use crate::storage::SqliteStorage;

/// Maps a bug's URL, with its host+path and host components, to the bug.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlIndexer;

impl Indexer for UrlIndexer {
    fn index(&self, storage: &mut SqliteStorage, bug: &Bug) -> Result<Option<i64>> {
        let Some(url) = bug.url.as_deref() else {
            debug!(id = bug.id, "Bug has no URL, nothing to index");
            return Ok(None);
        };
        let parts = decompose_url(url)?;
        let mapping = storage.upsert_url_mapping(bug.id, &parts)?;
        debug!(id = bug.id, mapping, host_path = %parts.host_path, "Indexed bug URL");
        Ok(Some(mapping))
    }
}
