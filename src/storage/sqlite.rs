//! `SQLite` storage implementation.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, Transaction, params};
use tracing::{debug, info, warn};

use bugtrack_core::error::{BugError, Result};
use bugtrack_core::model::{Bug, Provider, TestCycle, UrlBugMap};
use bugtrack_core::query::{BugFilters, BugUpdate};
use bugtrack_core::util::{UrlParts, decompose_url};

use super::schema::{SCHEMA_SQL, SCHEMA_VERSION};
use crate::validation::{BugValidator, CycleValidator};

const BUG_COLUMNS: &str = "id, provider, bug_id, project, title, status, state, url, priority, \
     author, reported_on, last_update, last_updater, details_link, expected, result, metadata, \
     content_hash, added, modified";

const MAPPING_COLUMNS: &str = "id, bug, url, host_path, host, added";

const CYCLE_COLUMNS: &str = "id, provider, project, cycle_id, name, created_at";

/// `SQLite`-backed bug store.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, Duration::from_secs(5))
    }

    /// Open with an explicit busy timeout.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the database cannot be opened or migrated.
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage("open database"))?;
        conn.busy_timeout(busy_timeout)
            .map_err(storage("set busy timeout"))?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(storage("enable WAL"))?;
        let store = Self { conn };
        store.apply_schema()?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened bug database");
        Ok(store)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the schema cannot be applied.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage("open in-memory database"))?;
        let store = Self { conn };
        store.apply_schema()?;
        Ok(store)
    }

    fn apply_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA_SQL)
            .map_err(storage("apply schema"))?;
        let current: Option<i64> = self
            .conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .map_err(storage("read schema version"))?;
        if current.is_none() {
            self.conn
                .execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    params![SCHEMA_VERSION],
                )
                .map_err(storage("record schema version"))?;
        }
        Ok(())
    }

    /// Schema version recorded in the database.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    pub fn schema_version(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .map_err(storage("read schema version"))
    }

    // ========================================================================
    // Bugs
    // ========================================================================

    /// Validate and insert a bug, returning the stored copy.
    ///
    /// `state`, `added`, `modified` and `content_hash` are derived here; the
    /// values on `bug` are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Create`, carrying the validation or storage cause.
    pub fn create_bug(&mut self, bug: &Bug) -> Result<Bug> {
        let mut bug = bug.clone();
        let now = Utc::now();
        bug.refresh_state();
        bug.added = now;
        bug.modified = now;
        bug.content_hash = Some(bug.compute_content_hash());

        BugValidator::check(&bug).map_err(|e| BugError::create_from("invalid bug", e))?;

        bug.id = insert_bug(&self.conn, &bug)
            .map_err(|e| BugError::create_from("insert bug", e))?;
        info!(id = bug.id, provider = %bug.provider, "Created bug");
        Ok(bug)
    }

    /// Fetch a bug by store key.
    ///
    /// # Errors
    ///
    /// Returns `BugNotFound` if absent, or `Storage` on query failure.
    pub fn get_bug(&self, id: i64) -> Result<Bug> {
        self.find_bug(id)?.ok_or(BugError::BugNotFound { id })
    }

    /// Fetch a bug by its textual key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId` for a malformed key, otherwise as [`Self::get_bug`].
    pub fn get_bug_by_key(&self, key: &str) -> Result<Bug> {
        let id = bugtrack_core::util::parse_bug_id(key)?;
        self.get_bug(id)
    }

    fn find_bug(&self, id: i64) -> Result<Option<Bug>> {
        self.conn
            .query_row(
                &format!("SELECT {BUG_COLUMNS} FROM bugs WHERE id = ?1"),
                params![id],
                bug_from_row,
            )
            .optional()
            .map_err(storage("get bug"))
    }

    /// Look a bug up by its provider-side key.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    pub fn find_by_provider_key(&self, provider: Provider, bug_id: &str) -> Result<Option<Bug>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {BUG_COLUMNS} FROM bugs WHERE provider = ?1 AND bug_id = ?2 \
                     ORDER BY id LIMIT 1"
                ),
                params![provider.as_str(), bug_id],
                bug_from_row,
            )
            .optional()
            .map_err(storage("find bug by provider key"))
    }

    /// Apply a partial update and return the resulting bug.
    ///
    /// An empty update, or one that changes nothing, returns the bug as
    /// stored without touching `modified`. When the URL changes, mappings
    /// for any other URL are dropped in the same write.
    ///
    /// # Errors
    ///
    /// Returns `BugNotFound` if absent, or `Update` carrying the validation
    /// or storage cause.
    pub fn update_bug(&mut self, id: i64, update: &BugUpdate) -> Result<Bug> {
        let mut bug = self.get_bug(id)?;
        let previous_url = bug.url.clone();
        if update.is_empty() {
            debug!(id, "Empty update, nothing to do");
            return Ok(bug);
        }
        if !update.apply_to(&mut bug) {
            debug!(id, "Update matches stored bug");
            return Ok(bug);
        }

        bug.modified = Utc::now();
        bug.content_hash = Some(bug.compute_content_hash());
        BugValidator::check(&bug).map_err(|e| BugError::Update {
            id,
            source: Box::new(e),
        })?;

        let wrap = move |e: BugError| BugError::Update {
            id,
            source: Box::new(e),
        };
        let sp = self
            .conn
            .savepoint()
            .map_err(storage("begin update"))
            .map_err(wrap)?;
        write_bug(&sp, &bug).map_err(wrap)?;
        if bug.url != previous_url {
            let pruned = prune_url_mappings(&sp, id, bug.url.as_deref()).map_err(wrap)?;
            debug!(id, pruned, "URL changed, dropped stale mappings");
        }
        sp.commit().map_err(storage("commit update")).map_err(wrap)?;
        info!(id, state = %bug.state, "Updated bug");
        Ok(bug)
    }

    /// Delete a bug and its URL mappings in one transaction.
    ///
    /// Returns the number of mappings removed.
    ///
    /// # Errors
    ///
    /// Returns `BugNotFound` if absent, or `Delete` carrying the storage
    /// cause.
    pub fn delete_bug(&mut self, id: i64) -> Result<usize> {
        if self.find_bug(id)?.is_none() {
            return Err(BugError::BugNotFound { id });
        }

        let wrap = move |e: BugError| BugError::Delete {
            id,
            source: Box::new(e),
        };
        let tx = self
            .conn
            .transaction()
            .map_err(storage("begin delete"))
            .map_err(wrap)?;
        let removed = delete_bug_tx(&tx, id).map_err(wrap)?;
        tx.commit().map_err(storage("commit delete")).map_err(wrap)?;

        info!(id, mappings = removed, "Deleted bug");
        Ok(removed)
    }

    /// Run `f` inside one write transaction, rolling back on error.
    ///
    /// `f` must not start its own transaction.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or `Storage` if the transaction cannot be
    /// opened or committed.
    pub fn with_transaction<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(storage("begin transaction"))?;
        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(storage("commit transaction"))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// List bugs matching `filters`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    pub fn list_bugs(&self, filters: &BugFilters) -> Result<Vec<Bug>> {
        let mut sql = format!("SELECT {BUG_COLUMNS} FROM bugs WHERE 1=1");
        let mut values: Vec<String> = Vec::new();

        if let Some(provider) = filters.provider {
            values.push(provider.as_str().to_string());
            sql.push_str(&format!(" AND provider = ?{}", values.len()));
        }
        if let Some(project) = filters.project.as_ref() {
            values.push(project.clone());
            sql.push_str(&format!(" AND project = ?{}", values.len()));
        }
        if let Some(state) = filters.state {
            values.push(state.as_str().to_string());
            sql.push_str(&format!(" AND state = ?{}", values.len()));
        }
        sql.push_str(" ORDER BY id ASC");
        if let Some(limit) = filters.limit {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = self.conn.prepare(&sql).map_err(storage("list bugs"))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), bug_from_row)
            .map_err(storage("list bugs"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage("list bugs"))
    }

    /// Total number of stored bugs.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    pub fn count_bugs(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM bugs", [], |row| row.get(0))
            .map_err(storage("count bugs"))?;
        usize::try_from(count).map_err(|e| BugError::storage("count bugs", e))
    }

    // ========================================================================
    // URL mappings
    // ========================================================================

    /// Make `parts` the only mapping of `bug` and return its id.
    ///
    /// Mappings for other URLs of the same bug are removed in the same
    /// savepoint; an existing row for `parts.url` is refreshed in place.
    ///
    /// # Errors
    ///
    /// Returns `BugNotFound` if the bug is absent, or `Storage` on failure.
    pub fn upsert_url_mapping(&mut self, bug: i64, parts: &UrlParts) -> Result<i64> {
        if self.find_bug(bug)?.is_none() {
            return Err(BugError::BugNotFound { id: bug });
        }
        let sp = self
            .conn
            .savepoint()
            .map_err(storage("begin url mapping"))?;
        sp.execute(
            "DELETE FROM url_bug_map WHERE bug = ?1 AND url <> ?2",
            params![bug, parts.url],
        )
        .map_err(storage("prune url mappings"))?;
        sp.execute(
            "INSERT INTO url_bug_map (bug, url, host_path, host, added)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(bug, url) DO UPDATE SET
                 host_path = excluded.host_path,
                 host = excluded.host",
            params![bug, parts.url, parts.host_path, parts.host, Utc::now()],
        )
        .map_err(storage("upsert url mapping"))?;
        let id = sp
            .query_row(
                "SELECT id FROM url_bug_map WHERE bug = ?1 AND url = ?2",
                params![bug, parts.url],
                |row| row.get(0),
            )
            .map_err(storage("read url mapping id"))?;
        sp.commit().map_err(storage("commit url mapping"))?;
        Ok(id)
    }

    /// Mappings owned by a bug.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    pub fn mappings_for_bug(&self, bug: i64) -> Result<Vec<UrlBugMap>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {MAPPING_COLUMNS} FROM url_bug_map WHERE bug = ?1 ORDER BY id"
            ))
            .map_err(storage("list url mappings"))?;
        let rows = stmt
            .query_map(params![bug], mapping_from_row)
            .map_err(storage("list url mappings"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage("list url mappings"))
    }

    /// Bugs mapped to `url`.
    ///
    /// Tries the full URL, then host plus path, then host alone, and
    /// returns the first non-empty match.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an unparseable URL, or `Storage`.
    pub fn bugs_for_url(&self, url: &str) -> Result<Vec<Bug>> {
        let parts = decompose_url(url)?;
        let columns: Vec<String> = BUG_COLUMNS
            .split(',')
            .map(|c| format!("b.{}", c.trim()))
            .collect();
        let select = columns.join(", ");

        for (column, value) in [
            ("url", &parts.url),
            ("host_path", &parts.host_path),
            ("host", &parts.host),
        ] {
            let mut stmt = self
                .conn
                .prepare(&format!(
                    "SELECT DISTINCT {select} FROM bugs b
                     JOIN url_bug_map m ON m.bug = b.id
                     WHERE m.{column} = ?1
                     ORDER BY b.id"
                ))
                .map_err(storage("lookup bugs by url"))?;
            let bugs = stmt
                .query_map(params![value], bug_from_row)
                .map_err(storage("lookup bugs by url"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(storage("lookup bugs by url"))?;
            if !bugs.is_empty() {
                debug!(url, matched_on = column, count = bugs.len(), "URL lookup");
                return Ok(bugs);
            }
        }
        Ok(Vec::new())
    }

    // ========================================================================
    // Test cycles
    // ========================================================================

    /// Insert a test cycle.
    ///
    /// # Errors
    ///
    /// Returns `Create`: without a cause when the triple already exists,
    /// with the validation or storage cause otherwise.
    pub fn create_test_cycle(&mut self, cycle: &TestCycle) -> Result<TestCycle> {
        CycleValidator::check(cycle).map_err(|e| BugError::create_from("invalid test cycle", e))?;

        let mut stored = cycle.clone();
        let result = self.conn.execute(
            "INSERT INTO test_cycles (provider, project, cycle_id, name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                cycle.provider.as_str(),
                cycle.project,
                cycle.cycle_id,
                cycle.name,
                cycle.created_at
            ],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(BugError::create(format!(
                    "test cycle {}/{}/{} already exists",
                    cycle.provider, cycle.project, cycle.cycle_id
                )));
            }
            Err(err) => {
                return Err(BugError::create_from(
                    "insert test cycle",
                    BugError::storage("insert test cycle", err),
                ));
            }
        }
        stored.id = self.conn.last_insert_rowid();
        info!(
            provider = %stored.provider,
            project = %stored.project,
            cycle_id = %stored.cycle_id,
            "Created test cycle"
        );
        Ok(stored)
    }

    /// Fetch a test cycle by its identifying triple.
    ///
    /// # Errors
    ///
    /// Returns `CycleNotFound` if absent, or `Storage` on failure.
    pub fn get_test_cycle(
        &self,
        provider: Provider,
        project: &str,
        cycle_id: &str,
    ) -> Result<TestCycle> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {CYCLE_COLUMNS} FROM test_cycles
                     WHERE provider = ?1 AND project = ?2 AND cycle_id = ?3"
                ),
                params![provider.as_str(), project, cycle_id],
                cycle_from_row,
            )
            .optional()
            .map_err(storage("get test cycle"))?
            .ok_or_else(|| BugError::CycleNotFound {
                provider: provider.to_string(),
                project: project.to_string(),
                cycle_id: cycle_id.to_string(),
            })
    }

    /// List test cycles, optionally narrowed by provider and project.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    pub fn list_test_cycles(
        &self,
        provider: Option<Provider>,
        project: Option<&str>,
    ) -> Result<Vec<TestCycle>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {CYCLE_COLUMNS} FROM test_cycles
                 WHERE (?1 IS NULL OR provider = ?1) AND (?2 IS NULL OR project = ?2)
                 ORDER BY provider, project, cycle_id"
            ))
            .map_err(storage("list test cycles"))?;
        let rows = stmt
            .query_map(
                params![provider.map(Provider::as_str), project],
                cycle_from_row,
            )
            .map_err(storage("list test cycles"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage("list test cycles"))
    }
}

// ============================================================================
// Row mapping and statement helpers
// ============================================================================

fn storage(context: &'static str) -> impl Fn(rusqlite::Error) -> BugError {
    move |err| BugError::storage(context, err)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = BugError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn bug_from_row(row: &Row<'_>) -> rusqlite::Result<Bug> {
    let metadata: String = row.get(16)?;
    Ok(Bug {
        id: row.get(0)?,
        provider: parse_column(row, 1)?,
        bug_id: row.get(2)?,
        project: row.get(3)?,
        title: row.get(4)?,
        status: row.get(5)?,
        state: parse_column(row, 6)?,
        url: row.get(7)?,
        priority: row.get(8)?,
        author: row.get(9)?,
        reported_on: row.get(10)?,
        last_update: row.get(11)?,
        last_updater: row.get(12)?,
        details_link: row.get(13)?,
        expected: row.get(14)?,
        result: row.get(15)?,
        metadata: serde_json::from_str(&metadata).map_err(|e| conversion_error(16, e))?,
        content_hash: row.get(17)?,
        added: row.get(18)?,
        modified: row.get(19)?,
    })
}

fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<UrlBugMap> {
    Ok(UrlBugMap {
        id: row.get(0)?,
        bug: row.get(1)?,
        url: row.get(2)?,
        host_path: row.get(3)?,
        host: row.get(4)?,
        added: row.get(5)?,
    })
}

fn cycle_from_row(row: &Row<'_>) -> rusqlite::Result<TestCycle> {
    Ok(TestCycle {
        id: row.get(0)?,
        provider: parse_column(row, 1)?,
        project: row.get(2)?,
        cycle_id: row.get(3)?,
        name: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn metadata_json(bug: &Bug) -> Result<String> {
    Ok(serde_json::to_string(&bug.metadata)?)
}

fn insert_bug(conn: &Connection, bug: &Bug) -> Result<i64> {
    let metadata = metadata_json(bug)?;
    conn.execute(
        "INSERT INTO bugs (
            provider, bug_id, project, title, status, state, url, priority, author,
            reported_on, last_update, last_updater, details_link, expected, result,
            metadata, content_hash, added, modified
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            bug.provider.as_str(),
            bug.bug_id,
            bug.project,
            bug.title,
            bug.status,
            bug.state.as_str(),
            bug.url,
            bug.priority,
            bug.author,
            bug.reported_on,
            bug.last_update,
            bug.last_updater,
            bug.details_link,
            bug.expected,
            bug.result,
            metadata,
            bug.content_hash,
            bug.added,
            bug.modified,
        ],
    )
    .map_err(storage("insert bug"))?;
    Ok(conn.last_insert_rowid())
}

fn write_bug(conn: &Connection, bug: &Bug) -> Result<()> {
    let metadata = metadata_json(bug)?;
    conn.execute(
        "UPDATE bugs SET
            bug_id = ?2, project = ?3, title = ?4, status = ?5, state = ?6, url = ?7,
            priority = ?8, author = ?9, reported_on = ?10, last_update = ?11,
            last_updater = ?12, details_link = ?13, expected = ?14, result = ?15,
            metadata = ?16, content_hash = ?17, modified = ?18
         WHERE id = ?1",
        params![
            bug.id,
            bug.bug_id,
            bug.project,
            bug.title,
            bug.status,
            bug.state.as_str(),
            bug.url,
            bug.priority,
            bug.author,
            bug.reported_on,
            bug.last_update,
            bug.last_updater,
            bug.details_link,
            bug.expected,
            bug.result,
            metadata,
            bug.content_hash,
            bug.modified,
        ],
    )
    .map_err(storage("write bug"))?;
    Ok(())
}

/// Drop mappings of `bug` other than the one for `keep`, or all of them
/// when `keep` is `None`.
fn prune_url_mappings(conn: &Connection, bug: i64, keep: Option<&str>) -> Result<usize> {
    let removed = match keep {
        Some(url) => {
            let parts = decompose_url(url)?;
            conn.execute(
                "DELETE FROM url_bug_map WHERE bug = ?1 AND url <> ?2",
                params![bug, parts.url],
            )
        }
        None => conn.execute("DELETE FROM url_bug_map WHERE bug = ?1", params![bug]),
    };
    removed.map_err(storage("prune url mappings"))
}

fn delete_bug_tx(tx: &Transaction<'_>, id: i64) -> Result<usize> {
    let removed = tx
        .execute("DELETE FROM url_bug_map WHERE bug = ?1", params![id])
        .map_err(storage("delete url mappings"))?;
    tx.execute("DELETE FROM bugs WHERE id = ?1", params![id])
        .map_err(storage("delete bug"))?;
    Ok(removed)
}
