//! Table definitions.

/// Bumped whenever the tables below change shape.
pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS bugs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    provider      TEXT NOT NULL,
    bug_id        TEXT,
    project       TEXT NOT NULL DEFAULT '',
    title         TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT '',
    state         TEXT NOT NULL DEFAULT 'unknown',
    url           TEXT,
    priority      TEXT,
    author        TEXT,
    reported_on   TEXT,
    last_update   TEXT,
    last_updater  TEXT,
    details_link  TEXT,
    expected      TEXT,
    result        TEXT,
    metadata      TEXT NOT NULL DEFAULT '{}',
    content_hash  TEXT,
    added         TEXT NOT NULL,
    modified      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bugs_provider_key ON bugs(provider, bug_id);
CREATE INDEX IF NOT EXISTS idx_bugs_project ON bugs(project);
CREATE INDEX IF NOT EXISTS idx_bugs_state ON bugs(state);

CREATE TABLE IF NOT EXISTS url_bug_map (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    bug        INTEGER NOT NULL,
    url        TEXT NOT NULL,
    host_path  TEXT NOT NULL,
    host       TEXT NOT NULL,
    added      TEXT NOT NULL,
    UNIQUE (bug, url)
);

CREATE INDEX IF NOT EXISTS idx_url_bug_map_url ON url_bug_map(url);
CREATE INDEX IF NOT EXISTS idx_url_bug_map_host_path ON url_bug_map(host_path);
CREATE INDEX IF NOT EXISTS idx_url_bug_map_host ON url_bug_map(host);

CREATE TABLE IF NOT EXISTS test_cycles (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    provider    TEXT NOT NULL,
    project     TEXT NOT NULL,
    cycle_id    TEXT NOT NULL,
    name        TEXT,
    created_at  TEXT NOT NULL,
    UNIQUE (provider, project, cycle_id)
);
";
