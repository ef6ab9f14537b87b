//! Event store database schema.
//!
//! Every statement is idempotent, so [`SCHEMA_STATEMENTS`] can run on each
//! startup.

/// Known streams. Registering a stream is the first write of an append.
pub const CREATE_STREAMS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS streams (
    id TEXT PRIMARY KEY NOT NULL
)";

/// Stored events, ordered within a stream by `position` (1-based).
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS events (
    id          TEXT PRIMARY KEY NOT NULL,
    stream_id   TEXT NOT NULL REFERENCES streams (id),
    position    INTEGER NOT NULL,
    type        TEXT NOT NULL,
    event       TEXT NOT NULL,
    metadata    TEXT NOT NULL DEFAULT '{}',
    occurred_on TEXT NOT NULL,
    version     TEXT NOT NULL DEFAULT '1.0',
    UNIQUE (stream_id, position)
)";

/// Supports migrations, which select by type and schema version.
pub const CREATE_EVENTS_TYPE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_events_type_version
    ON events (type, version)";

/// Aggregate snapshots; the highest `seq` per aggregate is the latest.
pub const CREATE_SNAPSHOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS snapshots (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    aggregate_type TEXT NOT NULL,
    aggregate_id   TEXT NOT NULL,
    version        INTEGER NOT NULL,
    state          TEXT NOT NULL,
    taken_on       TEXT NOT NULL
)";

/// Supports snapshot lookup by aggregate.
pub const CREATE_SNAPSHOTS_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_snapshots_aggregate
    ON snapshots (aggregate_type, aggregate_id, seq)";

/// The full schema, in creation order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_STREAMS_TABLE,
    CREATE_EVENTS_TABLE,
    CREATE_EVENTS_TYPE_INDEX,
    CREATE_SNAPSHOTS_TABLE,
    CREATE_SNAPSHOTS_INDEX,
];
