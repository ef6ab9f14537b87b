//! `SQLite` implementation of the `EventStorage` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use eventvault_core::error::EventStoreError;
use eventvault_core::event::{StoredEvent, StoredEventStream};
use eventvault_core::snapshot::Snapshot;
use eventvault_core::store::{
    EventStorage, EventStore, ExpectedVersion, check_expected_version, verify_append,
};
use eventvault_core::version::Version;

use crate::schema::SCHEMA_STATEMENTS;

/// An event store backed by `SQLite`.
pub type SqlEventStore<P> = EventStore<SqlEventStorage, P>;

/// SQLite-backed event storage.
///
/// An append registers its stream before anything else, which takes
/// `SQLite`'s write lock for the rest of the transaction. Concurrent
/// appenders therefore serialize, and the unique `(stream_id, position)`
/// constraint catches any writer that slips past the version check.
#[derive(Debug, Clone)]
pub struct SqlEventStorage {
    pool: SqlitePool,
}

impl SqlEventStorage {
    /// Creates a new `SqlEventStorage`.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the tables and indexes if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] when a statement fails.
    pub async fn create_schema(&self) -> Result<(), EventStoreError> {
        for &statement in SCHEMA_STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(infrastructure)?;
        }
        debug!("Event store schema ready");
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: String,
    stream_id: String,
    event_type: String,
    event: String,
    metadata: String,
    occurred_on: DateTime<Utc>,
    version: String,
}

impl EventRow {
    fn into_stored(self) -> Result<StoredEvent, EventStoreError> {
        let id = Uuid::parse_str(&self.id).map_err(|err| {
            EventStoreError::Infrastructure(format!("corrupt event id {}: {err}", self.id))
        })?;
        let version: Version = self.version.parse().map_err(|err| {
            EventStoreError::Infrastructure(format!("corrupt version of event {id}: {err}"))
        })?;
        Ok(StoredEvent {
            id,
            stream_id: self.stream_id,
            event_type: self.event_type,
            body: self.event,
            metadata: self.metadata,
            occurred_on: self.occurred_on,
            version,
        })
    }
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    aggregate_type: String,
    aggregate_id: String,
    version: i64,
    state: String,
    taken_on: DateTime<Utc>,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<Snapshot, EventStoreError> {
        let version = u64::try_from(self.version).map_err(|err| {
            EventStoreError::Infrastructure(format!(
                "corrupt snapshot version {} of {} {}: {err}",
                self.version, self.aggregate_type, self.aggregate_id
            ))
        })?;
        Ok(Snapshot {
            state: serde_json::from_str(&self.state)
                .map_err(|err| EventStoreError::Serialization(Box::new(err)))?,
            aggregate_type: self.aggregate_type,
            aggregate_id: self.aggregate_id,
            version,
            taken_on: self.taken_on,
        })
    }
}

const SELECT_EVENTS: &str = "SELECT id, stream_id, type AS event_type, event, metadata, \
     occurred_on, version FROM events";

fn infrastructure(err: sqlx::Error) -> EventStoreError {
    EventStoreError::Infrastructure(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

async fn count_events(
    conn: &mut SqliteConnection,
    stream_id: &str,
) -> Result<u64, EventStoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE stream_id = ?")
        .bind(stream_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(infrastructure)?;
    Ok(u64::try_from(count).unwrap_or_default())
}

#[async_trait]
impl EventStorage for SqlEventStorage {
    async fn stream_version(&self, stream_id: &str) -> Result<u64, EventStoreError> {
        let mut conn = self.pool.acquire().await.map_err(infrastructure)?;
        count_events(&mut conn, stream_id).await
    }

    async fn append(
        &self,
        stream_id: &str,
        events: Vec<StoredEvent>,
        expected: ExpectedVersion,
    ) -> Result<u64, EventStoreError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        sqlx::query("INSERT OR IGNORE INTO streams (id) VALUES (?)")
            .bind(stream_id)
            .execute(&mut *tx)
            .await
            .map_err(infrastructure)?;

        let current = count_events(&mut tx, stream_id).await?;
        let base = check_expected_version(stream_id, expected, current)?;
        let inserted = to_u64(events.len());

        for (offset, event) in (1_u64..).zip(&events) {
            let result = sqlx::query(
                "INSERT INTO events \
                 (id, stream_id, position, type, event, metadata, occurred_on, version) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(event.id.to_string())
            .bind(stream_id)
            .bind(to_i64(base + offset))
            .bind(&event.event_type)
            .bind(&event.body)
            .bind(&event.metadata)
            .bind(event.occurred_on)
            .bind(event.version.to_string())
            .execute(&mut *tx)
            .await;

            if let Err(err) = result {
                if !is_unique_violation(&err) {
                    return Err(infrastructure(err));
                }
                let written = count_events(&mut tx, stream_id).await?;
                warn!(position = base + offset, "Position already taken");
                return Err(EventStoreError::ConcurrencyConflict {
                    stream_id: stream_id.to_owned(),
                    expected: base,
                    actual: written.saturating_sub(offset - 1),
                });
            }
        }

        let final_version = count_events(&mut tx, stream_id).await?;
        verify_append(stream_id, base, inserted, final_version)?;
        tx.commit().await.map_err(infrastructure)?;
        debug!(stream_id, inserted, final_version, "Committed append");
        Ok(final_version)
    }

    async fn read_forward(
        &self,
        stream_id: &str,
        start: u64,
        count: Option<u64>,
    ) -> Result<StoredEventStream, EventStoreError> {
        // SQLite reads a negative LIMIT as no limit.
        let limit = count.map_or(-1, to_i64);
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "{SELECT_EVENTS} WHERE stream_id = ? AND position >= ? ORDER BY position LIMIT ?"
        ))
        .bind(stream_id)
        .bind(to_i64(start))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        let events = rows
            .into_iter()
            .map(EventRow::into_stored)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StoredEventStream::with_id(stream_id, events))
    }

    async fn events_of_type_and_version(
        &self,
        event_type: &str,
        version: Version,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "{SELECT_EVENTS} WHERE type = ? AND version = ? ORDER BY stream_id, position"
        ))
        .bind(event_type)
        .bind(version.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        rows.into_iter().map(EventRow::into_stored).collect()
    }

    async fn rewrite(&self, events: &[StoredEvent]) -> Result<(), EventStoreError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;
        for event in events {
            let result =
                sqlx::query("UPDATE events SET type = ?, event = ?, version = ? WHERE id = ?")
                    .bind(&event.event_type)
                    .bind(&event.body)
                    .bind(event.version.to_string())
                    .bind(event.id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(infrastructure)?;
            if result.rows_affected() != 1 {
                return Err(EventStoreError::Infrastructure(format!(
                    "cannot rewrite event {}: unknown event id",
                    event.id
                )));
            }
        }
        tx.commit().await.map_err(infrastructure)
    }

    async fn add_snapshot(&self, snapshot: &Snapshot) -> Result<(), EventStoreError> {
        sqlx::query(
            "INSERT INTO snapshots (aggregate_type, aggregate_id, version, state, taken_on) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&snapshot.aggregate_type)
        .bind(&snapshot.aggregate_id)
        .bind(to_i64(snapshot.version))
        .bind(snapshot.state.to_string())
        .bind(snapshot.taken_on)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn find_last_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            "SELECT aggregate_type, aggregate_id, version, state, taken_on FROM snapshots \
             WHERE aggregate_type = ? AND aggregate_id = ? ORDER BY seq DESC LIMIT 1",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;

        row.map(SnapshotRow::into_snapshot).transpose()
    }
}
