//! The event store: optimistic appends, upgrade-on-read, and snapshots.
//!
//! [`EventStorage`] is the backend seam. A backend owns raw persistence and
//! the atomic check-then-write of an append. [`EventStore`] sits in front of
//! any backend and adds serialization, schema upgrades, and listeners, so
//! every backend behaves the same way.

mod in_memory;
mod listener;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::EventStoreError;
use crate::event::{DomainEvent, EventPayload, EventStream, StoredEvent, StoredEventStream};
use crate::metadata::Metadata;
use crate::serializer::Serializer;
use crate::snapshot::Snapshot;
use crate::version::Version;
use crate::versioning::EventUpgrader;

pub use in_memory::InMemoryEventStorage;
use listener::Listeners;
pub use listener::{EventStoreListener, FnListener, ListenerPoint, listener_fn};

/// The stream version a caller expects before appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedVersion {
    /// Append regardless of the current version.
    Any,
    /// Append only if the stream holds exactly this many events.
    Exact(u64),
}

impl ExpectedVersion {
    /// The stream must not have any events yet.
    pub const EMPTY_STREAM: Self = Self::Exact(0);
}

impl Default for ExpectedVersion {
    fn default() -> Self {
        Self::EMPTY_STREAM
    }
}

impl From<u64> for ExpectedVersion {
    fn from(version: u64) -> Self {
        Self::Exact(version)
    }
}

/// Checks `expected` against the stream's `current` version.
///
/// Returns the version the new events will be numbered after. Backends
/// call this inside their atomic section.
///
/// # Errors
///
/// Returns [`EventStoreError::StreamDoesNotExist`] for a nonzero expected
/// version on an empty stream and [`EventStoreError::ConcurrencyConflict`]
/// for any other mismatch.
pub fn check_expected_version(
    stream_id: &str,
    expected: ExpectedVersion,
    current: u64,
) -> Result<u64, EventStoreError> {
    match expected {
        ExpectedVersion::Any => Ok(current),
        ExpectedVersion::Exact(n) if n == current => Ok(current),
        ExpectedVersion::Exact(_) if current == 0 => {
            Err(EventStoreError::StreamDoesNotExist(stream_id.to_owned()))
        }
        ExpectedVersion::Exact(n) => Err(EventStoreError::ConcurrencyConflict {
            stream_id: stream_id.to_owned(),
            expected: n,
            actual: current,
        }),
    }
}

/// Checks that an append of `inserted` events moved the stream from `base`
/// to `final_version`.
///
/// # Errors
///
/// Returns [`EventStoreError::ConcurrencyConflict`] when another writer
/// slipped events in; the backend must then discard the write.
pub fn verify_append(
    stream_id: &str,
    base: u64,
    inserted: u64,
    final_version: u64,
) -> Result<(), EventStoreError> {
    if final_version.checked_sub(base) == Some(inserted) {
        return Ok(());
    }
    Err(EventStoreError::ConcurrencyConflict {
        stream_id: stream_id.to_owned(),
        expected: base,
        actual: final_version.saturating_sub(inserted),
    })
}

/// Raw persistence of stored events and snapshots.
///
/// Implementations must make [`append`](EventStorage::append) and
/// [`rewrite`](EventStorage::rewrite) atomic.
#[async_trait]
pub trait EventStorage: Send + Sync {
    /// Number of events ever appended to `stream_id`; `0` when unknown.
    async fn stream_version(&self, stream_id: &str) -> Result<u64, EventStoreError>;

    /// Atomically re-checks `expected`, writes `events` in order, recounts,
    /// and returns the new stream version.
    ///
    /// Creates the stream on first write.
    async fn append(
        &self,
        stream_id: &str,
        events: Vec<StoredEvent>,
        expected: ExpectedVersion,
    ) -> Result<u64, EventStoreError>;

    /// Reads up to `count` events starting at 1-based position `start`.
    async fn read_forward(
        &self,
        stream_id: &str,
        start: u64,
        count: Option<u64>,
    ) -> Result<StoredEventStream, EventStoreError>;

    /// Every stored event of `event_type` at schema `version`, across all
    /// streams.
    async fn events_of_type_and_version(
        &self,
        event_type: &str,
        version: Version,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Atomically replaces type, body and version of each event, matched by
    /// id.
    async fn rewrite(&self, events: &[StoredEvent]) -> Result<(), EventStoreError>;

    /// Persists a snapshot.
    async fn add_snapshot(&self, snapshot: &Snapshot) -> Result<(), EventStoreError>;

    /// The most recently added snapshot for the aggregate.
    async fn find_last_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<Snapshot>, EventStoreError>;
}

/// An event store backed by process memory.
pub type InMemoryEventStore<P> = EventStore<InMemoryEventStorage, P>;

/// Backend-independent event store front.
pub struct EventStore<S, P> {
    storage: S,
    serializer: Box<dyn Serializer<P>>,
    upgrader: EventUpgrader,
    listeners: Listeners<P>,
}

impl<S: std::fmt::Debug, P> std::fmt::Debug for EventStore<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("storage", &self.storage)
            .field("upgrader", &self.upgrader)
            .field(
                "pre_append_listeners",
                &self.listeners.count(ListenerPoint::PreAppend),
            )
            .field(
                "post_append_listeners",
                &self.listeners.count(ListenerPoint::PostAppend),
            )
            .finish_non_exhaustive()
    }
}

impl<S, P> EventStore<S, P>
where
    S: EventStorage,
    P: EventPayload,
{
    /// Creates a store over `storage`.
    #[must_use]
    pub fn new(
        storage: S,
        serializer: impl Serializer<P> + 'static,
        upgrader: EventUpgrader,
    ) -> Self {
        Self {
            storage,
            serializer: Box::new(serializer),
            upgrader,
            listeners: Listeners::default(),
        }
    }

    /// The backend.
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The upgrade chain applied on read.
    #[must_use]
    pub fn upgrader(&self) -> &EventUpgrader {
        &self.upgrader
    }

    /// Registers a listener. Listeners at the same point run in the order
    /// they were added.
    pub fn add_event_listener(
        &mut self,
        point: ListenerPoint,
        listener: impl EventStoreListener<P> + 'static,
    ) {
        self.listeners.add(point, Box::new(listener));
    }

    /// Appends `events` to `stream_id` if the stream is at `expected`.
    ///
    /// Returns the new stream version. An empty batch only validates
    /// `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::ConcurrencyConflict`] or
    /// [`EventStoreError::StreamDoesNotExist`] when `expected` does not
    /// hold, [`EventStoreError::Listener`] when a listener fails, and
    /// [`EventStoreError::Serialization`] when a payload cannot be encoded.
    /// A post-append listener failure leaves the events written.
    #[instrument(skip(self, events), fields(event_count = events.len()))]
    pub async fn append_to_stream(
        &self,
        stream_id: &str,
        events: Vec<DomainEvent<P>>,
        expected: ExpectedVersion,
    ) -> Result<u64, EventStoreError> {
        let current = self.storage.stream_version(stream_id).await?;
        if let Err(err) = check_expected_version(stream_id, expected, current) {
            warn!(error = %err, "Rejected append");
            return Err(err);
        }
        if events.is_empty() {
            return Ok(current);
        }

        self.notify(ListenerPoint::PreAppend, &events)?;

        let stored = events
            .iter()
            .map(|event| self.to_stored(stream_id, event))
            .collect::<Result<Vec<_>, _>>()?;
        let version = match self.storage.append(stream_id, stored, expected).await {
            Ok(version) => version,
            Err(err) => {
                if err.is_retryable() {
                    warn!(error = %err, "Lost append race");
                }
                return Err(err);
            }
        };
        info!(version, "Appended events");

        self.notify(ListenerPoint::PostAppend, &events)?;
        Ok(version)
    }

    /// Reads up to `count` events starting at 1-based position `start`.
    ///
    /// `start` of `0` reads from the beginning; `None` reads to the end.
    /// Every event is upgraded to its newest registered schema before it is
    /// deserialized.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Upgrade`] or
    /// [`EventStoreError::Serialization`] when an event cannot be decoded.
    #[instrument(skip(self))]
    pub async fn read_stream_events_forward(
        &self,
        stream_id: &str,
        start: u64,
        count: Option<u64>,
    ) -> Result<EventStream<DomainEvent<P>>, EventStoreError> {
        let stored = self
            .storage
            .read_forward(stream_id, start.max(1), count)
            .await?;
        debug!(read = stored.len(), "Read events");
        stored.try_map(|event| self.to_domain(event))
    }

    /// Reads the whole stream. An unknown stream reads as empty.
    ///
    /// # Errors
    ///
    /// See [`EventStore::read_stream_events_forward`].
    pub async fn read_full_stream(
        &self,
        stream_id: &str,
    ) -> Result<EventStream<DomainEvent<P>>, EventStoreError> {
        self.read_stream_events_forward(stream_id, 1, None).await
    }

    /// Number of events ever appended to `stream_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] when the backend fails.
    pub async fn stream_version(&self, stream_id: &str) -> Result<u64, EventStoreError> {
        self.storage.stream_version(stream_id).await
    }

    /// Persists a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] when the backend fails.
    #[instrument(skip(self, snapshot), fields(
        aggregate_type = %snapshot.aggregate_type,
        aggregate_id = %snapshot.aggregate_id,
        version = snapshot.version
    ))]
    pub async fn add_snapshot(&self, snapshot: &Snapshot) -> Result<(), EventStoreError> {
        self.storage.add_snapshot(snapshot).await?;
        info!("Stored snapshot");
        Ok(())
    }

    /// The most recently added snapshot for the aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Infrastructure`] when the backend fails.
    pub async fn find_last_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        self.storage
            .find_last_snapshot(aggregate_type, aggregate_id)
            .await
    }

    /// Permanently upgrades every `event_type` event stored at `from` to
    /// `to`, across all streams. Returns the number of rewritten events.
    ///
    /// Nothing is written unless every event reaches `to`.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Upgrade`] when the registered chain cannot
    /// take an event from `from` to `to`.
    #[instrument(skip(self), fields(from = %from, to = %to))]
    pub async fn migrate(
        &self,
        event_type: &str,
        from: Version,
        to: Version,
    ) -> Result<usize, EventStoreError> {
        let mut events = self
            .storage
            .events_of_type_and_version(event_type, from)
            .await?;
        for event in &mut events {
            self.upgrader.upgrade_to(event, to)?;
        }
        if !events.is_empty() {
            self.storage.rewrite(&events).await?;
        }
        info!(migrated = events.len(), "Migrated events");
        Ok(events.len())
    }

    fn notify(
        &self,
        point: ListenerPoint,
        events: &[DomainEvent<P>],
    ) -> Result<(), EventStoreError> {
        self.listeners.notify(point, events).map_err(|source| {
            warn!(%point, error = %source, "Listener failed");
            EventStoreError::Listener { point, source }
        })
    }

    fn to_stored(
        &self,
        stream_id: &str,
        event: &DomainEvent<P>,
    ) -> Result<StoredEvent, EventStoreError> {
        let body = self
            .serializer
            .serialize(&event.payload)
            .map_err(EventStoreError::Serialization)?;
        let metadata = event
            .metadata
            .to_json()
            .map_err(|err| EventStoreError::Serialization(Box::new(err)))?;
        Ok(StoredEvent {
            id: Uuid::new_v4(),
            stream_id: stream_id.to_owned(),
            event_type: event.event_type().to_owned(),
            body,
            metadata,
            occurred_on: event.occurred_on,
            version: event.version.unwrap_or_default(),
        })
    }

    fn to_domain(&self, mut event: StoredEvent) -> Result<DomainEvent<P>, EventStoreError> {
        self.upgrader.upgrade(&mut event)?;
        let payload = self
            .serializer
            .deserialize(&event.body, &event.event_type)
            .map_err(EventStoreError::Serialization)?;
        let metadata = Metadata::from_json(&event.metadata)
            .map_err(|err| EventStoreError::Serialization(Box::new(err)))?;
        Ok(DomainEvent {
            payload,
            metadata,
            occurred_on: event.occurred_on,
            version: Some(event.version),
        })
    }
}
