//! Process-local storage backend.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{EventStorage, ExpectedVersion, check_expected_version, verify_append};
use crate::error::EventStoreError;
use crate::event::{StoredEvent, StoredEventStream};
use crate::snapshot::Snapshot;
use crate::version::Version;

#[derive(Debug, Default)]
struct State {
    streams: HashMap<String, Vec<StoredEvent>>,
    snapshots: Vec<Snapshot>,
}

impl State {
    fn stream_version(&self, stream_id: &str) -> u64 {
        self.streams
            .get(stream_id)
            .map_or(0, |events| usize_to_u64(events.len()))
    }

    fn events(&self) -> impl Iterator<Item = &StoredEvent> {
        self.streams.values().flatten()
    }
}

/// Event storage held in a mutex-guarded map.
///
/// Appends are checked and written under one lock, so racing appenders on
/// the same stream see the same guarantees as the SQL backend.
#[derive(Debug, Default)]
pub struct InMemoryEventStorage {
    state: Mutex<State>,
}

impl InMemoryEventStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage pre-loaded with existing streams.
    ///
    /// Streams without an id are skipped; events are taken as stored,
    /// including their schema versions.
    #[must_use]
    pub fn with_streams(streams: impl IntoIterator<Item = StoredEventStream>) -> Self {
        let mut state = State::default();
        for stream in streams {
            if let Some(id) = stream.id().map(str::to_owned) {
                state
                    .streams
                    .entry(id)
                    .or_default()
                    .extend(stream.into_events());
            }
        }
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, EventStoreError> {
        self.state
            .lock()
            .map_err(|_| EventStoreError::Infrastructure("in-memory storage lock poisoned".into()))
    }
}

fn usize_to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

#[async_trait]
impl EventStorage for InMemoryEventStorage {
    async fn stream_version(&self, stream_id: &str) -> Result<u64, EventStoreError> {
        Ok(self.lock()?.stream_version(stream_id))
    }

    async fn append(
        &self,
        stream_id: &str,
        events: Vec<StoredEvent>,
        expected: ExpectedVersion,
    ) -> Result<u64, EventStoreError> {
        let mut state = self.lock()?;
        let current = state.stream_version(stream_id);
        let base = check_expected_version(stream_id, expected, current)?;
        let inserted = usize_to_u64(events.len());
        let final_version = current.saturating_add(inserted);
        verify_append(stream_id, base, inserted, final_version)?;

        state
            .streams
            .entry(stream_id.to_owned())
            .or_default()
            .extend(events);
        Ok(final_version)
    }

    async fn read_forward(
        &self,
        stream_id: &str,
        start: u64,
        count: Option<u64>,
    ) -> Result<StoredEventStream, EventStoreError> {
        let state = self.lock()?;
        let Some(events) = state.streams.get(stream_id) else {
            return Ok(StoredEventStream::empty(stream_id));
        };
        let skip = usize::try_from(start.saturating_sub(1)).unwrap_or(usize::MAX);
        let take = count.map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        let page = events.iter().skip(skip).take(take).cloned().collect();
        Ok(StoredEventStream::with_id(stream_id, page))
    }

    async fn events_of_type_and_version(
        &self,
        event_type: &str,
        version: Version,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let state = self.lock()?;
        Ok(state
            .events()
            .filter(|event| event.event_type == event_type && event.version == version)
            .cloned()
            .collect())
    }

    async fn rewrite(&self, events: &[StoredEvent]) -> Result<(), EventStoreError> {
        let mut state = self.lock()?;
        let mut updates: HashMap<_, _> = events.iter().map(|event| (event.id, event)).collect();
        // Validate first so a missing id leaves every stream untouched.
        let known: HashSet<Uuid> = state.events().map(|stored| stored.id).collect();
        if let Some(unknown) = events.iter().find(|event| !known.contains(&event.id)) {
            return Err(EventStoreError::Infrastructure(format!(
                "cannot rewrite event {}: unknown event id",
                unknown.id
            )));
        }
        for stored in state.streams.values_mut().flatten() {
            if let Some(update) = updates.remove(&stored.id) {
                stored.event_type.clone_from(&update.event_type);
                stored.body.clone_from(&update.body);
                stored.version = update.version;
            }
        }
        Ok(())
    }

    async fn add_snapshot(&self, snapshot: &Snapshot) -> Result<(), EventStoreError> {
        self.lock()?.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn find_last_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        let state = self.lock()?;
        Ok(state
            .snapshots
            .iter()
            .rev()
            .find(|s| s.aggregate_type == aggregate_type && s.aggregate_id == aggregate_id)
            .cloned())
    }
}
