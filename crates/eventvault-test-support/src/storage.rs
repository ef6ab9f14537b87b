//! Test storage: a backend whose every call fails.

use async_trait::async_trait;
use eventvault_core::error::EventStoreError;
use eventvault_core::event::{StoredEvent, StoredEventStream};
use eventvault_core::snapshot::Snapshot;
use eventvault_core::store::{EventStorage, ExpectedVersion};
use eventvault_core::version::Version;

/// An event storage that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingEventStorage;

fn unavailable() -> EventStoreError {
    EventStoreError::Infrastructure("connection refused".into())
}

#[async_trait]
impl EventStorage for FailingEventStorage {
    async fn stream_version(&self, _stream_id: &str) -> Result<u64, EventStoreError> {
        Err(unavailable())
    }

    async fn append(
        &self,
        _stream_id: &str,
        _events: Vec<StoredEvent>,
        _expected: ExpectedVersion,
    ) -> Result<u64, EventStoreError> {
        Err(unavailable())
    }

    async fn read_forward(
        &self,
        _stream_id: &str,
        _start: u64,
        _count: Option<u64>,
    ) -> Result<StoredEventStream, EventStoreError> {
        Err(unavailable())
    }

    async fn events_of_type_and_version(
        &self,
        _event_type: &str,
        _version: Version,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Err(unavailable())
    }

    async fn rewrite(&self, _events: &[StoredEvent]) -> Result<(), EventStoreError> {
        Err(unavailable())
    }

    async fn add_snapshot(&self, _snapshot: &Snapshot) -> Result<(), EventStoreError> {
        Err(unavailable())
    }

    async fn find_last_snapshot(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &str,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        Err(unavailable())
    }
}
