//! Aggregate repository: load, save, and snapshot aggregates through an
//! event store.

use std::marker::PhantomData;

use tracing::{debug, instrument};

use crate::aggregate::AggregateRoot;
use crate::clock::Clock;
use crate::error::{EventStoreError, RepositoryError};
use crate::reconstructor::AggregateReconstructor;
use crate::snapshot::{Snapshot, Snapshottable};
use crate::store::{EventStorage, EventStore, ExpectedVersion, ListenerPoint};

/// Loads and saves aggregates of type `A`. An aggregate's stream id is its
/// aggregate id.
pub struct AggregateRepository<'a, S, A: AggregateRoot> {
    store: &'a EventStore<S, A::Event>,
    reconstructor: &'a AggregateReconstructor,
    _aggregate: PhantomData<fn() -> A>,
}

impl<S, A: AggregateRoot> std::fmt::Debug for AggregateRepository<'_, S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateRepository")
            .field("aggregate_type", &A::AGGREGATE_TYPE)
            .finish_non_exhaustive()
    }
}

impl<'a, S, A> AggregateRepository<'a, S, A>
where
    S: EventStorage,
    A: AggregateRoot,
    A::Event: Clone,
{
    /// Creates a repository over `store`.
    #[must_use]
    pub fn new(
        store: &'a EventStore<S, A::Event>,
        reconstructor: &'a AggregateReconstructor,
    ) -> Self {
        Self {
            store,
            reconstructor,
            _aggregate: PhantomData,
        }
    }

    /// Replays the aggregate's full stream.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] when reading fails and
    /// [`RepositoryError::Reconstruction`] when replay fails.
    #[instrument(skip(self), fields(aggregate_type = A::AGGREGATE_TYPE))]
    pub async fn load(&self, aggregate_id: &str) -> Result<Option<A>, RepositoryError> {
        let stream = self.store.read_full_stream(aggregate_id).await?;
        Ok(self.reconstructor.reconstitute::<A>(&stream)?)
    }

    /// Appends the aggregate's uncommitted events and clears them.
    ///
    /// The expected stream version is the aggregate's committed version, so
    /// a concurrent save of the same aggregate fails with a concurrency
    /// conflict. Returns the new stream version.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] when the append fails; the
    /// uncommitted events are kept in that case. A failing post-append
    /// listener is also reported, but the events are already committed and
    /// therefore cleared.
    #[instrument(skip(self, aggregate), fields(
        aggregate_type = A::AGGREGATE_TYPE,
        aggregate_id = aggregate.aggregate_id()
    ))]
    pub async fn save(&self, aggregate: &mut A) -> Result<u64, RepositoryError> {
        let expected = ExpectedVersion::Exact(aggregate.committed_version());
        let events = aggregate.uncommitted_events().to_vec();
        match self
            .store
            .append_to_stream(aggregate.aggregate_id(), events, expected)
            .await
        {
            Ok(version) => {
                aggregate.clear_uncommitted_events();
                Ok(version)
            }
            Err(
                err @ EventStoreError::Listener {
                    point: ListenerPoint::PostAppend,
                    ..
                },
            ) => {
                aggregate.clear_uncommitted_events();
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl<S, A> AggregateRepository<'_, S, A>
where
    S: EventStorage,
    A: Snapshottable,
    A::Event: Clone,
{
    /// Restores the latest snapshot and replays only the events after it.
    ///
    /// Falls back to a full replay when no snapshot exists.
    ///
    /// # Errors
    ///
    /// As [`AggregateRepository::load`].
    #[instrument(skip(self), fields(aggregate_type = A::AGGREGATE_TYPE))]
    pub async fn load_from_snapshot(
        &self,
        aggregate_id: &str,
    ) -> Result<Option<A>, RepositoryError> {
        let snapshot = self
            .store
            .find_last_snapshot(A::AGGREGATE_TYPE, aggregate_id)
            .await?;
        let start = snapshot.as_ref().map_or(1, |s| s.version + 1);
        debug!(start, from_snapshot = snapshot.is_some(), "Loading aggregate");
        let stream = self
            .store
            .read_stream_events_forward(aggregate_id, start, None)
            .await?;
        Ok(self
            .reconstructor
            .reconstitute_with_snapshot::<A>(&stream, snapshot.as_ref())?)
    }

    /// Takes and stores a snapshot of `aggregate`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Snapshot`] when `A` is not registered for
    /// snapshots and [`RepositoryError::Store`] when storing fails.
    pub async fn snapshot(
        &self,
        aggregate: &A,
        clock: &dyn Clock,
    ) -> Result<Snapshot, RepositoryError> {
        let snapshot = self
            .reconstructor
            .snapshotter()
            .take_snapshot(aggregate, clock)?;
        self.store.add_snapshot(&snapshot).await?;
        Ok(snapshot)
    }
}
