//! Rebuilding aggregates from their event history.

use std::collections::HashSet;

use tracing::debug;

use crate::aggregate::{AggregateRoot, ApplyOutcome};
use crate::error::ReconstructionError;
use crate::event::{DomainEvent, EventStream};
use crate::snapshot::{Snapshot, Snapshottable, Snapshotter};

/// What replay does with an event the aggregate has no handler for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayMode {
    /// Fail with [`ReconstructionError::UnhandledEvent`].
    #[default]
    Strict,
    /// Skip the event. The version still advances.
    Lenient,
}

/// Replays event streams into registered aggregate types.
#[derive(Debug, Clone, Default)]
pub struct AggregateReconstructor {
    aggregate_types: HashSet<&'static str>,
    snapshotter: Snapshotter,
    mode: ReplayMode,
}

impl AggregateReconstructor {
    /// Starts building a reconstructor.
    #[must_use]
    pub fn builder() -> AggregateReconstructorBuilder {
        AggregateReconstructorBuilder::default()
    }

    /// The snapshotter used to seed replays.
    #[must_use]
    pub fn snapshotter(&self) -> &Snapshotter {
        &self.snapshotter
    }

    /// The configured replay mode.
    #[must_use]
    pub fn replay_mode(&self) -> ReplayMode {
        self.mode
    }

    /// Rebuilds an `A` from its full history.
    ///
    /// Returns `None` for an empty stream or when the last event is a
    /// tombstone.
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructionError::InvalidAggregateType`] when `A` is not
    /// registered and [`ReconstructionError::UnhandledEvent`] in strict mode.
    pub fn reconstitute<A: AggregateRoot>(
        &self,
        stream: &EventStream<DomainEvent<A::Event>>,
    ) -> Result<Option<A>, ReconstructionError> {
        self.ensure_registered::<A>()?;
        if stream.is_empty() {
            return Ok(None);
        }
        self.replay(A::default(), stream)
    }

    /// Rebuilds an `A` from an optional snapshot plus the events recorded
    /// after it.
    ///
    /// # Errors
    ///
    /// As [`AggregateReconstructor::reconstitute`], plus
    /// [`ReconstructionError::SnapshotMismatch`] for a snapshot of another
    /// type and [`ReconstructionError::Snapshot`] when it cannot be
    /// restored.
    pub fn reconstitute_with_snapshot<A: Snapshottable>(
        &self,
        stream: &EventStream<DomainEvent<A::Event>>,
        snapshot: Option<&Snapshot>,
    ) -> Result<Option<A>, ReconstructionError> {
        let Some(snapshot) = snapshot else {
            return self.reconstitute(stream);
        };
        self.ensure_registered::<A>()?;
        if snapshot.aggregate_type != A::AGGREGATE_TYPE {
            return Err(ReconstructionError::SnapshotMismatch {
                expected: A::AGGREGATE_TYPE.to_owned(),
                found: snapshot.aggregate_type.clone(),
            });
        }
        let aggregate = self.snapshotter.translate_snapshot::<A>(snapshot)?;
        self.replay(aggregate, stream)
    }

    fn ensure_registered<A: AggregateRoot>(&self) -> Result<(), ReconstructionError> {
        if self.aggregate_types.contains(A::AGGREGATE_TYPE) {
            Ok(())
        } else {
            Err(ReconstructionError::InvalidAggregateType(
                A::AGGREGATE_TYPE.to_owned(),
            ))
        }
    }

    fn replay<A: AggregateRoot>(
        &self,
        mut aggregate: A,
        stream: &EventStream<DomainEvent<A::Event>>,
    ) -> Result<Option<A>, ReconstructionError> {
        let mut tombstoned = false;
        for event in stream {
            let position = aggregate.version() + 1;
            if aggregate.apply(event) == ApplyOutcome::Unhandled {
                if self.mode == ReplayMode::Strict {
                    return Err(ReconstructionError::UnhandledEvent {
                        aggregate_type: A::AGGREGATE_TYPE.to_owned(),
                        event_type: event.event_type().to_owned(),
                        position,
                    });
                }
                debug!(
                    aggregate_type = A::AGGREGATE_TYPE,
                    event_type = event.event_type(),
                    position,
                    "Skipped unhandled event"
                );
            }
            aggregate.set_version(position);
            tombstoned = A::is_tombstone(&event.payload);
        }
        debug!(
            aggregate_type = A::AGGREGATE_TYPE,
            aggregate_id = aggregate.aggregate_id(),
            version = aggregate.version(),
            replayed = stream.len(),
            tombstoned,
            "Reconstituted aggregate"
        );
        Ok((!tombstoned).then_some(aggregate))
    }
}

/// Collects aggregate types and options for an [`AggregateReconstructor`].
#[derive(Debug, Default)]
pub struct AggregateReconstructorBuilder {
    aggregate_types: HashSet<&'static str>,
    snapshotter: Snapshotter,
    mode: ReplayMode,
}

impl AggregateReconstructorBuilder {
    /// Registers `A` as event sourced.
    #[must_use]
    pub fn register<A: AggregateRoot>(mut self) -> Self {
        self.aggregate_types.insert(A::AGGREGATE_TYPE);
        self
    }

    /// Uses `snapshotter` to restore snapshots.
    #[must_use]
    pub fn snapshotter(mut self, snapshotter: Snapshotter) -> Self {
        self.snapshotter = snapshotter;
        self
    }

    /// Sets the replay mode; [`ReplayMode::Strict`] by default.
    #[must_use]
    pub fn replay_mode(mut self, mode: ReplayMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builds the reconstructor.
    #[must_use]
    pub fn build(self) -> AggregateReconstructor {
        AggregateReconstructor {
            aggregate_types: self.aggregate_types,
            snapshotter: self.snapshotter,
            mode: self.mode,
        }
    }
}
