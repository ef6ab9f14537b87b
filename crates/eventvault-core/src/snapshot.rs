//! Aggregate snapshots.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::AggregateRoot;
use crate::clock::Clock;
use crate::error::SnapshotError;

/// Captured aggregate state at a stream version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Registered aggregate type name.
    pub aggregate_type: String,
    /// Aggregate (and stream) id.
    pub aggregate_id: String,
    /// Number of events the state reflects.
    pub version: u64,
    /// The aggregate's snapshot state as JSON.
    pub state: Value,
    /// When the snapshot was taken.
    pub taken_on: DateTime<Utc>,
}

/// Aggregates that can be saved to and restored from a [`Snapshot`].
///
/// The aggregate owns its snapshot codec: it exposes a serde state type and
/// rebuilds itself from one without replaying events.
pub trait Snapshottable: AggregateRoot {
    /// Serializable form of the aggregate's internal state.
    type State: Serialize + DeserializeOwned;

    /// Captures the current state.
    fn to_snapshot_state(&self) -> Self::State;

    /// Rebuilds an aggregate from captured state. The version is set by the
    /// caller.
    fn from_snapshot_state(aggregate_id: &str, state: Self::State) -> Self;
}

/// Takes and restores snapshots for a fixed set of aggregate types.
#[derive(Debug, Clone, Default)]
pub struct Snapshotter {
    aggregate_types: HashSet<&'static str>,
}

impl Snapshotter {
    /// Starts building a snapshotter.
    #[must_use]
    pub fn builder() -> SnapshotterBuilder {
        SnapshotterBuilder::default()
    }

    /// Returns `true` if `aggregate_type` can be snapshotted.
    #[must_use]
    pub fn supports(&self, aggregate_type: &str) -> bool {
        self.aggregate_types.contains(aggregate_type)
    }

    /// Captures `aggregate` at its current version.
    ///
    /// Take snapshots of saved aggregates; uncommitted events would be
    /// included in the state.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NoTranslator`] for unregistered types and
    /// [`SnapshotError::State`] when the state does not serialize.
    pub fn take_snapshot<A: Snapshottable>(
        &self,
        aggregate: &A,
        clock: &dyn Clock,
    ) -> Result<Snapshot, SnapshotError> {
        self.ensure_supported(A::AGGREGATE_TYPE)?;
        Ok(Snapshot {
            aggregate_type: A::AGGREGATE_TYPE.to_owned(),
            aggregate_id: aggregate.aggregate_id().to_owned(),
            version: aggregate.version(),
            state: serde_json::to_value(aggregate.to_snapshot_state())?,
            taken_on: clock.now(),
        })
    }

    /// Restores an aggregate from `snapshot`, at the snapshot's version.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NoTranslator`] for unregistered types,
    /// [`SnapshotError::TypeMismatch`] when the snapshot belongs to another
    /// type, and [`SnapshotError::State`] when the state does not decode.
    pub fn translate_snapshot<A: Snapshottable>(
        &self,
        snapshot: &Snapshot,
    ) -> Result<A, SnapshotError> {
        self.ensure_supported(A::AGGREGATE_TYPE)?;
        if snapshot.aggregate_type != A::AGGREGATE_TYPE {
            return Err(SnapshotError::TypeMismatch {
                expected: A::AGGREGATE_TYPE.to_owned(),
                found: snapshot.aggregate_type.clone(),
            });
        }
        let state: A::State = serde_json::from_value(snapshot.state.clone())?;
        let mut aggregate = A::from_snapshot_state(&snapshot.aggregate_id, state);
        aggregate.set_version(snapshot.version);
        Ok(aggregate)
    }

    fn ensure_supported(&self, aggregate_type: &str) -> Result<(), SnapshotError> {
        if self.supports(aggregate_type) {
            Ok(())
        } else {
            Err(SnapshotError::NoTranslator(aggregate_type.to_owned()))
        }
    }
}

/// Collects snapshot-enabled aggregate types.
#[derive(Debug, Default)]
pub struct SnapshotterBuilder {
    aggregate_types: HashSet<&'static str>,
}

impl SnapshotterBuilder {
    /// Enables snapshots for `A`.
    #[must_use]
    pub fn register<A: Snapshottable>(mut self) -> Self {
        self.aggregate_types.insert(A::AGGREGATE_TYPE);
        self
    }

    /// Builds the snapshotter.
    #[must_use]
    pub fn build(self) -> Snapshotter {
        Snapshotter {
            aggregate_types: self.aggregate_types,
        }
    }
}
