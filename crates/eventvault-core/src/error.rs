//! Error types.
//!
//! Every failure kind is a distinct variant so callers can tell a retryable
//! concurrency conflict apart from configuration and programming errors.

use thiserror::Error;

use crate::store::ListenerPoint;
use crate::version::Version;

/// Boxed error used at collaborator seams (serializers, listeners).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the event store and its backends.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Optimistic concurrency conflict.
    #[error(
        "concurrency conflict on stream {stream_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The stream that had the conflict.
        stream_id: String,
        /// The version the caller expected.
        expected: u64,
        /// The version actually found.
        actual: u64,
    },

    /// A nonzero expected version was given for a stream with no events.
    #[error("event stream does not exist: {0}")]
    StreamDoesNotExist(String),

    /// A registered listener failed.
    #[error("{point} listener failed: {source}")]
    Listener {
        /// Where the listener was registered.
        point: ListenerPoint,
        /// The listener's error.
        #[source]
        source: BoxError,
    },

    /// A stored event could not be upgraded.
    #[error(transparent)]
    Upgrade(#[from] UpgradeError),

    /// The serializer failed; the source is passed through untouched.
    #[error("serialization failed: {0}")]
    Serialization(#[source] BoxError),

    /// A storage backend failure.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl EventStoreError {
    /// Returns `true` when reloading state and retrying may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Errors raised while parsing or following a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The expression could not be parsed.
    #[error("malformed path expression '{path}': {reason}")]
    Malformed {
        /// The offending expression.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The path does not resolve to a value.
    #[error("path '{path}' does not exist")]
    NotFound {
        /// The expression that was followed.
        path: String,
    },

    /// A key would be created where one already exists.
    #[error("path '{path}' already exists")]
    AlreadyExists {
        /// The expression that was followed.
        path: String,
    },

    /// A key operation was given a path ending in an array index.
    #[error("path '{path}' must end in an object key")]
    NotAKey {
        /// The expression that was followed.
        path: String,
    },

    /// A step crossed a scalar where an object or array was needed.
    #[error("path '{path}' crosses a value that is not an object or array")]
    NotAContainer {
        /// The expression that was followed.
        path: String,
    },
}

/// Errors raised by the JSON transformer.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The path expression was invalid for this body.
    #[error(transparent)]
    Path(#[from] PathError),

    /// The body is not valid JSON.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the upgrade pipeline.
#[derive(Debug, Error)]
pub enum UpgradeError {
    /// A transformation primitive failed.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// The body could not be decoded for a caller-supplied function.
    #[error("undecodable event body: {0}")]
    Body(#[from] serde_json::Error),

    /// No registered chain reaches the requested version.
    #[error("no upgrade path for {event_type} from {from} to {target} (stopped at {reached})")]
    Unresolved {
        /// The event type at the point the chain stopped.
        event_type: String,
        /// The version the event started at.
        from: Version,
        /// The version the chain reached.
        reached: Version,
        /// The requested version.
        target: Version,
    },

    /// The chain came back to a (type, version) it had already visited.
    #[error("upgrade chain for {event_type} loops back to {version}")]
    Cycle {
        /// The event type at the repeated step.
        event_type: String,
        /// The repeated version.
        version: Version,
    },

    /// Two upgrades were registered for the same source.
    #[error("more than one upgrade registered for {event_type} {from}")]
    DuplicateUpgrade {
        /// The event type.
        event_type: String,
        /// The shared source version.
        from: Version,
    },

    /// An upgrade declared the same source and target version.
    #[error("upgrade for {event_type} does not change the version ({version})")]
    NoOpUpgrade {
        /// The event type.
        event_type: String,
        /// The declared version.
        version: Version,
    },
}

/// Errors raised while translating snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The aggregate type has no registered snapshot translator.
    #[error("no snapshot translator registered for {0}")]
    NoTranslator(String),

    /// The snapshot belongs to another aggregate type.
    #[error("snapshot of {found} cannot be translated into {expected}")]
    TypeMismatch {
        /// The aggregate type requested.
        expected: String,
        /// The aggregate type recorded in the snapshot.
        found: String,
    },

    /// Snapshot state could not be (de)serialized.
    #[error("snapshot state error: {0}")]
    State(#[from] serde_json::Error),
}

/// Errors raised while reconstituting an aggregate.
#[derive(Debug, Error)]
pub enum ReconstructionError {
    /// The aggregate type is not registered as event sourced.
    #[error("{0} is not a registered event-sourced aggregate")]
    InvalidAggregateType(String),

    /// The snapshot was taken of another aggregate type.
    #[error("snapshot of {found} cannot seed a {expected}")]
    SnapshotMismatch {
        /// The aggregate type being rebuilt.
        expected: String,
        /// The aggregate type recorded in the snapshot.
        found: String,
    },

    /// An event had no handler and the replay mode is strict.
    #[error("{aggregate_type} has no handler for {event_type} at position {position}")]
    UnhandledEvent {
        /// The aggregate being rebuilt.
        aggregate_type: String,
        /// The event type without a handler.
        event_type: String,
        /// 1-based position of the event in the replayed stream.
        position: u64,
    },

    /// The snapshot could not be turned into an aggregate.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Errors raised by the aggregate repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Loading or appending failed.
    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// Replaying the stream failed.
    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),

    /// Taking a snapshot failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_concurrency_conflicts_are_retryable() {
        let conflict = EventStoreError::ConcurrencyConflict {
            stream_id: "orders-1".into(),
            expected: 1,
            actual: 2,
        };

        assert!(conflict.is_retryable());
        assert!(!EventStoreError::StreamDoesNotExist("orders-1".into()).is_retryable());
        assert!(!EventStoreError::Infrastructure("disk full".into()).is_retryable());
    }

    #[test]
    fn test_concurrency_conflict_message_names_both_versions() {
        let conflict = EventStoreError::ConcurrencyConflict {
            stream_id: "orders-1".into(),
            expected: 1,
            actual: 2,
        };

        assert_eq!(
            conflict.to_string(),
            "concurrency conflict on stream orders-1: expected version 1, found 2"
        );
    }
}
