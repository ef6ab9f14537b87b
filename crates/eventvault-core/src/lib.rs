//! Eventvault Core — event streams, schema upgrades, and aggregate
//! reconstruction.
//!
//! This crate defines the event store front, its storage seam, and an
//! in-memory backend. Durable backends live in `eventvault-event-store`.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod event;
pub mod json_path;
pub mod metadata;
pub mod projection;
pub mod reconstructor;
pub mod repository;
pub mod serializer;
pub mod snapshot;
pub mod store;
pub mod version;
pub mod versioning;

pub use aggregate::{AggregateRoot, ApplyOutcome};
pub use clock::{Clock, SystemClock};
pub use error::{
    BoxError, EventStoreError, PathError, ReconstructionError, RepositoryError, SnapshotError,
    TransformError, UpgradeError,
};
pub use event::{DomainEvent, EventPayload, EventStream, StoredEvent, StoredEventStream};
pub use metadata::Metadata;
pub use projection::{Emitter, Projection, ProjectionBuilder};
pub use reconstructor::{AggregateReconstructor, ReplayMode};
pub use repository::AggregateRepository;
pub use serializer::{JsonSerializer, Serializer};
pub use snapshot::{Snapshot, Snapshottable, Snapshotter};
pub use store::{
    EventStorage, EventStore, EventStoreListener, ExpectedVersion, InMemoryEventStorage,
    InMemoryEventStore, ListenerPoint, listener_fn,
};
pub use version::Version;
pub use versioning::{EventAdapter, EventUpgrade, EventUpgrader};
