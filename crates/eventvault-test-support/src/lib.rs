//! Shared test fixtures and doubles for eventvault.

mod aggregate;
mod clock;
mod events;
mod listener;
mod logging;
mod serializer;
mod storage;
mod upgrades;

use eventvault_core::serializer::JsonSerializer;
use eventvault_core::store::{EventStore, InMemoryEventStorage, InMemoryEventStore};
use eventvault_core::versioning::EventUpgrader;

pub use aggregate::{Ticket, TicketState};
pub use clock::FixedClock;
pub use events::TestEvent;
pub use listener::{FailingListener, ListenerCall, RecordingListener};
pub use logging::init_tracing;
pub use serializer::FailingSerializer;
pub use storage::FailingEventStorage;
pub use upgrades::{UserRegisteredV1ToV2, UserRegisteredV2ToV3};

/// An in-memory store of [`TestEvent`]s with JSON bodies.
#[must_use]
pub fn in_memory_store(upgrader: EventUpgrader) -> InMemoryEventStore<TestEvent> {
    EventStore::new(InMemoryEventStorage::new(), JsonSerializer, upgrader)
}

/// The `UserRegistered` 1.0 → 2.0 → 3.0 chain.
///
/// # Panics
///
/// Panics if the sample units conflict, which they do not.
#[must_use]
pub fn user_upgrader() -> EventUpgrader {
    EventUpgrader::builder()
        .register(UserRegisteredV1ToV2)
        .register(UserRegisteredV2ToV3)
        .build()
        .expect("sample upgrades are consistent")
}
