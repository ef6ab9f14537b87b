//! Aggregate root abstraction.

use crate::event::{DomainEvent, EventPayload};

/// Whether an aggregate had a handler for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event changed (or deliberately did not change) state.
    Handled,
    /// The aggregate has no handler for this event type.
    Unhandled,
}

/// Trait for aggregate roots that reconstitute from event history.
///
/// `Default` is the blank instance replay starts from; the creation event
/// fills in the identity.
pub trait AggregateRoot: Default + Send + Sync {
    /// The payload type this aggregate produces and consumes.
    type Event: EventPayload;

    /// Name under which the aggregate is registered and snapshotted.
    const AGGREGATE_TYPE: &'static str;

    /// Returns the aggregate identifier, which is also its stream id.
    fn aggregate_id(&self) -> &str;

    /// Returns the current version (number of events applied).
    fn version(&self) -> u64;

    /// Overwrites the version. Used by replay and snapshot restore.
    fn set_version(&mut self, version: u64);

    /// Apply an event to mutate internal state.
    fn apply(&mut self, event: &DomainEvent<Self::Event>) -> ApplyOutcome;

    /// Returns `true` for events after which the aggregate no longer
    /// exists.
    fn is_tombstone(_event: &Self::Event) -> bool {
        false
    }

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[DomainEvent<Self::Event>];

    /// Mutable access to the uncommitted event queue.
    fn uncommitted_events_mut(&mut self) -> &mut Vec<DomainEvent<Self::Event>>;

    /// The version last persisted, i.e. the expected stream version for
    /// the next append.
    fn committed_version(&self) -> u64 {
        let pending = u64::try_from(self.uncommitted_events().len()).unwrap_or(u64::MAX);
        self.version().saturating_sub(pending)
    }

    /// Applies a new event and queues it for persistence.
    fn record(&mut self, event: DomainEvent<Self::Event>) -> ApplyOutcome {
        let outcome = self.apply(&event);
        self.set_version(self.version() + 1);
        self.uncommitted_events_mut().push(event);
        outcome
    }

    /// Clears uncommitted events after persistence.
    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum CounterEvent {
        Incremented,
        Unknown,
    }

    impl EventPayload for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                Self::Incremented => "Incremented",
                Self::Unknown => "Unknown",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        id: String,
        version: u64,
        total: u32,
        uncommitted: Vec<DomainEvent<CounterEvent>>,
    }

    impl AggregateRoot for Counter {
        type Event = CounterEvent;
        const AGGREGATE_TYPE: &'static str = "Counter";

        fn aggregate_id(&self) -> &str {
            &self.id
        }

        fn version(&self) -> u64 {
            self.version
        }

        fn set_version(&mut self, version: u64) {
            self.version = version;
        }

        fn apply(&mut self, event: &DomainEvent<CounterEvent>) -> ApplyOutcome {
            match event.payload {
                CounterEvent::Incremented => {
                    self.total += 1;
                    ApplyOutcome::Handled
                }
                CounterEvent::Unknown => ApplyOutcome::Unhandled,
            }
        }

        fn uncommitted_events(&self) -> &[DomainEvent<CounterEvent>] {
            &self.uncommitted
        }

        fn uncommitted_events_mut(&mut self) -> &mut Vec<DomainEvent<CounterEvent>> {
            &mut self.uncommitted
        }
    }

    #[test]
    fn test_record_applies_and_queues() {
        // Arrange
        let mut counter = Counter {
            id: "c-1".into(),
            version: 3,
            ..Counter::default()
        };

        // Act
        let first = counter.record(DomainEvent::new(CounterEvent::Incremented, Utc::now()));
        let second = counter.record(DomainEvent::new(CounterEvent::Unknown, Utc::now()));

        // Assert
        assert_eq!(first, ApplyOutcome::Handled);
        assert_eq!(second, ApplyOutcome::Unhandled);
        assert_eq!(counter.total, 1);
        assert_eq!(counter.version(), 5);
        assert_eq!(counter.committed_version(), 3);
        assert_eq!(counter.uncommitted_events().len(), 2);
    }

    #[test]
    fn test_clear_uncommitted_events_commits_version() {
        let mut counter = Counter::default();
        counter.record(DomainEvent::new(CounterEvent::Incremented, Utc::now()));

        counter.clear_uncommitted_events();

        assert!(counter.uncommitted_events().is_empty());
        assert_eq!(counter.committed_version(), 1);
        assert!(!Counter::is_tombstone(&CounterEvent::Incremented));
    }
}
