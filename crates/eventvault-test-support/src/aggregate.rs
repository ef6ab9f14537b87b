//! Sample aggregate: a support ticket.

use eventvault_core::aggregate::{AggregateRoot, ApplyOutcome};
use eventvault_core::clock::Clock;
use eventvault_core::event::DomainEvent;
use eventvault_core::snapshot::Snapshottable;
use serde::{Deserialize, Serialize};

use crate::events::TestEvent;

/// A ticket that can be opened, edited, and closed.
///
/// `TicketClosed` is its tombstone. It has no handler for
/// `UserRegistered`, which makes it useful for replay-mode tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ticket {
    id: String,
    version: u64,
    name: String,
    description: String,
    closed: bool,
    uncommitted_events: Vec<DomainEvent<TestEvent>>,
}

/// Snapshot state of a [`Ticket`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketState {
    /// Current name.
    pub name: String,
    /// Current description.
    pub description: String,
}

impl Ticket {
    /// Opens a new ticket, producing a `TicketOpened` event.
    #[must_use]
    pub fn open(ticket_id: &str, name: &str, description: &str, clock: &dyn Clock) -> Self {
        let mut ticket = Self::default();
        ticket.record(DomainEvent::record(
            TestEvent::TicketOpened {
                ticket_id: ticket_id.to_owned(),
                name: name.to_owned(),
                description: description.to_owned(),
            },
            clock,
        ));
        ticket
    }

    /// Renames the ticket, producing a `NameChanged` event.
    pub fn rename(&mut self, name: &str, clock: &dyn Clock) {
        self.record(DomainEvent::record(TestEvent::name_changed(name), clock));
    }

    /// Changes the description, producing a `DescriptionChanged` event.
    pub fn describe(&mut self, description: &str, clock: &dyn Clock) {
        self.record(DomainEvent::record(
            TestEvent::DescriptionChanged {
                description: description.to_owned(),
            },
            clock,
        ));
    }

    /// Closes the ticket, producing a `TicketClosed` event.
    pub fn close(&mut self, clock: &dyn Clock) {
        let ticket_id = self.id.clone();
        self.record(DomainEvent::record(TestEvent::TicketClosed { ticket_id }, clock));
    }

    /// Current name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the ticket has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl AggregateRoot for Ticket {
    type Event = TestEvent;
    const AGGREGATE_TYPE: &'static str = "Ticket";

    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn apply(&mut self, event: &DomainEvent<TestEvent>) -> ApplyOutcome {
        match &event.payload {
            TestEvent::TicketOpened {
                ticket_id,
                name,
                description,
            } => {
                self.id.clone_from(ticket_id);
                self.name.clone_from(name);
                self.description.clone_from(description);
            }
            TestEvent::NameChanged { name } => self.name.clone_from(name),
            TestEvent::DescriptionChanged { description } => {
                self.description.clone_from(description);
            }
            TestEvent::TicketClosed { .. } => self.closed = true,
            TestEvent::UserRegistered { .. } => return ApplyOutcome::Unhandled,
        }
        ApplyOutcome::Handled
    }

    fn is_tombstone(event: &TestEvent) -> bool {
        matches!(event, TestEvent::TicketClosed { .. })
    }

    fn uncommitted_events(&self) -> &[DomainEvent<TestEvent>] {
        &self.uncommitted_events
    }

    fn uncommitted_events_mut(&mut self) -> &mut Vec<DomainEvent<TestEvent>> {
        &mut self.uncommitted_events
    }
}

impl Snapshottable for Ticket {
    type State = TicketState;

    fn to_snapshot_state(&self) -> TicketState {
        TicketState {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }

    fn from_snapshot_state(aggregate_id: &str, state: TicketState) -> Self {
        Self {
            id: aggregate_id.to_owned(),
            name: state.name,
            description: state.description,
            ..Self::default()
        }
    }
}
