//! Sample event payloads.

use eventvault_core::event::EventPayload;
use serde::{Deserialize, Serialize};

/// Payloads used across the test suites.
///
/// Serde tags equal the `event_type()` names, so the variants round-trip
/// through `JsonSerializer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestEvent {
    /// A ticket came into existence.
    TicketOpened {
        /// Ticket id, also the stream id.
        ticket_id: String,
        /// Initial name.
        name: String,
        /// Initial description.
        description: String,
    },
    /// The ticket was renamed.
    NameChanged {
        /// New name.
        name: String,
    },
    /// The ticket description changed.
    DescriptionChanged {
        /// New description.
        description: String,
    },
    /// The ticket was closed. Nothing may follow.
    TicketClosed {
        /// Ticket id.
        ticket_id: String,
    },
    /// A user signed up. Tickets have no handler for it.
    UserRegistered {
        /// Login name; stored as `name` before schema 2.0.
        username: String,
    },
}

impl TestEvent {
    /// `TicketOpened` with a name and description derived from the id.
    #[must_use]
    pub fn ticket_opened(ticket_id: &str) -> Self {
        Self::TicketOpened {
            ticket_id: ticket_id.to_owned(),
            name: format!("{ticket_id} name"),
            description: format!("{ticket_id} description"),
        }
    }

    /// `NameChanged` to `name`.
    #[must_use]
    pub fn name_changed(name: &str) -> Self {
        Self::NameChanged {
            name: name.to_owned(),
        }
    }

    /// `UserRegistered` for `username`.
    #[must_use]
    pub fn user_registered(username: &str) -> Self {
        Self::UserRegistered {
            username: username.to_owned(),
        }
    }
}

impl EventPayload for TestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::TicketOpened { .. } => "TicketOpened",
            Self::NameChanged { .. } => "NameChanged",
            Self::DescriptionChanged { .. } => "DescriptionChanged",
            Self::TicketClosed { .. } => "TicketClosed",
            Self::UserRegistered { .. } => "UserRegistered",
        }
    }
}
