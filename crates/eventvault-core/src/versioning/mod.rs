//! Schema evolution for stored events.
//!
//! Old events are never rewritten on read. Instead each read runs the
//! stored body through a chain of [`EventUpgrade`] units until it reaches
//! the newest registered version. `EventStore::migrate` can make an upgrade
//! permanent.

mod adapter;
mod upgrader;

pub use adapter::EventAdapter;
pub use upgrader::{EventUpgrade, EventUpgrader, EventUpgraderBuilder};
