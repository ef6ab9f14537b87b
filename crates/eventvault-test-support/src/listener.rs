//! Test listeners.

use std::sync::{Arc, Mutex};

use eventvault_core::error::BoxError;
use eventvault_core::event::{DomainEvent, EventPayload};
use eventvault_core::store::EventStoreListener;

/// One recorded listener invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerCall {
    /// Name of the listener that ran.
    pub listener: String,
    /// Event types of the batch it saw, in order.
    pub event_types: Vec<String>,
}

/// A listener that records every batch it sees.
///
/// Listeners created with [`RecordingListener::sharing`] write to the same
/// log, so a test can assert the order in which several listeners ran.
#[derive(Debug, Clone)]
pub struct RecordingListener {
    name: String,
    log: Arc<Mutex<Vec<ListenerCall>>>,
}

impl RecordingListener {
    /// Creates a listener with its own log.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            log: Arc::default(),
        }
    }

    /// Creates a listener that writes to `other`'s log.
    #[must_use]
    pub fn sharing(name: &str, other: &Self) -> Self {
        Self {
            name: name.to_owned(),
            log: Arc::clone(&other.log),
        }
    }

    /// Returns every recorded invocation in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<ListenerCall> {
        self.log.lock().unwrap().clone()
    }

    /// Returns the listener names in invocation order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn call_order(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.listener).collect()
    }
}

impl<P: EventPayload> EventStoreListener<P> for RecordingListener {
    fn handle(&self, events: &[DomainEvent<P>]) -> Result<(), BoxError> {
        self.log.lock().unwrap().push(ListenerCall {
            listener: self.name.clone(),
            event_types: events
                .iter()
                .map(|event| event.event_type().to_owned())
                .collect(),
        });
        Ok(())
    }
}

/// A listener that always fails with `message`.
#[derive(Debug, Clone, Copy)]
pub struct FailingListener(pub &'static str);

impl<P> EventStoreListener<P> for FailingListener {
    fn handle(&self, _events: &[DomainEvent<P>]) -> Result<(), BoxError> {
        Err(self.0.into())
    }
}
