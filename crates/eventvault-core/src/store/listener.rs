//! Append listeners.

use std::fmt;

use crate::error::BoxError;
use crate::event::DomainEvent;

/// Where a listener runs relative to the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerPoint {
    /// Before the batch is written. A failure aborts the append.
    PreAppend,
    /// After the batch is committed. A failure is reported but the events
    /// stay written.
    PostAppend,
}

impl fmt::Display for ListenerPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreAppend => "pre-append",
            Self::PostAppend => "post-append",
        })
    }
}

/// Observer of appended batches.
///
/// Listeners run inline on the appending task, in registration order.
pub trait EventStoreListener<P>: Send + Sync {
    /// Handles the batch being appended.
    ///
    /// # Errors
    ///
    /// Any error stops the remaining listeners at this point and is
    /// returned to the appender.
    fn handle(&self, events: &[DomainEvent<P>]) -> Result<(), BoxError>;
}

/// Adapts a closure into an [`EventStoreListener`].
pub struct FnListener<F>(F);

impl<F> fmt::Debug for FnListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnListener")
    }
}

impl<P, F> EventStoreListener<P> for FnListener<F>
where
    F: Fn(&[DomainEvent<P>]) -> Result<(), BoxError> + Send + Sync,
{
    fn handle(&self, events: &[DomainEvent<P>]) -> Result<(), BoxError> {
        (self.0)(events)
    }
}

/// Wraps a closure as a listener.
pub fn listener_fn<P, F>(f: F) -> FnListener<F>
where
    F: Fn(&[DomainEvent<P>]) -> Result<(), BoxError> + Send + Sync,
{
    FnListener(f)
}

/// Registered listeners, kept in registration order.
pub(crate) struct Listeners<P> {
    entries: Vec<(ListenerPoint, Box<dyn EventStoreListener<P>>)>,
}

impl<P> Default for Listeners<P> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<P> Listeners<P> {
    pub(crate) fn add(&mut self, point: ListenerPoint, listener: Box<dyn EventStoreListener<P>>) {
        self.entries.push((point, listener));
    }

    pub(crate) fn count(&self, point: ListenerPoint) -> usize {
        self.entries.iter().filter(|(p, _)| *p == point).count()
    }

    /// Runs every listener registered at `point`, stopping at the first
    /// failure.
    pub(crate) fn notify(
        &self,
        point: ListenerPoint,
        events: &[DomainEvent<P>],
    ) -> Result<(), BoxError> {
        self.entries
            .iter()
            .filter(|(p, _)| *p == point)
            .try_for_each(|(_, listener)| listener.handle(events))
    }
}
