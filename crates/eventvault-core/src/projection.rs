//! Projections: derive a new stream from an existing one.

use std::fmt;

use tracing::{info, instrument};

use crate::error::EventStoreError;
use crate::event::{DomainEvent, EventPayload};
use crate::store::{EventStorage, EventStore, ExpectedVersion};

/// Collects the events a projection handler emits.
#[derive(Debug)]
pub struct Emitter<P> {
    events: Vec<DomainEvent<P>>,
}

impl<P> Default for Emitter<P> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<P> Emitter<P> {
    /// Queues `event` for the target stream.
    pub fn emit(&mut self, event: DomainEvent<P>) {
        self.events.push(event);
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Entry point for defining a projection.
pub struct ProjectionBuilder<'a, S, P> {
    store: &'a EventStore<S, P>,
}

impl<'a, S, P> ProjectionBuilder<'a, S, P>
where
    S: EventStorage,
    P: EventPayload,
{
    /// Projects over streams in `store`.
    #[must_use]
    pub fn new(store: &'a EventStore<S, P>) -> Self {
        Self { store }
    }

    /// Reads from the stream `source`.
    #[must_use]
    pub fn from(self, source: impl Into<String>) -> Projection<'a, S, P> {
        Projection {
            store: self.store,
            source: source.into(),
            handlers: Vec::new(),
        }
    }
}

type Handler<'a, P> = Box<dyn FnMut(&DomainEvent<P>, &mut Emitter<P>) + Send + 'a>;

/// A source stream plus handlers keyed by event type.
pub struct Projection<'a, S, P> {
    store: &'a EventStore<S, P>,
    source: String,
    handlers: Vec<(String, Handler<'a, P>)>,
}

impl<S, P> fmt::Debug for Projection<'_, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let event_types: Vec<&str> = self.handlers.iter().map(|(t, _)| t.as_str()).collect();
        f.debug_struct("Projection")
            .field("source", &self.source)
            .field("handlers", &event_types)
            .finish_non_exhaustive()
    }
}

impl<'a, S, P> Projection<'a, S, P>
where
    S: EventStorage,
    P: EventPayload,
{
    /// Calls `handler` for every source event of `event_type`. Several
    /// handlers for one type run in the order they were added.
    #[must_use]
    pub fn when(
        mut self,
        event_type: impl Into<String>,
        handler: impl FnMut(&DomainEvent<P>, &mut Emitter<P>) + Send + 'a,
    ) -> Self {
        self.handlers.push((event_type.into(), Box::new(handler)));
        self
    }

    /// Runs the projection and appends everything emitted to `target` in
    /// one batch. Returns the number of emitted events.
    ///
    /// # Errors
    ///
    /// Returns whatever reading the source or appending to `target` fails
    /// with; `target` must be a new stream.
    #[instrument(skip(self), fields(source = %self.source))]
    pub async fn execute(mut self, target: &str) -> Result<usize, EventStoreError> {
        let events = self.store.read_full_stream(&self.source).await?;
        let mut emitter = Emitter::default();
        for event in &events {
            for (event_type, handler) in &mut self.handlers {
                if event_type.as_str() == event.event_type() {
                    handler(event, &mut emitter);
                }
            }
        }
        let emitted = emitter.len();
        self.store
            .append_to_stream(target, emitter.events, ExpectedVersion::EMPTY_STREAM)
            .await?;
        info!(read = events.len(), emitted, "Projected stream");
        Ok(emitted)
    }
}
