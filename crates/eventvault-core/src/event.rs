//! Domain and stored events, and the streams that carry them.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::Clock;
use crate::metadata::Metadata;
use crate::version::Version;

/// Trait that all event payloads implement.
///
/// Payloads are expected to be sum types with one variant per event, so the
/// type name is known without reflection.
pub trait EventPayload: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (used for serialization routing and
    /// upgrade selection).
    fn event_type(&self) -> &'static str;
}

/// An event as the domain sees it: a typed payload plus its envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent<P> {
    /// Event-specific payload.
    pub payload: P,
    /// Metadata attached by the producer.
    pub metadata: Metadata,
    /// When the event happened.
    pub occurred_on: DateTime<Utc>,
    /// Schema version of the payload; `None` is persisted as `1.0`.
    pub version: Option<Version>,
}

impl<P> DomainEvent<P> {
    /// Creates an event with empty metadata and no explicit version.
    #[must_use]
    pub fn new(payload: P, occurred_on: DateTime<Utc>) -> Self {
        Self {
            payload,
            metadata: Metadata::new(),
            occurred_on,
            version: None,
        }
    }

    /// Creates an event stamped with the clock's current time.
    #[must_use]
    pub fn record(payload: P, clock: &dyn Clock) -> Self {
        Self::new(payload, clock.now())
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets an explicit schema version.
    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }
}

impl<P: EventPayload> DomainEvent<P> {
    /// The payload's event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}

/// Durable representation of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// Stream this event belongs to.
    pub stream_id: String,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized payload.
    pub body: String,
    /// Serialized metadata, a JSON object.
    pub metadata: String,
    /// When the event happened.
    pub occurred_on: DateTime<Utc>,
    /// Schema version of `body`.
    pub version: Version,
}

/// An ordered, finite sequence of events, optionally tagged with the id of
/// the stream it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct EventStream<E> {
    id: Option<String>,
    events: Vec<E>,
}

/// A stream of stored events; always carries its id when read from a
/// backend.
pub type StoredEventStream = EventStream<StoredEvent>;

impl<E> EventStream<E> {
    /// Creates an anonymous stream.
    #[must_use]
    pub fn new(events: Vec<E>) -> Self {
        Self { id: None, events }
    }

    /// Creates a stream owned by `id`.
    #[must_use]
    pub fn with_id(id: impl Into<String>, events: Vec<E>) -> Self {
        Self {
            id: Some(id.into()),
            events,
        }
    }

    /// Creates an empty stream owned by `id`.
    #[must_use]
    pub fn empty(id: impl Into<String>) -> Self {
        Self::with_id(id, Vec::new())
    }

    /// The owning stream id, if known.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The events in stream order.
    #[must_use]
    pub fn events(&self) -> &[E] {
        &self.events
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the stream holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates events in stream order.
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.events.iter()
    }

    /// Consumes the stream, returning its events.
    #[must_use]
    pub fn into_events(self) -> Vec<E> {
        self.events
    }

    /// Maps every event, keeping order and id.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(E) -> U) -> EventStream<U> {
        EventStream {
            id: self.id,
            events: self.events.into_iter().map(f).collect(),
        }
    }

    /// Maps every event with a fallible function, stopping at the first
    /// error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_map<U, Err>(
        self,
        f: impl FnMut(E) -> Result<U, Err>,
    ) -> Result<EventStream<U>, Err> {
        Ok(EventStream {
            id: self.id,
            events: self.events.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}

impl<E> Default for EventStream<E> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<E> FromIterator<E> for EventStream<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<E> IntoIterator for EventStream<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a EventStream<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_order_and_id() {
        let stream = EventStream::with_id("orders-1", vec![1, 2, 3]);

        let mapped = stream.map(|n| n * 10);

        assert_eq!(mapped.id(), Some("orders-1"));
        assert_eq!(mapped.events(), &[10, 20, 30]);
        assert_eq!(mapped.len(), 3);
    }

    #[test]
    fn test_try_map_stops_at_first_error() {
        let stream = EventStream::new(vec!["1", "x", "3"]);

        let result = stream.try_map(str::parse::<u32>);

        assert!(result.is_err());
    }

    #[test]
    fn test_default_stream_is_empty_and_anonymous() {
        let stream: EventStream<u8> = EventStream::default();

        assert!(stream.is_empty());
        assert_eq!(stream.id(), None);
    }
}
