//! Payload serialization seam.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::BoxError;
use crate::event::EventPayload;

/// Turns payloads into stored bodies and back.
///
/// Errors are reported as-is; the store wraps them without interpretation.
pub trait Serializer<P>: Send + Sync {
    /// Serializes a payload into a body.
    ///
    /// # Errors
    ///
    /// Returns the serializer's own error when the payload cannot be encoded.
    fn serialize(&self, payload: &P) -> Result<String, BoxError>;

    /// Deserializes a body stored under `event_type`.
    ///
    /// # Errors
    ///
    /// Returns the serializer's own error when the body does not decode.
    fn deserialize(&self, body: &str, event_type: &str) -> Result<P, BoxError>;
}

/// Errors specific to [`JsonSerializer`].
#[derive(Debug, Error)]
pub enum JsonSerializerError {
    /// serde_json failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The payload did not serialize as an externally tagged variant.
    #[error("payload {event_type} did not serialize as a single tagged variant")]
    NotAVariant {
        /// The payload's event type.
        event_type: String,
    },

    /// The serde variant tag disagrees with `event_type()`.
    #[error("variant tag '{tag}' does not match event type '{event_type}'")]
    TagMismatch {
        /// The serde tag.
        tag: String,
        /// The payload's event type.
        event_type: String,
    },
}

/// JSON serializer for externally tagged payload enums.
///
/// The body holds the variant's content only; the tag is rebuilt from the
/// stored event type on read, so upgrades address fields from the root of
/// the body. Each variant's serde tag must equal its `event_type()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    fn split_variant<P: EventPayload + Serialize>(
        payload: &P,
    ) -> Result<Value, JsonSerializerError> {
        let event_type = payload.event_type();
        match serde_json::to_value(payload)? {
            Value::Object(map) if map.len() == 1 => match map.into_iter().next() {
                Some((tag, content)) if tag == event_type => Ok(content),
                Some((tag, _)) => Err(JsonSerializerError::TagMismatch {
                    tag,
                    event_type: event_type.to_owned(),
                }),
                None => Err(JsonSerializerError::NotAVariant {
                    event_type: event_type.to_owned(),
                }),
            },
            // Unit variants serialize as their bare tag.
            Value::String(tag) if tag == event_type => Ok(Value::Object(Map::new())),
            _ => Err(JsonSerializerError::NotAVariant {
                event_type: event_type.to_owned(),
            }),
        }
    }
}

impl<P> Serializer<P> for JsonSerializer
where
    P: EventPayload + Serialize + DeserializeOwned,
{
    fn serialize(&self, payload: &P) -> Result<String, BoxError> {
        let content = Self::split_variant(payload)?;
        Ok(serde_json::to_string(&content).map_err(JsonSerializerError::from)?)
    }

    fn deserialize(&self, body: &str, event_type: &str) -> Result<P, BoxError> {
        let content: Value = serde_json::from_str(body).map_err(JsonSerializerError::from)?;
        let mut tagged = Map::new();
        tagged.insert(event_type.to_owned(), content);
        match serde_json::from_value(Value::Object(tagged)) {
            Ok(payload) => Ok(payload),
            Err(struct_err) => serde_json::from_value(Value::String(event_type.to_owned()))
                .map_err(|_| Box::new(JsonSerializerError::from(struct_err)) as BoxError),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum OrderEvent {
        OrderPlaced { order_id: String, total: u32 },
        OrderCancelled,
        #[serde(rename = "order.shipped")]
        Shipped { carrier: String },
    }

    impl EventPayload for OrderEvent {
        fn event_type(&self) -> &'static str {
            match self {
                Self::OrderPlaced { .. } => "OrderPlaced",
                Self::OrderCancelled => "OrderCancelled",
                Self::Shipped { .. } => "Shipped",
            }
        }
    }

    #[test]
    fn test_serialize_stores_variant_content_only() {
        let event = OrderEvent::OrderPlaced {
            order_id: "o-1".into(),
            total: 42,
        };

        let body = JsonSerializer.serialize(&event).unwrap();

        assert_eq!(body, r#"{"order_id":"o-1","total":42}"#);
    }

    #[test]
    fn test_deserialize_rebuilds_variant_from_event_type() {
        let event: OrderEvent = JsonSerializer
            .deserialize(r#"{"order_id":"o-1","total":42}"#, "OrderPlaced")
            .unwrap();

        assert_eq!(
            event,
            OrderEvent::OrderPlaced {
                order_id: "o-1".into(),
                total: 42,
            }
        );
    }

    #[test]
    fn test_unit_variants_use_an_empty_object_body() {
        let body = JsonSerializer.serialize(&OrderEvent::OrderCancelled).unwrap();
        assert_eq!(body, "{}");

        let event: OrderEvent = JsonSerializer.deserialize(&body, "OrderCancelled").unwrap();
        assert_eq!(event, OrderEvent::OrderCancelled);
    }

    #[test]
    fn test_tag_mismatch_is_reported() {
        let event = OrderEvent::Shipped {
            carrier: "post".into(),
        };

        let err = JsonSerializer.serialize(&event).unwrap_err();

        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_unknown_event_type_fails() {
        let result: Result<OrderEvent, _> = JsonSerializer.deserialize("{}", "Nope");

        assert!(result.is_err());
    }
}
