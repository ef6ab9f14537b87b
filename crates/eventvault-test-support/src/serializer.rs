//! Test serializer.

use eventvault_core::error::BoxError;
use eventvault_core::serializer::Serializer;

/// A serializer that rejects every payload and body with `message`.
#[derive(Debug, Clone, Copy)]
pub struct FailingSerializer(pub &'static str);

impl Default for FailingSerializer {
    fn default() -> Self {
        Self("serializer unavailable")
    }
}

impl<P> Serializer<P> for FailingSerializer {
    fn serialize(&self, _payload: &P) -> Result<String, BoxError> {
        Err(self.0.into())
    }

    fn deserialize(&self, _body: &str, _event_type: &str) -> Result<P, BoxError> {
        Err(self.0.into())
    }
}
