//! Sample upgrade units for `UserRegistered`.

use eventvault_core::error::UpgradeError;
use eventvault_core::event::StoredEvent;
use eventvault_core::version::Version;
use eventvault_core::versioning::{EventAdapter, EventUpgrade};
use serde_json::{Value, json};

/// 1.0 → 2.0: `name` became `username`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRegisteredV1ToV2;

impl EventUpgrade for UserRegisteredV1ToV2 {
    fn event_type(&self) -> &str {
        "UserRegistered"
    }

    fn from_version(&self) -> Version {
        Version::new(1, 0)
    }

    fn to_version(&self) -> Version {
        Version::new(2, 0)
    }

    fn migrate(&self, event: &mut StoredEvent) -> Result<(), UpgradeError> {
        EventAdapter::rename_field(event, "name", "username")
    }
}

/// 2.0 → 3.0: adds `display_name`, derived from `username`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRegisteredV2ToV3;

impl EventUpgrade for UserRegisteredV2ToV3 {
    fn event_type(&self) -> &str {
        "UserRegistered"
    }

    fn from_version(&self) -> Version {
        Version::new(2, 0)
    }

    fn to_version(&self) -> Version {
        Version::new(3, 0)
    }

    fn migrate(&self, event: &mut StoredEvent) -> Result<(), UpgradeError> {
        EventAdapter::enrich(event, "display_name", |body| {
            body.get("username")
                .and_then(Value::as_str)
                .map_or(Value::Null, |username| json!(username.to_uppercase()))
        })
    }
}
