//! Edits applied to a stored event by upgrade units.

use serde_json::Value;

use crate::error::UpgradeError;
use crate::event::StoredEvent;
use crate::json_path::JsonTransformer;

/// Field and type edits on a [`StoredEvent`].
///
/// These are the building blocks of [`EventUpgrade`](super::EventUpgrade)
/// implementations. Each one rewrites `event.body` (or `event.event_type`)
/// in place and leaves the schema version alone; the upgrader bumps it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventAdapter;

impl EventAdapter {
    /// Renames the field at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`UpgradeError::Transform`] when the path does not exist or
    /// `new_name` is already taken.
    pub fn rename_field(
        event: &mut StoredEvent,
        path: &str,
        new_name: &str,
    ) -> Result<(), UpgradeError> {
        event.body = JsonTransformer::rename_key(&event.body, path, new_name)?;
        Ok(())
    }

    /// Changes the event type identifier.
    pub fn rename(event: &mut StoredEvent, new_type: impl Into<String>) {
        event.event_type = new_type.into();
    }

    /// Adds a field at `path` whose value is computed from the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`UpgradeError::Body`] when the body is not JSON and
    /// [`UpgradeError::Transform`] when the field already exists.
    pub fn enrich(
        event: &mut StoredEvent,
        path: &str,
        f: impl FnOnce(&Value) -> Value,
    ) -> Result<(), UpgradeError> {
        let decoded: Value = serde_json::from_str(&event.body)?;
        event.body = JsonTransformer::add_key(&event.body, path, f(&decoded))?;
        Ok(())
    }

    /// Removes the field at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`UpgradeError::Transform`] when the path does not exist.
    pub fn remove_field(event: &mut StoredEvent, path: &str) -> Result<(), UpgradeError> {
        event.body = JsonTransformer::remove_key(&event.body, path)?;
        Ok(())
    }

    /// Replaces the value at `path` with one computed from the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`UpgradeError::Body`] when the body is not JSON and
    /// [`UpgradeError::Transform`] when the path does not exist.
    pub fn change_value(
        event: &mut StoredEvent,
        path: &str,
        f: impl FnOnce(&Value) -> Value,
    ) -> Result<(), UpgradeError> {
        let decoded: Value = serde_json::from_str(&event.body)?;
        event.body = JsonTransformer::set_value(&event.body, path, f(&decoded))?;
        Ok(())
    }
}
