//! Upgrade units and the chain that runs them.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::error::UpgradeError;
use crate::event::StoredEvent;
use crate::version::Version;

/// One step that moves an event type from one schema version to the next.
///
/// Implementations edit the stored event through
/// [`EventAdapter`](super::EventAdapter). They do not set the version; the
/// upgrader does that after `migrate` returns.
pub trait EventUpgrade: Send + Sync {
    /// The event type this unit applies to.
    fn event_type(&self) -> &str;

    /// The schema version this unit reads.
    fn from_version(&self) -> Version;

    /// The schema version this unit produces.
    fn to_version(&self) -> Version;

    /// Rewrites the event body (and possibly its type).
    ///
    /// # Errors
    ///
    /// Returns an [`UpgradeError`] when the body does not have the expected
    /// shape.
    fn migrate(&self, event: &mut StoredEvent) -> Result<(), UpgradeError>;
}

type UpgradeKey = (String, Version);

/// Registry of upgrade units keyed by (event type, source version).
///
/// Built once through [`EventUpgrader::builder`]; the set is fixed after
/// that.
#[derive(Default)]
pub struct EventUpgrader {
    upgrades: HashMap<UpgradeKey, Box<dyn EventUpgrade>>,
}

impl fmt::Debug for EventUpgrader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .upgrades
            .values()
            .map(|u| format!("{} {} -> {}", u.event_type(), u.from_version(), u.to_version()))
            .collect();
        keys.sort();
        f.debug_struct("EventUpgrader")
            .field("upgrades", &keys)
            .finish()
    }
}

impl EventUpgrader {
    /// An upgrader with no units; every event is already current.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts building an upgrader.
    #[must_use]
    pub fn builder() -> EventUpgraderBuilder {
        EventUpgraderBuilder::default()
    }

    /// Number of registered units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.upgrades.len()
    }

    /// Returns `true` if no unit is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upgrades.is_empty()
    }

    /// Returns `true` if a unit reads `event_type` at `version`.
    #[must_use]
    pub fn can_upgrade(&self, event_type: &str, version: Version) -> bool {
        self.upgrades.contains_key(&(event_type.to_owned(), version))
    }

    /// Applies units until none matches the event's (type, version).
    ///
    /// Used on every read. Returns the number of units applied; `0` means the
    /// event was already current.
    ///
    /// # Errors
    ///
    /// Returns [`UpgradeError::Cycle`] when the chain revisits a (type,
    /// version) pair, or whatever a unit fails with. The event may be
    /// partially upgraded on error.
    pub fn upgrade(&self, event: &mut StoredEvent) -> Result<usize, UpgradeError> {
        let mut visited = HashSet::new();
        let mut hops = 0;
        loop {
            let key = (event.event_type.clone(), event.version);
            let Some(unit) = self.upgrades.get(&key) else {
                return Ok(hops);
            };
            if !visited.insert(key) {
                return Err(cycle(event));
            }
            Self::apply(unit.as_ref(), event)?;
            hops += 1;
        }
    }

    /// Applies units until the event reaches `target`.
    ///
    /// # Errors
    ///
    /// Returns [`UpgradeError::Unresolved`] when no unit continues the chain
    /// before `target`, [`UpgradeError::Cycle`] when the chain loops, or
    /// whatever a unit fails with.
    pub fn upgrade_to(
        &self,
        event: &mut StoredEvent,
        target: Version,
    ) -> Result<usize, UpgradeError> {
        let from = event.version;
        let mut visited = HashSet::new();
        let mut hops = 0;
        while event.version != target {
            let key = (event.event_type.clone(), event.version);
            let Some(unit) = self.upgrades.get(&key) else {
                return Err(UpgradeError::Unresolved {
                    event_type: event.event_type.clone(),
                    from,
                    reached: event.version,
                    target,
                });
            };
            if !visited.insert(key) {
                return Err(cycle(event));
            }
            Self::apply(unit.as_ref(), event)?;
            hops += 1;
        }
        Ok(hops)
    }

    fn apply(unit: &dyn EventUpgrade, event: &mut StoredEvent) -> Result<(), UpgradeError> {
        let from_type = event.event_type.clone();
        unit.migrate(event)?;
        event.version = unit.to_version();
        debug!(
            event_id = %event.id,
            from_type = %from_type,
            to_type = %event.event_type,
            from = %unit.from_version(),
            to = %event.version,
            "Upgraded event"
        );
        Ok(())
    }
}

fn cycle(event: &StoredEvent) -> UpgradeError {
    UpgradeError::Cycle {
        event_type: event.event_type.clone(),
        version: event.version,
    }
}

/// Collects upgrade units for an [`EventUpgrader`].
#[derive(Default)]
pub struct EventUpgraderBuilder {
    units: Vec<Box<dyn EventUpgrade>>,
}

impl fmt::Debug for EventUpgraderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventUpgraderBuilder")
            .field("units", &self.units.len())
            .finish()
    }
}

impl EventUpgraderBuilder {
    /// Adds a unit.
    #[must_use]
    pub fn register(mut self, upgrade: impl EventUpgrade + 'static) -> Self {
        self.units.push(Box::new(upgrade));
        self
    }

    /// Validates the units and builds the upgrader.
    ///
    /// # Errors
    ///
    /// Returns [`UpgradeError::NoOpUpgrade`] for a unit whose source and
    /// target versions are equal, and [`UpgradeError::DuplicateUpgrade`]
    /// when two units read the same (type, version).
    pub fn build(self) -> Result<EventUpgrader, UpgradeError> {
        let mut upgrades = HashMap::with_capacity(self.units.len());
        for unit in self.units {
            let event_type = unit.event_type().to_owned();
            let from = unit.from_version();
            if from == unit.to_version() {
                return Err(UpgradeError::NoOpUpgrade {
                    event_type,
                    version: from,
                });
            }
            let key = (event_type.clone(), from);
            if upgrades.contains_key(&key) {
                return Err(UpgradeError::DuplicateUpgrade { event_type, from });
            }
            upgrades.insert(key, unit);
        }
        Ok(EventUpgrader { upgrades })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::versioning::EventAdapter;

    struct RenameField {
        event_type: &'static str,
        from: Version,
        to: Version,
        field: &'static str,
        new_name: &'static str,
    }

    impl EventUpgrade for RenameField {
        fn event_type(&self) -> &str {
            self.event_type
        }

        fn from_version(&self) -> Version {
            self.from
        }

        fn to_version(&self) -> Version {
            self.to
        }

        fn migrate(&self, event: &mut StoredEvent) -> Result<(), UpgradeError> {
            EventAdapter::rename_field(event, self.field, self.new_name)
        }
    }

    struct RetypeTo(&'static str, &'static str, Version, Version);

    impl EventUpgrade for RetypeTo {
        fn event_type(&self) -> &str {
            self.0
        }

        fn from_version(&self) -> Version {
            self.2
        }

        fn to_version(&self) -> Version {
            self.3
        }

        fn migrate(&self, event: &mut StoredEvent) -> Result<(), UpgradeError> {
            EventAdapter::rename(event, self.1);
            Ok(())
        }
    }

    fn v(major: u32, minor: u32) -> Version {
        Version::new(major, minor)
    }

    fn stored(event_type: &str, body: &str, version: Version) -> StoredEvent {
        StoredEvent {
            id: Uuid::new_v4(),
            stream_id: "users-1".into(),
            event_type: event_type.into(),
            body: body.into(),
            metadata: "{}".into(),
            occurred_on: Utc::now(),
            version,
        }
    }

    fn two_step_chain() -> EventUpgrader {
        EventUpgrader::builder()
            .register(RenameField {
                event_type: "UserRegistered",
                from: v(1, 0),
                to: v(2, 0),
                field: "name",
                new_name: "username",
            })
            .register(RenameField {
                event_type: "UserRegistered",
                from: v(2, 0),
                to: v(3, 0),
                field: "mail",
                new_name: "email",
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_upgrade_follows_chain_to_the_end() {
        // Arrange
        let upgrader = two_step_chain();
        let mut event = stored("UserRegistered", r#"{"name":"ada","mail":"a@b"}"#, v(1, 0));

        // Act
        let hops = upgrader.upgrade(&mut event).unwrap();

        // Assert
        assert_eq!(hops, 2);
        assert_eq!(event.version, v(3, 0));
        assert_eq!(event.body, r#"{"username":"ada","email":"a@b"}"#);
    }

    #[test]
    fn test_upgrade_of_current_event_is_a_no_op() {
        let upgrader = two_step_chain();
        let mut event = stored("UserRegistered", r#"{"username":"ada"}"#, v(3, 0));

        let hops = upgrader.upgrade(&mut event).unwrap();

        assert_eq!(hops, 0);
        assert_eq!(event.body, r#"{"username":"ada"}"#);
    }

    #[test]
    fn test_upgrade_to_stops_at_target() {
        let upgrader = two_step_chain();
        let mut event = stored("UserRegistered", r#"{"name":"ada","mail":"a@b"}"#, v(1, 0));

        upgrader.upgrade_to(&mut event, v(2, 0)).unwrap();

        assert_eq!(event.version, v(2, 0));
        assert_eq!(event.body, r#"{"username":"ada","mail":"a@b"}"#);
    }

    #[test]
    fn test_upgrade_to_unreachable_target_is_unresolved() {
        // Arrange
        let upgrader = two_step_chain();
        let mut event = stored("UserRegistered", r#"{"name":"ada","mail":"a@b"}"#, v(1, 0));

        // Act
        let err = upgrader.upgrade_to(&mut event, v(4, 0)).unwrap_err();

        // Assert
        match err {
            UpgradeError::Unresolved {
                event_type,
                from,
                reached,
                target,
            } => {
                assert_eq!(event_type, "UserRegistered");
                assert_eq!(from, v(1, 0));
                assert_eq!(reached, v(3, 0));
                assert_eq!(target, v(4, 0));
            }
            other => panic!("expected Unresolved, got {other:?}"),
        }
    }

    #[test]
    fn test_chain_follows_type_renames() {
        // Arrange
        let upgrader = EventUpgrader::builder()
            .register(RetypeTo("UserCreated", "UserRegistered", v(1, 0), v(2, 0)))
            .register(RenameField {
                event_type: "UserRegistered",
                from: v(2, 0),
                to: v(3, 0),
                field: "name",
                new_name: "username",
            })
            .build()
            .unwrap();
        let mut event = stored("UserCreated", r#"{"name":"ada"}"#, v(1, 0));

        // Act
        let hops = upgrader.upgrade(&mut event).unwrap();

        // Assert
        assert_eq!(hops, 2);
        assert_eq!(event.event_type, "UserRegistered");
        assert_eq!(event.body, r#"{"username":"ada"}"#);
    }

    #[test]
    fn test_looping_chain_is_reported_as_cycle() {
        // Arrange
        let upgrader = EventUpgrader::builder()
            .register(RetypeTo("A", "B", v(1, 0), v(2, 0)))
            .register(RetypeTo("B", "A", v(2, 0), v(1, 0)))
            .build()
            .unwrap();
        let mut event = stored("A", "{}", v(1, 0));

        // Act
        let err = upgrader.upgrade(&mut event).unwrap_err();

        // Assert
        assert!(matches!(err, UpgradeError::Cycle { .. }));
        let mut event = stored("A", "{}", v(1, 0));
        let err = upgrader.upgrade_to(&mut event, v(9, 0)).unwrap_err();
        assert!(matches!(err, UpgradeError::Cycle { .. }));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let result = EventUpgrader::builder()
            .register(RetypeTo("A", "B", v(1, 0), v(2, 0)))
            .register(RetypeTo("A", "C", v(1, 0), v(3, 0)))
            .build();

        assert!(matches!(
            result,
            Err(UpgradeError::DuplicateUpgrade { ref event_type, from }) if event_type == "A" && from == v(1, 0)
        ));
    }

    #[test]
    fn test_no_op_registration_is_rejected() {
        let result = EventUpgrader::builder()
            .register(RetypeTo("A", "B", v(1, 0), v(1, 0)))
            .build();

        assert!(matches!(result, Err(UpgradeError::NoOpUpgrade { .. })));
    }

    #[test]
    fn test_empty_upgrader_reports_no_units() {
        let upgrader = EventUpgrader::new();

        assert!(upgrader.is_empty());
        assert!(!upgrader.can_upgrade("A", v(1, 0)));
        assert!(two_step_chain().can_upgrade("UserRegistered", v(2, 0)));
        assert_eq!(two_step_chain().len(), 2);
    }
}
