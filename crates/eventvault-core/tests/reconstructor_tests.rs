//! Integration tests for `AggregateReconstructor` and `Snapshotter`.

use eventvault_core::aggregate::AggregateRoot;
use eventvault_core::error::{ReconstructionError, SnapshotError};
use eventvault_core::event::{DomainEvent, EventStream};
use eventvault_core::reconstructor::{AggregateReconstructor, ReplayMode};
use eventvault_core::snapshot::{Snapshot, Snapshotter};
use eventvault_test_support::{FixedClock, TestEvent, Ticket};
use serde_json::json;

fn history(payloads: Vec<TestEvent>) -> EventStream<DomainEvent<TestEvent>> {
    let clock = FixedClock::reference();
    payloads
        .into_iter()
        .map(|payload| DomainEvent::record(payload, &clock))
        .collect()
}

fn reconstructor(mode: ReplayMode) -> AggregateReconstructor {
    AggregateReconstructor::builder()
        .register::<Ticket>()
        .snapshotter(Snapshotter::builder().register::<Ticket>().build())
        .replay_mode(mode)
        .build()
}

fn ticket_snapshot(version: u64) -> Snapshot {
    Snapshot {
        aggregate_type: "Ticket".to_owned(),
        aggregate_id: "ticket-1".to_owned(),
        version,
        state: json!({ "name": "from snapshot", "description": "restored" }),
        taken_on: FixedClock::reference().0,
    }
}

// --- full replay ---

#[test]
fn test_replay_folds_events_in_order() {
    // Arrange
    let stream = history(vec![
        TestEvent::ticket_opened("ticket-1"),
        TestEvent::name_changed("second"),
        TestEvent::name_changed("third"),
    ]);

    // Act
    let ticket: Ticket = reconstructor(ReplayMode::Strict)
        .reconstitute(&stream)
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(ticket.aggregate_id(), "ticket-1");
    assert_eq!(ticket.name(), "third");
    assert_eq!(ticket.description(), "ticket-1 description");
    assert_eq!(ticket.version(), 3);
    assert!(ticket.uncommitted_events().is_empty());
}

#[test]
fn test_empty_history_yields_nothing() {
    let result = reconstructor(ReplayMode::Strict)
        .reconstitute::<Ticket>(&EventStream::default())
        .unwrap();

    assert!(result.is_none());
}

#[test]
fn test_trailing_tombstone_yields_nothing() {
    // Arrange
    let stream = history(vec![
        TestEvent::ticket_opened("ticket-1"),
        TestEvent::TicketClosed {
            ticket_id: "ticket-1".to_owned(),
        },
    ]);

    // Act
    let result = reconstructor(ReplayMode::Strict)
        .reconstitute::<Ticket>(&stream)
        .unwrap();

    // Assert
    assert!(result.is_none());
}

#[test]
fn test_unregistered_aggregate_type_is_rejected() {
    let stream = history(vec![TestEvent::ticket_opened("ticket-1")]);

    let err = AggregateReconstructor::builder()
        .build()
        .reconstitute::<Ticket>(&stream)
        .unwrap_err();

    assert!(matches!(err, ReconstructionError::InvalidAggregateType(ref t) if t == "Ticket"));
}

// --- missing handlers ---

#[test]
fn test_strict_replay_fails_on_unhandled_event() {
    // Arrange
    let stream = history(vec![
        TestEvent::ticket_opened("ticket-1"),
        TestEvent::user_registered("ada"),
    ]);

    // Act
    let err = reconstructor(ReplayMode::Strict)
        .reconstitute::<Ticket>(&stream)
        .unwrap_err();

    // Assert
    match err {
        ReconstructionError::UnhandledEvent {
            aggregate_type,
            event_type,
            position,
        } => {
            assert_eq!(aggregate_type, "Ticket");
            assert_eq!(event_type, "UserRegistered");
            assert_eq!(position, 2);
        }
        other => panic!("expected UnhandledEvent, got {other:?}"),
    }
}

#[test]
fn test_lenient_replay_skips_unhandled_event_but_counts_it() {
    // Arrange
    let stream = history(vec![
        TestEvent::ticket_opened("ticket-1"),
        TestEvent::user_registered("ada"),
        TestEvent::name_changed("renamed"),
    ]);

    // Act
    let ticket: Ticket = reconstructor(ReplayMode::Lenient)
        .reconstitute(&stream)
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(ticket.version(), 3);
    assert_eq!(ticket.name(), "renamed");
}

#[test]
fn test_strict_is_the_default_mode() {
    assert_eq!(
        AggregateReconstructor::builder().build().replay_mode(),
        ReplayMode::Strict
    );
}

// --- snapshots ---

#[test]
fn test_snapshot_plus_one_event_reaches_next_version() {
    // Arrange
    let snapshot = ticket_snapshot(2);
    let stream = history(vec![TestEvent::name_changed("after snapshot")]);

    // Act
    let ticket: Ticket = reconstructor(ReplayMode::Strict)
        .reconstitute_with_snapshot(&stream, Some(&snapshot))
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(ticket.version(), 3);
    assert_eq!(ticket.name(), "after snapshot");
    assert_eq!(ticket.description(), "restored");
    assert_eq!(ticket.aggregate_id(), "ticket-1");
}

#[test]
fn test_snapshot_without_later_events_is_restored_as_is() {
    let snapshot = ticket_snapshot(2);

    let ticket: Ticket = reconstructor(ReplayMode::Strict)
        .reconstitute_with_snapshot(&EventStream::default(), Some(&snapshot))
        .unwrap()
        .unwrap();

    assert_eq!(ticket.version(), 2);
    assert_eq!(ticket.name(), "from snapshot");
}

#[test]
fn test_unhandled_event_position_counts_from_snapshot() {
    let snapshot = ticket_snapshot(5);
    let stream = history(vec![TestEvent::user_registered("ada")]);

    let err = reconstructor(ReplayMode::Strict)
        .reconstitute_with_snapshot::<Ticket>(&stream, Some(&snapshot))
        .unwrap_err();

    assert!(matches!(
        err,
        ReconstructionError::UnhandledEvent { position: 6, .. }
    ));
}

#[test]
fn test_snapshot_of_another_type_is_rejected() {
    // Arrange
    let mut snapshot = ticket_snapshot(2);
    snapshot.aggregate_type = "Invoice".to_owned();

    // Act
    let err = reconstructor(ReplayMode::Strict)
        .reconstitute_with_snapshot::<Ticket>(&EventStream::default(), Some(&snapshot))
        .unwrap_err();

    // Assert
    assert!(matches!(
        err,
        ReconstructionError::SnapshotMismatch { ref expected, ref found }
            if expected == "Ticket" && found == "Invoice"
    ));
}

#[test]
fn test_snapshot_without_registered_translator_fails() {
    let reconstructor = AggregateReconstructor::builder()
        .register::<Ticket>()
        .build();

    let err = reconstructor
        .reconstitute_with_snapshot::<Ticket>(&EventStream::default(), Some(&ticket_snapshot(1)))
        .unwrap_err();

    assert!(matches!(
        err,
        ReconstructionError::Snapshot(SnapshotError::NoTranslator(_))
    ));
}

#[test]
fn test_snapshotter_round_trips_ticket_state() {
    // Arrange
    let clock = FixedClock::reference();
    let snapshotter = Snapshotter::builder().register::<Ticket>().build();
    let mut ticket = Ticket::open("ticket-1", "name", "description", &clock);
    ticket.rename("renamed", &clock);
    ticket.clear_uncommitted_events();

    // Act
    let snapshot = snapshotter.take_snapshot(&ticket, &clock).unwrap();
    let restored: Ticket = snapshotter.translate_snapshot(&snapshot).unwrap();

    // Assert
    assert_eq!(snapshot.aggregate_type, "Ticket");
    assert_eq!(snapshot.version, 2);
    assert_eq!(snapshot.taken_on, clock.0);
    assert_eq!(restored, ticket);
}

#[test]
fn test_snapshotter_rejects_unregistered_and_mismatched_types() {
    // Arrange
    let clock = FixedClock::reference();
    let ticket = Ticket::open("ticket-1", "name", "description", &clock);
    let mut foreign = ticket_snapshot(1);
    foreign.aggregate_type = "Invoice".to_owned();

    // Act
    let unregistered = Snapshotter::default().take_snapshot(&ticket, &clock);
    let mismatched = Snapshotter::builder()
        .register::<Ticket>()
        .build()
        .translate_snapshot::<Ticket>(&foreign);

    // Assert
    assert!(matches!(unregistered, Err(SnapshotError::NoTranslator(_))));
    assert!(matches!(mismatched, Err(SnapshotError::TypeMismatch { .. })));
}
