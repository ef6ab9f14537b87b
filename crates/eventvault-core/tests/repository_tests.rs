//! Integration tests for `AggregateRepository` over the in-memory store.

use eventvault_core::aggregate::AggregateRoot;
use eventvault_core::error::{EventStoreError, RepositoryError};
use eventvault_core::reconstructor::AggregateReconstructor;
use eventvault_core::repository::AggregateRepository;
use eventvault_core::snapshot::Snapshotter;
use eventvault_core::store::{InMemoryEventStorage, ListenerPoint};
use eventvault_core::versioning::EventUpgrader;
use eventvault_test_support::{FailingListener, FixedClock, Ticket, in_memory_store};

fn reconstructor() -> AggregateReconstructor {
    AggregateReconstructor::builder()
        .register::<Ticket>()
        .snapshotter(Snapshotter::builder().register::<Ticket>().build())
        .build()
}

#[tokio::test]
async fn test_saved_aggregate_loads_back() {
    // Arrange
    let clock = FixedClock::reference();
    let store = in_memory_store(EventUpgrader::new());
    let reconstructor = reconstructor();
    let repository =
        AggregateRepository::<InMemoryEventStorage, Ticket>::new(&store, &reconstructor);
    let mut ticket = Ticket::open("ticket-1", "name", "description", &clock);
    ticket.rename("renamed", &clock);

    // Act
    let version = repository.save(&mut ticket).await.unwrap();
    let loaded = repository.load("ticket-1").await.unwrap().unwrap();

    // Assert
    assert_eq!(version, 2);
    assert!(ticket.uncommitted_events().is_empty());
    assert_eq!(loaded, ticket);
}

#[tokio::test]
async fn test_missing_aggregate_loads_as_none() {
    let store = in_memory_store(EventUpgrader::new());
    let reconstructor = reconstructor();
    let repository = AggregateRepository::<_, Ticket>::new(&store, &reconstructor);

    let loaded = repository.load("ticket-404").await.unwrap();

    assert!(loaded.is_none());
}

#[tokio::test]
async fn test_stale_copy_fails_to_save_and_keeps_its_events() {
    // Arrange
    let clock = FixedClock::reference();
    let store = in_memory_store(EventUpgrader::new());
    let reconstructor = reconstructor();
    let repository = AggregateRepository::<_, Ticket>::new(&store, &reconstructor);
    let mut ticket = Ticket::open("ticket-1", "name", "description", &clock);
    repository.save(&mut ticket).await.unwrap();
    let mut first = repository.load("ticket-1").await.unwrap().unwrap();
    let mut second = repository.load("ticket-1").await.unwrap().unwrap();
    first.rename("first", &clock);
    second.rename("second", &clock);

    // Act
    repository.save(&mut first).await.unwrap();
    let err = repository.save(&mut second).await.unwrap_err();

    // Assert
    assert!(matches!(
        err,
        RepositoryError::Store(EventStoreError::ConcurrencyConflict {
            expected: 1,
            actual: 2,
            ..
        })
    ));
    assert_eq!(second.uncommitted_events().len(), 1);
    let current = repository.load("ticket-1").await.unwrap().unwrap();
    assert_eq!(current.name(), "first");
}

#[tokio::test]
async fn test_failing_post_append_listener_still_clears_committed_events() {
    // Arrange
    let clock = FixedClock::reference();
    let mut store = in_memory_store(EventUpgrader::new());
    store.add_event_listener(ListenerPoint::PostAppend, FailingListener("mailer down"));
    let reconstructor = reconstructor();
    let repository = AggregateRepository::<_, Ticket>::new(&store, &reconstructor);
    let mut ticket = Ticket::open("ticket-1", "name", "description", &clock);

    // Act
    let first = repository.save(&mut ticket).await.unwrap_err();
    ticket.rename("renamed", &clock);
    let second = repository.save(&mut ticket).await.unwrap_err();

    // Assert
    assert!(matches!(
        first,
        RepositoryError::Store(EventStoreError::Listener {
            point: ListenerPoint::PostAppend,
            ..
        })
    ));
    assert!(matches!(
        second,
        RepositoryError::Store(EventStoreError::Listener { .. })
    ));
    assert!(ticket.uncommitted_events().is_empty());
    assert_eq!(ticket.committed_version(), 2);
    assert_eq!(store.stream_version("ticket-1").await.unwrap(), 2);
    let loaded = repository.load("ticket-1").await.unwrap().unwrap();
    assert_eq!(loaded.name(), "renamed");
}

#[tokio::test]
async fn test_closed_ticket_no_longer_loads() {
    let clock = FixedClock::reference();
    let store = in_memory_store(EventUpgrader::new());
    let reconstructor = reconstructor();
    let repository = AggregateRepository::<_, Ticket>::new(&store, &reconstructor);
    let mut ticket = Ticket::open("ticket-1", "name", "description", &clock);
    ticket.close(&clock);
    repository.save(&mut ticket).await.unwrap();

    let loaded = repository.load("ticket-1").await.unwrap();

    assert!(loaded.is_none());
}

#[tokio::test]
async fn test_load_from_snapshot_replays_only_newer_events() {
    // Arrange
    let clock = FixedClock::reference();
    let store = in_memory_store(EventUpgrader::new());
    let reconstructor = reconstructor();
    let repository = AggregateRepository::<_, Ticket>::new(&store, &reconstructor);
    let mut ticket = Ticket::open("ticket-1", "name", "description", &clock);
    ticket.rename("before snapshot", &clock);
    repository.save(&mut ticket).await.unwrap();
    let snapshot = repository.snapshot(&ticket, &clock).await.unwrap();
    ticket.describe("after snapshot", &clock);
    repository.save(&mut ticket).await.unwrap();

    // Act
    let loaded = repository
        .load_from_snapshot("ticket-1")
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(snapshot.version, 2);
    assert_eq!(loaded.version(), 3);
    assert_eq!(loaded.name(), "before snapshot");
    assert_eq!(loaded.description(), "after snapshot");
    let stored = store
        .find_last_snapshot("Ticket", "ticket-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, snapshot);
}

#[tokio::test]
async fn test_load_from_snapshot_without_snapshot_replays_everything() {
    let clock = FixedClock::reference();
    let store = in_memory_store(EventUpgrader::new());
    let reconstructor = reconstructor();
    let repository = AggregateRepository::<_, Ticket>::new(&store, &reconstructor);
    let mut ticket = Ticket::open("ticket-1", "name", "description", &clock);
    repository.save(&mut ticket).await.unwrap();

    let loaded = repository
        .load_from_snapshot("ticket-1")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded, ticket);
}
