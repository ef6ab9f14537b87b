//! Eventvault Event Store — durable event storage on `SQLite`.
//!
//! [`SqlEventStorage`] implements the core `EventStorage` seam. Wrap it in
//! an `EventStore` (see [`SqlEventStore`]) to get serialization, upgrades,
//! and listeners on top.

pub mod config;
pub mod schema;
pub mod sql_storage;

pub use config::{ConfigError, SqlStoreConfig};
pub use sql_storage::{SqlEventStorage, SqlEventStore};
