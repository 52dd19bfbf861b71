//! Persistence for signals, notifications, and run logs. An in-memory
//! implementation backs tests and the simulator; a SQLite implementation is
//! the server's default (§3 Persisted Entities).

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{MemoryNotificationStore, MemoryRunLogStore, MemorySignalStore};
pub use sqlite::SqliteStore;
pub use store::{CasResult, NotificationStore, RunLogStore, SignalStore};
