//! facedb-store: SQLite persistence for enrolled face samples.

pub mod maintenance;
pub mod sqlite;

pub use maintenance::{delete_if_exists, DeleteOutcome};
pub use sqlite::{SqliteStore, StoreError};
