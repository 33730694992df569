//! hdforge Storage - Transactional wallet database.
//!
//! Tables are held in memory behind a `RwLock` and persisted as one JSON file.
//! Writes go through a [`Transaction`]: one writer at a time, all-or-nothing.

pub mod db;
pub mod error;
pub mod tables;
pub mod transaction;

pub use db::{Database, DB_FILE};
pub use error::StorageError;
pub use tables::{Table, TableCounts, Tables};
pub use transaction::Transaction;
