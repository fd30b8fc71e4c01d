//! SQLite implementation of the obligation store

pub mod obligations;

pub use obligations::{list_occurrences, SqliteObligationStore, SqliteObligationTx};
