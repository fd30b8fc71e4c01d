//! Database schema, catalog models and queries

pub mod catalog;
pub mod init;
pub mod models;

pub use catalog::*;
pub use init::*;
pub use models::*;
