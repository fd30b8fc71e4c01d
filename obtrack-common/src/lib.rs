//! # OBTRACK Common Library
//!
//! Shared code for the OBTRACK compliance tools including:
//! - Database schema, catalog models and queries
//! - Configuration loading
//! - Common error type
//! - Time helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
