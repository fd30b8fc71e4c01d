//! Store and configuration errors shared by the OBTRACK crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Config or data file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file present but not valid TOML for [`crate::config::TomlConfig`]
    #[error("Configuration error: {0}")]
    Config(String),

    /// Company, jurisdiction or obligation type missing from the catalog
    #[error("{0} not found")]
    NotFound(String),

    /// Stored value that cannot be decoded (e.g. a malformed timestamp)
    #[error("Internal error: {0}")]
    Internal(String),
}
