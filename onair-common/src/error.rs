//! Errors raised by the shared store and configuration layer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Root folder creation or config file access failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML config could not be parsed or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored column holds a value the models cannot represent
    #[error("Corrupt value in {column}: '{value}'")]
    CorruptValue { column: String, value: String },
}

impl Error {
    pub fn corrupt(column: &str, value: &str) -> Self {
        Error::CorruptValue {
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}
