//! Error types for cdnsieve.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SieveError {
    #[error("Invalid IPv4 address: {0}")]
    InvalidIp(String),

    #[error("Missing CSV column: {0}")]
    MissingColumn(String),

    #[error("Malformed CSV row {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("Undetected encoding, decoded as lossy UTF-8: {0}")]
    Encoding(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
