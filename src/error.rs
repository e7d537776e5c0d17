//! Crate-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed compact-string input.
    #[error("format error: {0}")]
    Format(String),

    /// No converter registered for the requested type, or a stored value
    /// that does not parse as that type.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Invalid argument passed to a public entry point.
    #[error("argument error: {0}")]
    Argument(String),

    /// Failure reported by a configuration store backend.
    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
