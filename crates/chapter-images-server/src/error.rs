//! Error types for the server crate

use thiserror::Error;

/// Server result type
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised while starting the server or building adapters
#[derive(Error, Debug)]
pub enum ServerError {
    /// Bad or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
