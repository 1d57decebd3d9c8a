//! Error types for image resolution
//!
//! Nothing in the resolution path returns these to presentation code. They
//! travel between components and end up in [`log_suppressed`] when a
//! component boundary converts them into a safe default value.

use std::fmt::Display;
use thiserror::Error;
use tracing::warn;

/// Image resolution result type
pub type Result<T> = std::result::Result<T, ImageError>;

/// Errors raised by a storage provider adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Object does not exist in the bucket
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Provider rejected the request
    #[error("Access denied to {bucket}/{key}: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    /// Transport failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Signing requires account credentials that were not configured
    #[error("Missing credentials for provider {0}")]
    MissingCredentials(String),

    /// The provider cannot perform this operation at all
    #[error("Operation '{operation}' is not supported by provider {provider}")]
    Unsupported { provider: String, operation: String },

    /// Anything else the SDK reported
    #[error("{0}")]
    Other(String),
}

/// Errors raised inside the resolution layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Missing bucket name, base URL or credentials
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider call failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl ImageError {
    /// True for errors caused by configuration rather than a provider call
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ImageError::Config(_) | ImageError::Provider(ProviderError::MissingCredentials(_))
        )
    }
}

/// Record an error that a component boundary swallowed.
///
/// Every catch-and-fallback site goes through here so suppressed failures
/// share one event shape: `component`, `operation`, `subject` and `error`.
pub fn log_suppressed(component: &str, operation: &str, subject: &str, err: &dyn Display) {
    warn!(
        component,
        operation,
        subject,
        error = %err,
        "suppressed error, falling back"
    );
}
