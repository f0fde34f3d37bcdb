//! Error types for Questgate.
//!
//! Subsystems with their own failure modes carry their own enums
//! ([`crate::http::HttpError`], [`crate::records::RecordsError`],
//! [`crate::resources::ManifestError`]); this type covers loading the
//! service configuration.

use thiserror::Error;

/// Main error type for Questgate operations.
#[derive(Error, Debug)]
pub enum QuestgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Questgate operations.
pub type Result<T> = std::result::Result<T, QuestgateError>;
