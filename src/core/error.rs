/// Datawhisper Error Module
///
/// This module defines the error kinds surfaced by the query pipeline and the
/// shell around it. Every failure is returned as a value so callers must
/// decide how each path is reported.
use std::time::Duration;
use thiserror::Error;

/// Error type for the Datawhisper application.
///
/// - Boundary validation (empty credential or query fields)
/// - Opening the database connection
/// - Executing SQL, including timeouts
/// - Statements refused by the safety gate
/// - Configuration, export and I/O failures
#[derive(Error, Debug)]
pub enum WhisperError {
    /// A required field was left empty at the boundary
    #[error("Input error: {0}")]
    InputValidation(String),

    /// The database rejected the connection attempt
    #[error("Connection error: {0}")]
    Connection(String),

    /// The database rejected the statement (syntax, permissions, missing table)
    #[error("Query error: {0}")]
    Query(String),

    /// The statement was interrupted after running past the configured limit
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// The safety gate refused the statement before it reached the database
    #[error("Rejected for safety: {0}")]
    SafetyRejection(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Result export errors (unknown format)
    #[error("Export error: {0}")]
    Export(String),

    /// File system and terminal I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WhisperError {
    /// Short title used when the shell reports the error to the user.
    pub fn title(&self) -> &'static str {
        match self {
            WhisperError::InputValidation(_) => "Input Error",
            WhisperError::Connection(_) => "Connection Error",
            WhisperError::Query(_) | WhisperError::Timeout(_) => "Execution Error",
            WhisperError::SafetyRejection(_) => "Security Warning",
            WhisperError::Config(_) => "Configuration Error",
            WhisperError::Export(_) => "Export Error",
            WhisperError::Io(_) | WhisperError::Json(_) => "Error",
        }
    }

    /// Whether the shell can keep going after reporting this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, WhisperError::Io(_))
    }
}

/// Type alias for Result to use WhisperError as the error type.
pub type Result<T> = std::result::Result<T, WhisperError>;
