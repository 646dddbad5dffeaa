/// Core Module for Datawhisper
///
/// Shared infrastructure for the query pipeline: the database layer and the
/// error type every other module returns.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Result, WhisperError};
