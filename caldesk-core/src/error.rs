//! Error types for the scheduling core.

use thiserror::Error;

use crate::event::EventId;
use crate::validation::ValidationError;

/// Opaque failure reported by a `Storage` implementation.
///
/// The core passes it through to its caller without inspecting it.
pub type StorageError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in scheduling operations.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event not found: {0}")]
    NotFound(EventId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),
}

/// Result type alias for scheduling operations.
pub type ScheduleResult<T> = Result<T, ScheduleError>;
