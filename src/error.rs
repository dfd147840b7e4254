//! Error types for the record mirror.

use crate::types::RecordId;
use std::sync::Arc;
use thiserror::Error;

/// One rejected operation inside a batch write.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchFailure {
    /// Record the operation targeted.
    pub id: RecordId,
    /// HTTP-style status reported by the backend.
    pub status: u16,
    pub message: String,
}

/// Main error type for mirror operations.
#[derive(Clone, Debug, Error)]
pub enum MirrorError {
    #[error("Request failed ({status}): {message}")]
    Request { status: u16, message: String },

    #[error("Batch write failed: {} of {total} operations rejected", .failures.len())]
    Batch {
        failures: Vec<BatchFailure>,
        total: usize,
    },

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl MirrorError {
    /// Build a request error from a status code and message.
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        MirrorError::Request {
            status,
            message: message.into(),
        }
    }

    /// Aggregate per-operation failures of a batch write.
    pub fn batch(failures: Vec<BatchFailure>, total: usize) -> Self {
        MirrorError::Batch { failures, total }
    }

    /// Status code of the failure, if the backend reported one.
    ///
    /// Aggregated batch errors report the first failure's status.
    pub fn status(&self) -> Option<u16> {
        match self {
            MirrorError::Request { status, .. } => Some(*status),
            MirrorError::Batch { failures, .. } => failures.first().map(|f| f.status),
            MirrorError::RecordNotFound(_) => Some(404),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(e: serde_json::Error) -> Self {
        MirrorError::Serialization(e.to_string())
    }
}

/// Callback that receives errors from `update` and `refetch`.
pub type ErrorHandler = Arc<dyn Fn(&MirrorError) + Send + Sync>;

/// The handler used when the caller supplies none: log and continue.
pub fn log_error_handler() -> ErrorHandler {
    Arc::new(|error: &MirrorError| {
        tracing::error!(%error, "record mirror request failed");
    })
}

/// Result type for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;
