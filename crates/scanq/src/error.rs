//! Error types for scanq

use std::io;
use thiserror::Error;

/// scanq error type
#[derive(Error, Debug)]
pub enum ScanqError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Could never reach {target} after {attempts} attempts: {last_error}")]
    ConnectExhausted {
        target: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Could not create channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("Could not declare queue '{queue}': {source}")]
    QueueDeclare {
        queue: String,
        #[source]
        source: lapin::Error,
    },
}

impl ScanqError {
    /// Setup failures end the run; everything else is absorbed per entry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanqError::ConnectExhausted { .. }
                | ScanqError::Channel(_)
                | ScanqError::QueueDeclare { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ScanqError>;
