//! Error types and handling for Outrider

use crate::columns::ColumnId;

/// Result type alias for Outrider operations
pub type Result<T> = std::result::Result<T, OutriderError>;

/// Error types for the Outrider lookahead subsystem.
///
/// Protocol violations (ring overflow, out-of-order reads, unreachable write
/// targets) are deliberately *not* represented here: they indicate a bug in
/// the producer/consumer protocol itself and abort via assertion instead of
/// surfacing as recoverable errors.
#[derive(Debug, thiserror::Error)]
pub enum OutriderError {
    /// I/O related errors from the underlying dataset access layer
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// A column was accessed that the session never declared for prefetch
    #[error("Column not prefetched: {column}")]
    ColumnNotPrefetched { column: ColumnId },

    /// A declared prefetch column does not exist in the dataset
    #[error("Column missing from dataset: {column}")]
    ColumnMissing { column: ColumnId },

    /// A batch accessor was called while no batch is attached to the cursor
    #[error("No batch attached: position {position} has not been fetched")]
    NoCurrentBuffer { position: String },

    /// The lookahead worker thread died; carries the column being filled at
    /// the time of death when one was in progress
    #[error("Lookahead worker failed{}: {message}", fill_context(.column))]
    WorkerFailed {
        column: Option<ColumnId>,
        message: String,
    },

    /// The lookahead session was terminated while this call was pending
    #[error("Lookahead terminated")]
    Terminated,
}

fn fill_context(column: &Option<ColumnId>) -> String {
    match column {
        Some(column) => format!(" while filling {}", column),
        None => String::new(),
    }
}

impl OutriderError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create an I/O error carrying only a message
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a column-not-prefetched error
    pub fn column_not_prefetched(column: ColumnId) -> Self {
        Self::ColumnNotPrefetched { column }
    }

    /// Create a column-missing error
    pub fn column_missing(column: ColumnId) -> Self {
        Self::ColumnMissing { column }
    }

    /// Create a no-batch-attached error
    pub fn no_current_buffer(position: impl ToString) -> Self {
        Self::NoCurrentBuffer {
            position: position.to_string(),
        }
    }

    /// Create a worker-failed error
    pub fn worker_failed(column: Option<ColumnId>, message: impl Into<String>) -> Self {
        Self::WorkerFailed {
            column,
            message: message.into(),
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for OutriderError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = OutriderError::invalid_parameter("ring_buffers", "must be at least 1");
        assert!(matches!(err, OutriderError::InvalidParameter { .. }));

        let err = OutriderError::column_not_prefetched(ColumnId::Weight);
        assert!(matches!(
            err,
            OutriderError::ColumnNotPrefetched {
                column: ColumnId::Weight
            }
        ));

        let err = OutriderError::worker_failed(Some(ColumnId::Time), "disk gone");
        assert!(matches!(err, OutriderError::WorkerFailed { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = OutriderError::column_not_prefetched(ColumnId::Sigma);
        let display = format!("{}", err);
        assert!(display.contains("not prefetched"));
        assert!(display.contains("sigma"));

        let err = OutriderError::worker_failed(Some(ColumnId::Flags), "read past end");
        let display = format!("{}", err);
        assert!(display.contains("while filling flags"));
        assert!(display.contains("read past end"));

        let err = OutriderError::worker_failed(None, "sweep setup failed");
        let display = format!("{}", err);
        assert!(!display.contains("while filling"));
    }
}
