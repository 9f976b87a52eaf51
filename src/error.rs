//! Error types for stream-output capture.

use thiserror::Error;

/// Errors that can occur in the stream-output capture system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamOutError {
    /// A configuration value is outside its valid domain.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Layout partitioning requested more elements than remain in the layout.
    #[error(
        "layout partition out of range: slot {slot} requested {requested} element(s) at offset {offset}, layout has {available}"
    )]
    OutOfRange {
        /// Buffer slot whose request overran the layout.
        slot: usize,
        /// Number of elements the slot asked for.
        requested: usize,
        /// Cursor position when the request was made.
        offset: usize,
        /// Total number of elements in the layout.
        available: usize,
    },

    /// The render context refused to allocate a buffer or view.
    #[error("device resource allocation failed: {0}")]
    DeviceResource(String),

    /// An operation was issued against an object in the wrong state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Convenience alias for results in this crate.
pub type StreamOutResult<T> = Result<T, StreamOutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StreamOutError::DeviceResource("out of memory".to_string());
        assert_eq!(
            err.to_string(),
            "device resource allocation failed: out of memory"
        );

        let err = StreamOutError::OutOfRange {
            slot: 1,
            requested: 5,
            offset: 2,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "layout partition out of range: slot 1 requested 5 element(s) at offset 2, layout has 3"
        );
    }
}
