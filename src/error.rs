//! Error types for volcar
//!
//! One central error enum for the whole conversion pipeline. The design is
//! all-or-nothing: no variant is retried or recovered locally, and any error
//! reaching the CLI aborts the run with a non-zero exit code before a
//! manifest is written.

use thiserror::Error;

/// Result type alias for volcar operations
pub type Result<T> = std::result::Result<T, VolcarError>;

/// Error type for checkpoint conversion operations
#[derive(Debug, Error)]
pub enum VolcarError {
    /// A variable name or checkpoint structure does not match the expected
    /// GPT-2 layout (missing namespace prefix, unparsable path, duplicate
    /// index entry, layer block out of range, bad container contents)
    #[error("Format error: {reason}")]
    FormatError {
        /// Human-readable description of the mismatch
        reason: String,
    },

    /// A tensor's shape is inconsistent with its data
    #[error("Invalid shape: {reason}")]
    InvalidShape {
        /// Human-readable description of the inconsistency
        reason: String,
    },

    /// An underlying file operation failed
    #[error("I/O error: {message}")]
    IoError {
        /// Description including the failing path and OS error
        message: String,
    },

    /// The byte cursor total disagrees with the blob size on disk
    #[error("Blob size mismatch: expected {expected} bytes, found {actual} bytes")]
    IntegrityError {
        /// Bytes the offset tracker accounted for
        expected: u64,
        /// Bytes the storage layer reports
        actual: u64,
    },

    /// An HTTP transfer failed
    #[error("Connection error: {0}")]
    ConnectionError(String),
}
