//! Error types for the swing capture library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// A clip was requested while the rolling buffer held no frames
    #[error("Cannot save clip: the frame buffer is empty")]
    EmptyBuffer,

    /// No encoding session could be opened, or its input could not be attached
    #[error("Video encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// The encoder accepted the session but did not produce a complete clip
    #[error("Video encoding failed: {0}")]
    EncodeFailed(#[source] EncoderError),

    /// The rolling buffer worker has shut down
    #[error("Frame buffer worker is no longer running")]
    BufferClosed,

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Landmark session file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Filter initialization error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Pose detector collaborator failed on a frame
    #[error("Pose detector error: {0}")]
    DetectorError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Failures raised by a video encoder backend.
#[derive(Error, Debug)]
pub enum EncoderError {
    /// Writing to or spawning the encoder failed
    #[error("encoder I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The external encoder process exited unsuccessfully
    #[error("encoder process exited with {status}: {stderr}")]
    ProcessFailed {
        /// Exit status as reported by the OS
        status: String,
        /// Trailing stderr output
        stderr: String,
    },

    /// The session input stayed busy past the configured readiness timeout
    #[error("encoder input not ready after {waited_ms} ms")]
    Stalled {
        /// Time spent polling
        waited_ms: u128,
    },

    /// A frame did not match the dimensions the session was opened with
    #[error("frame {index} is {actual_width}x{actual_height}, session expects {width}x{height}")]
    DimensionMismatch {
        /// Position of the frame in the snapshot
        index: usize,
        /// Session width
        width: u32,
        /// Session height
        height: u32,
        /// Frame width
        actual_width: u32,
        /// Frame height
        actual_height: u32,
    },

    /// Finalization did not reach a completed state
    #[error("session finished in state {0}")]
    Incomplete(String),

    /// The finished artifact is missing from disk
    #[error("encoded file missing: {}", .0.display())]
    MissingOutput(PathBuf),

    /// `OpenCV` operation failed
    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// Backend specific failure
    #[error("{0}")]
    Backend(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
