//! Error types for the body pose alignment library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[cfg(feature = "camera")]
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding, encoding or processing failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// A camera, model or other session resource could not be acquired.
    ///
    /// This is the only fatal error class: the pipeline halts before its
    /// first tick and releases whatever was acquired so far.
    #[error("Resource acquisition failed: {0}")]
    ResourceAcquisition(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model inference error
    #[error("Model error: {0}")]
    ModelError(String),

    /// Model output had an unexpected shape or layout
    #[error("Model output error: {0}")]
    ModelOutputError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Scheduler or background task failure
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
