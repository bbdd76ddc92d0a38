//! Error types for flipbook.

use thiserror::Error;

/// Main error type for flipbook operations.
#[derive(Error, Debug)]
pub enum FlipbookError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Shader compilation error: {0}")]
    Shader(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for flipbook operations.
pub type Result<T> = std::result::Result<T, FlipbookError>;
