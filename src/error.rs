//! Error types for the face retouch pipeline.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input parameters provided (bad dimensions, empty buffers)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Landmark list unusable for region extraction (too few points)
    #[error("Region extraction error: {0}")]
    RegionExtraction(String),

    /// Segmentation mask arrived in an unrecognized layout
    #[error("Mask format error: {0}")]
    MaskFormat(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
