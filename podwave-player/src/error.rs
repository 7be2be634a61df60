//! Error types for podwave-player
//!
//! Component errors (`SourceError`, `ResourceError`) live next to their
//! traits; this enum covers everything that can stop an operation outright.

use thiserror::Error;

use crate::audio::ResourceError;
use crate::source::SourceError;

/// Main error type for podwave-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Narration API errors
    #[error("Narration source error: {0}")]
    Source(#[from] SourceError),

    /// Audio resource errors
    #[error("Audio error: {0}")]
    Audio(#[from] ResourceError),

    /// Playback rate must be a finite, positive number
    #[error("Invalid playback rate: {0}")]
    InvalidRate(f64),

    /// Narration generation finished with a failure
    #[error("Generation failed for {id}: {message}")]
    GenerationFailed { id: String, message: String },

    /// Narration did not finish generating in time
    #[error("Generation of {0} timed out")]
    GenerationTimedOut(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<podwave_common::Error> for Error {
    fn from(e: podwave_common::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Convenience Result type using podwave-player Error
pub type Result<T> = std::result::Result<T, Error>;
