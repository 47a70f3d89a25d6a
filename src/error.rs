//! Error types for the karaoke engine
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the karaoke engine
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or empty source paths and other bad caller input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Source file could not be opened or read
    #[error("File I/O error: {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No audio track in the source, or no decoder for its codec
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Lifecycle method called out of order
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
