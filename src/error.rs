//! Error types for RekhaTrack

use thiserror::Error;

/// RekhaTrack error type
#[derive(Error, Debug)]
pub enum RekhaError {
    #[error("Invalid tree parameters: {0}")]
    Param(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed tree file: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, RekhaError>;
