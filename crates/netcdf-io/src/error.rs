//! Error types for NetCDF operations.

use std::path::PathBuf;

use ocean_common::PipelineError;
use thiserror::Error;

/// Result type for NetCDF operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF reading and writing.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The file does not exist
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Missing required variable, dimension or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// ncdump / ncgen execution error
    #[error("Command execution failed: {0}")]
    CommandError(String),
}

impl From<NetCdfError> for PipelineError {
    fn from(err: NetCdfError) -> Self {
        match err {
            NetCdfError::NotFound(path) => PipelineError::missing_input(path, "file not found"),
            NetCdfError::IoError(e) => PipelineError::Io(e),
            other => PipelineError::Data(other.to_string()),
        }
    }
}
