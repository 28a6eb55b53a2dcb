//! Error taxonomy for the mapping pipeline.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using PipelineError.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Primary error type shared by every pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    // === Configuration ===
    #[error("Invalid configuration: {0}")]
    Config(String),

    // === Inputs ===
    #[error("Missing input {}: {detail}", path.display())]
    MissingInput { path: PathBuf, detail: String },

    #[error("Missing validation input {}: {detail}", path.display())]
    ValidationInput { path: PathBuf, detail: String },

    // === Collaborators ===
    #[error("Transient I/O failure: {0}")]
    TransientIo(String),

    #[error("{name} failed: {message}")]
    Collaborator { name: String, message: String },

    #[error("Stage {stage} timed out after {after:?}")]
    Timeout { stage: String, after: Duration },

    #[error("Run cancelled")]
    Cancelled,

    // === Infrastructure ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    Data(String),
}

impl PipelineError {
    pub fn missing_input(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::MissingInput {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn validation_input(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::ValidationInput {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn collaborator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Only transient network or file-system hiccups may be retried, and only
    /// by the collaborator that hit them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientIo(_))
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::MissingInput { .. } => "missing_input",
            Self::ValidationInput { .. } => "validation_input",
            Self::TransientIo(_) => "transient_io",
            Self::Collaborator { .. } => "collaborator",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
            Self::Data(_) => "data",
        }
    }

    /// The resource a human operator must look at, when the error names one.
    pub fn resource_path(&self) -> Option<&PathBuf> {
        match self {
            Self::MissingInput { path, .. } | Self::ValidationInput { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_io_is_retryable() {
        assert!(PipelineError::TransientIo("reset".into()).is_retryable());
        assert!(!PipelineError::missing_input("/a", "gone").is_retryable());
        assert!(!PipelineError::Config("bad".into()).is_retryable());
        assert!(!PipelineError::Cancelled.is_retryable());
    }

    #[test]
    fn test_messages_name_the_path() {
        let err = PipelineError::missing_input("/data/input_exp/20240111", "no files");
        assert_eq!(
            err.to_string(),
            "Missing input /data/input_exp/20240111: no files"
        );
        assert_eq!(err.kind(), "missing_input");
        assert!(err.resource_path().is_some());
    }
}
