// Pipeline Errors
// Error taxonomy shared by classification, stage resolution, backends and stages

use crate::config::ParseError;

use std::io;
use thiserror::Error;

/// Result type used throughout the engine
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can abort a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("file '{path}' does not match pattern '{pattern}'")]
    PatternMismatch { path: String, pattern: String },

    #[error("invalid file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("could not parse timestamp '{value}' from '{path}'")]
    TimestampParse { path: String, value: String },

    #[error("stage not found: {module}.{name}")]
    StageNotFound { module: String, name: String },

    #[error("stage '{stage}' cannot consume {found} input (accepts {expected})")]
    StageInput {
        stage: String,
        expected: String,
        found: String,
    },

    #[error("could not connect to scheduler at {address}: {message}")]
    BackendConnection { address: String, message: String },

    #[error("backend error: {0}")]
    Backend(String),

    #[error(
        "could not complete {process} successfully since {failed} of {total} raw files failed. \
         Try fixing or skipping the files from the process. If `use_offline` is set to true, \
         processed files will be skipped on the next run."
    )]
    PartialFailure {
        process: String,
        failed: usize,
        total: usize,
    },

    #[error("stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },

    #[error("conversion failed: {0}")]
    Convert(String),

    #[error("{0}")]
    Config(#[from] ParseError),

    #[error("storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn storage(path: impl Into<String>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn backend_connection(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendConnection {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Whether a rerun with offline reuse enabled can pick up where this run stopped
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::PartialFailure { .. } | Self::Convert(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_names_process() {
        let err = PipelineError::PartialFailure {
            process: "Convert".to_string(),
            failed: 1,
            total: 2,
        };
        let message = err.to_string();
        assert!(message.contains("Convert"));
        assert!(message.contains("1 of 2"));
        assert!(err.is_resumable());
    }

    #[test]
    fn test_stage_not_found_display() {
        let err = PipelineError::StageNotFound {
            module: "sonarflow.stages.missing".to_string(),
            name: "missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "stage not found: sonarflow.stages.missing.missing"
        );
        assert!(!err.is_resumable());
    }
}
