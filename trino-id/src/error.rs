//! Error types for trino-id
//!
//! Two layers: [`Error`] for service-level faults (config, database, HTTP
//! server), and [`PipelineError`] for per-request pipeline stage failures.
//! Pipeline errors are terminal for the request: each carries a stage tag
//! for the error sink and a coarse caller-facing message.

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for the trino-id service
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration or startup validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Classifier checkpoint loading errors
    #[error("Model load error: {0}")]
    ModelLoad(String),
}

/// Convenience Result type using trino-id Error
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage failure, one variant per stage.
///
/// The pipeline aborts on the first failing stage; no retries and no
/// partial results.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Upload could not be read from the request
    #[error("failed to read uploaded file: {0}")]
    Read(String),

    /// Declared content type not in the allow-list
    #[error("unsupported content type: {0}")]
    InvalidType(String),

    /// Upload exceeds the byte size limit
    #[error("file too large: {0} bytes")]
    TooLarge(usize),

    /// Bytes could not be decoded to PCM
    #[error("could not decode audio: {0}")]
    Decode(String),

    /// Decoded duration outside the accepted range
    #[error("invalid duration: {0:.2}s")]
    InvalidDuration(f64),

    /// Classifier forward pass failed
    #[error("inference failed: {0}")]
    Inference(String),
}

impl PipelineError {
    /// Stage tag recorded in the system error log
    pub fn stage_tag(&self) -> &'static str {
        match self {
            PipelineError::Read(_) => "read_error",
            PipelineError::InvalidType(_) => "invalid_type",
            PipelineError::TooLarge(_) => "too_large",
            PipelineError::Decode(_) => "decode_error",
            PipelineError::InvalidDuration(_) => "invalid_duration",
            PipelineError::Inference(_) => "inference_error",
        }
    }

    /// Coarse caller-facing message, distinct per stage
    pub fn caller_message(&self) -> &'static str {
        match self {
            PipelineError::Read(_) => "Could not read the uploaded file, please try again.",
            PipelineError::InvalidType(_) => {
                "Unsupported file format, please upload a valid audio file."
            }
            PipelineError::TooLarge(_) => "File too large, the maximum size is 100 MB.",
            PipelineError::Decode(_) => {
                "The file is not valid audio, please try a different file."
            }
            PipelineError::InvalidDuration(_) => {
                "Invalid audio duration, recordings must be between 1 and 60 seconds."
            }
            PipelineError::Inference(_) => {
                "An error occurred during identification, please try again later."
            }
        }
    }

    /// HTTP status for the caller-facing response
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            PipelineError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_tags_are_distinct() {
        let errors = [
            PipelineError::Read("x".into()),
            PipelineError::InvalidType("x".into()),
            PipelineError::TooLarge(1),
            PipelineError::Decode("x".into()),
            PipelineError::InvalidDuration(0.5),
            PipelineError::Inference("x".into()),
        ];
        let mut tags: Vec<&str> = errors.iter().map(|e| e.stage_tag()).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), 6);
    }

    #[test]
    fn status_codes_per_stage() {
        assert_eq!(
            PipelineError::TooLarge(200_000_000).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            PipelineError::Inference("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::InvalidDuration(0.2).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
