//! Admission checks for incoming submissions
//!
//! Declared content type and byte size are checked before any decoding;
//! the duration bound runs after decode, since only the decoded buffer
//! knows its real length. Each violation aborts the request before later
//! stages run.

use crate::error::PipelineError;

/// Accepted declared content types
pub const ALLOWED_TYPES: &[&str] = &[
    "audio/wav",
    "audio/x-wav",
    "audio/mpeg",
    "audio/mp3",
    "audio/webm",
    "audio/ogg",
];

/// Maximum upload size: 100 MB
pub const MAX_SIZE_BYTES: usize = 100 * 1024 * 1024;

/// Accepted recording duration bounds, inclusive
pub const MIN_DURATION_SECONDS: f64 = 1.0;
pub const MAX_DURATION_SECONDS: f64 = 60.0;

/// Check the declared MIME type against the allow-list.
pub fn validate_content_type(declared_type: &str) -> Result<(), PipelineError> {
    if ALLOWED_TYPES.contains(&declared_type) {
        Ok(())
    } else {
        Err(PipelineError::InvalidType(declared_type.to_string()))
    }
}

/// Check the upload byte size.
pub fn validate_size(byte_len: usize) -> Result<(), PipelineError> {
    if byte_len > MAX_SIZE_BYTES {
        Err(PipelineError::TooLarge(byte_len))
    } else {
        Ok(())
    }
}

/// Check the decoded duration against the accepted range (inclusive on
/// both ends: a 1.00 s or 60.00 s clip passes).
pub fn validate_duration(seconds: f64) -> Result<(), PipelineError> {
    if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&seconds) {
        Err(PipelineError::InvalidDuration(seconds))
    } else {
        Ok(())
    }
}

/// Containers symphonia cannot decode natively; these go through the
/// external transcoder first.
pub fn requires_transcode(declared_type: &str) -> bool {
    declared_type == "audio/webm"
}
