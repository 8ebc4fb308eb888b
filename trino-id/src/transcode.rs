//! External container transcoding
//!
//! Containers the native decoder cannot handle (webm uploads from browser
//! recorders) are piped through an external ffmpeg binary that emits
//! linear PCM WAV at 16 kHz mono; the pipeline then treats the result
//! like any other WAV upload. The binary path is injected from
//! configuration, and the whole step sits behind a trait so tests can
//! substitute a stub.

use crate::error::PipelineError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Capability interface: compressed container bytes in, PCM WAV bytes out.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, bytes: &[u8], declared_type: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Transcoder backed by an external ffmpeg binary invoked over pipes.
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, bytes: &[u8], declared_type: &str) -> Result<Vec<u8>, PipelineError> {
        debug!(
            binary = %self.binary.display(),
            declared_type,
            input_bytes = bytes.len(),
            "Transcoding via ffmpeg"
        );

        let mut child = Command::new(&self.binary)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                "pipe:0",
                "-f",
                "wav",
                "-acodec",
                "pcm_s16le",
                "-ar",
                "16000",
                "-ac",
                "1",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::Decode(format!("failed to start transcoder: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(bytes)
                .await
                .map_err(|e| PipelineError::Decode(format!("transcoder stdin write failed: {e}")))?;
            // Close stdin so ffmpeg sees EOF and flushes its output
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| PipelineError::Decode(format!("transcoder failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Decode(format!(
                "transcoder exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(PipelineError::Decode(
                "transcoder produced no output".to_string(),
            ));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_a_decode_error() {
        let transcoder = FfmpegTranscoder::new(PathBuf::from("/nonexistent/ffmpeg"));
        let err = transcoder
            .transcode(&[0u8; 16], "audio/webm")
            .await
            .unwrap_err();
        assert_eq!(err.stage_tag(), "decode_error");
    }
}
