//! The audio-to-prediction pipeline
//!
//! Stages run strictly in sequence, each able to abort the request with a
//! stage-tagged error before later stages run:
//!
//! bytes -> validate -> (transcode) -> decode/condition -> features ->
//! classify -> resolve
//!
//! One invocation per request, no internal parallelism, no shared mutable
//! state: the only shared pieces are the read-only classifier handle and
//! the catalog pool, both safe for concurrent use.

pub mod classify;
pub mod condition;
pub mod decode;
pub mod features;
pub mod resolve;
pub mod validate;

use crate::db::SpeciesCatalog;
use crate::error::PipelineError;
use crate::transcode::Transcoder;
use classify::Classifier;
use decode::TARGET_SAMPLE_RATE;
use features::FeatureExtractor;
use resolve::SpeciesPrediction;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Default number of ranked candidates returned
pub const DEFAULT_TOP_N: usize = 5;

/// An incoming recording, request-scoped
#[derive(Debug)]
pub struct RawSubmission {
    pub bytes: Vec<u8>,
    pub declared_type: String,
    pub user_id: Option<i64>,
    pub top_n: usize,
}

/// Successful pipeline result
#[derive(Debug, Clone)]
pub struct InferenceOutcome {
    pub duration_seconds: f64,
    pub elapsed_inference_seconds: f64,
    pub predictions: Vec<SpeciesPrediction>,
}

/// One pipeline instance serves the whole process; `run` takes `&self`
/// and each invocation owns its buffers.
pub struct Pipeline {
    classifier: Arc<dyn Classifier>,
    transcoder: Arc<dyn Transcoder>,
    catalog: SpeciesCatalog,
    extractor: Arc<FeatureExtractor>,
}

impl Pipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        transcoder: Arc<dyn Transcoder>,
        catalog: SpeciesCatalog,
    ) -> Self {
        Self {
            classifier,
            transcoder,
            catalog,
            extractor: Arc::new(FeatureExtractor::new(TARGET_SAMPLE_RATE)),
        }
    }

    /// Run the full pipeline for one submission.
    pub async fn run(&self, submission: RawSubmission) -> Result<InferenceOutcome, PipelineError> {
        validate::validate_content_type(&submission.declared_type)?;
        validate::validate_size(submission.bytes.len())?;

        // Non-native containers go through the external transcoder, which
        // hands back plain WAV
        let (bytes, effective_type) = if validate::requires_transcode(&submission.declared_type) {
            let wav = self
                .transcoder
                .transcode(&submission.bytes, &submission.declared_type)
                .await?;
            (wav, "audio/wav".to_string())
        } else {
            (submission.bytes, submission.declared_type.clone())
        };

        let started = Instant::now();

        // The CPU-bound body must not stall the async executor
        let extractor = Arc::clone(&self.extractor);
        let classifier = Arc::clone(&self.classifier);
        let (duration_seconds, probabilities) =
            tokio::task::spawn_blocking(move || -> Result<(f64, Vec<f32>), PipelineError> {
                let mut pcm = decode::decode_to_mono(bytes, &effective_type)?;
                let duration = pcm.duration_seconds();
                validate::validate_duration(duration)?;

                condition::condition(&mut pcm.samples);
                let tensor = extractor.extract(&pcm.samples);
                let probabilities = classifier.predict(&tensor)?;
                Ok((duration, probabilities))
            })
            .await
            .map_err(|e| PipelineError::Inference(format!("pipeline task failed: {e}")))??;

        let predictions =
            resolve::resolve(&self.catalog, &probabilities, submission.top_n).await?;
        let elapsed_inference_seconds = started.elapsed().as_secs_f64();

        debug!(
            duration_seconds,
            elapsed_inference_seconds,
            candidates = predictions.len(),
            "Pipeline run complete"
        );

        Ok(InferenceOutcome {
            duration_seconds,
            elapsed_inference_seconds,
            predictions,
        })
    }
}
