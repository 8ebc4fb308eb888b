//! Classifier invocation
//!
//! Wraps the pre-trained CNN behind an object-safe [`Classifier`] trait so
//! the pipeline depends on an injected handle rather than ambient global
//! state, and tests can substitute a stub. The production implementation
//! loads its weights once at startup and is immutable afterwards; the
//! forward pass takes `&self` and is safe for concurrent use.

use crate::error::{Error, PipelineError};
use crate::pipeline::features::{N_MELS, TARGET_FRAMES};
use candle_core::{Device, Tensor, D};
use candle_nn::{Conv2d, Conv2dConfig, Linear, Module};
use std::collections::HashMap;
use std::path::Path;

/// Stateless probability-producing classifier: fixed-shape feature tensor
/// in, one probability per known species index out.
pub trait Classifier: Send + Sync {
    /// Forward pass. Returns a probability vector of length
    /// [`Classifier::output_width`], position i corresponding to catalog
    /// identifier i.
    fn predict(&self, features: &ndarray::Array2<f32>) -> Result<Vec<f32>, PipelineError>;

    /// Number of species the model was trained on.
    fn output_width(&self) -> usize;
}

/// CNN classifier over log-mel tensors: two conv/relu/maxpool blocks
/// followed by a linear head and softmax.
#[derive(Debug)]
pub struct CnnClassifier {
    conv1: Conv2d,
    conv2: Conv2d,
    fc: Linear,
    output_width: usize,
    device: Device,
}

impl CnnClassifier {
    /// Load checkpoint weights from a safetensors file.
    ///
    /// Shapes are taken from the checkpoint itself, so the output width is
    /// whatever the model was trained with; the caller validates it
    /// against the species catalog at startup.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let device = Device::Cpu;
        let tensors = candle_core::safetensors::load(path, &device)
            .map_err(|e| Error::ModelLoad(format!("{}: {e}", path.display())))?;

        let get = |name: &str| -> Result<Tensor, Error> {
            tensors
                .get(name)
                .cloned()
                .ok_or_else(|| Error::ModelLoad(format!("missing tensor {name} in checkpoint")))
        };

        let conv_cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let conv1 = Conv2d::new(get("conv1.weight")?, Some(get("conv1.bias")?), conv_cfg);
        let conv2 = Conv2d::new(get("conv2.weight")?, Some(get("conv2.bias")?), conv_cfg);

        let fc_weight = get("fc.weight")?;
        let output_width = fc_weight
            .dim(0)
            .map_err(|e| Error::ModelLoad(format!("bad fc.weight shape: {e}")))?;
        let fc = Linear::new(fc_weight, Some(get("fc.bias")?));

        Ok(Self {
            conv1,
            conv2,
            fc,
            output_width,
            device,
        })
    }

    fn forward(&self, input: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.conv1.forward(input)?.relu()?.max_pool2d(2)?;
        let xs = self.conv2.forward(&xs)?.relu()?.max_pool2d(2)?;
        let xs = xs.flatten_from(1)?;
        let logits = self.fc.forward(&xs)?;
        candle_nn::ops::softmax(&logits, D::Minus1)
    }
}

impl Classifier for CnnClassifier {
    fn predict(&self, features: &ndarray::Array2<f32>) -> Result<Vec<f32>, PipelineError> {
        let (rows, cols) = features.dim();
        if (rows, cols) != (N_MELS, TARGET_FRAMES) {
            return Err(PipelineError::Inference(format!(
                "feature tensor has shape {rows}x{cols}, expected {N_MELS}x{TARGET_FRAMES}"
            )));
        }

        // Reshape with explicit batch and channel axes: (1, 1, 128, 216)
        let data: Vec<f32> = features.iter().copied().collect();
        let input = Tensor::from_vec(data, (1, 1, N_MELS, TARGET_FRAMES), &self.device)
            .map_err(|e| PipelineError::Inference(e.to_string()))?;

        let probabilities = self
            .forward(&input)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| PipelineError::Inference(e.to_string()))?;

        Ok(probabilities)
    }

    fn output_width(&self) -> usize {
        self.output_width
    }
}

/// Save a checkpoint in the layout `CnnClassifier::load` expects.
/// Used by tooling and tests; training happens elsewhere.
pub fn save_checkpoint(
    tensors: &HashMap<String, Tensor>,
    path: &Path,
) -> Result<(), Error> {
    candle_core::safetensors::save(tensors, path)
        .map_err(|e| Error::ModelLoad(format!("failed to save checkpoint: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Zero-weight checkpoint with `classes` output classes. Softmax over
    /// all-zero logits gives a uniform distribution, which makes the
    /// forward path easy to verify end to end.
    fn zero_checkpoint(classes: usize) -> HashMap<String, Tensor> {
        let device = Device::Cpu;
        // After two stride-2 pools: 128x216 -> 64x108 -> 32x54
        let fc_in = 32 * 32 * 54;
        let mut tensors = HashMap::new();
        let zeros = |shape: &[usize]| Tensor::zeros(shape, candle_core::DType::F32, &device).unwrap();
        tensors.insert("conv1.weight".to_string(), zeros(&[16, 1, 3, 3]));
        tensors.insert("conv1.bias".to_string(), zeros(&[16]));
        tensors.insert("conv2.weight".to_string(), zeros(&[32, 16, 3, 3]));
        tensors.insert("conv2.bias".to_string(), zeros(&[32]));
        tensors.insert("fc.weight".to_string(), zeros(&[classes, fc_in]));
        tensors.insert("fc.bias".to_string(), zeros(&[classes]));
        tensors
    }

    #[test]
    fn load_reads_output_width_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        save_checkpoint(&zero_checkpoint(7), &path).unwrap();

        let classifier = CnnClassifier::load(&path).unwrap();
        assert_eq!(classifier.output_width(), 7);
    }

    #[test]
    fn predict_returns_probability_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        save_checkpoint(&zero_checkpoint(4), &path).unwrap();
        let classifier = CnnClassifier::load(&path).unwrap();

        let features = Array2::<f32>::zeros((N_MELS, TARGET_FRAMES));
        let probs = classifier.predict(&features).unwrap();

        assert_eq!(probs.len(), 4);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4, "probabilities sum to {sum}");
        // Zero weights -> uniform distribution
        for &p in &probs {
            assert!((p - 0.25).abs() < 1e-4);
        }
    }

    #[test]
    fn predict_rejects_wrong_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        save_checkpoint(&zero_checkpoint(4), &path).unwrap();
        let classifier = CnnClassifier::load(&path).unwrap();

        let features = Array2::<f32>::zeros((64, 100));
        let err = classifier.predict(&features).unwrap_err();
        assert_eq!(err.stage_tag(), "inference_error");
    }

    #[test]
    fn load_missing_file_fails() {
        assert!(CnnClassifier::load(Path::new("/nonexistent/model.safetensors")).is_err());
    }

    #[test]
    fn load_incomplete_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let mut tensors = zero_checkpoint(4);
        tensors.remove("fc.bias");
        save_checkpoint(&tensors, &path).unwrap();

        let err = CnnClassifier::load(&path).unwrap_err();
        assert!(err.to_string().contains("fc.bias"));
    }
}
