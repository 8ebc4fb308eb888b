//! Log-mel spectrogram feature extraction
//!
//! Converts a conditioned mono PCM buffer into the fixed-shape
//! 128 x 216 tensor the classifier was trained on. The stage is pure and
//! deterministic: identical PCM input always yields an identical tensor.
//!
//! Numeric contract:
//! - STFT: 2048-point FFT, hop 512, Hann window, centered frames
//! - 128 triangular mel filters over 500-11025 Hz
//! - Power converted to dB referenced to the grid's own maximum (loudest
//!   cell is always 0 dB), floored at -80 dB
//! - Min-max normalized to [0,1] over the whole grid
//! - Frame axis forced to 216: zero-pad on the right, or center-crop

use ndarray::{s, Array1, Array2};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Number of mel frequency bands
pub const N_MELS: usize = 128;

/// Fixed frame count of the output tensor
pub const TARGET_FRAMES: usize = 216;

/// FFT window length
const N_FFT: usize = 2048;

/// Hop between successive analysis frames
const HOP_LENGTH: usize = 512;

/// Lower edge of the mel filterbank (Hz). Bird vocalizations carry little
/// energy below this, and it keeps low-frequency handling noise out.
const FMIN: f32 = 500.0;

/// Upper edge of the mel filterbank (Hz)
const FMAX: f32 = 11_025.0;

/// Dynamic range floor below the reference maximum (dB)
const TOP_DB: f32 = 80.0;

const POWER_FLOOR: f32 = 1e-10;
const NORM_EPSILON: f32 = 1e-9;

/// Mel spectrogram extractor with precomputed filterbank, window, and FFT
/// plan. Construct once and reuse across requests; `extract` takes `&self`
/// and is safe to call concurrently.
pub struct FeatureExtractor {
    /// Triangular mel filterbank, shape (N_MELS, N_FFT/2 + 1)
    mel_filters: Array2<f32>,
    /// Hann window of N_FFT samples
    window: Array1<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl FeatureExtractor {
    pub fn new(sample_rate: u32) -> Self {
        let mel_filters = mel_filterbank(N_MELS, sample_rate, FMIN, FMAX);
        let window = hann_window(N_FFT);
        let fft = FftPlanner::new().plan_fft_forward(N_FFT);
        Self {
            mel_filters,
            window,
            fft,
        }
    }

    /// PCM buffer -> normalized log-mel tensor of shape (128, 216).
    pub fn extract(&self, samples: &[f32]) -> Array2<f32> {
        let power = self.power_spectrogram(samples);
        let mel = self.mel_filters.dot(&power);
        let db = power_to_db_ref_max(&mel);
        let norm = min_max_normalize(&db);
        fit_frame_count(norm)
    }

    /// Short-time power spectrum, shape (N_FFT/2 + 1, F) with
    /// F = samples.len() / HOP_LENGTH + 1 (centered framing).
    fn power_spectrogram(&self, samples: &[f32]) -> Array2<f32> {
        // Center the frames: pad half a window of silence on each side so
        // frame k is centered on sample k * HOP_LENGTH.
        let mut padded = vec![0.0f32; samples.len() + N_FFT];
        padded[N_FFT / 2..N_FFT / 2 + samples.len()].copy_from_slice(samples);

        let n_frames = (padded.len() - N_FFT) / HOP_LENGTH + 1;
        let n_freqs = N_FFT / 2 + 1;
        let mut power = Array2::<f32>::zeros((n_freqs, n_frames));

        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); N_FFT];

        for frame_idx in 0..n_frames {
            let start = frame_idx * HOP_LENGTH;
            for (i, b) in buffer.iter_mut().enumerate() {
                *b = Complex::new(padded[start + i] * self.window[i], 0.0);
            }
            self.fft.process_with_scratch(&mut buffer, &mut scratch);

            for (i, c) in buffer.iter().take(n_freqs).enumerate() {
                power[[i, frame_idx]] = c.re * c.re + c.im * c.im;
            }
        }

        power
    }
}

/// Convert a power grid to dB relative to its own maximum, floored at
/// `-TOP_DB`. The loudest cell always maps to 0 dB, so overall recording
/// level does not shift the feature values.
fn power_to_db_ref_max(power: &Array2<f32>) -> Array2<f32> {
    let ref_power = power.iter().cloned().fold(POWER_FLOOR, f32::max);
    let ref_db = 10.0 * ref_power.log10();
    power.mapv(|p| (10.0 * p.max(POWER_FLOOR).log10() - ref_db).max(-TOP_DB))
}

/// Min-max scale the whole grid into [0,1]. The epsilon keeps a flat grid
/// (e.g. silence) at 0 instead of dividing by zero.
fn min_max_normalize(db: &Array2<f32>) -> Array2<f32> {
    let min = db.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = db.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let denom = max - min + NORM_EPSILON;
    db.mapv(|v| (v - min) / denom)
}

/// Force the frame axis to exactly TARGET_FRAMES: zero-pad short grids on
/// the right, center-crop long ones (left floor), identity at the target.
fn fit_frame_count(grid: Array2<f32>) -> Array2<f32> {
    let frames = grid.dim().1;
    match frames.cmp(&TARGET_FRAMES) {
        std::cmp::Ordering::Equal => grid,
        std::cmp::Ordering::Less => {
            let mut out = Array2::<f32>::zeros((grid.dim().0, TARGET_FRAMES));
            out.slice_mut(s![.., ..frames]).assign(&grid);
            out
        }
        std::cmp::Ordering::Greater => {
            let start = (frames - TARGET_FRAMES) / 2;
            grid.slice(s![.., start..start + TARGET_FRAMES]).to_owned()
        }
    }
}

fn hann_window(len: usize) -> Array1<f32> {
    Array1::from_iter((0..len).map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / len as f32).cos())))
}

/// Triangular mel filterbank (HTK mel formula) over [fmin, fmax].
fn mel_filterbank(n_mels: usize, sample_rate: u32, fmin: f32, fmax: f32) -> Array2<f32> {
    let n_freqs = N_FFT / 2 + 1;
    let mut filters = Array2::<f32>::zeros((n_mels, n_freqs));

    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);

    // n_mels + 2 edge points define n_mels triangles
    let hz_points: Vec<f32> = (0..=n_mels + 1)
        .map(|i| mel_min + i as f32 * (mel_max - mel_min) / (n_mels + 1) as f32)
        .map(mel_to_hz)
        .collect();

    let freq_per_bin = sample_rate as f32 / N_FFT as f32;

    for m in 0..n_mels {
        let (left, center, right) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
        for k in 0..n_freqs {
            let freq = k as f32 * freq_per_bin;
            let weight = if freq >= left && freq <= center && center > left {
                (freq - left) / (center - left)
            } else if freq > center && freq <= right && right > center {
                (right - freq) / (right - center)
            } else {
                0.0
            };
            filters[[m, k]] = weight;
        }
    }

    filters
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}
