//! Signal conditioning applied after decode and before feature extraction
//!
//! Two steps, in order: peak normalization and a first-order pre-emphasis
//! filter. Both operate in place on the mono sample buffer.

/// Epsilon added to the peak before dividing, so an all-zero (silent)
/// buffer passes through unchanged instead of dividing by zero.
const PEAK_EPSILON: f32 = 1e-9;

/// Pre-emphasis filter coefficient
pub const PREEMPHASIS_COEF: f32 = 0.97;

/// Scale the buffer so the maximum absolute sample is ~1.0.
pub fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    let scale = 1.0 / (peak + PEAK_EPSILON);
    for s in samples.iter_mut() {
        *s *= scale;
    }
}

/// Apply `y[n] = x[n] - coef * x[n-1]`, boosting high-frequency content
/// ahead of spectral analysis. The first sample is left unchanged.
pub fn preemphasis(samples: &mut [f32], coef: f32) {
    let mut prev = 0.0f32;
    for s in samples.iter_mut() {
        let current = *s;
        *s = current - coef * prev;
        prev = current;
    }
}

/// Full conditioning pass: peak-normalize then pre-emphasize.
pub fn condition(samples: &mut [f32]) {
    peak_normalize(samples);
    preemphasis(samples, PREEMPHASIS_COEF);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_normalize_reaches_unity() {
        let mut samples = vec![0.1, -0.4, 0.25];
        peak_normalize(&mut samples);
        let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
        assert!((peak - 1.0).abs() < 1e-5, "peak was {peak}");
    }

    #[test]
    fn peak_normalize_silent_input_stays_zero() {
        let mut samples = vec![0.0f32; 128];
        peak_normalize(&mut samples);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn preemphasis_first_sample_unchanged() {
        let mut samples = vec![0.5, 0.5, 0.5];
        preemphasis(&mut samples, PREEMPHASIS_COEF);
        assert_eq!(samples[0], 0.5);
        assert!((samples[1] - (0.5 - 0.97 * 0.5)).abs() < 1e-6);
        assert!((samples[2] - (0.5 - 0.97 * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn preemphasis_attenuates_dc() {
        // A constant signal is (almost) removed, a fast-alternating one is boosted
        let mut dc = vec![1.0f32; 1000];
        preemphasis(&mut dc, PREEMPHASIS_COEF);
        let dc_energy: f32 = dc[1..].iter().map(|s| s * s).sum();

        let mut nyquist: Vec<f32> = (0..1000).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        preemphasis(&mut nyquist, PREEMPHASIS_COEF);
        let hf_energy: f32 = nyquist[1..].iter().map(|s| s * s).sum();

        assert!(dc_energy < hf_energy / 100.0);
    }

    #[test]
    fn conditioned_output_is_deterministic() {
        let input: Vec<f32> = (0..4410).map(|i| (i as f32 * 0.01).sin() * 0.3).collect();
        let mut a = input.clone();
        let mut b = input;
        condition(&mut a);
        condition(&mut b);
        assert_eq!(a, b);
    }
}
