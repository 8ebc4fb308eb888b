//! Audio decoding and sample-rate conversion
//!
//! Decodes uploaded bytes to a mono PCM buffer at the pipeline's target
//! rate using symphonia, downmixing multi-channel audio by arithmetic
//! mean and resampling with rubato when the native rate differs.

use crate::error::PipelineError;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Target sample rate for the whole pipeline
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Mono PCM buffer owned by a single pipeline invocation
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcmBuffer {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode raw bytes into a mono PCM buffer at [`TARGET_SAMPLE_RATE`].
pub fn decode_to_mono(bytes: Vec<u8>, declared_type: &str) -> Result<PcmBuffer, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::Decode("empty input".to_string()));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_for_mime(declared_type) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PipelineError::Decode(format!("unrecognized container: {e}")))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| PipelineError::Decode("no audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let native_rate = codec_params
        .sample_rate
        .ok_or_else(|| PipelineError::Decode("unknown sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| PipelineError::Decode(format!("unsupported codec: {e}")))?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(PipelineError::Decode(format!("read failed: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet is skippable; anything else aborts
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(PipelineError::Decode(format!("decode failed: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            continue;
        }

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);

        // Downmix to mono: arithmetic mean across channels
        for frame in buf.samples().chunks_exact(channels) {
            mono.push(frame.iter().sum::<f32>() / channels as f32);
        }
    }

    if mono.is_empty() {
        return Err(PipelineError::Decode("no audio samples decoded".to_string()));
    }

    debug!(
        native_rate,
        samples = mono.len(),
        "Decoded audio to mono PCM"
    );

    let samples = resample_mono(mono, native_rate, TARGET_SAMPLE_RATE)?;

    Ok(PcmBuffer {
        samples,
        sample_rate: TARGET_SAMPLE_RATE,
    })
}

/// Single-shot mono resample. Returns the input untouched when the rates
/// already match.
fn resample_mono(samples: Vec<f32>, from: u32, to: u32) -> Result<Vec<f32>, PipelineError> {
    if from == to {
        return Ok(samples);
    }

    debug!("Resampling from {}Hz to {}Hz", from, to);

    let mut resampler = FastFixedIn::<f32>::new(
        to as f64 / from as f64,
        1.0,
        PolynomialDegree::Septic,
        samples.len(),
        1,
    )
    .map_err(|e| PipelineError::Decode(format!("failed to create resampler: {e}")))?;

    let output = resampler
        .process(&[samples], None)
        .map_err(|e| PipelineError::Decode(format!("resampling failed: {e}")))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

/// File extension hint for symphonia's format probe
fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/ogg" => Some("ogg"),
        "audio/webm" => Some("webm"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 16-bit PCM WAV fixture, in memory
    fn wav_bytes(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    fn sine_i16(seconds: f64, sample_rate: u32, freq: f32) -> Vec<i16> {
        let n = (seconds * sample_rate as f64) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                ((2.0 * std::f32::consts::PI * freq * t).sin() * 12000.0) as i16
            })
            .collect()
    }

    #[test]
    fn decodes_mono_wav_at_target_rate() {
        let samples = sine_i16(2.0, 44_100, 1000.0);
        let bytes = wav_bytes(&samples, 44_100, 1);
        let pcm = decode_to_mono(bytes, "audio/wav").unwrap();
        assert_eq!(pcm.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(pcm.samples.len(), samples.len());
        assert!((pcm.duration_seconds() - 2.0).abs() < 0.01);
    }

    #[test]
    fn resamples_low_rate_input() {
        let samples = sine_i16(2.0, 22_050, 1000.0);
        let bytes = wav_bytes(&samples, 22_050, 1);
        let pcm = decode_to_mono(bytes, "audio/wav").unwrap();
        assert_eq!(pcm.sample_rate, TARGET_SAMPLE_RATE);
        // Resampler delay may shave a few frames off the exact 2x length
        assert!((pcm.duration_seconds() - 2.0).abs() < 0.05);
    }

    #[test]
    fn downmixes_stereo_by_mean() {
        // L and R exactly cancel, so the mono mix is silence
        let frames = 44_100;
        let mut interleaved = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            interleaved.push(8000i16);
            interleaved.push(-8000i16);
        }
        let bytes = wav_bytes(&interleaved, 44_100, 2);
        let pcm = decode_to_mono(bytes, "audio/wav").unwrap();
        assert_eq!(pcm.samples.len(), frames);
        let peak = pcm.samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
        assert!(peak < 1e-3, "stereo cancel left peak {peak}");
    }

    #[test]
    fn rejects_garbage_bytes() {
        let err = decode_to_mono(vec![0xde, 0xad, 0xbe, 0xef], "audio/wav").unwrap_err();
        assert_eq!(err.stage_tag(), "decode_error");
    }

    #[test]
    fn rejects_empty_input() {
        let err = decode_to_mono(Vec::new(), "audio/wav").unwrap_err();
        assert_eq!(err.stage_tag(), "decode_error");
    }
}
