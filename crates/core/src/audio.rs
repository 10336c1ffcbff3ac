//! PCM16 conversion and frame math
//!
//! Both directions of the duplex stream carry 16-bit signed little-endian
//! mono PCM at a fixed rate. Capture converts float blocks to PCM16 before
//! they leave the audio thread; playback decodes inbound chunks back to
//! float samples for scheduling.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bytes per PCM16 sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// Normalization constant for decoding PCM16 to [-1.0, 1.0]
const PCM16_NORMALIZE: f32 = 32768.0;

/// Scale constant for non-negative samples when encoding
const PCM16_SCALE: f32 = 32767.0;

/// Supported audio sample rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SampleRate {
    /// 16kHz - standard speech recognition
    Hz16000,
    /// 24kHz - conversational agent wire format
    #[default]
    Hz24000,
    /// 48kHz - professional audio
    Hz48000,
}

impl SampleRate {
    /// Get sample rate as u32
    pub fn as_u32(&self) -> u32 {
        match self {
            SampleRate::Hz16000 => 16000,
            SampleRate::Hz24000 => 24000,
            SampleRate::Hz48000 => 48000,
        }
    }
}

/// Audio encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// 16-bit signed PCM (little-endian)
    #[default]
    Linear16,
}

impl AudioEncoding {
    /// Wire name used in the configuration message
    pub fn wire_name(&self) -> &'static str {
        match self {
            AudioEncoding::Linear16 => "linear16",
        }
    }
}

/// Convert float samples to PCM16 little-endian bytes.
///
/// Samples are clamped to [-1.0, 1.0]. Negative values scale by 32768,
/// non-negative by 32767, so both full-scale extremes map onto the i16
/// range without overflow.
pub fn pcm16_from_f32(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let scaled = if clamped < 0.0 {
            clamped * PCM16_NORMALIZE
        } else {
            clamped * PCM16_SCALE
        };
        bytes.extend_from_slice(&(scaled as i16).to_le_bytes());
    }
    bytes
}

/// Decode PCM16 little-endian bytes to float samples in [-1.0, 1.0].
///
/// A trailing odd byte is ignored; length validation is the caller's
/// responsibility.
pub fn f32_from_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|chunk| {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            sample as f32 / PCM16_NORMALIZE
        })
        .collect()
}

/// Playback duration of a PCM16 byte buffer at the given rate
pub fn pcm16_duration(byte_len: usize, rate: SampleRate) -> Duration {
    let samples = byte_len / BYTES_PER_SAMPLE;
    Duration::from_secs_f64(samples as f64 / rate.as_u32() as f64)
}
