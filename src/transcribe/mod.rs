//! Speech-to-text backends and the dispatcher that selects between them
//!
//! Three adapters share one trait:
//! - Local whisper.cpp inference (whisper-rs crate)
//! - OpenAI-compatible cloud API
//! - Self-hosted ihear server
//!
//! The [`dispatch::Dispatcher`] owns the adapters and implements the
//! fallback and retry policy.

pub mod cloud;
pub mod dispatch;
pub mod remote;
pub mod whisper;

pub use dispatch::Dispatcher;

use crate::error::DispatchError;
use std::io::Cursor;

/// Which backend family an adapter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Cloud,
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Cloud => write!(f, "cloud"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

/// Outcome of a successful dispatch, including which adapter answered
#[derive(Debug, Clone)]
pub struct BackendResult {
    pub text: String,
    pub backend_used: BackendKind,
}

/// Trait for speech-to-text implementations
///
/// Input: f32 samples, mono, 16kHz. Implementations are blocking; the
/// dispatcher runs them on a blocking task with a timeout.
pub trait Transcriber: Send + Sync {
    /// Which backend family this adapter is
    fn kind(&self) -> BackendKind;

    /// Transcribe audio samples to text
    fn transcribe(&self, samples: &[f32]) -> Result<String, DispatchError>;
}

/// Encode f32 samples to 16-bit PCM WAV at 16kHz
pub fn encode_wav(samples: &[f32]) -> Result<Vec<u8>, DispatchError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut buffer, spec)
        .map_err(|e| DispatchError::AudioFormat(format!("Failed to create WAV writer: {}", e)))?;

    // Convert f32 [-1.0, 1.0] to i16
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let scaled = (clamped * i16::MAX as f32) as i16;
        writer
            .write_sample(scaled)
            .map_err(|e| DispatchError::AudioFormat(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| DispatchError::AudioFormat(format!("Failed to finalize WAV: {}", e)))?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wav_basic() {
        // One second of a 440Hz sine
        let samples: Vec<f32> = (0..16000)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * 0.5)
            .collect();

        let wav = encode_wav(&samples).unwrap();

        // 44-byte header plus 16000 samples * 2 bytes
        assert_eq!(wav.len(), 44 + 32000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }

    #[test]
    fn test_encode_wav_clamps_out_of_range() {
        let samples = vec![2.0f32, -2.0];
        let wav = encode_wav(&samples).unwrap();
        let hi = i16::from_le_bytes([wav[44], wav[45]]);
        let lo = i16::from_le_bytes([wav[46], wav[47]]);
        assert_eq!(hi, i16::MAX);
        assert_eq!(lo, -i16::MAX);
    }

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Local.to_string(), "local");
        assert_eq!(BackendKind::Cloud.to_string(), "cloud");
        assert_eq!(BackendKind::Remote.to_string(), "remote");
    }
}
