//! Audio capture module
//!
//! Provides audio recording via cpal, which works with PipeWire,
//! PulseAudio, and ALSA backends, plus the `CaptureSession` that owns the
//! buffer for one recording and feeds the live waveform display.

pub mod cpal_capture;

use crate::config::AudioConfig;
use crate::error::CaptureError;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Trait for audio capture implementations
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing audio.
    /// Returns a channel receiver for audio chunks (f32 samples, mono, 16kHz).
    /// Fails with `DeviceUnavailable` if no input device can be opened.
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, CaptureError>;

    /// Stop capturing and release the device
    async fn stop(&mut self) -> Result<(), CaptureError>;
}

/// Factory function to create audio capture
pub fn create_capture(config: &AudioConfig) -> Result<Box<dyn AudioCapture>, CaptureError> {
    Ok(Box::new(cpal_capture::CpalCapture::new(config)?))
}

/// One recording's audio buffer plus live amplitude sampling.
///
/// The session is fed chunks from the capture receiver, appends them to an
/// unbounded in-memory buffer, and publishes a normalized RMS amplitude per
/// chunk for waveform display. The configured duration ceiling bounds
/// memory: once hit, `append` reports overflow and the daemon force-stops
/// the capture, still dispatching the truncated buffer.
pub struct CaptureSession {
    samples: Vec<f32>,
    sample_rate: u32,
    max_samples: usize,
    amplitude_tx: watch::Sender<f32>,
    max_amplitude: f32,
    finished: bool,
}

/// What `append` observed about the session after taking a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Chunk stored, keep capturing
    Ok,
    /// The duration ceiling was hit; the chunk was truncated to fit
    Overflow,
}

impl CaptureSession {
    pub fn new(config: &AudioConfig) -> Self {
        let (amplitude_tx, _) = watch::channel(0.0);
        Self {
            samples: Vec::new(),
            sample_rate: config.sample_rate,
            max_samples: config.sample_rate as usize * config.max_duration_secs as usize,
            amplitude_tx,
            max_amplitude: 0.1,
            finished: false,
        }
    }

    /// Subscribe to the per-chunk amplitude feed. Values are normalized to
    /// [0, 1] against the loudest chunk seen so far in this session.
    pub fn amplitude(&self) -> watch::Receiver<f32> {
        self.amplitude_tx.subscribe()
    }

    /// Append a chunk of samples, publishing its amplitude.
    /// Chunks arriving after `finish` are dropped.
    pub fn append(&mut self, chunk: &[f32]) -> AppendOutcome {
        if self.finished || chunk.is_empty() {
            return AppendOutcome::Ok;
        }

        let rms = (chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32).sqrt();
        self.max_amplitude = self.max_amplitude.max(rms).max(0.01);
        let _ = self.amplitude_tx.send((rms / self.max_amplitude).min(1.0));

        let remaining = self.max_samples.saturating_sub(self.samples.len());
        if chunk.len() >= remaining {
            self.samples.extend_from_slice(&chunk[..remaining]);
            tracing::warn!(
                "Recording hit the {:.0}s ceiling, truncating",
                self.max_samples as f32 / self.sample_rate as f32
            );
            return AppendOutcome::Overflow;
        }

        self.samples.extend_from_slice(chunk);
        AppendOutcome::Ok
    }

    /// Duration of audio captured so far
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Finalize the session and borrow the buffer. Idempotent: calling it
    /// again returns the same buffer without touching the device.
    pub fn finish(&mut self) -> &[f32] {
        self.finished = true;
        &self.samples
    }

    /// Consume the session into its finalized buffer
    pub fn into_samples(mut self) -> Vec<f32> {
        self.finished = true;
        std::mem::take(&mut self.samples)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
