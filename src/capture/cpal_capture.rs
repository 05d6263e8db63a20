//! cpal-based audio capture
//!
//! Uses the cpal crate for cross-platform audio input.
//! Works with PipeWire, PulseAudio, and ALSA backends.
//!
//! Note: cpal::Stream is not Send, so the stream lives on a dedicated
//! thread and chunks flow out through a channel. Buffering is the
//! `CaptureSession`'s job; this type only produces mono 16kHz chunks.

use super::AudioCapture;
use crate::config::AudioConfig;
use crate::error::CaptureError;
use std::thread;
use tokio::sync::{mpsc, oneshot};

/// Commands sent to the audio capture thread
enum CaptureCommand {
    Stop(oneshot::Sender<()>),
}

/// cpal-based audio capture implementation
pub struct CpalCapture {
    config: AudioConfig,
    cmd_tx: Option<std::sync::mpsc::Sender<CaptureCommand>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl CpalCapture {
    pub fn new(config: &AudioConfig) -> Result<Self, CaptureError> {
        Ok(Self {
            config: config.clone(),
            cmd_tx: None,
            thread_handle: None,
        })
    }
}

/// Find an audio input device by name.
///
/// Matches exactly first, then case-insensitively, then by substring, so
/// users can give either full cpal names or PipeWire short names.
fn find_audio_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, CaptureError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
        .collect();

    let search_lower = device_name.to_lowercase();

    let matched = devices.iter().position(|d| {
        d.name().map(|n| n == device_name).unwrap_or(false)
    });
    let matched = matched.or_else(|| {
        devices
            .iter()
            .position(|d| d.name().map(|n| n.to_lowercase() == search_lower).unwrap_or(false))
    });
    let matched = matched.or_else(|| {
        devices.iter().position(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(&search_lower))
                .unwrap_or(false)
        })
    });

    match matched {
        Some(idx) => {
            let device = devices.into_iter().nth(idx).expect("index from position");
            tracing::debug!(
                "Found audio device: {}",
                device.name().unwrap_or_else(|_| "unknown".to_string())
            );
            Ok(device)
        }
        None => {
            let available: Vec<String> =
                devices.iter().filter_map(|d| d.name().ok()).collect();
            Err(CaptureError::DeviceUnavailable(format!(
                "'{}' not found (available: {})",
                device_name,
                if available.is_empty() {
                    "none".to_string()
                } else {
                    available.join(", ")
                }
            )))
        }
    }
}

#[async_trait::async_trait]
impl AudioCapture for CpalCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, CaptureError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();

        let device = if self.config.device == "default" {
            host.default_input_device()
                .ok_or_else(|| CaptureError::DeviceUnavailable("no default input".to_string()))?
        } else {
            find_audio_device(&host, &self.config.device)?
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("Using audio device: {}", device_name);

        let supported_config = device
            .default_input_config()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let source_sample_rate = supported_config.sample_rate().0;
        let source_channels = supported_config.channels() as usize;
        let target_sample_rate = self.config.sample_rate;
        let sample_format = supported_config.sample_format();

        tracing::debug!(
            "Device config: {} Hz, {} channel(s), format: {:?}",
            source_sample_rate,
            source_channels,
            sample_format
        );

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<CaptureCommand>();

        let thread_handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_fn = |err| tracing::error!("Audio stream error: {}", err);

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(
                    &device,
                    &stream_config,
                    chunk_tx,
                    source_sample_rate,
                    target_sample_rate,
                    source_channels,
                    err_fn,
                ),
                cpal::SampleFormat::I16 => build_stream::<i16>(
                    &device,
                    &stream_config,
                    chunk_tx,
                    source_sample_rate,
                    target_sample_rate,
                    source_channels,
                    err_fn,
                ),
                cpal::SampleFormat::U16 => build_stream::<u16>(
                    &device,
                    &stream_config,
                    chunk_tx,
                    source_sample_rate,
                    target_sample_rate,
                    source_channels,
                    err_fn,
                ),
                format => {
                    tracing::error!("Unsupported sample format: {:?}", format);
                    return;
                }
            };

            let stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to build audio stream: {}", e);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                tracing::error!("Failed to start audio stream: {}", e);
                return;
            }

            tracing::debug!("Audio capture thread started");

            if let Ok(CaptureCommand::Stop(done_tx)) = cmd_rx.recv() {
                drop(stream);
                let _ = done_tx.send(());
            }

            tracing::debug!("Audio capture thread stopped");
        });

        self.cmd_tx = Some(cmd_tx);
        self.thread_handle = Some(thread_handle);

        Ok(chunk_rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(cmd_tx) = self.cmd_tx.take() {
            let (done_tx, done_rx) = oneshot::channel();

            if cmd_tx.send(CaptureCommand::Stop(done_tx)).is_ok() {
                match tokio::time::timeout(std::time::Duration::from_secs(2), done_rx).await {
                    Ok(_) => {}
                    Err(_) => {
                        return Err(CaptureError::Stream(
                            "capture thread did not stop within 2s".to_string(),
                        ))
                    }
                }
            }
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        Ok(())
    }
}

/// Build an input stream for a specific sample type
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: mpsc::Sender<Vec<f32>>,
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Convert to f32 and mix to mono
                let mono_f32: Vec<f32> = data
                    .chunks(source_channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / source_channels as f32
                    })
                    .collect();

                let resampled = if source_rate != target_rate {
                    resample(&mono_f32, source_rate, target_rate)
                } else {
                    mono_f32
                };

                // Receiver gone means the session ended; drop the chunk
                let _ = tx.try_send(resampled);
            },
            err_fn,
            None,
        )
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

    Ok(stream)
}

/// Linear interpolation resampling
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}
