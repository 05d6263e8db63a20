//! Cloud speech-to-text via an OpenAI-compatible transcription API
//!
//! Sends audio as multipart form data to /v1/audio/transcriptions with
//! Bearer authentication. Construction fails when no API key is
//! resolvable, so misconfiguration surfaces before any network traffic.

use super::{encode_wav, BackendKind, Transcriber};
use crate::config::BackendConfig;
use crate::error::DispatchError;
use std::time::Duration;
use serde_json::Value;

const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Cloud transcriber using an OpenAI-compatible Whisper API
pub struct CloudTranscriber {
    /// Model name to send
    model: String,
    /// API key sent as a Bearer token
    api_key: String,
    /// Request timeout
    timeout: Duration,
}

impl CloudTranscriber {
    /// Create a new cloud transcriber from config
    pub fn new(config: &BackendConfig) -> Result<Self, DispatchError> {
        Self::with_key(config, config.resolved_cloud_api_key())
    }

    /// Construction from an already-resolved key, so tests can exercise
    /// the missing-key path without touching the process environment
    fn with_key(
        config: &BackendConfig,
        api_key: Option<String>,
    ) -> Result<Self, DispatchError> {
        let api_key = api_key.ok_or_else(|| DispatchError::AuthFailure {
            backend: BackendKind::Cloud,
            message: "no API key configured. Set backend.cloud_api_key or IHEAR_CLOUD_API_KEY"
                .into(),
        })?;

        Ok(Self {
            model: config.cloud_model.clone(),
            api_key,
            timeout: config.request_timeout(),
        })
    }

    /// Build the multipart form body for the API request
    fn build_multipart_body(&self, wav_data: &[u8]) -> (String, Vec<u8>) {
        let boundary = format!(
            "----IhearBoundary{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );

        let mut body = Vec::new();

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"audio.wav\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(wav_data);
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"model\"\r\n\r\n");
        body.extend_from_slice(self.model.as_bytes());
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"response_format\"\r\n\r\n");
        body.extend_from_slice(b"json\r\n");

        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        (boundary, body)
    }
}

impl Transcriber for CloudTranscriber {
    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    fn transcribe(&self, samples: &[f32]) -> Result<String, DispatchError> {
        if samples.is_empty() {
            return Err(DispatchError::AudioFormat("Empty audio buffer".into()));
        }

        let duration_secs = samples.len() as f32 / 16000.0;
        tracing::debug!(
            "Sending {:.2}s of audio to cloud API ({} samples)",
            duration_secs,
            samples.len()
        );

        let start = std::time::Instant::now();

        let wav_data = encode_wav(samples)?;
        let (boundary, body) = self.build_multipart_body(&wav_data);

        let url = format!("{}/v1/audio/transcriptions", DEFAULT_API_BASE);

        let response = ureq::post(&url)
            .timeout(self.timeout)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_bytes(&body)
            .map_err(|e| match e {
                ureq::Error::Status(401, resp) | ureq::Error::Status(403, resp) => {
                    DispatchError::AuthFailure {
                        backend: BackendKind::Cloud,
                        message: resp.into_string().unwrap_or_default(),
                    }
                }
                ureq::Error::Status(429, resp) => DispatchError::QuotaExceeded {
                    backend: BackendKind::Cloud,
                    message: resp.into_string().unwrap_or_default(),
                },
                ureq::Error::Status(code, resp) => DispatchError::InvalidResponse {
                    backend: BackendKind::Cloud,
                    message: format!(
                        "server returned {}: {}",
                        code,
                        resp.into_string().unwrap_or_default()
                    ),
                },
                ureq::Error::Transport(t) => DispatchError::Network {
                    backend: BackendKind::Cloud,
                    message: t.to_string(),
                },
            })?;

        let json: Value =
            response
                .into_json()
                .map_err(|e| DispatchError::InvalidResponse {
                    backend: BackendKind::Cloud,
                    message: format!("failed to parse response: {}", e),
                })?;

        let text = json
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DispatchError::InvalidResponse {
                backend: BackendKind::Cloud,
                message: format!("response missing 'text' field: {}", json),
            })?
            .trim()
            .to_string();

        tracing::info!(
            "Cloud transcription completed in {:.2}s ({} chars)",
            start.elapsed().as_secs_f32(),
            text.chars().count()
        );

        Ok(text)
    }
}
