//! Remote transcription via a self-hosted ihear server
//!
//! Sends audio to POST {server_url}/transcriptions as multipart form
//! data with optional Bearer authentication. The daemon persists
//! transcripts locally, so the server is asked not to save or
//! summarise.
//!
//! TLS verification can be disabled for self-signed certificates on
//! trusted networks via backend.verify_tls.

use super::{encode_wav, BackendKind, Transcriber};
use crate::config::BackendConfig;
use crate::error::DispatchError;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Remote transcriber talking to a self-hosted ihear server
pub struct RemoteTranscriber {
    /// Base server URL (e.g. "https://gpu-host:8080")
    server_url: String,
    /// Optional Bearer token
    token: Option<String>,
    /// Request timeout
    timeout: Duration,
    /// HTTP agent, built once so the TLS connector is reused
    agent: ureq::Agent,
}

impl RemoteTranscriber {
    /// Create a new remote transcriber from config
    pub fn new(config: &BackendConfig) -> Result<Self, DispatchError> {
        let server_url = config
            .server_url
            .as_ref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                DispatchError::Config(
                    "backend.server_url is required for the remote backend".into(),
                )
            })?
            .trim_end_matches('/')
            .to_string();

        if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
            return Err(DispatchError::Config(format!(
                "backend.server_url must start with http:// or https://, got: {}",
                server_url
            )));
        }

        if server_url.starts_with("http://")
            && !server_url.contains("localhost")
            && !server_url.contains("127.0.0.1")
            && !server_url.contains("[::1]")
        {
            tracing::warn!(
                "Server URL uses HTTP without TLS. Audio will be transmitted unencrypted!"
            );
        }

        let timeout = config.request_timeout();

        let mut builder = ureq::AgentBuilder::new().timeout(timeout);
        if !config.verify_tls {
            tracing::warn!("TLS certificate verification is disabled for {}", server_url);
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|e| {
                    DispatchError::Config(format!("failed to build TLS connector: {}", e))
                })?;
            builder = builder.tls_connector(Arc::new(connector));
        }

        Ok(Self {
            server_url,
            token: config.resolved_server_token(),
            timeout,
            agent: builder.build(),
        })
    }

    /// Build the multipart form body for POST /transcriptions
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

        // The daemon stores and summarises locally
        for (name, value) in [("summarise", "false"), ("save", "false")] {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        (boundary, body)
    }
}

impl Transcriber for RemoteTranscriber {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn transcribe(&self, samples: &[f32]) -> Result<String, DispatchError> {
        if samples.is_empty() {
            return Err(DispatchError::AudioFormat("Empty audio buffer".into()));
        }

        let duration_secs = samples.len() as f32 / 16000.0;
        tracing::debug!(
            "Sending {:.2}s of audio to {} ({} samples)",
            duration_secs,
            self.server_url,
            samples.len()
        );

        let start = std::time::Instant::now();

        let wav_data = encode_wav(samples)?;
        let (boundary, body) = self.build_multipart_body(&wav_data);

        let url = format!("{}/transcriptions", self.server_url);

        let mut request = self.agent.post(&url).timeout(self.timeout).set(
            "Content-Type",
            &format!("multipart/form-data; boundary={}", boundary),
        );

        if let Some(ref token) = self.token {
            request = request.set("Authorization", &format!("Bearer {}", token));
        }

        let response = request.send_bytes(&body).map_err(|e| match e {
            ureq::Error::Status(401, resp) | ureq::Error::Status(403, resp) => {
                DispatchError::AuthFailure {
                    backend: BackendKind::Remote,
                    message: resp.into_string().unwrap_or_default(),
                }
            }
            ureq::Error::Status(code, resp) => DispatchError::InvalidResponse {
                backend: BackendKind::Remote,
                message: format!(
                    "server returned {}: {}",
                    code,
                    resp.into_string().unwrap_or_default()
                ),
            },
            ureq::Error::Transport(t) => DispatchError::Network {
                backend: BackendKind::Remote,
                message: t.to_string(),
            },
        })?;

        let json: Value =
            response
                .into_json()
                .map_err(|e| DispatchError::InvalidResponse {
                    backend: BackendKind::Remote,
                    message: format!("failed to parse response: {}", e),
                })?;

        let text = json
            .get("transcript")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DispatchError::InvalidResponse {
                backend: BackendKind::Remote,
                message: format!("response missing 'transcript' field: {}", json),
            })?
            .trim()
            .to_string();

        tracing::info!(
            "Remote transcription completed in {:.2}s ({} chars)",
            start.elapsed().as_secs_f32(),
            text.chars().count()
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_url(url: &str) -> BackendConfig {
        BackendConfig {
            server_url: Some(url.to_string()),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn test_missing_server_url_rejected() {
        let config = BackendConfig::default();
        let result = RemoteTranscriber::new(&config);
        assert!(matches!(result, Err(DispatchError::Config(_))));
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        let result = RemoteTranscriber::new(&config_with_url("gpu-host:8080"));
        assert!(matches!(result, Err(DispatchError::Config(_))));
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let transcriber =
            RemoteTranscriber::new(&config_with_url("http://localhost:8080/")).unwrap();
        assert_eq!(transcriber.server_url, "http://localhost:8080");
    }

    #[test]
    fn test_token_from_config() {
        let mut config = config_with_url("http://localhost:8080");
        config.server_token = Some("secret".to_string());
        let transcriber = RemoteTranscriber::new(&config).unwrap();
        assert_eq!(transcriber.token, Some("secret".to_string()));
    }

    #[test]
    fn test_multipart_body_structure() {
        let transcriber =
            RemoteTranscriber::new(&config_with_url("http://localhost:8080")).unwrap();
        let wav_data = vec![0u8; 100];

        let (boundary, body) = transcriber.build_multipart_body(&wav_data);
        let body_str = String::from_utf8_lossy(&body);

        assert!(body_str.contains(&boundary));
        assert!(body_str.contains("name=\"file\""));
        assert!(body_str.contains("name=\"summarise\""));
        assert!(body_str.contains("name=\"save\""));
        assert!(body_str.ends_with(&format!("--{}--\r\n", boundary)));
    }
}
