//! Backend dispatcher
//!
//! Owns the configured adapters and applies the selection policy:
//! - explicit mode pins a single adapter
//! - auto mode tries remote, then cloud, then local, in that order
//! - transient failures (timeout, network) are retried once per adapter
//! - every attempt runs on a blocking task under a wall-clock timeout

use super::{BackendKind, BackendResult, Transcriber};
use crate::config::{BackendMode, Config};
use crate::error::DispatchError;
use std::sync::Arc;
use std::time::Duration;

/// Dispatches transcription requests to an ordered list of adapters
pub struct Dispatcher {
    adapters: Vec<Arc<dyn Transcriber>>,
    timeout: Duration,
}

impl Dispatcher {
    /// Build a dispatcher from an explicit adapter list
    pub fn new(
        adapters: Vec<Arc<dyn Transcriber>>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        if adapters.is_empty() {
            return Err(DispatchError::NoBackendAvailable);
        }
        Ok(Self { adapters, timeout })
    }

    /// Resolve adapters from the active configuration
    ///
    /// In auto mode an adapter that cannot be constructed (no server URL,
    /// no API key, missing model file) is skipped with a warning. In an
    /// explicit mode a construction failure is fatal, so a cloud mode
    /// without a key fails here before any audio is captured.
    pub fn from_config(config: &Config) -> Result<Self, DispatchError> {
        let timeout = config.backend.request_timeout();
        let mut adapters: Vec<Arc<dyn Transcriber>> = Vec::new();

        match config.backend.mode {
            BackendMode::Auto => {
                if config.backend.server_url.is_some() {
                    match super::remote::RemoteTranscriber::new(&config.backend) {
                        Ok(t) => adapters.push(Arc::new(t)),
                        Err(e) => tracing::warn!("Skipping remote backend: {}", e),
                    }
                }
                if config.backend.resolved_cloud_api_key().is_some() {
                    match super::cloud::CloudTranscriber::new(&config.backend) {
                        Ok(t) => adapters.push(Arc::new(t)),
                        Err(e) => tracing::warn!("Skipping cloud backend: {}", e),
                    }
                }
                match super::whisper::WhisperTranscriber::new(&config.backend) {
                    Ok(t) => adapters.push(Arc::new(t)),
                    Err(e) => tracing::warn!("Skipping local backend: {}", e),
                }
            }
            BackendMode::Local => {
                adapters.push(Arc::new(super::whisper::WhisperTranscriber::new(
                    &config.backend,
                )?));
            }
            BackendMode::Cloud => {
                adapters.push(Arc::new(super::cloud::CloudTranscriber::new(
                    &config.backend,
                )?));
            }
            BackendMode::Remote => {
                adapters.push(Arc::new(super::remote::RemoteTranscriber::new(
                    &config.backend,
                )?));
            }
        }

        tracing::info!(
            "Dispatcher ready: backends={:?}, timeout={:.0}s",
            adapters.iter().map(|a| a.kind()).collect::<Vec<_>>(),
            timeout.as_secs_f64()
        );

        Self::new(adapters, timeout)
    }

    /// The adapters that will be tried, in order
    pub fn backend_kinds(&self) -> Vec<BackendKind> {
        self.adapters.iter().map(|a| a.kind()).collect()
    }

    /// Transcribe the buffer, walking the adapter chain
    ///
    /// Returns the first success along with which adapter produced it.
    /// When every adapter fails the per-adapter failures are collected
    /// into [`DispatchError::Exhausted`]; a single pinned adapter's
    /// failure propagates unwrapped.
    pub async fn transcribe(&self, samples: Arc<Vec<f32>>) -> Result<BackendResult, DispatchError> {
        if samples.is_empty() {
            return Err(DispatchError::AudioFormat("Empty audio buffer".into()));
        }

        let mut attempts: Vec<(BackendKind, String)> = Vec::new();

        for adapter in &self.adapters {
            let kind = adapter.kind();

            let mut result = self.attempt(adapter.clone(), samples.clone()).await;

            if let Err(ref e) = result {
                if e.is_transient() {
                    tracing::warn!("{} backend failed transiently, retrying once: {}", kind, e);
                    result = self.attempt(adapter.clone(), samples.clone()).await;
                }
            }

            match result {
                Ok(text) => {
                    return Ok(BackendResult {
                        text,
                        backend_used: kind,
                    });
                }
                Err(e) => {
                    tracing::warn!("{} backend failed: {}", kind, e);
                    if self.adapters.len() == 1 {
                        return Err(e);
                    }
                    attempts.push((kind, e.to_string()));
                }
            }
        }

        Err(DispatchError::Exhausted { attempts })
    }

    /// Run one adapter attempt on a blocking task with a timeout
    ///
    /// On timeout the task is left to finish in the background and its
    /// result is discarded; blocking inference cannot be interrupted.
    async fn attempt(
        &self,
        adapter: Arc<dyn Transcriber>,
        samples: Arc<Vec<f32>>,
    ) -> Result<String, DispatchError> {
        let kind = adapter.kind();
        let task = tokio::task::spawn_blocking(move || adapter.transcribe(&samples));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(DispatchError::InferenceFailed(format!(
                "{} worker panicked: {}",
                kind, join_err
            ))),
            Err(_) => Err(DispatchError::Timeout {
                backend: kind,
                timeout_secs: self.timeout.as_secs_f64(),
            }),
        }
    }
}
