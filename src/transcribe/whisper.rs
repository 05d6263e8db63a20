//! Local whisper.cpp inference via the whisper-rs crate
//!
//! Loads the ggml model once at construction and reuses the context
//! across recordings.

use super::{BackendKind, Transcriber};
use crate::config::{BackendConfig, Config};
use crate::error::DispatchError;
use std::path::PathBuf;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Whisper-based local transcriber
pub struct WhisperTranscriber {
    /// Whisper context (holds the model)
    ctx: WhisperContext,
    /// Number of threads to use
    threads: usize,
    /// "en" for English-only models, "auto" otherwise
    language: &'static str,
}

impl WhisperTranscriber {
    /// Create a new whisper transcriber, loading the configured model
    pub fn new(config: &BackendConfig) -> Result<Self, DispatchError> {
        let model_path = resolve_model_path(&config.local_model)?;

        tracing::info!("Loading whisper model from {:?}", model_path);
        let start = std::time::Instant::now();

        let ctx = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| DispatchError::ModelNotFound("Invalid path".to_string()))?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| DispatchError::ModelNotFound(format!("{:?}: {}", model_path, e)))?;

        tracing::info!("Model loaded in {:.2}s", start.elapsed().as_secs_f32());

        let threads = num_cpus::get().min(4);
        let language = model_language(&config.local_model);

        Ok(Self {
            ctx,
            threads,
            language,
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn transcribe(&self, samples: &[f32]) -> Result<String, DispatchError> {
        if samples.is_empty() {
            return Err(DispatchError::AudioFormat("Empty audio buffer".to_string()));
        }

        let duration_secs = samples.len() as f32 / 16000.0;
        tracing::debug!(
            "Transcribing {:.2}s of audio ({} samples)",
            duration_secs,
            samples.len()
        );

        let start = std::time::Instant::now();

        // Each transcription gets its own state so the context stays reusable
        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| DispatchError::InferenceFailed(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(self.language));
        params.set_n_threads(self.threads as i32);

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        params.set_suppress_blank(true);
        params.set_suppress_nst(true);

        // Short memos fit a single segment
        if duration_secs < 30.0 {
            params.set_single_segment(true);
        }

        state
            .full(params, samples)
            .map_err(|e| DispatchError::InferenceFailed(e.to_string()))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(
                segment
                    .to_str()
                    .map_err(|e| DispatchError::InferenceFailed(e.to_string()))?,
            );
        }

        let result = text.trim().to_string();

        tracing::info!(
            "Local transcription completed in {:.2}s ({} chars)",
            start.elapsed().as_secs_f32(),
            result.chars().count()
        );

        Ok(result)
    }
}

/// Language hint for a model: English-only models (the `.en` variants) are
/// pinned to English, multilingual models auto-detect
fn model_language(model: &str) -> &'static str {
    let stem = model.strip_suffix(".bin").unwrap_or(model);
    if stem.ends_with(".en") {
        "en"
    } else {
        "auto"
    }
}

/// Resolve a model name or path to the ggml model file on disk
pub fn resolve_model_path(model: &str) -> Result<PathBuf, DispatchError> {
    // Absolute paths are used directly
    let path = PathBuf::from(model);
    if path.is_absolute() && path.exists() {
        return Ok(path);
    }

    let model_filename = match model {
        "tiny" => "ggml-tiny.bin",
        "tiny.en" => "ggml-tiny.en.bin",
        "base" => "ggml-base.bin",
        "base.en" => "ggml-base.en.bin",
        "small" => "ggml-small.bin",
        "small.en" => "ggml-small.en.bin",
        "medium" => "ggml-medium.bin",
        "medium.en" => "ggml-medium.en.bin",
        "large" | "large-v1" => "ggml-large-v1.bin",
        "large-v2" => "ggml-large-v2.bin",
        "large-v3" => "ggml-large-v3.bin",
        "large-v3-turbo" => "ggml-large-v3-turbo.bin",
        other if other.ends_with(".bin") => other,
        other => {
            return Err(DispatchError::ModelNotFound(format!(
                "Unknown model: '{}'. Valid models: tiny, base, small, medium, large-v3, large-v3-turbo",
                other
            )));
        }
    };

    let models_dir = Config::models_dir();
    let model_path = models_dir.join(model_filename);

    if model_path.exists() {
        return Ok(model_path);
    }

    // Also check the current directory
    let cwd_path = PathBuf::from(model_filename);
    if cwd_path.exists() {
        return Ok(cwd_path);
    }

    Err(DispatchError::ModelNotFound(format!(
        "Model file '{}' not found in {:?}. Download it with:\n  curl -L -o {:?} https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        model_filename,
        models_dir,
        models_dir.join(model_filename),
        model_filename
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_language_from_name() {
        assert_eq!(model_language("base.en"), "en");
        assert_eq!(model_language("tiny.en"), "en");
        assert_eq!(model_language("base"), "auto");
        assert_eq!(model_language("large-v3"), "auto");
        assert_eq!(model_language("/models/ggml-small.en.bin"), "en");
        assert_eq!(model_language("/models/ggml-medium.bin"), "auto");
    }

    #[test]
    fn test_resolve_unknown_model_name() {
        let err = resolve_model_path("no-such-model").unwrap_err();
        assert!(err.to_string().contains("Unknown model"));
    }

    #[test]
    fn test_resolve_missing_model_file() {
        let err = resolve_model_path("tiny.en").unwrap_err();
        // Either found locally (unlikely in CI) or a helpful download hint
        assert!(err.to_string().contains("ggml-tiny.en.bin"));
    }
}
