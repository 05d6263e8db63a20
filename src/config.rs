//! Configuration loading and types for ihear
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/ihear/config.toml)
//! 3. Environment variables (IHEAR_*)
//! 4. CLI arguments (highest priority)
//!
//! The loaded `Config` is an immutable snapshot: the daemon hands a clone to
//! each session at start, and a reload produces a new validated snapshot
//! rather than mutating shared state. In-flight sessions finish under the
//! snapshot they started with.

use crate::error::IhearError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# ihear Configuration
#
# Location: ~/.config/ihear/config.toml
# All settings can be overridden via CLI flags

[hotkey]
# Key that drives recording. Hold for a quick memo, double-tap to start a
# hands-free continuous memo (single tap stops it).
# Common choices: SCROLLLOCK, PAUSE, RIGHTALT, F13-F24
# Use `evtest` to find key names for your keyboard
key = "SCROLLLOCK"

# Key that cancels an in-progress recording without transcribing
cancel_key = "ESC"

# Two key-down edges within this window enter continuous mode.
# A single press that outlives the window degrades to quick (hold) mode.
double_tap_window_ms = 300

[audio]
# Audio input device ("default" uses system default)
# List devices with: pactl list sources short
device = "default"

# Sample rate in Hz (whisper expects 16000)
sample_rate = 16000

# Maximum recording duration in seconds. Capture is force-stopped at this
# ceiling; the audio recorded so far is still transcribed.
max_duration_secs = 120

[backend]
# Backend selection: "auto", "local", "cloud", or "remote"
# - auto:   remote server if configured, else cloud if a key is set,
#           else local whisper, else fail with a clear error
# - local:  in-process whisper.cpp only (never leaves the machine)
# - cloud:  hosted transcription API only (requires api_key)
# - remote: self-hosted inference server only (requires server_url)
mode = "auto"

# Local whisper model: tiny, base, small, medium, large-v3, large-v3-turbo,
# or an absolute path to a ggml .bin file
local_model = "base.en"

# Model id sent to the cloud transcription API
cloud_model = "whisper-1"

# API key for the cloud backend (or set IHEAR_CLOUD_API_KEY)
# cloud_api_key = "sk-..."

# Self-hosted inference server, e.g. "https://gpu-host:8080"
# server_url = ""

# Bearer token for the self-hosted server (or set IHEAR_SERVER_TOKEN)
# server_token = ""

# TLS certificate verification for the self-hosted server.
# Only disable for servers you control on a trusted network.
verify_tls = true

# Per-request timeout in seconds for every backend attempt
request_timeout_secs = 30.0

[delivery]
# Where finished text goes: "paste" (clipboard + Ctrl+V) or "clipboard"
insert_destination = "paste"

[session]
# Hard ceiling on how long a finished recording may sit in transcription
# before the daemon gives up and is ready for the next memo.
finalize_ceiling_secs = 60

# Generate an extractive summary for each stored memo
summarize = true

# Persist each memo to the transcript library
save = true
"#;

/// Backend selection mode
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// Try remote, then cloud, then local, in that order
    #[default]
    Auto,
    /// In-process whisper.cpp only
    Local,
    /// Hosted transcription API only
    Cloud,
    /// Self-hosted inference server only
    Remote,
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendMode::Auto => write!(f, "auto"),
            BackendMode::Local => write!(f, "local"),
            BackendMode::Cloud => write!(f, "cloud"),
            BackendMode::Remote => write!(f, "remote"),
        }
    }
}

/// Where finished text is delivered
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InsertDestination {
    /// Copy to clipboard, then simulate Ctrl+V
    #[default]
    Paste,
    /// Copy to clipboard only
    Clipboard,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub hotkey: HotkeyConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Hotkey detection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotkeyConfig {
    /// Key name (evdev KEY_* constant name, without the KEY_ prefix)
    #[serde(default = "default_hotkey_key")]
    pub key: String,

    /// Key that cancels an in-progress recording
    #[serde(default = "default_cancel_key")]
    pub cancel_key: String,

    /// Double-tap window W in milliseconds
    #[serde(default = "default_double_tap_window_ms")]
    pub double_tap_window_ms: u64,
}

impl HotkeyConfig {
    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_window_ms)
    }
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            key: default_hotkey_key(),
            cancel_key: default_cancel_key(),
            double_tap_window_ms: default_double_tap_window_ms(),
        }
    }
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// PipeWire/PulseAudio device name, or "default"
    #[serde(default = "default_device")]
    pub device: String,

    /// Sample rate in Hz (whisper expects 16000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Maximum recording duration in seconds (memory safety ceiling)
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
            max_duration_secs: default_max_duration_secs(),
        }
    }
}

/// Transcription backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub mode: BackendMode,

    /// Local whisper model name or absolute .bin path
    #[serde(default = "default_local_model")]
    pub local_model: String,

    /// Model id for the cloud transcription API
    #[serde(default = "default_cloud_model")]
    pub cloud_model: String,

    /// API key for the cloud backend
    #[serde(default)]
    pub cloud_api_key: Option<String>,

    /// Base URL of a self-hosted inference server
    #[serde(default)]
    pub server_url: Option<String>,

    /// Bearer token for the self-hosted server
    #[serde(default)]
    pub server_token: Option<String>,

    /// Verify TLS certificates when talking to the self-hosted server
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Per-request timeout in seconds for every backend attempt
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: f64,
}

impl BackendConfig {
    /// Resolve the cloud API key from config or environment
    pub fn resolved_cloud_api_key(&self) -> Option<String> {
        self.cloud_api_key
            .clone()
            .or_else(|| std::env::var("IHEAR_CLOUD_API_KEY").ok())
    }

    /// Resolve the server bearer token from config or environment
    pub fn resolved_server_token(&self) -> Option<String> {
        self.server_token
            .clone()
            .or_else(|| std::env::var("IHEAR_SERVER_TOKEN").ok())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs.max(0.1))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Auto,
            local_model: default_local_model(),
            cloud_model: default_cloud_model(),
            cloud_api_key: None,
            server_url: None,
            server_token: None,
            verify_tls: true,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Text delivery configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub insert_destination: InsertDestination,
}

/// Session pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Hard ceiling on transcription wait before the daemon returns to idle
    #[serde(default = "default_finalize_ceiling_secs")]
    pub finalize_ceiling_secs: u32,

    /// Generate an extractive summary for each stored memo
    #[serde(default = "default_true")]
    pub summarize: bool,

    /// Persist each memo to the transcript library
    #[serde(default = "default_true")]
    pub save: bool,
}

impl SessionConfig {
    pub fn finalize_ceiling(&self) -> Duration {
        Duration::from_secs(self.finalize_ceiling_secs as u64)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            finalize_ceiling_secs: default_finalize_ceiling_secs(),
            summarize: true,
            save: true,
        }
    }
}

fn default_hotkey_key() -> String {
    "SCROLLLOCK".to_string()
}

fn default_cancel_key() -> String {
    "ESC".to_string()
}

fn default_double_tap_window_ms() -> u64 {
    300
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_max_duration_secs() -> u32 {
    120
}

fn default_local_model() -> String {
    "base.en".to_string()
}

fn default_cloud_model() -> String {
    "whisper-1".to_string()
}

fn default_request_timeout_secs() -> f64 {
    30.0
}

fn default_finalize_ceiling_secs() -> u32 {
    60
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ihear")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ihear")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the data directory path (models, transcript database)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "ihear")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the models directory path
    pub fn models_dir() -> PathBuf {
        Self::data_dir().join("models")
    }

    /// Get the transcript database path
    pub fn db_path() -> PathBuf {
        Self::data_dir().join("transcripts.db")
    }

    /// Ensure config and data directories exist
    pub fn ensure_directories() -> std::io::Result<()> {
        if let Some(config_dir) = Self::config_dir() {
            std::fs::create_dir_all(&config_dir)?;
            tracing::debug!("Ensured config directory exists: {:?}", config_dir);
        }
        let models_dir = Self::models_dir();
        std::fs::create_dir_all(&models_dir)?;
        tracing::debug!("Ensured models directory exists: {:?}", models_dir);
        Ok(())
    }

    /// Check the invariants that must hold before the config can serve a
    /// session. Applied both at startup and before a reload snapshot is
    /// swapped in, so a bad config is never partially applied.
    pub fn validate(&self) -> Result<(), IhearError> {
        match self.backend.mode {
            BackendMode::Remote => {
                let url = self.backend.server_url.as_deref().unwrap_or("");
                if url.is_empty() {
                    return Err(IhearError::Config(
                        "backend.mode = \"remote\" requires backend.server_url".into(),
                    ));
                }
                validate_server_url(url)?;
            }
            BackendMode::Cloud => {
                if self.backend.resolved_cloud_api_key().is_none() {
                    return Err(IhearError::Config(
                        "backend.mode = \"cloud\" requires backend.cloud_api_key \
                         (or IHEAR_CLOUD_API_KEY)"
                            .into(),
                    ));
                }
            }
            BackendMode::Auto | BackendMode::Local => {}
        }

        if let Some(ref url) = self.backend.server_url {
            if !url.is_empty() {
                validate_server_url(url)?;
            }
        }

        if self.backend.request_timeout_secs <= 0.0 {
            return Err(IhearError::Config(
                "backend.request_timeout_secs must be positive".into(),
            ));
        }

        if self.audio.max_duration_secs == 0 {
            return Err(IhearError::Config(
                "audio.max_duration_secs must be at least 1".into(),
            ));
        }

        if self.hotkey.double_tap_window_ms == 0 {
            return Err(IhearError::Config(
                "hotkey.double_tap_window_ms must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

fn validate_server_url(url: &str) -> Result<(), IhearError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(IhearError::Config(format!(
            "backend.server_url must start with http:// or https://, got: {}",
            url
        )));
    }
    Ok(())
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, IhearError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| IhearError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| IhearError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(key) = std::env::var("IHEAR_HOTKEY") {
        config.hotkey.key = key;
    }
    if let Ok(model) = std::env::var("IHEAR_LOCAL_MODEL") {
        config.backend.local_model = model;
    }
    if let Ok(url) = std::env::var("IHEAR_SERVER_URL") {
        config.backend.server_url = Some(url);
    }
    if let Ok(mode) = std::env::var("IHEAR_BACKEND") {
        config.backend.mode = match mode.to_lowercase().as_str() {
            "local" => BackendMode::Local,
            "cloud" => BackendMode::Cloud,
            "remote" => BackendMode::Remote,
            _ => BackendMode::Auto,
        };
    }

    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &Config, path: &Path) -> Result<(), IhearError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| IhearError::Config(format!("Failed to create config dir: {}", e)))?;
    }

    let contents = toml::to_string_pretty(config)
        .map_err(|e| IhearError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, contents)
        .map_err(|e| IhearError::Config(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hotkey.key, "SCROLLLOCK");
        assert_eq!(config.hotkey.double_tap_window_ms, 300);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.backend.mode, BackendMode::Auto);
        assert_eq!(config.delivery.insert_destination, InsertDestination::Paste);
        assert!(config.backend.verify_tls);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_template_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.hotkey.key, "SCROLLLOCK");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
            [hotkey]
            key = "PAUSE"
            double_tap_window_ms = 250

            [audio]
            device = "default"
            sample_rate = 16000
            max_duration_secs = 30

            [backend]
            mode = "remote"
            server_url = "https://gpu-host:8080"
            verify_tls = false
            request_timeout_secs = 5.0

            [delivery]
            insert_destination = "clipboard"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.hotkey.key, "PAUSE");
        assert_eq!(config.hotkey.double_tap_window_ms, 250);
        assert_eq!(config.backend.mode, BackendMode::Remote);
        assert_eq!(
            config.backend.server_url.as_deref(),
            Some("https://gpu-host:8080")
        );
        assert!(!config.backend.verify_tls);
        assert_eq!(
            config.delivery.insert_destination,
            InsertDestination::Clipboard
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_remote_mode_requires_server_url() {
        let mut config = Config::default();
        config.backend.mode = BackendMode::Remote;
        assert!(config.validate().is_err());

        config.backend.server_url = Some("https://gpu-host".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cloud_mode_requires_api_key() {
        let mut config = Config::default();
        config.backend.mode = BackendMode::Cloud;
        config.backend.cloud_api_key = None;
        // Only meaningful when the env fallback is unset; skip otherwise.
        if std::env::var("IHEAR_CLOUD_API_KEY").is_err() {
            assert!(config.validate().is_err());
        }

        config.backend.cloud_api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_url_scheme_rejected() {
        let mut config = Config::default();
        config.backend.mode = BackendMode::Remote;
        config.backend.server_url = Some("gpu-host:8080".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.backend.request_timeout_secs = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            [backend]
            mode = "local"
            local_model = "small.en"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.mode, BackendMode::Local);
        assert_eq!(config.backend.local_model, "small.en");
        assert_eq!(config.hotkey.key, "SCROLLLOCK");
        assert_eq!(config.audio.max_duration_secs, 120);
    }
}
