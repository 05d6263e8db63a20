//! Error types for ihear
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use crate::transcribe::BackendKind;
use thiserror::Error;

/// Top-level error type for the ihear application
#[derive(Error, Debug)]
pub enum IhearError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Audio capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Transcription error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Delivery error: {0}")]
    Deliver(#[from] DeliverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to hotkey detection
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("Unknown key name: '{0}'. Use evtest or wev to find valid key names.")]
    UnknownKey(String),

    #[error("No keyboard device found in /dev/input/")]
    NoKeyboard,

    #[error("evdev error: {0}")]
    Evdev(String),
}

/// Errors related to audio capture
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Microphone unavailable: {0}. List devices with: pactl list sources short")]
    DeviceUnavailable(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}

/// Errors produced by the backend dispatcher and its adapters
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Transient: the adapter did not answer within the request timeout
    #[error("{backend} backend timed out after {timeout_secs:.0}s")]
    Timeout {
        backend: BackendKind,
        timeout_secs: f64,
    },

    /// Transient: connection refused, reset, DNS failure
    #[error("{backend} backend network error: {message}")]
    Network {
        backend: BackendKind,
        message: String,
    },

    /// Non-transient: bad or missing credentials
    #[error("{backend} backend rejected credentials: {message}")]
    AuthFailure {
        backend: BackendKind,
        message: String,
    },

    /// Non-transient: the provider refused the request on quota grounds
    #[error("{backend} backend quota exceeded: {message}")]
    QuotaExceeded {
        backend: BackendKind,
        message: String,
    },

    /// Non-transient: the audio buffer could not be encoded or was rejected
    #[error("Audio format error: {0}")]
    AudioFormat(String),

    /// Non-transient: the backend cannot be constructed from the active config
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-transient: local model missing or failed to load
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Local inference failed: {0}")]
    InferenceFailed(String),

    #[error("{backend} backend returned an invalid response: {message}")]
    InvalidResponse {
        backend: BackendKind,
        message: String,
    },

    /// No adapter is configured or resolvable; never a fabricated transcript
    #[error("No transcription backend available. Configure a remote server, a cloud API key, or a local model.")]
    NoBackendAvailable,

    /// Every adapter in the auto fallback chain failed
    #[error("All transcription backends failed:\n{}", format_attempts(.attempts))]
    Exhausted {
        attempts: Vec<(BackendKind, String)>,
    },
}

impl DispatchError {
    /// Transient failures are retried once per adapter; everything else
    /// propagates immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DispatchError::Timeout { .. } | DispatchError::Network { .. }
        )
    }
}

fn format_attempts(attempts: &[(BackendKind, String)]) -> String {
    attempts
        .iter()
        .map(|(backend, message)| format!("  - {}: {}", backend, message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors related to text delivery
#[derive(Error, Debug)]
pub enum DeliverError {
    #[error("wl-copy not found. Install wl-clipboard: sudo apt install wl-clipboard")]
    WlCopyNotFound,

    #[error("ydotool not found. Install ydotool for paste support, or set delivery.insert_destination = \"clipboard\"")]
    YdotoolNotFound,

    #[error("ydotool daemon not running. Start it with: systemctl --user start ydotool")]
    YdotoolNotRunning,

    #[error("Delivery failed: {0}")]
    Failed(String),
}

/// Errors related to transcript persistence
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Transcript {0} not found")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema migration to version {version} failed: {message}")]
    Migration { version: u32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using IhearError
pub type Result<T> = std::result::Result<T, IhearError>;

#[cfg(target_os = "linux")]
impl From<evdev::Error> for HotkeyError {
    fn from(e: evdev::Error) -> Self {
        HotkeyError::Evdev(e.to_string())
    }
}
