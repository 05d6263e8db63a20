//! Hotkey detection module
//!
//! Provides kernel-level key event detection using evdev. This works on
//! all Wayland compositors because it operates at the Linux input
//! subsystem level. Requires the user to be in the 'input' group.
//!
//! The listener reports raw key edges only; double-tap detection and the
//! session lifecycle live in the session state machine.

#[cfg(target_os = "linux")]
pub mod evdev_listener;

use crate::config::HotkeyConfig;
use crate::error::HotkeyError;
use tokio::sync::mpsc;

/// Raw key edges emitted by the hotkey listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// Trigger key pressed (repeat events are filtered out)
    Down,
    /// Trigger key released
    Up,
    /// Cancel key pressed
    Cancel,
}

/// Trait for hotkey detection implementations
#[async_trait::async_trait]
pub trait HotkeyListener: Send + Sync {
    /// Start listening for key events.
    /// Returns a channel receiver for events.
    async fn start(&mut self) -> Result<mpsc::Receiver<KeyEvent>, HotkeyError>;

    /// Stop listening and clean up
    async fn stop(&mut self) -> Result<(), HotkeyError>;
}

/// Factory function to create the platform hotkey listener
#[cfg(target_os = "linux")]
pub fn create_listener(config: &HotkeyConfig) -> Result<Box<dyn HotkeyListener>, HotkeyError> {
    Ok(Box::new(evdev_listener::EvdevListener::new(config)?))
}

#[cfg(not(target_os = "linux"))]
pub fn create_listener(_config: &HotkeyConfig) -> Result<Box<dyn HotkeyListener>, HotkeyError> {
    Err(HotkeyError::Evdev(
        "Built-in hotkey detection is only supported on Linux".to_string(),
    ))
}
