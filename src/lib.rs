//! ihear: hotkey-driven voice memos for Linux
//!
//! This library provides the core functionality for:
//! - Detecting hotkey taps via evdev (kernel-level, works on all compositors)
//! - Interpreting key edges through a deterministic session state machine
//!   (tap for a quick memo, double-tap for continuous recording)
//! - Capturing audio via cpal (supports PipeWire, PulseAudio, ALSA)
//! - Dispatching audio to transcription backends with fallback
//!   (self-hosted server, cloud API, local whisper.cpp)
//! - Summarising and persisting transcripts in a SQLite library
//! - Delivering finished text to the clipboard or active window
//!
//! # Architecture
//!
//! ```text
//!          ┌──────────────┐   key edges   ┌──────────────────┐
//!          │    Hotkey    │ ────────────▶ │     Session      │
//!          │   (evdev)    │               │  state machine   │
//!          └──────────────┘               └──────────────────┘
//!                                                  │ actions
//!                                                  ▼
//!                                         ┌──────────────────┐
//!                          audio chunks   │      Daemon      │
//!          ┌──────────────┐ ────────────▶ │   (event loop)   │
//!          │    Audio     │               └──────────────────┘
//!          │    (cpal)    │                        │ finished buffer
//!          └──────────────┘                        ▼
//!                                         ┌──────────────────┐
//!                                         │    Dispatcher    │
//!                                         │ remote▸cloud▸local│
//!                                         └──────────────────┘
//!                                                  │ text
//!                                 ┌────────────────┼────────────────┐
//!                                 ▼                ▼                ▼
//!                          ┌────────────┐  ┌──────────────┐  ┌────────────┐
//!                          │ Summarizer │  │    Store     │  │  Delivery  │
//!                          │  (TF-IDF)  │  │   (SQLite)   │  │ (clipboard)│
//!                          └────────────┘  └──────────────┘  └────────────┘
//! ```

pub mod capture;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod deliver;
pub mod error;
pub mod hotkey;
pub mod session;
pub mod store;
pub mod summarize;
pub mod transcribe;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{IhearError, Result};
