//! Daemon module - main event loop orchestration
//!
//! Coordinates the hotkey listener, the session state machine, audio
//! capture, backend dispatch, persistence, and text delivery.
//!
//! The state machine decides every transition; this loop only performs
//! the side effects it asks for. Deadlines (the double-tap window and
//! the finalize ceiling) are driven by a sleep_until arm in the select
//! loop, so no transition depends on incidental event traffic.

use crate::capture::{self, AppendOutcome, AudioCapture, CaptureSession};
use crate::config::{load_config, Config};
use crate::deliver;
use crate::error::{DispatchError, Result};
use crate::hotkey::{self, KeyEvent};
use crate::session::{RecordingMode, SessionAction, SessionEvent, SessionMachine};
use crate::store::{NewTranscript, TranscriptStore};
use crate::summarize::{self, Summarizer};
use crate::transcribe::{BackendResult, Dispatcher};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capture plumbing for the recording in progress
#[derive(Default)]
struct CaptureState {
    device: Option<Box<dyn AudioCapture>>,
    chunk_rx: Option<mpsc::Receiver<Vec<f32>>>,
    session: Option<CaptureSession>,
}

/// A dispatch task in flight for a finalizing session
struct InflightDispatch {
    handle: JoinHandle<std::result::Result<BackendResult, DispatchError>>,
    mode: RecordingMode,
    duration_secs: f64,
}

/// Main daemon that orchestrates all components
pub struct Daemon {
    config: Config,
    config_path: Option<PathBuf>,
    dispatcher: Arc<Dispatcher>,
    store: TranscriptStore,
    summarizer: Summarizer,
}

impl Daemon {
    /// Create a new daemon with the given configuration
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Result<Self> {
        let dispatcher = Arc::new(Dispatcher::from_config(&config)?);
        let store = TranscriptStore::open(&Config::db_path())?;

        Ok(Self {
            config,
            config_path,
            dispatcher,
            store,
            summarizer: Summarizer::default(),
        })
    }

    /// Run the daemon main loop
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting ihear daemon");

        let mut sighup = signal(SignalKind::hangup())
            .map_err(|e| crate::error::IhearError::Config(format!("SIGHUP handler: {}", e)))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| crate::error::IhearError::Config(format!("SIGTERM handler: {}", e)))?;

        Config::ensure_directories()?;

        let mut hotkey_listener = hotkey::create_listener(&self.config.hotkey)?;
        let mut hotkey_rx = hotkey_listener.start().await?;

        let mut machine = SessionMachine::new(
            self.config.hotkey.double_tap_window(),
            self.config.session.finalize_ceiling(),
        );
        let mut capture = CaptureState::default();
        let mut inflight: Option<InflightDispatch> = None;
        let mut pending_reload: Option<Config> = None;

        tracing::info!(
            "Listening for {} (tap for quick memo, double-tap for continuous; {} cancels)",
            self.config.hotkey.key,
            self.config.hotkey.cancel_key
        );

        loop {
            tokio::select! {
                // Key edges from the hotkey listener
                Some(key_event) = hotkey_rx.recv() => {
                    let event = match key_event {
                        KeyEvent::Down => SessionEvent::KeyDown,
                        KeyEvent::Up => SessionEvent::KeyUp,
                        KeyEvent::Cancel => SessionEvent::Cancel,
                    };
                    let actions = machine.on_event(event, Instant::now());
                    self.apply_actions(&mut machine, &mut capture, &mut inflight, actions).await;
                }

                // Audio chunks while a recording is open
                Some(chunk) = async {
                    match capture.chunk_rx.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    if let Some(session) = capture.session.as_mut() {
                        if session.append(&chunk) == AppendOutcome::Overflow {
                            let actions = machine.on_event(SessionEvent::Overflow, Instant::now());
                            self.apply_actions(&mut machine, &mut capture, &mut inflight, actions).await;
                        }
                    }
                }

                // The dispatch task for the finalizing session finished
                join_result = async {
                    match inflight.as_mut() {
                        Some(d) => (&mut d.handle).await,
                        None => std::future::pending().await,
                    }
                } => {
                    // inflight is Some here, the arm cannot fire otherwise
                    if let Some(done) = inflight.take() {
                        match join_result {
                            Ok(Ok(result)) => {
                                self.persist_and_deliver(result, done.mode, done.duration_secs).await;
                            }
                            Ok(Err(e)) => {
                                tracing::error!("Transcription failed, nothing saved: {}", e);
                            }
                            Err(e) => {
                                tracing::error!("Dispatch task failed: {}", e);
                            }
                        }
                    }
                    let actions = machine.on_event(SessionEvent::DispatchDone, Instant::now());
                    self.apply_actions(&mut machine, &mut capture, &mut inflight, actions).await;
                }

                // Pending deadline: double-tap window expiry or finalize ceiling
                _ = async {
                    match machine.next_deadline() {
                        Some(deadline) => {
                            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                        }
                        None => std::future::pending().await,
                    }
                } => {
                    let actions = machine.poll(Instant::now());
                    self.apply_actions(&mut machine, &mut capture, &mut inflight, actions).await;
                }

                // SIGHUP - reload configuration
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    match load_config(self.config_path.as_deref()) {
                        Ok(new_config) => match new_config.validate() {
                            Ok(()) => pending_reload = Some(new_config),
                            Err(e) => tracing::error!("Reloaded config is invalid, keeping current: {}", e),
                        },
                        Err(e) => tracing::error!("Config reload failed, keeping current: {}", e),
                    }
                }

                // Graceful shutdown
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT, shutting down...");
                    break;
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down...");
                    break;
                }
            }

            // A validated reload is swapped in only between sessions, so a
            // recording in progress finishes under the config it started with
            if pending_reload.is_some() && machine.is_idle() && inflight.is_none() {
                if let Some(new_config) = pending_reload.take() {
                    self.apply_reload(new_config, &mut machine);
                }
            }
        }

        // Cleanup
        if let Some(d) = inflight.take() {
            d.handle.abort();
        }
        if let Some(mut device) = capture.device.take() {
            let _ = device.stop().await;
        }
        hotkey_listener.stop().await?;

        tracing::info!("Daemon stopped");
        Ok(())
    }

    /// Swap in a validated config snapshot
    fn apply_reload(&mut self, new_config: Config, machine: &mut SessionMachine) {
        match Dispatcher::from_config(&new_config) {
            Ok(dispatcher) => {
                self.dispatcher = Arc::new(dispatcher);
                *machine = SessionMachine::new(
                    new_config.hotkey.double_tap_window(),
                    new_config.session.finalize_ceiling(),
                );
                self.config = new_config;
                tracing::info!("Configuration reloaded");
            }
            Err(e) => {
                tracing::error!("Reloaded config cannot build a dispatcher, keeping current: {}", e);
            }
        }
    }

    /// Perform the side effects the state machine asked for
    ///
    /// Actions can cascade (an empty recording finishes its session
    /// immediately, which may replay a queued key press), so this works
    /// through a queue rather than recursing.
    async fn apply_actions(
        &self,
        machine: &mut SessionMachine,
        capture: &mut CaptureState,
        inflight: &mut Option<InflightDispatch>,
        actions: Vec<SessionAction>,
    ) {
        let mut queue: VecDeque<SessionAction> = actions.into();

        while let Some(action) = queue.pop_front() {
            match action {
                SessionAction::StartCapture => {
                    tracing::info!("Recording started");
                    match capture::create_capture(&self.config.audio) {
                        Ok(mut device) => match device.start().await {
                            Ok(rx) => {
                                capture.device = Some(device);
                                capture.chunk_rx = Some(rx);
                                capture.session = Some(CaptureSession::new(&self.config.audio));
                            }
                            Err(e) => {
                                tracing::error!("Failed to start audio capture: {}", e);
                                machine.capture_failed();
                            }
                        },
                        Err(e) => {
                            tracing::error!("Failed to open audio device: {}", e);
                            machine.capture_failed();
                        }
                    }
                }

                SessionAction::CommitMode(mode) => {
                    tracing::info!("Recording mode: {}", mode);
                }

                SessionAction::FinishAndDispatch(mode) => {
                    if let Some(mut device) = capture.device.take() {
                        let _ = device.stop().await;
                    }
                    capture.chunk_rx = None;

                    let samples = capture
                        .session
                        .take()
                        .map(|s| s.into_samples())
                        .unwrap_or_default();

                    if samples.is_empty() {
                        tracing::warn!("No audio captured, skipping transcription");
                        queue.extend(machine.on_event(SessionEvent::DispatchDone, Instant::now()));
                        continue;
                    }

                    let duration_secs =
                        samples.len() as f64 / self.config.audio.sample_rate as f64;
                    tracing::info!(
                        "Recording stopped ({:.1}s, {} mode), transcribing...",
                        duration_secs,
                        mode
                    );

                    let dispatcher = self.dispatcher.clone();
                    let samples = Arc::new(samples);
                    let handle =
                        tokio::spawn(async move { dispatcher.transcribe(samples).await });

                    *inflight = Some(InflightDispatch {
                        handle,
                        mode,
                        duration_secs,
                    });
                }

                SessionAction::DiscardCapture => {
                    tracing::info!("Recording cancelled, buffer discarded");
                    if let Some(mut device) = capture.device.take() {
                        let _ = device.stop().await;
                    }
                    capture.chunk_rx = None;
                    capture.session = None;
                }

                SessionAction::AbortDispatch => {
                    if let Some(d) = inflight.take() {
                        tracing::warn!(
                            "Transcription exceeded the {:.0}s finalize ceiling, aborting",
                            self.config.session.finalize_ceiling().as_secs_f64()
                        );
                        d.handle.abort();
                    }
                }
            }
        }
    }

    /// Store and deliver a finished transcript
    ///
    /// The transcript is persisted before delivery is attempted, so a
    /// clipboard failure never loses the text.
    async fn persist_and_deliver(
        &self,
        result: BackendResult,
        mode: RecordingMode,
        duration_secs: f64,
    ) {
        let text = result.text.trim();
        if text.is_empty() {
            tracing::info!("Transcription was empty, nothing to save");
            return;
        }

        tracing::info!(
            "Transcribed via {} backend ({} chars)",
            result.backend_used,
            text.chars().count()
        );

        let summary = if self.config.session.summarize {
            let s = self.summarizer.summarize(text);
            (!s.is_empty() && s != text).then_some(s)
        } else {
            None
        };

        if self.config.session.save {
            let new = NewTranscript {
                title: summarize::derive_title(text, 8),
                transcript: text.to_string(),
                summary,
                backend_used: result.backend_used.to_string(),
                duration_secs,
                source: None,
            };
            match self.store.create(&new) {
                Ok(record) => {
                    tracing::info!("Saved transcript {} ({} mode)", record.id, mode);
                }
                Err(e) => tracing::error!("Failed to save transcript: {}", e),
            }
        }

        if let Err(e) = deliver::deliver(text, self.config.delivery.insert_destination).await {
            tracing::warn!("Delivery failed (transcript is saved): {}", e);
        }
    }
}
