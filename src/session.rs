//! Session state machine for the ihear daemon
//!
//! Interprets raw key edges into the recording lifecycle:
//! Idle → Arming → Capturing(quick|continuous) → Finalizing → Idle
//!
//! The machine is pure: callers feed it events and timestamps, and it
//! returns the side effects to perform. The daemon owns the actual audio
//! capture and dispatch tasks, which keeps every transition (including the
//! double-tap window and the finalize ceiling) deterministic under test.
//!
//! Timing rules:
//! - The first key-down starts capture immediately (provisional quick mode).
//! - A second key-down within the double-tap window upgrades the session to
//!   continuous mode; a single tap that outlives the window degrades to
//!   quick mode.
//! - Finalizing can never outlive the ceiling: the machine force-returns to
//!   Idle and tells the daemon to abort the in-flight dispatch.
//! - One key-down arriving during Finalizing is queued and replayed once
//!   Idle is reached; a key-up while an intent is queued cancels it (the
//!   press and release both landed inside Finalizing).

use std::time::{Duration, Instant};

/// Audio samples collected during recording (f32, mono, 16kHz)
pub type AudioBuffer = Vec<f32>;

/// How the current recording was initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingMode {
    /// Key held for the duration of the memo
    Quick,
    /// Entered via double-tap; a single tap stops it
    Continuous,
}

impl std::fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingMode::Quick => write!(f, "quick"),
            RecordingMode::Continuous => write!(f, "continuous"),
        }
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Hotkey pressed
    KeyDown,
    /// Hotkey released
    KeyUp,
    /// Cancel key pressed: discard the buffer, skip dispatch
    Cancel,
    /// The dispatch task for the finalizing session completed (ok or err)
    DispatchDone,
    /// Capture hit the configured duration ceiling
    Overflow,
}

/// Side effects the daemon must perform for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Open the input device and begin buffering audio
    StartCapture,
    /// The session mode is now decided
    CommitMode(RecordingMode),
    /// Stop capture and hand the buffer to the dispatcher
    FinishAndDispatch(RecordingMode),
    /// Stop capture and drop the buffer without dispatching
    DiscardCapture,
    /// Finalize ceiling hit: abort the in-flight dispatch task
    AbortDispatch,
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for a key press
    Idle,
    /// First key-down seen; capturing, but the mode is not yet decided
    Arming { pressed_at: Instant, released: bool },
    /// Mode committed, still capturing
    Capturing {
        mode: RecordingMode,
        started_at: Instant,
    },
    /// Capture finished, dispatch in flight
    Finalizing { since: Instant, queued: bool },
}

/// The hotkey-driven session state machine
#[derive(Debug)]
pub struct SessionMachine {
    phase: Phase,
    double_tap_window: Duration,
    finalize_ceiling: Duration,
}

impl SessionMachine {
    pub fn new(double_tap_window: Duration, finalize_ceiling: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            double_tap_window,
            finalize_ceiling,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.phase, Phase::Arming { .. } | Phase::Capturing { .. })
    }

    pub fn is_finalizing(&self) -> bool {
        matches!(self.phase, Phase::Finalizing { .. })
    }

    /// When the capture for the current session began, if capturing
    pub fn capture_started_at(&self) -> Option<Instant> {
        match self.phase {
            Phase::Arming { pressed_at, .. } => Some(pressed_at),
            Phase::Capturing { started_at, .. } => Some(started_at),
            _ => None,
        }
    }

    /// The next point in time at which `poll` may produce actions.
    /// The daemon sleeps until this deadline in its select loop.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Arming { pressed_at, .. } => Some(pressed_at + self.double_tap_window),
            Phase::Finalizing { since, .. } => Some(since + self.finalize_ceiling),
            _ => None,
        }
    }

    /// Fire any deadline that has passed: double-tap window expiry while
    /// arming, or the finalize ceiling.
    pub fn poll(&mut self, now: Instant) -> Vec<SessionAction> {
        match self.phase {
            Phase::Arming {
                pressed_at,
                released,
            } if now >= pressed_at + self.double_tap_window => {
                if released {
                    // Single short tap: degrade to quick and finalize at
                    // once, keeping the audio captured so far.
                    self.phase = Phase::Finalizing {
                        since: now,
                        queued: false,
                    };
                    vec![
                        SessionAction::CommitMode(RecordingMode::Quick),
                        SessionAction::FinishAndDispatch(RecordingMode::Quick),
                    ]
                } else {
                    self.phase = Phase::Capturing {
                        mode: RecordingMode::Quick,
                        started_at: pressed_at,
                    };
                    vec![SessionAction::CommitMode(RecordingMode::Quick)]
                }
            }
            Phase::Finalizing { since, queued } if now >= since + self.finalize_ceiling => {
                tracing::warn!(
                    "Finalize ceiling ({:.0}s) hit, abandoning dispatch",
                    self.finalize_ceiling.as_secs_f32()
                );
                self.phase = Phase::Idle;
                let mut actions = vec![SessionAction::AbortDispatch];
                actions.extend(self.replay_queued(queued, now));
                actions
            }
            _ => Vec::new(),
        }
    }

    /// Feed one event into the machine. Expired deadlines are applied first
    /// so event ordering relative to `poll` never matters.
    pub fn on_event(&mut self, event: SessionEvent, now: Instant) -> Vec<SessionAction> {
        let mut actions = self.poll(now);
        actions.extend(self.apply(event, now));
        actions
    }

    /// The capture the machine asked for could not be started
    /// (microphone unavailable). Fall back to Idle so the user can retry.
    pub fn capture_failed(&mut self) {
        if self.is_capturing() {
            self.phase = Phase::Idle;
        }
    }

    fn apply(&mut self, event: SessionEvent, now: Instant) -> Vec<SessionAction> {
        match (self.phase, event) {
            (Phase::Idle, SessionEvent::KeyDown) => {
                self.phase = Phase::Arming {
                    pressed_at: now,
                    released: false,
                };
                vec![SessionAction::StartCapture]
            }
            (Phase::Idle, _) => Vec::new(),

            (Phase::Arming { pressed_at, .. }, SessionEvent::KeyUp) => {
                self.phase = Phase::Arming {
                    pressed_at,
                    released: true,
                };
                Vec::new()
            }
            (
                Phase::Arming {
                    pressed_at,
                    released: true,
                },
                SessionEvent::KeyDown,
            ) => {
                // Second tap within the window: hands-free continuous mode
                self.phase = Phase::Capturing {
                    mode: RecordingMode::Continuous,
                    started_at: pressed_at,
                };
                vec![SessionAction::CommitMode(RecordingMode::Continuous)]
            }
            (Phase::Arming { .. }, SessionEvent::KeyDown) => Vec::new(),
            (Phase::Arming { .. }, SessionEvent::Cancel) => {
                self.phase = Phase::Idle;
                vec![SessionAction::DiscardCapture]
            }
            (Phase::Arming { .. }, SessionEvent::Overflow) => {
                self.finish(RecordingMode::Quick, now)
            }
            (Phase::Arming { .. }, SessionEvent::DispatchDone) => Vec::new(),

            (Phase::Capturing { mode, .. }, SessionEvent::KeyUp) => match mode {
                RecordingMode::Quick => self.finish(mode, now),
                // Continuous mode ignores releases; only a tap stops it
                RecordingMode::Continuous => Vec::new(),
            },
            (Phase::Capturing { mode, .. }, SessionEvent::KeyDown) => match mode {
                RecordingMode::Continuous => self.finish(mode, now),
                // No mode switch mid-recording
                RecordingMode::Quick => Vec::new(),
            },
            (Phase::Capturing { .. }, SessionEvent::Cancel) => {
                self.phase = Phase::Idle;
                vec![SessionAction::DiscardCapture]
            }
            (Phase::Capturing { mode, .. }, SessionEvent::Overflow) => self.finish(mode, now),
            (Phase::Capturing { .. }, SessionEvent::DispatchDone) => Vec::new(),

            (Phase::Finalizing { since, .. }, SessionEvent::KeyDown) => {
                self.phase = Phase::Finalizing {
                    since,
                    queued: true,
                };
                Vec::new()
            }
            (Phase::Finalizing { since, queued: true }, SessionEvent::KeyUp) => {
                // Press and release both landed inside Finalizing: the
                // intended session already ended, drop the queued intent.
                self.phase = Phase::Finalizing {
                    since,
                    queued: false,
                };
                Vec::new()
            }
            (Phase::Finalizing { queued, .. }, SessionEvent::DispatchDone) => {
                self.phase = Phase::Idle;
                self.replay_queued(queued, now)
            }
            (Phase::Finalizing { .. }, _) => Vec::new(),
        }
    }

    fn finish(&mut self, mode: RecordingMode, now: Instant) -> Vec<SessionAction> {
        self.phase = Phase::Finalizing {
            since: now,
            queued: false,
        };
        vec![SessionAction::FinishAndDispatch(mode)]
    }

    fn replay_queued(&mut self, queued: bool, now: Instant) -> Vec<SessionAction> {
        if queued {
            tracing::debug!("Replaying queued key press");
            self.phase = Phase::Arming {
                pressed_at: now,
                released: false,
            };
            vec![SessionAction::StartCapture]
        } else {
            Vec::new()
        }
    }
}

impl std::fmt::Display for SessionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.phase {
            Phase::Idle => write!(f, "Idle"),
            Phase::Arming { pressed_at, .. } => {
                write!(f, "Arming ({:.0}ms)", pressed_at.elapsed().as_millis())
            }
            Phase::Capturing { mode, started_at } => {
                write!(
                    f,
                    "Capturing[{}] ({:.1}s)",
                    mode,
                    started_at.elapsed().as_secs_f32()
                )
            }
            Phase::Finalizing { since, queued } => {
                write!(
                    f,
                    "Finalizing ({:.1}s{})",
                    since.elapsed().as_secs_f32(),
                    if queued { ", 1 queued" } else { "" }
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: Duration = Duration::from_millis(300);
    const CEILING: Duration = Duration::from_secs(60);

    fn machine() -> SessionMachine {
        SessionMachine::new(W, CEILING)
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn test_key_down_starts_capture_immediately() {
        let base = Instant::now();
        let mut m = machine();

        let actions = m.on_event(SessionEvent::KeyDown, base);
        assert_eq!(actions, vec![SessionAction::StartCapture]);
        assert!(m.is_capturing());
        assert!(!m.is_idle());
    }

    #[test]
    fn test_held_key_commits_quick_after_window() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        let actions = m.poll(at(base, 301));
        assert_eq!(
            actions,
            vec![SessionAction::CommitMode(RecordingMode::Quick)]
        );

        // Release after 2s finalizes the quick session
        let actions = m.on_event(SessionEvent::KeyUp, at(base, 2000));
        assert_eq!(
            actions,
            vec![SessionAction::FinishAndDispatch(RecordingMode::Quick)]
        );
        assert!(m.is_finalizing());
    }

    #[test]
    fn test_double_tap_enters_continuous() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        m.on_event(SessionEvent::KeyUp, at(base, 80));
        let actions = m.on_event(SessionEvent::KeyDown, at(base, 160));
        assert_eq!(
            actions,
            vec![SessionAction::CommitMode(RecordingMode::Continuous)]
        );

        // Releasing the second tap does not stop a continuous session
        assert!(m.on_event(SessionEvent::KeyUp, at(base, 240)).is_empty());
        assert!(m.is_capturing());

        // A single tap stops it
        let actions = m.on_event(SessionEvent::KeyDown, at(base, 5000));
        assert_eq!(
            actions,
            vec![SessionAction::FinishAndDispatch(RecordingMode::Continuous)]
        );
    }

    #[test]
    fn test_short_tap_degrades_to_quick_on_window_expiry() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        m.on_event(SessionEvent::KeyUp, at(base, 100));
        // No second tap: on expiry the session commits quick and finalizes
        let actions = m.poll(at(base, 301));
        assert_eq!(
            actions,
            vec![
                SessionAction::CommitMode(RecordingMode::Quick),
                SessionAction::FinishAndDispatch(RecordingMode::Quick),
            ]
        );
        assert!(m.is_finalizing());
    }

    #[test]
    fn test_second_tap_after_window_is_queued_not_continuous() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        m.on_event(SessionEvent::KeyUp, at(base, 100));
        // The second tap arrives late; the expired window is applied first,
        // so the session finalizes as quick and the press is queued.
        let actions = m.on_event(SessionEvent::KeyDown, at(base, 500));
        assert_eq!(
            actions,
            vec![
                SessionAction::CommitMode(RecordingMode::Quick),
                SessionAction::FinishAndDispatch(RecordingMode::Quick),
            ]
        );
        assert!(m.is_finalizing());

        // Dispatch completes; the queued press starts the next session
        let actions = m.on_event(SessionEvent::DispatchDone, at(base, 900));
        assert_eq!(actions, vec![SessionAction::StartCapture]);
        assert!(m.is_capturing());
    }

    #[test]
    fn test_never_double_enters_capturing() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        m.poll(at(base, 301));
        assert!(m.is_capturing());

        // Repeated key-downs while already capturing in quick mode are ignored
        assert!(m.on_event(SessionEvent::KeyDown, at(base, 400)).is_empty());
        assert!(m.on_event(SessionEvent::KeyDown, at(base, 500)).is_empty());
        assert!(m.is_capturing());
    }

    #[test]
    fn test_dispatch_done_returns_to_idle() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        m.poll(at(base, 301));
        m.on_event(SessionEvent::KeyUp, at(base, 2000));
        assert!(m.is_finalizing());

        let actions = m.on_event(SessionEvent::DispatchDone, at(base, 2500));
        assert!(actions.is_empty());
        assert!(m.is_idle());
    }

    #[test]
    fn test_finalize_ceiling_forces_idle_and_aborts() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        m.poll(at(base, 301));
        m.on_event(SessionEvent::KeyUp, at(base, 2000));
        assert!(m.is_finalizing());

        // Dispatcher never answers (hung backend); the ceiling fires
        let actions = m.poll(at(base, 2000 + 60_001));
        assert_eq!(actions, vec![SessionAction::AbortDispatch]);
        assert!(m.is_idle());

        // The daemon can immediately start a new recording
        let actions = m.on_event(SessionEvent::KeyDown, at(base, 2000 + 60_100));
        assert_eq!(actions, vec![SessionAction::StartCapture]);
    }

    #[test]
    fn test_key_down_during_finalizing_is_replayed() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        m.poll(at(base, 301));
        m.on_event(SessionEvent::KeyUp, at(base, 2000));

        // User starts talking again while transcription is in flight
        assert!(m.on_event(SessionEvent::KeyDown, at(base, 2100)).is_empty());

        let actions = m.on_event(SessionEvent::DispatchDone, at(base, 2600));
        assert_eq!(actions, vec![SessionAction::StartCapture]);
        assert!(m.is_capturing());
    }

    #[test]
    fn test_full_press_release_during_finalizing_is_dropped() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        m.poll(at(base, 301));
        m.on_event(SessionEvent::KeyUp, at(base, 2000));

        m.on_event(SessionEvent::KeyDown, at(base, 2100));
        m.on_event(SessionEvent::KeyUp, at(base, 2200));

        let actions = m.on_event(SessionEvent::DispatchDone, at(base, 2600));
        assert!(actions.is_empty());
        assert!(m.is_idle());
    }

    #[test]
    fn test_queue_is_one_deep() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        m.poll(at(base, 301));
        m.on_event(SessionEvent::KeyUp, at(base, 2000));

        m.on_event(SessionEvent::KeyDown, at(base, 2100));
        m.on_event(SessionEvent::KeyDown, at(base, 2200));

        // Two presses collapse into a single replay
        let actions = m.on_event(SessionEvent::DispatchDone, at(base, 2600));
        assert_eq!(actions, vec![SessionAction::StartCapture]);
    }

    #[test]
    fn test_cancel_discards_without_dispatch() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        m.poll(at(base, 301));
        let actions = m.on_event(SessionEvent::Cancel, at(base, 1500));
        assert_eq!(actions, vec![SessionAction::DiscardCapture]);
        assert!(m.is_idle());
    }

    #[test]
    fn test_overflow_finalizes_with_truncated_buffer() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        m.poll(at(base, 301));

        // Ceiling reached mid-recording: the session is still dispatched
        let actions = m.on_event(SessionEvent::Overflow, at(base, 120_000));
        assert_eq!(
            actions,
            vec![SessionAction::FinishAndDispatch(RecordingMode::Quick)]
        );
        assert!(m.is_finalizing());
    }

    #[test]
    fn test_capture_failure_falls_back_to_idle() {
        let base = Instant::now();
        let mut m = machine();

        m.on_event(SessionEvent::KeyDown, base);
        assert!(m.is_capturing());
        m.capture_failed();
        assert!(m.is_idle());
    }

    #[test]
    fn test_next_deadline_tracks_phase() {
        let base = Instant::now();
        let mut m = machine();
        assert!(m.next_deadline().is_none());

        m.on_event(SessionEvent::KeyDown, base);
        assert_eq!(m.next_deadline(), Some(base + W));

        m.poll(at(base, 301));
        assert!(m.next_deadline().is_none());

        let up = at(base, 2000);
        m.on_event(SessionEvent::KeyUp, up);
        assert_eq!(m.next_deadline(), Some(up + CEILING));
    }
}
