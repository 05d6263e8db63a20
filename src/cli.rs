// Command-line interface definitions for ihear
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ihear")]
#[command(author, version, about = "Hotkey-driven voice memos for Linux")]
#[command(long_about = "
ihear captures voice memos from a global hotkey, transcribes them,
and keeps a searchable transcript library.

SETUP:
  1. Add yourself to the input group: sudo usermod -aG input $USER
  2. Log out and back in
  3. Install wl-clipboard (and ydotool for paste support)
  4. Run: ihear (to start the daemon)

USAGE:
  Tap ScrollLock (default) and speak; release to transcribe.
  Double-tap to keep recording hands-free; a single tap stops it.
  Esc cancels a recording without transcribing.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override the hotkey (e.g., SCROLLLOCK, PAUSE, F13)
    #[arg(long, value_name = "KEY")]
    pub hotkey: Option<String>,

    /// Override the local whisper model (tiny, base, small, medium, large-v3)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Override the backend mode (auto, local, cloud, remote)
    #[arg(long, value_name = "MODE")]
    pub backend: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Transcribe an audio file (WAV)
    Transcribe {
        /// Path to audio file
        file: std::path::PathBuf,

        /// Title for the stored transcript (defaults to the first words)
        #[arg(long, value_name = "TITLE")]
        title: Option<String>,

        /// Print the transcript without saving it
        #[arg(long)]
        no_save: bool,

        /// Skip summary generation
        #[arg(long)]
        no_summarize: bool,
    },

    /// List stored transcripts, newest first
    List {
        /// Maximum number of transcripts to show
        #[arg(short, long, value_name = "N")]
        limit: Option<u32>,
    },

    /// Show a stored transcript in full
    Show {
        /// Transcript id
        id: i64,
    },

    /// Delete a stored transcript
    Delete {
        /// Transcript id
        id: i64,
    },

    /// Regenerate the summary for a stored transcript
    Summarize {
        /// Transcript id
        id: i64,
    },

    /// Show which transcription backends the current config resolves to
    Backends,

    /// Show current configuration
    Config,
}
