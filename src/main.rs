//! ihear - hotkey-driven voice memos for Linux
//!
//! Run with `ihear` or `ihear daemon` to start the daemon.
//! Use `ihear transcribe <file>` to transcribe an audio file,
//! and `ihear list` / `show` / `delete` / `summarize` to manage
//! the transcript library.

use clap::Parser;
use ihear::capture::cpal_capture::resample;
use ihear::cli::{Cli, Commands};
use ihear::config::{self, BackendMode, Config};
use ihear::store::{NewTranscript, TranscriptStore};
use ihear::summarize::{self, Summarizer};
use ihear::transcribe::{self, Dispatcher};
use ihear::Daemon;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("ihear={},warn", log_level))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(hotkey) = cli.hotkey {
        config.hotkey.key = hotkey;
    }
    if let Some(model) = cli.model {
        config.backend.local_model = model;
    }
    if let Some(ref backend) = cli.backend {
        config.backend.mode = match backend.to_lowercase().as_str() {
            "auto" => BackendMode::Auto,
            "local" => BackendMode::Local,
            "cloud" => BackendMode::Cloud,
            "remote" => BackendMode::Remote,
            other => anyhow::bail!(
                "Unknown backend mode '{}'. Valid modes: auto, local, cloud, remote",
                other
            ),
        };
    }

    config.validate()?;

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            let mut daemon = Daemon::new(config, cli.config)?;
            daemon.run().await?;
        }

        Commands::Transcribe {
            file,
            title,
            no_save,
            no_summarize,
        } => {
            transcribe_file(&config, &file, title, no_save, no_summarize).await?;
        }

        Commands::List { limit } => {
            let store = TranscriptStore::open(&Config::db_path())?;
            let records = store.list(limit)?;
            if records.is_empty() {
                println!("No transcripts stored yet.");
            }
            for record in records {
                println!(
                    "{:>5}  {}  [{}] {:.1}s  {}",
                    record.id,
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.backend_used,
                    record.duration_secs,
                    record.title
                );
            }
        }

        Commands::Show { id } => {
            let store = TranscriptStore::open(&Config::db_path())?;
            let record = store.get(id)?;
            println!("# {} (id {})", record.title, record.id);
            println!(
                "Recorded {} via {} backend ({:.1}s)",
                record.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                record.backend_used,
                record.duration_secs
            );
            if let Some(source) = &record.source {
                println!("Source: {}", source);
            }
            println!("\n{}", record.transcript);
            if let Some(summary) = record.summary {
                println!("\nSummary:\n{}", summary);
            }
        }

        Commands::Delete { id } => {
            let store = TranscriptStore::open(&Config::db_path())?;
            store.delete(id)?;
            println!("Deleted transcript {}.", id);
        }

        Commands::Summarize { id } => {
            let store = TranscriptStore::open(&Config::db_path())?;
            let record = store.get(id)?;
            let summary = Summarizer::default().summarize(&record.transcript);
            if summary.is_empty() {
                println!("Transcript {} has no content to summarise.", id);
            } else {
                store.set_summary(id, &summary)?;
                println!("{}", summary);
            }
        }

        Commands::Backends => {
            show_backends(&config);
        }

        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

/// Transcribe an audio file through the configured dispatcher
async fn transcribe_file(
    config: &Config,
    path: &Path,
    title: Option<String>,
    no_save: bool,
    no_summarize: bool,
) -> anyhow::Result<()> {
    let samples = load_wav(path)?;
    println!(
        "Processing {} samples ({:.2}s)...",
        samples.len(),
        samples.len() as f32 / 16000.0
    );
    let duration_secs = samples.len() as f64 / 16000.0;

    let dispatcher = Dispatcher::from_config(config)?;
    let result = dispatcher.transcribe(Arc::new(samples)).await?;

    println!("\n{}", result.text);

    let summary = if no_summarize {
        None
    } else {
        let s = Summarizer::default().summarize(&result.text);
        if !s.is_empty() && s != result.text {
            println!("\nSummary:\n{}", s);
            Some(s)
        } else {
            None
        }
    };

    if !no_save {
        let store = TranscriptStore::open(&Config::db_path())?;
        let record = store.create(&NewTranscript {
            title: title.unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| summarize::derive_title(&result.text, 8))
            }),
            transcript: result.text.clone(),
            summary,
            backend_used: result.backend_used.to_string(),
            duration_secs,
            source: Some(path.to_string_lossy().into_owned()),
        })?;
        println!("\nSaved transcript with id {}.", record.id);
    }

    Ok(())
}

/// Load a WAV file as f32 mono samples at 16kHz
fn load_wav(path: &Path) -> anyhow::Result<Vec<f32>> {
    use hound::WavReader;

    println!("Loading audio file: {:?}", path);

    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    println!(
        "Audio format: {} Hz, {} channel(s), {:?}",
        spec.sample_rate, spec.channels, spec.sample_format
    );

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max_val)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(|s| s.ok())
            .collect(),
    };

    // Mix to mono if stereo
    let mono_samples: Vec<f32> = if spec.channels > 1 {
        samples
            .chunks(spec.channels as usize)
            .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
            .collect()
    } else {
        samples
    };

    // Resample to 16kHz if needed
    let final_samples = if spec.sample_rate != 16000 {
        println!("Resampling from {} Hz to 16000 Hz...", spec.sample_rate);
        resample(&mono_samples, spec.sample_rate, 16000)
    } else {
        mono_samples
    };

    Ok(final_samples)
}

/// Report which backends the current config would try, without loading any
fn show_backends(config: &Config) {
    println!("Backend mode: {}", config.backend.mode);
    println!();

    let remote = match config.backend.server_url {
        Some(ref url) if !url.is_empty() => format!("configured ({})", url),
        _ => "not configured (set backend.server_url)".to_string(),
    };
    let cloud = if config.backend.resolved_cloud_api_key().is_some() {
        format!("configured (model {})", config.backend.cloud_model)
    } else {
        "not configured (set backend.cloud_api_key or IHEAR_CLOUD_API_KEY)".to_string()
    };
    let local = match transcribe::whisper::resolve_model_path(&config.backend.local_model) {
        Ok(path) => format!("ready ({})", path.display()),
        Err(_) => format!("model '{}' not downloaded", config.backend.local_model),
    };

    println!("  remote: {}", remote);
    println!("  cloud:  {}", cloud);
    println!("  local:  {}", local);

    if config.backend.mode == BackendMode::Auto {
        println!("\nAuto mode tries remote, then cloud, then local.");
    }
}

/// Print the resolved configuration and relevant paths
fn show_config(config: &Config) -> anyhow::Result<()> {
    if let Some(path) = Config::default_path() {
        let status = if path.exists() { "" } else { " (not written yet)" };
        println!("Config file: {}{}", path.display(), status);
    }
    println!("Data dir:    {}", Config::data_dir().display());
    println!("Database:    {}", Config::db_path().display());
    println!("Models dir:  {}", Config::models_dir().display());
    println!();
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
