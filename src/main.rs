//! Quickscribe - global-hotkey dictation daemon
//!
//! Run with `quickscribe` or `quickscribe daemon` to start the daemon.
//! Use `quickscribe transcribe [file]` to re-run a saved recording.

use anyhow::Context;
use clap::Parser;
use quickscribe::capture::store::RecordingStore;
use quickscribe::cli::{Cli, Commands};
use quickscribe::config::{load_config, write_default_config, Config};
use quickscribe::prompts::PromptLibrary;
use quickscribe::retry::RetryPolicy;
use quickscribe::{edit, transcribe, wav, Daemon};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

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
                .unwrap_or_else(|_| EnvFilter::new(format!("quickscribe={}", log_level))),
        )
        .init();

    // Seed the commented config template on first run
    if cli.config.is_none() {
        if let Some(path) = Config::default_path() {
            if !path.exists() {
                write_default_config(&path)?;
                tracing::info!("Wrote default config to {:?}", path);
            }
        }
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        None | Some(Commands::Daemon) => {
            let mut daemon = Daemon::new(config);
            daemon.run().await?;
        }

        Some(Commands::Transcribe { file, edit }) => {
            run_transcribe(config, file, edit).await?;
        }

        Some(Commands::Config) => {
            print_config(&config)?;
        }

        Some(Commands::Devices) => {
            let devices = quickscribe::capture::list_input_devices()?;
            if devices.is_empty() {
                println!("No audio input devices found.");
            } else {
                for name in devices {
                    println!("{}", name);
                }
            }
        }
    }

    Ok(())
}

/// One-shot pipeline over a saved recording: transcribe, optionally edit,
/// print to stdout
async fn run_transcribe(
    config: Config,
    file: Option<std::path::PathBuf>,
    edit_pass: bool,
) -> anyhow::Result<()> {
    let path = match file {
        Some(path) => path,
        None => RecordingStore::new(&config.recordings)
            .latest()
            .context("no saved recordings found; pass a file path")?,
    };

    tracing::info!("Transcribing {:?}", path);
    let (samples, sample_rate) = wav::read_wav(&path)?;

    let retry = RetryPolicy::from_config(&config.retry);

    let transcriber: Arc<dyn transcribe::Transcriber> = Arc::from(transcribe::create_transcriber(
        &config.transcribe,
        config.transcribe_api_key(),
        sample_rate,
    )?);

    let raw_text = {
        let transcriber = transcriber.clone();
        tokio::task::spawn_blocking(move || {
            retry.run("transcription", || transcriber.transcribe(&samples))
        })
        .await??
    };

    if !edit_pass {
        println!("{}", raw_text);
        return Ok(());
    }

    let editor: Arc<dyn edit::Editor> =
        Arc::from(edit::create_editor(&config.edit, config.edit_api_key())?);
    let instructions = PromptLibrary::from_config(&config)
        .selected()
        .instructions
        .clone();

    let edited = {
        let transcript = raw_text.clone();
        tokio::task::spawn_blocking(move || {
            retry.run("edit", || editor.edit(&instructions, &transcript))
        })
        .await?
    };

    match edited {
        Ok(text) => println!("{}", text),
        Err(e) => {
            // Same degrade rule as the daemon: the transcript survives a
            // failed enhancement
            tracing::warn!("Editing failed, printing raw transcript: {}", e);
            println!("{}", raw_text);
        }
    }

    Ok(())
}

/// Print the effective configuration with credentials redacted
fn print_config(config: &Config) -> anyhow::Result<()> {
    let mut redacted = config.clone();
    if redacted.transcribe.api_key.is_some() {
        redacted.transcribe.api_key = Some("<redacted>".to_string());
    }
    if redacted.edit.api_key.is_some() {
        redacted.edit.api_key = Some("<redacted>".to_string());
    }

    if let Some(path) = Config::default_path() {
        println!("# config file: {:?}", path);
    }
    print!("{}", toml::to_string_pretty(&redacted)?);
    Ok(())
}
