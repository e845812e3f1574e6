// Command-line interface definitions for quickscribe
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "quickscribe")]
#[command(author, version, about = "Global-hotkey dictation with remote transcription and AI copy-editing")]
#[command(long_about = "
Quickscribe turns a global hotkey press into recorded audio, a remote
transcription, an optional AI copy-edit pass, and the result on your
clipboard and/or pasted into the window you were working in.

SETUP:
  1. Set your API key: export QUICKSCRIBE_API_KEY=sk-...
  2. Run: quickscribe (to start the daemon)

USAGE:
  Press ctrl+alt+j (default), speak, press it again to stop. The edited
  transcript lands on the clipboard and is pasted at the cursor.
  ctrl+alt+shift+j skips the copy-edit pass; ctrl+alt+x cancels.
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

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Transcribe a saved recording (WAV, mono)
    Transcribe {
        /// Path to audio file; defaults to the most recent recording
        file: Option<std::path::PathBuf>,

        /// Run the AI copy-edit pass on the transcript
        #[arg(long)]
        edit: bool,
    },

    /// Show effective configuration (API keys redacted)
    Config,

    /// List audio input devices
    Devices,
}
