//! Quickscribe: global-hotkey dictation with remote transcription and AI
//! copy-editing
//!
//! This library provides the core functionality for:
//! - Global hotkey detection with health-probed registrations (rdev)
//! - Audio capture via cpal (PipeWire, PulseAudio, ALSA, CoreAudio, WASAPI)
//! - Remote speech-to-text and transcript editing over OpenAI-style APIs
//! - Delivery to the clipboard and the previously focused window
//!
//! # Architecture
//!
//! ```text
//!   HotkeyWatcher ──┐                       ┌── SystemEventWatcher
//!   (rdev, probed)  │  Trigger/Stop/Cancel  │   (lock/unlock → refresh)
//!                   ▼                       ▼
//!          ┌─────────────────────────────────────┐
//!          │          SessionOrchestrator        │   one consumer loop;
//!          │  Idle → Recording → Stopping →      │   live session id
//!          │  Transcribing → Editing →           │   discards stale
//!          │  Delivering → Idle                  │   worker results
//!          └─────────────────────────────────────┘
//!             │             │              │
//!             ▼             ▼              ▼
//!       AudioCapture   Transcriber      Editor        (worker threads)
//!         (cpal)       (remote API)   (remote API)
//!             │                                │
//!             ▼                                ▼
//!       RecordingStore                   DeliverySink
//!       (WAV on disk)               (clipboard, then paste)
//!                   │
//!                   ▼
//!          ordered Notice stream → Daemon UI loop
//!          (state file, cues, one notification per terminal state)
//! ```

pub mod capture;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod deliver;
pub mod edit;
pub mod error;
pub mod feedback;
pub mod hotkey;
pub mod orchestrator;
pub mod prompts;
pub mod retry;
pub mod session;
pub mod system_events;
pub mod transcribe;
pub mod wav;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{QuickscribeError, Result};
