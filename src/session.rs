//! Session model for the recording pipeline
//!
//! A session is one attempt at record → transcribe → edit → deliver.
//! Stages mirror the pipeline:
//! Recording → Stopping → Transcribing → Editing → Delivering → Delivered,
//! with Cancelled and Failed reachable from every non-terminal stage.

use crate::error::{CaptureError, DeliveryError, DeviceError, TranscribeError};
use std::time::Instant;

/// Monotonically increasing session identifier. Zero is reserved as the
/// "no live session" sentinel and is never assigned to a session.
pub type SessionId = u64;

/// What the session does after transcription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Transcribe, then rewrite with the editing model
    EditAndTranscribe,
    /// Transcribe only; the editing client is never invoked
    TranscribeOnly,
}

/// Pipeline stage of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Audio capture running
    Recording,
    /// Capture finalizing, waiting for the blob
    Stopping,
    /// Remote speech-to-text call in flight (retries included)
    Transcribing,
    /// Remote rewrite call in flight (retries included)
    Editing,
    /// Clipboard/paste delivery running
    Delivering,
    /// Terminal: text delivered
    Delivered,
    /// Terminal: cancelled before delivery
    Cancelled,
    /// Terminal: pipeline failed
    Failed,
}

impl Stage {
    /// Whether this stage ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Delivered | Stage::Cancelled | Stage::Failed)
    }

    /// Short name written to the state file
    pub fn state_name(&self) -> &'static str {
        match self {
            Stage::Recording => "recording",
            Stage::Stopping => "stopping",
            Stage::Transcribing => "transcribing",
            Stage::Editing => "editing",
            Stage::Delivering => "delivering",
            Stage::Delivered => "idle",
            Stage::Cancelled => "idle",
            Stage::Failed => "idle",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Recording => "Recording",
            Stage::Stopping => "Stopping",
            Stage::Transcribing => "Transcribing",
            Stage::Editing => "Editing",
            Stage::Delivering => "Delivering",
            Stage::Delivered => "Delivered",
            Stage::Cancelled => "Cancelled",
            Stage::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

/// Classified failure carried by a terminal notice
#[derive(Debug, Clone)]
pub enum SessionError {
    Device(DeviceError),
    Capture(CaptureError),
    Transcribe(TranscribeError),
    Delivery(DeliveryError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Device(e) => write!(f, "{}", e),
            SessionError::Capture(e) => write!(f, "{}", e),
            SessionError::Transcribe(e) => write!(f, "{}", e),
            SessionError::Delivery(e) => write!(f, "{}", e),
        }
    }
}

/// One attempt at record → transcribe → edit → deliver
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub mode: Mode,
    pub stage: Stage,
    /// Raw transcript, populated after transcription
    pub raw_text: Option<String>,
    /// Edited transcript; equals raw_text when editing degraded or was skipped
    pub edited_text: Option<String>,
    /// Non-fatal problem surfaced with the terminal notice (degraded edit,
    /// failed paste)
    pub warning: Option<String>,
    pub error: Option<SessionError>,
    pub started_at: Instant,
    pub ended_at: Option<Instant>,
}

impl Session {
    /// Create a new session in the Recording stage
    pub fn new(id: SessionId, mode: Mode) -> Self {
        debug_assert!(id != 0, "session id 0 is the live-token sentinel");
        Self {
            id,
            mode,
            stage: Stage::Recording,
            raw_text: None,
            edited_text: None,
            warning: None,
            error: None,
            started_at: Instant::now(),
            ended_at: None,
        }
    }

    /// Recording duration so far
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Text that would be (or was) delivered
    pub fn final_text(&self) -> Option<&str> {
        self.edited_text
            .as_deref()
            .or(self.raw_text.as_deref())
    }
}
