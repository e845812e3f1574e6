//! Error types for quickscribe
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the quickscribe application
#[derive(Error, Debug)]
pub enum QuickscribeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Audio device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Audio capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Editing error: {0}")]
    Edit(#[from] EditError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors opening or running the audio input device
#[derive(Error, Debug, Clone)]
pub enum DeviceError {
    #[error("Audio device not found: '{0}'. Run 'quickscribe devices' to list inputs.")]
    NotFound(String),

    #[error("Failed to open audio input: {0}")]
    OpenFailed(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}

/// Errors finalizing a recording
#[derive(Error, Debug, Clone)]
pub enum CaptureError {
    #[error("No audio was captured. Check your microphone.")]
    Empty,

    #[error("Recording too short ({got_ms}ms, minimum {min_ms}ms)")]
    TooShort { got_ms: u64, min_ms: u64 },

    #[error("Capture thread did not respond: {0}")]
    Stopped(String),
}

/// Per-binding hotkey registration errors
#[derive(Error, Debug, Clone)]
pub enum RegistrationError {
    #[error("Unknown key name '{0}' in hotkey combo")]
    UnknownKey(String),

    #[error("Invalid hotkey combo '{0}': needs at least one non-modifier key")]
    InvalidCombo(String),

    #[error("Global key listener could not be started: {0}")]
    ListenerFailed(String),
}

/// Errors from the remote speech-to-text call
#[derive(Error, Debug, Clone)]
pub enum TranscribeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Transcription server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Authentication failed ({status}). Check your API key.")]
    Auth { status: u16 },

    #[error("Quota or rate limit exhausted: {0}")]
    Quota(String),

    #[error("Request rejected by server: {0}")]
    BadRequest(String),

    #[error("Unexpected response from server: {0}")]
    BadResponse(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TranscribeError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TranscribeError::Network(_) | TranscribeError::Server { .. }
        )
    }
}

/// Errors from the remote text-rewrite call
#[derive(Error, Debug, Clone)]
pub enum EditError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Editing server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Authentication failed ({status}). Check your API key.")]
    Auth { status: u16 },

    #[error("Quota or rate limit exhausted: {0}")]
    Quota(String),

    #[error("Request rejected by server: {0}")]
    BadRequest(String),

    #[error("Unexpected response from server: {0}")]
    BadResponse(String),
}

impl EditError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, EditError::Network(_) | EditError::Server { .. })
    }
}

/// Errors delivering final text
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    #[error("Clipboard write failed: {0}")]
    Clipboard(String),

    #[error("Paste keystroke failed: {0}")]
    Paste(String),

    #[error("Could not refocus target window: {0}")]
    Refocus(String),
}

/// Result type alias using QuickscribeError
pub type Result<T> = std::result::Result<T, QuickscribeError>;
