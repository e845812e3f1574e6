//! Configuration loading and types for quickscribe
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/quickscribe/config.toml)
//! 3. Environment variables (QUICKSCRIBE_*)
//! 4. CLI arguments (highest priority)
//!
//! Changes take effect at the next accepted trigger; a session that is
//! already in flight keeps the snapshot taken when it was created.

use crate::error::QuickscribeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Quickscribe Configuration
#
# Location: ~/.config/quickscribe/config.toml
# All settings can be overridden via CLI flags

# State file for external integrations (Waybar, polybar, etc.)
# Use "auto" for the default location ($XDG_RUNTIME_DIR/quickscribe/state),
# a custom path, or "disabled" to turn off. The daemon writes the current
# session stage ("idle", "recording", "transcribing", ...) to this file.
state_file = "auto"

# Initially selected editing prompt profile (see [[prompt_profiles]] below).
# Cycle at runtime with the prev/next hotkeys; the profile selected when
# recording starts is the one used for that session.
selected_prompt = "Default"

[hotkey]
# Key combos for the five actions. Format: modifiers+key, e.g. "ctrl+alt+j".
# Modifiers: ctrl, alt, shift, meta (cmd on macOS, win on Windows).
record_edit       = "ctrl+alt+j"
record_transcribe = "ctrl+alt+shift+j"
cancel            = "ctrl+alt+x"
prev_prompt       = "alt+left"
next_prompt       = "alt+right"

# Activation mode: "toggle" or "push_to_talk"
# - toggle: press the record combo to start, press it again to stop (default)
# - push_to_talk: hold the combo to record, release to stop
# mode = "toggle"

# How often (seconds) to verify registrations are still alive at the OS
# level. Some lock/unlock cycles silently drop global hooks; the probe
# re-registers dead bindings automatically.
# probe_interval_secs = 30

# Enable global hotkey detection (set false to drive via CLI only)
# enabled = true

[audio]
# Audio input device ("default" uses the system default; otherwise matched
# by exact name or substring). List devices with: quickscribe devices
device = "default"

# Sample rate in Hz (speech-to-text APIs expect 16000)
sample_rate = 16000

# Recordings shorter than this are discarded without a network call
min_duration_ms = 300

# Maximum recording duration in seconds (safety limit)
max_duration_secs = 120

# [audio.feedback]
# Audio cues on recording start/stop/cancel/error
# enabled = true
# theme = "default"    # "default", "subtle", "mechanical"
# volume = 0.7

[recordings]
# Where finished recordings are written. The file is written before any
# network call, so a failed transcription still leaves audio to retry with
# `quickscribe transcribe <file>`.
# location: "app-data", "alongside" (next to the executable), or a path
location = "app-data"

# "overwrite" reuses one file; "timestamp" keeps a file per session
file_handling = "overwrite"

[transcribe]
# Speech-to-text model. "gpt-4o-transcribe"-style models return plain text;
# "whisper-1"-style models return verbose JSON. The request shape is picked
# from the model name.
model = "gpt-4o-transcribe"

# OpenAI-compatible API base URL
endpoint = "https://api.openai.com"

# API key; prefer the QUICKSCRIBE_API_KEY environment variable
# api_key = "sk-..."

# "auto" lets the server detect the spoken language
language = "auto"

# Request timeout in seconds
timeout_secs = 30

[edit]
# Text-rewrite model applied after transcription in record+edit mode.
# "gpt-5*" models use the responses API shape; others use chat completions.
model = "gpt-5-mini"
endpoint = "https://api.openai.com"
timeout_secs = 60
max_output_tokens = 8000

[retry]
# Transient failures (network, 5xx) are retried with exponential backoff;
# auth/quota/malformed requests fail immediately.
max_retries = 2
backoff_ms = 1000
backoff_multiplier = 3.0

[delivery]
# Copy the final text to the clipboard (copy failure fails the session)
copy = true

# Paste into the window that was focused when recording started
# (paste failure is logged but the text stays on the clipboard)
paste = true

[[prompt_profiles]]
name = "Default"
instructions = """
You copy-edit dictated text. Fix grammar, punctuation and obvious
dictation artifacts. Preserve the speaker's meaning and tone. Output only
the edited text, nothing else.
"""
"#;

/// Hotkey activation mode
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    /// Press once to start recording, press again to stop (default)
    #[default]
    Toggle,
    /// Hold key to record, release to stop
    PushToTalk,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub hotkey: HotkeyConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub recordings: RecordingsConfig,

    pub transcribe: TranscribeConfig,

    #[serde(default)]
    pub edit: EditConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Editing prompt profiles; a built-in Default is added when empty
    #[serde(default)]
    pub prompt_profiles: Vec<PromptProfileConfig>,

    /// Name of the initially selected prompt profile
    #[serde(default = "default_prompt_name")]
    pub selected_prompt: String,

    /// Optional path to a state file for external integrations.
    /// "auto" uses the runtime dir; "disabled" turns it off.
    #[serde(default)]
    pub state_file: Option<String>,
}

/// Hotkey bindings and supervision settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotkeyConfig {
    #[serde(default = "default_record_edit")]
    pub record_edit: String,

    #[serde(default = "default_record_transcribe")]
    pub record_transcribe: String,

    #[serde(default = "default_cancel")]
    pub cancel: String,

    #[serde(default = "default_prev_prompt")]
    pub prev_prompt: String,

    #[serde(default = "default_next_prompt")]
    pub next_prompt: String,

    #[serde(default)]
    pub mode: ActivationMode,

    /// Seconds between health probes of the OS-level registrations
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Input device name, or "default"
    #[serde(default = "default_device")]
    pub device: String,

    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Recordings below this duration are rejected as accidental taps
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,

    /// Maximum recording duration in seconds (safety limit)
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u32,

    #[serde(default)]
    pub feedback: FeedbackConfig,
}

/// Audio feedback configuration for sound cues
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedbackConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Sound theme: "default", "subtle", "mechanical"
    #[serde(default = "default_sound_theme")]
    pub theme: String,

    /// Volume level (0.0 to 1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,
}

/// Where and how finished recordings are persisted
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordingsConfig {
    /// "app-data", "alongside", or a custom directory path
    #[serde(default = "default_recordings_location")]
    pub location: String,

    /// "overwrite" or "timestamp"
    #[serde(default)]
    pub file_handling: FileHandling,
}

/// Recording file naming policy
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileHandling {
    /// One file, replaced each session
    #[default]
    Overwrite,
    /// One timestamp-suffixed file per session
    Timestamp,
}

/// Remote speech-to-text configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscribeConfig {
    /// Model name; determines the request/response shape
    pub model: String,

    /// OpenAI-compatible base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key (QUICKSCRIBE_API_KEY overrides)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Language code, or "auto" for server-side detection
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_transcribe_timeout")]
    pub timeout_secs: u64,
}

/// Remote text-rewrite configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EditConfig {
    pub model: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key; falls back to the transcribe key, then the environment
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_edit_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

/// Retry/backoff policy for the remote clients
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

/// Final text delivery flags
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_true")]
    pub copy: bool,

    #[serde(default = "default_true")]
    pub paste: bool,
}

/// A named editing instruction set
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptProfileConfig {
    pub name: String,
    pub instructions: String,
}

fn default_record_edit() -> String {
    "ctrl+alt+j".to_string()
}

fn default_record_transcribe() -> String {
    "ctrl+alt+shift+j".to_string()
}

fn default_cancel() -> String {
    "ctrl+alt+x".to_string()
}

fn default_prev_prompt() -> String {
    "alt+left".to_string()
}

fn default_next_prompt() -> String {
    "alt+right".to_string()
}

fn default_probe_interval() -> u64 {
    30
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_min_duration_ms() -> u64 {
    300
}

fn default_max_duration_secs() -> u32 {
    120
}

fn default_sound_theme() -> String {
    "default".to_string()
}

fn default_volume() -> f32 {
    0.7
}

fn default_recordings_location() -> String {
    "app-data".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_transcribe_timeout() -> u64 {
    30
}

fn default_edit_timeout() -> u64 {
    60
}

fn default_max_output_tokens() -> u32 {
    8000
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    3.0
}

fn default_prompt_name() -> String {
    "Default".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            record_edit: default_record_edit(),
            record_transcribe: default_record_transcribe(),
            cancel: default_cancel(),
            prev_prompt: default_prev_prompt(),
            next_prompt: default_next_prompt(),
            mode: ActivationMode::default(),
            probe_interval_secs: default_probe_interval(),
            enabled: true,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
            min_duration_ms: default_min_duration_ms(),
            max_duration_secs: default_max_duration_secs(),
            feedback: FeedbackConfig::default(),
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            theme: default_sound_theme(),
            volume: default_volume(),
        }
    }
}

impl Default for RecordingsConfig {
    fn default() -> Self {
        Self {
            location: default_recordings_location(),
            file_handling: FileHandling::default(),
        }
    }
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            model: "gpt-5-mini".to_string(),
            endpoint: default_endpoint(),
            api_key: None,
            timeout_secs: default_edit_timeout(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            copy: true,
            paste: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: HotkeyConfig::default(),
            audio: AudioConfig::default(),
            recordings: RecordingsConfig::default(),
            transcribe: TranscribeConfig {
                model: "gpt-4o-transcribe".to_string(),
                endpoint: default_endpoint(),
                api_key: None,
                language: default_language(),
                timeout_secs: default_transcribe_timeout(),
            },
            edit: EditConfig::default(),
            retry: RetryConfig::default(),
            delivery: DeliveryConfig::default(),
            prompt_profiles: Vec::new(),
            selected_prompt: default_prompt_name(),
            state_file: Some("auto".to_string()),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "quickscribe")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the runtime directory for ephemeral files (state file)
    pub fn runtime_dir() -> PathBuf {
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir())
            .join("quickscribe")
    }

    /// Get the data directory path (recordings)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "quickscribe")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve the state file path from config.
    /// Returns None when disabled, the runtime-dir path for "auto".
    pub fn resolve_state_file(&self) -> Option<PathBuf> {
        self.state_file
            .as_ref()
            .and_then(|path| match path.to_lowercase().as_str() {
                "disabled" | "none" | "off" | "false" => None,
                "auto" => Some(Self::runtime_dir().join("state")),
                _ => Some(PathBuf::from(path)),
            })
    }

    /// Effective API key for the transcription client
    pub fn transcribe_api_key(&self) -> Option<String> {
        self.transcribe
            .api_key
            .clone()
            .or_else(|| std::env::var("QUICKSCRIBE_API_KEY").ok())
    }

    /// Effective API key for the editing client (falls back to transcribe key)
    pub fn edit_api_key(&self) -> Option<String> {
        self.edit
            .api_key
            .clone()
            .or_else(|| self.transcribe_api_key())
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, QuickscribeError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| QuickscribeError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| QuickscribeError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(model) = std::env::var("QUICKSCRIBE_TRANSCRIBE_MODEL") {
        config.transcribe.model = model;
    }
    if let Ok(model) = std::env::var("QUICKSCRIBE_EDIT_MODEL") {
        config.edit.model = model;
    }
    if let Ok(endpoint) = std::env::var("QUICKSCRIBE_ENDPOINT") {
        config.transcribe.endpoint = endpoint.clone();
        config.edit.endpoint = endpoint;
    }

    Ok(config)
}

/// Write the commented default config to the given path
pub fn write_default_config(path: &Path) -> Result<(), QuickscribeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| QuickscribeError::Config(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| QuickscribeError::Config(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hotkey.record_edit, "ctrl+alt+j");
        assert_eq!(config.hotkey.mode, ActivationMode::Toggle);
        assert_eq!(config.hotkey.probe_interval_secs, 30);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.min_duration_ms, 300);
        assert_eq!(config.transcribe.model, "gpt-4o-transcribe");
        assert_eq!(config.retry.max_retries, 2);
        assert!(config.delivery.copy);
        assert!(config.delivery.paste);
    }

    #[test]
    fn test_default_config_template_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.transcribe.model, "gpt-4o-transcribe");
        assert_eq!(config.recordings.file_handling, FileHandling::Overwrite);
        assert_eq!(config.prompt_profiles.len(), 1);
        assert_eq!(config.prompt_profiles[0].name, "Default");
        assert_eq!(config.selected_prompt, "Default");
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
            [hotkey]
            record_edit = "meta+alt+j"
            mode = "push_to_talk"

            [audio]
            device = "USB Microphone"
            min_duration_ms = 500

            [recordings]
            location = "/tmp/recs"
            file_handling = "timestamp"

            [transcribe]
            model = "whisper-1"
            language = "en"

            [edit]
            model = "gpt-4o"

            [retry]
            max_retries = 4
            backoff_ms = 250

            [delivery]
            copy = true
            paste = false
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.hotkey.record_edit, "meta+alt+j");
        assert_eq!(config.hotkey.record_transcribe, "ctrl+alt+shift+j"); // default
        assert_eq!(config.hotkey.mode, ActivationMode::PushToTalk);
        assert_eq!(config.audio.device, "USB Microphone");
        assert_eq!(config.audio.min_duration_ms, 500);
        assert_eq!(config.recordings.location, "/tmp/recs");
        assert_eq!(config.recordings.file_handling, FileHandling::Timestamp);
        assert_eq!(config.transcribe.model, "whisper-1");
        assert_eq!(config.retry.max_retries, 4);
        assert!(!config.delivery.paste);
    }

    #[test]
    fn test_resolve_state_file_disabled() {
        let mut config = Config::default();
        config.state_file = Some("disabled".to_string());
        assert!(config.resolve_state_file().is_none());

        config.state_file = Some("/tmp/qs-state".to_string());
        assert_eq!(
            config.resolve_state_file(),
            Some(PathBuf::from("/tmp/qs-state"))
        );
    }

    #[test]
    fn test_edit_key_falls_back_to_transcribe_key() {
        let mut config = Config::default();
        config.transcribe.api_key = Some("sk-shared".to_string());
        assert_eq!(config.edit_api_key(), Some("sk-shared".to_string()));

        config.edit.api_key = Some("sk-edit".to_string());
        assert_eq!(config.edit_api_key(), Some("sk-edit".to_string()));
    }
}
