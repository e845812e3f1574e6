//! Global hotkey module
//!
//! Turns OS-level key events into the abstract control events the
//! orchestrator consumes. Owns the binding set for the five logical actions,
//! registered and unregistered as a unit, and supervises the registrations
//! with a periodic health probe: some OS lock/unlock cycles silently drop
//! global hooks, so dead bindings are re-registered automatically.

pub mod listener;
pub mod platform;
mod watcher;

pub use watcher::{HotkeyWatcher, WatcherNotice};

use crate::config::HotkeyConfig;
use crate::error::RegistrationError;
use std::collections::BTreeSet;
use tokio::sync::mpsc;

/// Logical actions a key combo can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    RecordEdit,
    RecordTranscribe,
    Cancel,
    PrevPrompt,
    NextPrompt,
}

impl HotkeyAction {
    pub const ALL: [HotkeyAction; 5] = [
        HotkeyAction::RecordEdit,
        HotkeyAction::RecordTranscribe,
        HotkeyAction::Cancel,
        HotkeyAction::PrevPrompt,
        HotkeyAction::NextPrompt,
    ];
}

impl std::fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HotkeyAction::RecordEdit => "record_edit",
            HotkeyAction::RecordTranscribe => "record_transcribe",
            HotkeyAction::Cancel => "cancel",
            HotkeyAction::PrevPrompt => "prev_prompt",
            HotkeyAction::NextPrompt => "next_prompt",
        };
        write!(f, "{}", name)
    }
}

/// A parsed key combination: zero or more modifiers plus one trigger key.
/// Matching is by exact pressed-set equality, so ctrl+alt+shift+j does not
/// fire the ctrl+alt+j binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: BTreeSet<String>,
    pub key: String,
}

const MODIFIER_NAMES: [&str; 4] = ["ctrl", "alt", "shift", "meta"];

impl KeyCombo {
    /// Parse a combo string like "ctrl+alt+j" or "meta+shift+left".
    /// Modifier aliases: control→ctrl, cmd/command/win/super→meta.
    pub fn parse(spec: &str) -> Result<Self, RegistrationError> {
        let mut modifiers = BTreeSet::new();
        let mut key: Option<String> = None;

        for part in spec.split('+') {
            let token = normalize_token(part);
            if token.is_empty() {
                continue;
            }
            if MODIFIER_NAMES.contains(&token.as_str()) {
                modifiers.insert(token);
            } else if listener::is_known_key(&token) {
                if key.replace(token).is_some() {
                    return Err(RegistrationError::InvalidCombo(spec.to_string()));
                }
            } else {
                return Err(RegistrationError::UnknownKey(part.trim().to_string()));
            }
        }

        match key {
            Some(key) => Ok(Self { modifiers, key }),
            None => Err(RegistrationError::InvalidCombo(spec.to_string())),
        }
    }

    /// Whether the currently pressed key set matches this combo exactly
    pub fn matches(&self, pressed: &std::collections::HashSet<String>) -> bool {
        if pressed.len() != self.modifiers.len() + 1 {
            return false;
        }
        pressed.contains(&self.key) && self.modifiers.iter().all(|m| pressed.contains(m))
    }

    /// Whether the given key participates in this combo
    pub fn involves(&self, token: &str) -> bool {
        self.key == token || self.modifiers.contains(token)
    }
}

impl std::fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Stable modifier order for display
        for name in ["ctrl", "alt", "shift", "meta"] {
            if self.modifiers.contains(name) {
                write!(f, "{}+", name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}

fn normalize_token(token: &str) -> String {
    let token = token.trim().to_lowercase();
    match token.as_str() {
        "control" => "ctrl".to_string(),
        "cmd" | "command" | "win" | "super" => "meta".to_string(),
        other => other.to_string(),
    }
}

/// One logical action bound to a key combination
#[derive(Debug, Clone)]
pub struct Binding {
    pub action: HotkeyAction,
    pub combo: KeyCombo,
}

/// Parse the configured combo strings into bindings. Unparsable combos are
/// reported per-binding; the rest of the set stays usable.
pub fn bindings_from_config(
    config: &HotkeyConfig,
) -> (Vec<Binding>, Vec<(HotkeyAction, RegistrationError)>) {
    let specs = [
        (HotkeyAction::RecordEdit, config.record_edit.as_str()),
        (
            HotkeyAction::RecordTranscribe,
            config.record_transcribe.as_str(),
        ),
        (HotkeyAction::Cancel, config.cancel.as_str()),
        (HotkeyAction::PrevPrompt, config.prev_prompt.as_str()),
        (HotkeyAction::NextPrompt, config.next_prompt.as_str()),
    ];

    let mut bindings = Vec::new();
    let mut failures = Vec::new();

    for (action, spec) in specs {
        match KeyCombo::parse(spec) {
            Ok(combo) => bindings.push(Binding { action, combo }),
            Err(e) => failures.push((action, e)),
        }
    }

    (bindings, failures)
}

/// A matched binding press or release, emitted by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEvent {
    pub action: HotkeyAction,
    pub pressed: bool,
}

/// Interface over the platform hotkey machinery.
///
/// One implementation per OS, selected at process start; see
/// [`platform::PlatformHotkeys`].
pub trait HotkeyBackend: Send {
    /// Register the full binding set, replacing any previous set.
    /// Idempotent. Returns per-binding failures; the others stay registered.
    fn register(&mut self, bindings: &[Binding]) -> Vec<(HotkeyAction, RegistrationError)>;

    /// Release all bindings. Safe to call when none are registered.
    fn unregister(&mut self);

    /// Whether the registration for this action is still live at the OS level
    fn probe(&self, action: HotkeyAction) -> bool;
}

/// Channel capacity for raw action events
pub(crate) fn action_channel() -> (mpsc::Sender<ActionEvent>, mpsc::Receiver<ActionEvent>) {
    mpsc::channel(32)
}
