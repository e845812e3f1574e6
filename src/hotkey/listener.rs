//! Shared global key listener built on rdev
//!
//! A dedicated thread runs the OS-level hook and reduces raw key presses to
//! matched binding events. rdev's listen loop cannot be stopped once
//! started, so unregister flips an enabled flag that makes the callback
//! ignore everything; the health probe treats a finished listener thread as
//! a dead registration and respawns it.

use super::{ActionEvent, Binding, HotkeyAction};
use crate::error::RegistrationError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::mpsc;

/// State shared between the handle and the listener thread
struct Shared {
    enabled: AtomicBool,
    bindings: Mutex<Vec<Binding>>,
}

/// Handle to the global listener thread
pub struct RdevListener {
    shared: Arc<Shared>,
    tx: mpsc::Sender<ActionEvent>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RdevListener {
    pub fn new(tx: mpsc::Sender<ActionEvent>) -> Self {
        Self {
            shared: Arc::new(Shared {
                enabled: AtomicBool::new(false),
                bindings: Mutex::new(Vec::new()),
            }),
            tx,
            thread: None,
        }
    }

    /// Replace the binding set and make sure the listener thread is running
    pub fn register(&mut self, bindings: &[Binding]) -> Vec<(HotkeyAction, RegistrationError)> {
        {
            let mut guard = self.shared.bindings.lock().unwrap();
            *guard = bindings.to_vec();
        }
        self.shared.enabled.store(true, Ordering::SeqCst);

        let thread_dead = self
            .thread
            .as_ref()
            .map(|t| t.is_finished())
            .unwrap_or(true);

        if thread_dead {
            if let Some(old) = self.thread.take() {
                let _ = old.join();
            }

            let shared = self.shared.clone();
            let tx = self.tx.clone();
            self.thread = Some(thread::spawn(move || listener_loop(shared, tx)));

            // rdev reports hook failures by returning from listen almost
            // immediately; give it a moment so startup failures surface here
            // instead of on the first probe.
            thread::sleep(std::time::Duration::from_millis(50));

            if self
                .thread
                .as_ref()
                .map(|t| t.is_finished())
                .unwrap_or(true)
            {
                let error = RegistrationError::ListenerFailed(
                    "global key hook exited immediately".to_string(),
                );
                return bindings
                    .iter()
                    .map(|b| (b.action, error.clone()))
                    .collect();
            }
        }

        Vec::new()
    }

    /// Release all bindings. The OS hook keeps running but matches nothing.
    pub fn unregister(&mut self) {
        self.shared.enabled.store(false, Ordering::SeqCst);
        self.shared.bindings.lock().unwrap().clear();
    }

    /// Whether the registration for this action is still live
    pub fn probe(&self, action: HotkeyAction) -> bool {
        if !self.shared.enabled.load(Ordering::SeqCst) {
            return false;
        }
        let registered = self
            .shared
            .bindings
            .lock()
            .unwrap()
            .iter()
            .any(|b| b.action == action);
        let thread_alive = self
            .thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false);
        registered && thread_alive
    }
}

/// Listener thread body: run the OS hook until it dies
fn listener_loop(shared: Arc<Shared>, tx: mpsc::Sender<ActionEvent>) {
    let mut tracker = ComboTracker::default();

    let result = rdev::listen(move |event| {
        let (token, is_press) = match event.event_type {
            rdev::EventType::KeyPress(key) => match key_token(key) {
                Some(t) => (t, true),
                None => return,
            },
            rdev::EventType::KeyRelease(key) => match key_token(key) {
                Some(t) => (t, false),
                None => return,
            },
            _ => return,
        };

        if !shared.enabled.load(Ordering::SeqCst) {
            tracker.reset();
            return;
        }

        let bindings = shared.bindings.lock().unwrap();
        for action_event in tracker.on_key(&token, is_press, &bindings) {
            // The receiver drains fast; drop events rather than block the
            // OS hook thread.
            if tx.try_send(action_event).is_err() {
                tracing::warn!("Hotkey event channel full, dropping {:?}", action_event);
            }
        }
    });

    if let Err(e) = result {
        tracing::error!("Global key hook failed: {:?}", e);
    }
    tracing::debug!("Hotkey listener thread exited");
}

/// Reduces a stream of key press/release tokens to binding press/release
/// events, with exact pressed-set matching and repeat suppression.
#[derive(Default)]
pub struct ComboTracker {
    pressed: HashSet<String>,
    active: HashSet<HotkeyAction>,
}

impl ComboTracker {
    pub fn on_key(&mut self, token: &str, is_press: bool, bindings: &[Binding]) -> Vec<ActionEvent> {
        let mut events = Vec::new();

        if is_press {
            // OS key-repeat shows up as repeated presses
            if !self.pressed.insert(token.to_string()) {
                return events;
            }
            for binding in bindings {
                if !self.active.contains(&binding.action) && binding.combo.matches(&self.pressed) {
                    self.active.insert(binding.action);
                    events.push(ActionEvent {
                        action: binding.action,
                        pressed: true,
                    });
                }
            }
        } else {
            for binding in bindings {
                if self.active.contains(&binding.action) && binding.combo.involves(token) {
                    self.active.remove(&binding.action);
                    events.push(ActionEvent {
                        action: binding.action,
                        pressed: false,
                    });
                }
            }
            self.pressed.remove(token);
        }

        events
    }

    pub fn reset(&mut self) {
        self.pressed.clear();
        self.active.clear();
    }
}

/// Normalize an rdev key to a combo token
pub fn key_token(key: rdev::Key) -> Option<String> {
    use rdev::Key::*;

    let token = match key {
        ControlLeft | ControlRight => "ctrl",
        Alt | AltGr => "alt",
        ShiftLeft | ShiftRight => "shift",
        MetaLeft | MetaRight => "meta",

        KeyA => "a",
        KeyB => "b",
        KeyC => "c",
        KeyD => "d",
        KeyE => "e",
        KeyF => "f",
        KeyG => "g",
        KeyH => "h",
        KeyI => "i",
        KeyJ => "j",
        KeyK => "k",
        KeyL => "l",
        KeyM => "m",
        KeyN => "n",
        KeyO => "o",
        KeyP => "p",
        KeyQ => "q",
        KeyR => "r",
        KeyS => "s",
        KeyT => "t",
        KeyU => "u",
        KeyV => "v",
        KeyW => "w",
        KeyX => "x",
        KeyY => "y",
        KeyZ => "z",

        Num0 => "0",
        Num1 => "1",
        Num2 => "2",
        Num3 => "3",
        Num4 => "4",
        Num5 => "5",
        Num6 => "6",
        Num7 => "7",
        Num8 => "8",
        Num9 => "9",

        LeftArrow => "left",
        RightArrow => "right",
        UpArrow => "up",
        DownArrow => "down",

        LeftBracket => "[",
        RightBracket => "]",

        Space => "space",
        Return => "enter",
        Tab => "tab",
        Escape => "escape",
        Backspace => "backspace",
        Delete => "delete",
        Home => "home",
        End => "end",
        PageUp => "pageup",
        PageDown => "pagedown",
        Insert => "insert",

        F1 => "f1",
        F2 => "f2",
        F3 => "f3",
        F4 => "f4",
        F5 => "f5",
        F6 => "f6",
        F7 => "f7",
        F8 => "f8",
        F9 => "f9",
        F10 => "f10",
        F11 => "f11",
        F12 => "f12",

        _ => return None,
    };

    Some(token.to_string())
}

/// Whether a combo token names a key the listener can report
pub fn is_known_key(token: &str) -> bool {
    if token.len() == 1 {
        let c = token.chars().next().unwrap();
        return c.is_ascii_lowercase() || c.is_ascii_digit() || c == '[' || c == ']';
    }

    matches!(
        token,
        "left"
            | "right"
            | "up"
            | "down"
            | "space"
            | "enter"
            | "tab"
            | "escape"
            | "backspace"
            | "delete"
            | "home"
            | "end"
            | "pageup"
            | "pagedown"
            | "insert"
            | "f1"
            | "f2"
            | "f3"
            | "f4"
            | "f5"
            | "f6"
            | "f7"
            | "f8"
            | "f9"
            | "f10"
            | "f11"
            | "f12"
    )
}
