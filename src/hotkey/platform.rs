//! Platform-specific hotkey backends
//!
//! One variant per OS, selected by runtime platform detection and dispatched
//! as a tagged enum. All three ride the same global listener; they differ in
//! the guidance they log when the hook cannot start (macOS needs an
//! Accessibility grant, Wayland compositors restrict global hooks) and in
//! which modifier the conventional defaults use.

use super::listener::RdevListener;
use super::{ActionEvent, Binding, HotkeyAction, HotkeyBackend};
use crate::error::RegistrationError;
use tokio::sync::mpsc;

/// Runtime-detected platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            _ => Platform::Linux,
        }
    }
}

/// Tagged-variant dispatch over the per-OS backends
pub enum PlatformHotkeys {
    Windows(WindowsHotkeys),
    MacOs(MacOsHotkeys),
    Linux(LinuxHotkeys),
}

impl PlatformHotkeys {
    /// Build the backend for the detected platform
    pub fn new(tx: mpsc::Sender<ActionEvent>) -> Self {
        Self::for_platform(Platform::detect(), tx)
    }

    pub fn for_platform(platform: Platform, tx: mpsc::Sender<ActionEvent>) -> Self {
        match platform {
            Platform::Windows => PlatformHotkeys::Windows(WindowsHotkeys {
                listener: RdevListener::new(tx),
            }),
            Platform::MacOs => PlatformHotkeys::MacOs(MacOsHotkeys {
                listener: RdevListener::new(tx),
            }),
            Platform::Linux => PlatformHotkeys::Linux(LinuxHotkeys {
                listener: RdevListener::new(tx),
            }),
        }
    }
}

impl HotkeyBackend for PlatformHotkeys {
    fn register(&mut self, bindings: &[Binding]) -> Vec<(HotkeyAction, RegistrationError)> {
        match self {
            PlatformHotkeys::Windows(b) => b.register(bindings),
            PlatformHotkeys::MacOs(b) => b.register(bindings),
            PlatformHotkeys::Linux(b) => b.register(bindings),
        }
    }

    fn unregister(&mut self) {
        match self {
            PlatformHotkeys::Windows(b) => b.listener.unregister(),
            PlatformHotkeys::MacOs(b) => b.listener.unregister(),
            PlatformHotkeys::Linux(b) => b.listener.unregister(),
        }
    }

    fn probe(&self, action: HotkeyAction) -> bool {
        match self {
            PlatformHotkeys::Windows(b) => b.listener.probe(action),
            PlatformHotkeys::MacOs(b) => b.listener.probe(action),
            PlatformHotkeys::Linux(b) => b.listener.probe(action),
        }
    }
}

/// Windows backend. Lock/unlock cycles are the main way registrations die
/// here; the health probe and unlock refresh recover them.
pub struct WindowsHotkeys {
    listener: RdevListener,
}

impl WindowsHotkeys {
    fn register(&mut self, bindings: &[Binding]) -> Vec<(HotkeyAction, RegistrationError)> {
        self.listener.register(bindings)
    }
}

/// macOS backend. The global hook needs an Accessibility permission grant;
/// conventional combos use cmd (meta) rather than ctrl.
pub struct MacOsHotkeys {
    listener: RdevListener,
}

impl MacOsHotkeys {
    fn register(&mut self, bindings: &[Binding]) -> Vec<(HotkeyAction, RegistrationError)> {
        let failures = self.listener.register(bindings);
        if !failures.is_empty() {
            tracing::warn!(
                "Global hotkeys unavailable. Grant Accessibility permission in \
                 System Settings > Privacy & Security > Accessibility, then restart."
            );
        }
        failures
    }
}

/// Linux backend. X11 works out of the box; Wayland compositors may not
/// expose global key events to the hook.
pub struct LinuxHotkeys {
    listener: RdevListener,
}

impl LinuxHotkeys {
    fn register(&mut self, bindings: &[Binding]) -> Vec<(HotkeyAction, RegistrationError)> {
        let failures = self.listener.register(bindings);
        if !failures.is_empty() && std::env::var("WAYLAND_DISPLAY").is_ok() {
            tracing::warn!(
                "Global hotkeys are limited under Wayland; X11 is recommended, \
                 or disable [hotkey] and drive recording via the CLI."
            );
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_returns_a_variant() {
        let (tx, _rx) = crate::hotkey::action_channel();
        let backend = PlatformHotkeys::new(tx);
        // Nothing registered yet, so every probe reports dead
        assert!(!backend.probe(HotkeyAction::RecordEdit));
    }

    #[test]
    fn test_for_platform_variants() {
        let (tx, _rx) = crate::hotkey::action_channel();
        assert!(matches!(
            PlatformHotkeys::for_platform(Platform::Windows, tx.clone()),
            PlatformHotkeys::Windows(_)
        ));
        assert!(matches!(
            PlatformHotkeys::for_platform(Platform::MacOs, tx.clone()),
            PlatformHotkeys::MacOs(_)
        ));
        assert!(matches!(
            PlatformHotkeys::for_platform(Platform::Linux, tx),
            PlatformHotkeys::Linux(_)
        ));
    }
}
