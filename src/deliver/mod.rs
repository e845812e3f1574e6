//! Final text delivery: clipboard copy and paste keystroke synthesis
//!
//! Copy always runs first and its failure fails the call; paste runs only
//! after a successful copy and its failure is reported as a warning, never
//! reverting the copy. The paste target is the window that was focused when
//! recording started, captured at session creation since focus may move
//! during transcription.
//!
//! All methods block briefly (clipboard, subprocess, keystroke timing) and
//! are called from worker context, never the event loop.

use crate::config::DeliveryConfig;
use crate::error::DeliveryError;
use crate::hotkey::platform::Platform;
use std::process::Command;
use std::time::Duration;

/// Opaque handle to the window focused at hotkey-press time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusTarget {
    window_id: String,
}

/// What delivery accomplished beyond the clipboard copy
#[derive(Debug, Clone, Default)]
pub struct DeliveryOutcome {
    pub pasted: bool,
    pub warning: Option<String>,
}

/// Trait for delivery implementations
pub trait DeliverySink: Send + Sync {
    /// Snapshot the currently focused window. Best effort: None means paste
    /// will go to whatever holds focus at delivery time.
    fn capture_focus(&self) -> Option<FocusTarget>;

    /// Deliver text per the flags. Err means the clipboard copy failed and
    /// nothing was delivered.
    fn deliver(
        &self,
        text: &str,
        flags: &DeliveryConfig,
        target: Option<&FocusTarget>,
    ) -> Result<DeliveryOutcome, DeliveryError>;
}

/// Clipboard + synthesized paste keystroke delivery
pub struct SystemDeliverySink {
    platform: Platform,
}

impl SystemDeliverySink {
    pub fn new() -> Self {
        Self {
            platform: Platform::detect(),
        }
    }

    fn copy_to_clipboard(&self, text: &str) -> Result<(), DeliveryError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| DeliveryError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| DeliveryError::Clipboard(e.to_string()))?;
        tracing::info!("Text copied to clipboard ({} chars)", text.len());
        Ok(())
    }

    /// Re-activate the captured window before pasting (X11 only)
    fn refocus(&self, target: &FocusTarget) -> Result<(), DeliveryError> {
        let status = Command::new("xdotool")
            .args(["windowactivate", "--sync", &target.window_id])
            .status()
            .map_err(|e| DeliveryError::Refocus(e.to_string()))?;

        if !status.success() {
            return Err(DeliveryError::Refocus(format!(
                "xdotool windowactivate exited with {}",
                status
            )));
        }
        Ok(())
    }

    /// Synthesize the platform paste chord (Ctrl+V, Cmd+V on macOS)
    fn send_paste_chord(&self) -> Result<(), DeliveryError> {
        use rdev::{simulate, EventType, Key};

        let modifier = paste_modifier(self.platform);
        let sequence = [
            EventType::KeyPress(modifier),
            EventType::KeyPress(Key::KeyV),
            EventType::KeyRelease(Key::KeyV),
            EventType::KeyRelease(modifier),
        ];

        for event in &sequence {
            simulate(event).map_err(|e| DeliveryError::Paste(format!("{:?}", e)))?;
            // Some targets drop events injected back-to-back
            std::thread::sleep(Duration::from_millis(20));
        }

        Ok(())
    }
}

impl Default for SystemDeliverySink {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliverySink for SystemDeliverySink {
    fn capture_focus(&self) -> Option<FocusTarget> {
        // xdotool covers X11; elsewhere paste lands in the current focus
        let output = Command::new("xdotool")
            .arg("getactivewindow")
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let window_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if window_id.is_empty() {
            return None;
        }

        tracing::debug!("Captured focus target: window {}", window_id);
        Some(FocusTarget { window_id })
    }

    fn deliver(
        &self,
        text: &str,
        flags: &DeliveryConfig,
        target: Option<&FocusTarget>,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let mut outcome = DeliveryOutcome::default();

        if flags.copy {
            self.copy_to_clipboard(text)?;
        }

        if !flags.paste {
            return Ok(outcome);
        }

        // Paste requires the text on the clipboard; without copy there is
        // nothing to paste.
        if !flags.copy {
            outcome.warning = Some("paste requested without copy, skipped".to_string());
            return Ok(outcome);
        }

        if let Some(target) = target {
            if let Err(e) = self.refocus(target) {
                tracing::warn!("Refocus failed, pasting into current focus: {}", e);
            }
        }

        // Let the clipboard settle before the paste chord
        std::thread::sleep(Duration::from_millis(100));

        match self.send_paste_chord() {
            Ok(()) => {
                outcome.pasted = true;
                tracing::info!("Pasted {} chars into the focused window", text.len());
            }
            Err(e) => {
                // The text is already on the clipboard; never undo that
                tracing::warn!("Paste failed (text remains on clipboard): {}", e);
                outcome.warning = Some(format!("paste failed: {}", e));
            }
        }

        Ok(outcome)
    }
}

fn paste_modifier(platform: Platform) -> rdev::Key {
    match platform {
        Platform::MacOs => rdev::Key::MetaLeft,
        Platform::Linux | Platform::Windows => rdev::Key::ControlLeft,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paste_modifier_per_platform() {
        assert_eq!(paste_modifier(Platform::MacOs), rdev::Key::MetaLeft);
        assert_eq!(paste_modifier(Platform::Linux), rdev::Key::ControlLeft);
        assert_eq!(paste_modifier(Platform::Windows), rdev::Key::ControlLeft);
    }

    #[test]
    fn test_outcome_default_has_no_warning() {
        let outcome = DeliveryOutcome::default();
        assert!(!outcome.pasted);
        assert!(outcome.warning.is_none());
    }
}
