//! Daemon module - component wiring and the UI drain loop
//!
//! Builds the orchestrator and its collaborators from config, starts the
//! hotkey watcher and system event watcher, then drains the ordered notice
//! stream: state file writes, feedback cues, and exactly one desktop
//! notification per terminal session state.

use crate::capture::store::RecordingStore;
use crate::capture::CpalCaptureFactory;
use crate::config::Config;
use crate::deliver::{DeliverySink, SystemDeliverySink};
use crate::error::Result;
use crate::feedback::{AudioFeedback, SoundEvent};
use crate::hotkey::platform::PlatformHotkeys;
use crate::hotkey::{self, HotkeyWatcher, WatcherNotice};
use crate::orchestrator::{
    Collaborators, Notice, Orchestrator, OrchestratorConfig, SessionNotice,
};
use crate::prompts::PromptLibrary;
use crate::retry::RetryPolicy;
use crate::session::{SessionId, Stage};
use crate::system_events::SystemEventWatcher;
use crate::{edit, transcribe};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;

/// Send a desktop notification
async fn send_notification(title: &str, body: &str) {
    let _ = Command::new("notify-send")
        .args(["--app-name=Quickscribe", "--expire-time=3000", title, body])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
}

/// Write state to file for external integrations (e.g., Waybar)
fn write_state_file(path: &PathBuf, state: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create state file directory: {}", e);
            return;
        }
    }

    if let Err(e) = std::fs::write(path, state) {
        tracing::warn!("Failed to write state file: {}", e);
    }
}

/// Remove state file on shutdown
fn cleanup_state_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove state file: {}", e);
        }
    }
}

/// Resolves when the process should shut down (SIGTERM on Unix)
#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(e) => {
            tracing::warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}

/// Main daemon that wires all components together
pub struct Daemon {
    config: Config,
    state_file_path: Option<PathBuf>,
    audio_feedback: Option<AudioFeedback>,
    /// Highest session id already reported terminal; later notices for it
    /// (there should be none) are ignored
    last_terminal: Option<SessionId>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        let state_file_path = config.resolve_state_file();

        let audio_feedback = if config.audio.feedback.enabled {
            match AudioFeedback::new(&config.audio.feedback) {
                Ok(feedback) => {
                    tracing::info!(
                        "Audio feedback enabled (theme: {}, volume: {:.0}%)",
                        config.audio.feedback.theme,
                        config.audio.feedback.volume * 100.0
                    );
                    Some(feedback)
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize audio feedback: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            config,
            state_file_path,
            audio_feedback,
            last_terminal: None,
        }
    }

    fn play_feedback(&self, event: SoundEvent) {
        if let Some(ref feedback) = self.audio_feedback {
            feedback.play(event);
        }
    }

    fn update_state(&self, state_name: &str) {
        if let Some(ref path) = self.state_file_path {
            write_state_file(path, state_name);
        }
    }

    /// Run the daemon until Ctrl+C or SIGTERM
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting quickscribe daemon");

        let transcriber: Arc<dyn transcribe::Transcriber> = Arc::from(transcribe::create_transcriber(
            &self.config.transcribe,
            self.config.transcribe_api_key(),
            self.config.audio.sample_rate,
        )?);

        let editor: Arc<dyn edit::Editor> =
            Arc::from(edit::create_editor(&self.config.edit, self.config.edit_api_key())?);

        let delivery: Arc<dyn DeliverySink> = Arc::new(SystemDeliverySink::new());
        let store = Arc::new(RecordingStore::new(&self.config.recordings));
        tracing::info!("Recordings directory: {:?}", store.dir());

        let prompts = PromptLibrary::from_config(&self.config);
        tracing::info!(
            "Prompt profiles: {} (selected: {})",
            prompts.len(),
            prompts.selected().name
        );

        let (control_tx, control_rx) = mpsc::channel(32);
        let (notice_tx, mut notice_rx) = mpsc::channel(64);

        let orchestrator = Orchestrator::new(
            OrchestratorConfig {
                retry: RetryPolicy::from_config(&self.config.retry),
                delivery: self.config.delivery,
                sample_rate: self.config.audio.sample_rate,
                max_duration: Duration::from_secs(self.config.audio.max_duration_secs as u64),
            },
            Collaborators {
                capture: Box::new(CpalCaptureFactory::new(&self.config.audio)),
                transcriber,
                editor,
                delivery,
                store,
            },
            prompts,
            control_rx,
            notice_tx,
        );
        let orchestrator_task = tokio::spawn(orchestrator.run());

        if self.config.hotkey.enabled {
            let (action_tx, action_rx) = hotkey::action_channel();
            let (system_tx, system_rx) = mpsc::channel(8);
            let (watch_tx, mut watch_rx) = mpsc::channel(16);

            let backend = Box::new(PlatformHotkeys::new(action_tx));
            let watcher = HotkeyWatcher::new(
                &self.config.hotkey,
                backend,
                action_rx,
                control_tx.clone(),
                system_rx,
                watch_tx,
            );
            tokio::spawn(watcher.run());
            tokio::spawn(SystemEventWatcher::new(system_tx).run());

            // Watcher diagnostics only need logging
            tokio::spawn(async move {
                while let Some(notice) = watch_rx.recv().await {
                    match notice {
                        WatcherNotice::Refreshed { action } => {
                            tracing::info!("Re-registered dead hotkey binding: {}", action);
                        }
                        WatcherNotice::ForcedRefresh => {
                            tracing::info!("Hotkey bindings refreshed after session unlock");
                        }
                        WatcherNotice::RegistrationFailed { action, error } => {
                            tracing::warn!("Hotkey {} unavailable: {}", action, error);
                        }
                    }
                }
            });

            tracing::info!(
                "Hotkeys: record+edit {}, record {}, cancel {} ({:?} mode)",
                self.config.hotkey.record_edit,
                self.config.hotkey.record_transcribe,
                self.config.hotkey.cancel,
                self.config.hotkey.mode
            );
        } else {
            tracing::info!("Hotkeys disabled; use 'quickscribe transcribe' for saved audio");
        }

        self.update_state("idle");

        let terminate = terminate_signal();
        tokio::pin!(terminate);

        // Drain the ordered notice stream until shutdown
        loop {
            tokio::select! {
                notice = notice_rx.recv() => {
                    match notice {
                        Some(notice) => self.handle_notice(notice).await,
                        None => break,
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT, shutting down...");
                    break;
                }

                _ = &mut terminate => {
                    tracing::info!("Received SIGTERM, shutting down...");
                    break;
                }
            }
        }

        drop(control_tx);
        orchestrator_task.abort();

        if let Some(ref path) = self.state_file_path {
            cleanup_state_file(path);
        }

        tracing::info!("Daemon stopped");
        Ok(())
    }

    async fn handle_notice(&mut self, notice: Notice) {
        match notice {
            Notice::Session(notice) => self.handle_session_notice(notice).await,
            Notice::PromptSelected { name } => {
                send_notification("Prompt selected", &name).await;
            }
        }
    }

    async fn handle_session_notice(&mut self, notice: SessionNotice) {
        // Ids are monotonic; anything at or below the last terminal id has
        // already finished
        if let Some(last) = self.last_terminal {
            if notice.id <= last {
                tracing::debug!("Ignoring notice for finished session {}", notice.id);
                return;
            }
        }

        self.update_state(notice.stage.state_name());

        match notice.stage {
            Stage::Recording => self.play_feedback(SoundEvent::RecordingStart),
            Stage::Stopping => self.play_feedback(SoundEvent::RecordingStop),
            Stage::Transcribing | Stage::Editing | Stage::Delivering => {}

            Stage::Delivered => {
                self.last_terminal = Some(notice.id);
                let preview = notice
                    .text
                    .as_deref()
                    .map(preview_text)
                    .unwrap_or_default();
                match notice.warning {
                    Some(warning) => {
                        tracing::warn!("Session {} delivered with warning: {}", notice.id, warning);
                        send_notification("Delivered (with warning)", &warning).await;
                    }
                    None => send_notification("Delivered", &preview).await,
                }
            }

            Stage::Cancelled => {
                self.last_terminal = Some(notice.id);
                self.play_feedback(SoundEvent::Cancelled);
                send_notification("Recording cancelled", "").await;
            }

            Stage::Failed => {
                self.last_terminal = Some(notice.id);
                self.play_feedback(SoundEvent::Error);
                let message = notice
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                send_notification("Session failed", &message).await;
            }
        }
    }
}

/// Truncate delivered text for the notification body
fn preview_text(text: &str) -> String {
    if text.chars().count() > 80 {
        format!("{}...", text.chars().take(80).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let short = "hello";
        assert_eq!(preview_text(short), "hello");

        let long = "é".repeat(100);
        let preview = preview_text(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 83);
    }
}
