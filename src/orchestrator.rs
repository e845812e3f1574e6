//! Session orchestrator: the single-active-session state machine
//!
//! Owns the lifecycle of one record → transcribe → edit → deliver attempt.
//! All control events (hotkeys, CLI) and all pipeline completions funnel
//! into one consumer loop, so observable state changes and UI notices come
//! out in a single well-defined order even though capture, transcription
//! and editing run on worker threads.
//!
//! Cancellation is cooperative-by-discard: in-flight device or network
//! calls run to completion, and their results are dropped when the live
//! session id no longer matches. The live id is the only shared mutable
//! state; workers read it before enqueuing results, this loop writes it on
//! trigger and cancel.

use crate::capture::store::RecordingStore;
use crate::capture::{AudioCapture, CaptureFactory};
use crate::config::DeliveryConfig;
use crate::deliver::{DeliverySink, FocusTarget};
use crate::edit::Editor;
use crate::error::TranscribeError;
use crate::prompts::PromptLibrary;
use crate::retry::RetryPolicy;
use crate::session::{Mode, Session, SessionError, SessionId, Stage};
use crate::transcribe::Transcriber;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// External control events consumed by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Start a new session in the given mode
    Trigger(Mode),
    /// Finalize the current recording and run the pipeline
    Stop,
    /// Abandon the current session
    Cancel,
    /// Select the previous editing prompt profile
    PrevPrompt,
    /// Select the next editing prompt profile
    NextPrompt,
}

/// Ordered notifications drained by the UI loop
#[derive(Debug, Clone)]
pub enum Notice {
    Session(SessionNotice),
    PromptSelected { name: String },
}

/// One observable state change of a session
#[derive(Debug, Clone)]
pub struct SessionNotice {
    pub id: SessionId,
    pub mode: Mode,
    pub stage: Stage,
    /// Final text, present on the Delivered notice
    pub text: Option<String>,
    /// Non-fatal problem (degraded edit, failed paste)
    pub warning: Option<String>,
    pub error: Option<SessionError>,
}

/// The id of the session whose results are still wanted. Zero means none.
///
/// Workers read-and-compare before enqueuing a result; the orchestrator
/// loop writes on trigger/cancel/completion. A stale id means the session
/// was superseded and the result must be discarded.
pub struct LiveToken(AtomicU64);

const LIVE_NONE: u64 = 0;

impl LiveToken {
    pub fn new() -> Self {
        Self(AtomicU64::new(LIVE_NONE))
    }

    pub fn set(&self, id: SessionId) {
        self.0.store(id, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(LIVE_NONE, Ordering::SeqCst);
    }

    pub fn is_live(&self, id: SessionId) -> bool {
        id != LIVE_NONE && self.0.load(Ordering::SeqCst) == id
    }
}

impl Default for LiveToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline progress reported back to the orchestrator loop
#[derive(Debug)]
enum PipelineEvent {
    StageChanged { id: SessionId, stage: Stage },
    Finished { id: SessionId, outcome: PipelineOutcome },
}

#[derive(Debug)]
enum PipelineOutcome {
    Delivered {
        raw_text: String,
        edited_text: String,
        warning: Option<String>,
    },
    Failed(SessionError),
}

/// The orchestrator's collaborators, behind narrow interfaces so tests can
/// script them
pub struct Collaborators {
    pub capture: Box<dyn CaptureFactory>,
    pub transcriber: Arc<dyn Transcriber>,
    pub editor: Arc<dyn Editor>,
    pub delivery: Arc<dyn DeliverySink>,
    pub store: Arc<RecordingStore>,
}

/// Per-process orchestrator settings, snapshotted from config at build time
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub retry: RetryPolicy,
    pub delivery: DeliveryConfig,
    pub sample_rate: u32,
    pub max_duration: Duration,
}

/// The session currently owning the audio device and pipeline
struct ActiveSession {
    session: Session,
    /// Present only while Recording
    capture: Option<Box<dyn AudioCapture>>,
    /// Focus at trigger time; paste targets this window
    focus: Option<FocusTarget>,
    /// Prompt instructions snapshotted at session start
    instructions: String,
}

/// Single-active-session state machine
pub struct Orchestrator {
    config: OrchestratorConfig,
    collab: Collaborators,
    prompts: PromptLibrary,
    control_rx: mpsc::Receiver<ControlEvent>,
    pipeline_tx: mpsc::Sender<PipelineEvent>,
    pipeline_rx: mpsc::Receiver<PipelineEvent>,
    notice_tx: mpsc::Sender<Notice>,
    live: Arc<LiveToken>,
    next_id: SessionId,
    current: Option<ActiveSession>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        collab: Collaborators,
        prompts: PromptLibrary,
        control_rx: mpsc::Receiver<ControlEvent>,
        notice_tx: mpsc::Sender<Notice>,
    ) -> Self {
        let (pipeline_tx, pipeline_rx) = mpsc::channel(64);
        Self {
            config,
            collab,
            prompts,
            control_rx,
            pipeline_tx,
            pipeline_rx,
            notice_tx,
            live: Arc::new(LiveToken::new()),
            next_id: 1,
            current: None,
        }
    }

    /// Run the state machine until the control channel closes
    pub async fn run(mut self) {
        loop {
            let recording = self.is_recording();

            tokio::select! {
                control = self.control_rx.recv() => {
                    let Some(event) = control else { break };
                    self.handle_control(event).await;
                }

                Some(event) = self.pipeline_rx.recv() => {
                    self.handle_pipeline(event).await;
                }

                // Safety stop for forgotten recordings
                _ = tokio::time::sleep(Duration::from_millis(250)), if recording => {
                    if self.recording_elapsed() >= self.config.max_duration {
                        tracing::warn!(
                            "Recording hit the {:.0}s safety limit, stopping",
                            self.config.max_duration.as_secs_f32()
                        );
                        self.handle_control(ControlEvent::Stop).await;
                    }
                }
            }
        }

        // Shutting down mid-recording: discard, the session never completes
        if let Some(mut active) = self.current.take() {
            if let Some(mut capture) = active.capture.take() {
                capture.abort().await;
            }
        }
        tracing::debug!("Orchestrator stopped");
    }

    fn is_recording(&self) -> bool {
        self.current
            .as_ref()
            .map(|a| a.session.stage == Stage::Recording)
            .unwrap_or(false)
    }

    fn recording_elapsed(&self) -> Duration {
        self.current
            .as_ref()
            .map(|a| a.session.elapsed())
            .unwrap_or_default()
    }

    async fn handle_control(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Trigger(mode) => self.on_trigger(mode).await,
            ControlEvent::Stop => self.on_stop().await,
            ControlEvent::Cancel => self.on_cancel().await,
            ControlEvent::PrevPrompt => {
                let name = self.prompts.cycle_backward().name.clone();
                tracing::info!("Prompt profile: {}", name);
                let _ = self.notice_tx.send(Notice::PromptSelected { name }).await;
            }
            ControlEvent::NextPrompt => {
                let name = self.prompts.cycle_forward().name.clone();
                tracing::info!("Prompt profile: {}", name);
                let _ = self.notice_tx.send(Notice::PromptSelected { name }).await;
            }
        }
    }

    /// Idle + Trigger → Recording. A trigger while any session is active is
    /// a no-op: restarting would contend for the audio device, and queueing
    /// would surprise the user long after the keypress.
    async fn on_trigger(&mut self, mode: Mode) {
        if let Some(ref active) = self.current {
            tracing::debug!(
                "Ignoring trigger while session {} is {}",
                active.session.id,
                active.session.stage
            );
            return;
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut capture = match self.collab.capture.create() {
            Ok(capture) => capture,
            Err(e) => {
                tracing::error!("Failed to create audio capture: {}", e);
                self.emit_failure(id, mode, SessionError::Device(e)).await;
                return;
            }
        };

        if let Err(e) = capture.start().await {
            tracing::error!("Failed to open audio device: {}", e);
            self.emit_failure(id, mode, SessionError::Device(e)).await;
            return;
        }

        // Focus must be captured now: it may change during recording and
        // transcription, and paste targets the window the user spoke at.
        let delivery = self.collab.delivery.clone();
        let focus = tokio::task::spawn_blocking(move || delivery.capture_focus())
            .await
            .unwrap_or(None);

        let instructions = self.prompts.selected().instructions.clone();

        let session = Session::new(id, mode);
        self.live.set(id);
        tracing::info!("Session {} recording ({:?})", id, mode);

        self.emit_session(&session, None).await;
        self.current = Some(ActiveSession {
            session,
            capture: Some(capture),
            focus,
            instructions,
        });
    }

    /// Recording + Stop → Stopping; the pipeline task takes over from here
    async fn on_stop(&mut self) {
        let Some(active) = self.current.as_mut() else {
            tracing::debug!("Stop with no active session, ignoring");
            return;
        };
        if active.session.stage != Stage::Recording {
            tracing::debug!(
                "Stop while session {} is {}, ignoring",
                active.session.id,
                active.session.stage
            );
            return;
        }

        let Some(capture) = active.capture.take() else {
            return;
        };

        active.session.stage = Stage::Stopping;
        let session_snapshot = active.session.clone();
        tracing::info!(
            "Session {} stopping after {:.1}s",
            session_snapshot.id,
            session_snapshot.elapsed().as_secs_f32()
        );
        self.emit_session(&session_snapshot, None).await;

        let ctx = PipelineContext {
            id: session_snapshot.id,
            mode: session_snapshot.mode,
            instructions: self.current.as_ref().map(|a| a.instructions.clone()).unwrap_or_default(),
            focus: self.current.as_ref().and_then(|a| a.focus.clone()),
            transcriber: self.collab.transcriber.clone(),
            editor: self.collab.editor.clone(),
            delivery: self.collab.delivery.clone(),
            store: self.collab.store.clone(),
            live: self.live.clone(),
            tx: self.pipeline_tx.clone(),
            config: self.config,
        };

        tokio::spawn(run_pipeline(ctx, capture));
    }

    /// Cancel from any active stage. During Recording the capture is
    /// aborted outright; later stages are abandoned by resetting the live
    /// id, so in-flight results get discarded when they arrive.
    async fn on_cancel(&mut self) {
        let Some(mut active) = self.current.take() else {
            tracing::debug!("Cancel with no active session, ignoring");
            return;
        };

        if let Some(mut capture) = active.capture.take() {
            capture.abort().await;
        }

        self.live.clear();
        active.session.stage = Stage::Cancelled;
        active.session.ended_at = Some(std::time::Instant::now());
        tracing::info!("Session {} cancelled", active.session.id);
        self.emit_session(&active.session, None).await;
    }

    async fn handle_pipeline(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::StageChanged { id, stage } => {
                if !self.live.is_live(id) {
                    tracing::debug!("Dropping stale stage change for session {}", id);
                    return;
                }
                if let Some(active) = self.current.as_mut() {
                    active.session.stage = stage;
                    let snapshot = active.session.clone();
                    self.emit_session(&snapshot, None).await;
                }
            }

            PipelineEvent::Finished { id, outcome } => {
                if !self.live.is_live(id) {
                    tracing::debug!("Dropping stale completion for session {}", id);
                    return;
                }
                let Some(mut active) = self.current.take() else {
                    return;
                };
                self.live.clear();
                active.session.ended_at = Some(std::time::Instant::now());

                match outcome {
                    PipelineOutcome::Delivered {
                        raw_text,
                        edited_text,
                        warning,
                    } => {
                        active.session.raw_text = Some(raw_text);
                        active.session.edited_text = Some(edited_text.clone());
                        active.session.warning = warning;
                        active.session.stage = Stage::Delivered;
                        tracing::info!(
                            "Session {} delivered ({} chars)",
                            id,
                            edited_text.len()
                        );
                        self.emit_session(&active.session, Some(edited_text)).await;
                    }
                    PipelineOutcome::Failed(error) => {
                        active.session.error = Some(error.clone());
                        active.session.stage = Stage::Failed;
                        tracing::error!("Session {} failed: {}", id, error);
                        self.emit_session(&active.session, None).await;
                    }
                }
            }
        }
    }

    /// Device failure before a session exists: one Failed notice, nothing
    /// persists
    async fn emit_failure(&mut self, id: SessionId, mode: Mode, error: SessionError) {
        let _ = self
            .notice_tx
            .send(Notice::Session(SessionNotice {
                id,
                mode,
                stage: Stage::Failed,
                text: None,
                warning: None,
                error: Some(error),
            }))
            .await;
    }

    async fn emit_session(&mut self, session: &Session, text: Option<String>) {
        let _ = self
            .notice_tx
            .send(Notice::Session(SessionNotice {
                id: session.id,
                mode: session.mode,
                stage: session.stage,
                text,
                warning: session.warning.clone(),
                error: session.error.clone(),
            }))
            .await;
    }
}

/// Everything the pipeline task needs, detached from the orchestrator
struct PipelineContext {
    id: SessionId,
    mode: Mode,
    instructions: String,
    focus: Option<FocusTarget>,
    transcriber: Arc<dyn Transcriber>,
    editor: Arc<dyn Editor>,
    delivery: Arc<dyn DeliverySink>,
    store: Arc<RecordingStore>,
    live: Arc<LiveToken>,
    tx: mpsc::Sender<PipelineEvent>,
    config: OrchestratorConfig,
}

impl PipelineContext {
    async fn stage(&self, stage: Stage) {
        let _ = self
            .tx
            .send(PipelineEvent::StageChanged { id: self.id, stage })
            .await;
    }

    async fn finish(&self, outcome: PipelineOutcome) {
        let _ = self
            .tx
            .send(PipelineEvent::Finished {
                id: self.id,
                outcome,
            })
            .await;
    }

    async fn fail(&self, error: SessionError) {
        self.finish(PipelineOutcome::Failed(error)).await;
    }
}

/// Worker side of a session: finalize capture, persist audio, transcribe,
/// optionally edit, deliver. Checks the live token at every stage boundary
/// and bails out silently once the session is superseded; the orchestrator
/// already reported the cancellation.
async fn run_pipeline(ctx: PipelineContext, mut capture: Box<dyn AudioCapture>) {
    let samples = match capture.stop().await {
        Ok(samples) => samples,
        Err(e) => {
            ctx.fail(SessionError::Capture(e)).await;
            return;
        }
    };

    // Persist before any network call: a failed transcription must leave
    // recoverable audio on disk. Persistence failure alone is not fatal.
    {
        let store = ctx.store.clone();
        let samples = samples.clone();
        let sample_rate = ctx.config.sample_rate;
        let persisted = tokio::task::spawn_blocking(move || store.persist(&samples, sample_rate))
            .await;
        match persisted {
            Ok(Ok(path)) => tracing::debug!("Session {} audio saved to {:?}", ctx.id, path),
            Ok(Err(e)) => tracing::warn!("Failed to persist recording: {}", e),
            Err(e) => tracing::warn!("Recording persist task failed: {}", e),
        }
    }

    if !ctx.live.is_live(ctx.id) {
        return;
    }
    ctx.stage(Stage::Transcribing).await;

    let raw_text = {
        let transcriber = ctx.transcriber.clone();
        let retry = ctx.config.retry;
        let result = tokio::task::spawn_blocking(move || {
            retry.run("transcription", || transcriber.transcribe(&samples))
        })
        .await;

        match result {
            Ok(Ok(text)) if !text.is_empty() => text,
            Ok(Ok(_)) => {
                ctx.fail(SessionError::Transcribe(TranscribeError::BadResponse(
                    "transcription was empty".to_string(),
                )))
                .await;
                return;
            }
            Ok(Err(e)) => {
                ctx.fail(SessionError::Transcribe(e)).await;
                return;
            }
            Err(e) => {
                ctx.fail(SessionError::Transcribe(TranscribeError::BadResponse(
                    format!("transcription worker failed: {}", e),
                )))
                .await;
                return;
            }
        }
    };

    if !ctx.live.is_live(ctx.id) {
        return;
    }

    let (edited_text, mut warning) = match ctx.mode {
        Mode::TranscribeOnly => (raw_text.clone(), None),
        Mode::EditAndTranscribe => {
            ctx.stage(Stage::Editing).await;

            let editor = ctx.editor.clone();
            let retry = ctx.config.retry;
            let instructions = ctx.instructions.clone();
            let transcript = raw_text.clone();
            let result = tokio::task::spawn_blocking(move || {
                retry.run("edit", || editor.edit(&instructions, &transcript))
            })
            .await;

            match result {
                Ok(Ok(text)) if !text.is_empty() => (text, None),
                // An existing transcription is never thrown away for a
                // failed enhancement: degrade to the raw text.
                Ok(Ok(_)) => (
                    raw_text.clone(),
                    Some("edit returned empty text, delivered raw transcript".to_string()),
                ),
                Ok(Err(e)) => {
                    tracing::warn!("Editing failed, delivering raw transcript: {}", e);
                    (
                        raw_text.clone(),
                        Some(format!("editing failed, delivered raw transcript: {}", e)),
                    )
                }
                Err(e) => {
                    tracing::warn!("Edit worker failed, delivering raw transcript: {}", e);
                    (
                        raw_text.clone(),
                        Some(format!("editing failed, delivered raw transcript: {}", e)),
                    )
                }
            }
        }
    };

    if !ctx.live.is_live(ctx.id) {
        return;
    }
    ctx.stage(Stage::Delivering).await;

    let delivery_result = {
        let delivery = ctx.delivery.clone();
        let flags = ctx.config.delivery;
        let focus = ctx.focus.clone();
        let text = edited_text.clone();
        tokio::task::spawn_blocking(move || delivery.deliver(&text, &flags, focus.as_ref())).await
    };

    match delivery_result {
        Ok(Ok(outcome)) => {
            if warning.is_none() {
                warning = outcome.warning;
            }
            ctx.finish(PipelineOutcome::Delivered {
                raw_text,
                edited_text,
                warning,
            })
            .await;
        }
        Ok(Err(e)) => {
            ctx.fail(SessionError::Delivery(e)).await;
        }
        Err(e) => {
            ctx.fail(SessionError::Delivery(crate::error::DeliveryError::Clipboard(
                format!("delivery worker failed: {}", e),
            )))
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_token_lifecycle() {
        let live = LiveToken::new();
        assert!(!live.is_live(1));

        live.set(7);
        assert!(live.is_live(7));
        assert!(!live.is_live(6));

        live.clear();
        assert!(!live.is_live(7));
        assert!(!live.is_live(LIVE_NONE));
    }

    #[test]
    fn test_live_token_supersede() {
        let live = LiveToken::new();
        live.set(1);
        live.set(2);
        // Results from session 1 must now be discarded
        assert!(!live.is_live(1));
        assert!(live.is_live(2));
    }
}
