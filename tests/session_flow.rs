//! End-to-end orchestrator tests against scripted collaborators
//!
//! Drives the session state machine through its control events and asserts
//! the ordered notice stream, the single-active-session invariant, the
//! stale-result discard on cancel, and the degrade-on-edit-failure rule.

use quickscribe::capture::store::RecordingStore;
use quickscribe::capture::{AudioCapture, CaptureFactory};
use quickscribe::config::{Config, DeliveryConfig, FileHandling, PromptProfileConfig, RecordingsConfig};
use quickscribe::deliver::{DeliveryOutcome, DeliverySink, FocusTarget};
use quickscribe::edit::Editor;
use quickscribe::error::{CaptureError, DeliveryError, DeviceError, EditError, TranscribeError};
use quickscribe::orchestrator::{
    Collaborators, ControlEvent, Notice, Orchestrator, OrchestratorConfig, SessionNotice,
};
use quickscribe::prompts::PromptLibrary;
use quickscribe::retry::RetryPolicy;
use quickscribe::session::{Mode, SessionError, Stage};
use quickscribe::transcribe::Transcriber;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

// === Scripted collaborators ===

#[derive(Clone)]
enum CaptureScript {
    Samples(Vec<f32>),
    FailOpen(DeviceError),
    FailStop(CaptureError),
}

struct StubCaptureFactory {
    script: CaptureScript,
    aborts: Arc<AtomicU32>,
}

impl CaptureFactory for StubCaptureFactory {
    fn create(&self) -> Result<Box<dyn AudioCapture>, DeviceError> {
        Ok(Box::new(StubCapture {
            script: self.script.clone(),
            aborts: self.aborts.clone(),
        }))
    }
}

struct StubCapture {
    script: CaptureScript,
    aborts: Arc<AtomicU32>,
}

#[async_trait::async_trait]
impl AudioCapture for StubCapture {
    async fn start(&mut self) -> Result<(), DeviceError> {
        match &self.script {
            CaptureScript::FailOpen(e) => Err(e.clone()),
            _ => Ok(()),
        }
    }

    async fn stop(&mut self) -> Result<Vec<f32>, CaptureError> {
        match &self.script {
            CaptureScript::Samples(samples) => Ok(samples.clone()),
            CaptureScript::FailStop(e) => Err(e.clone()),
            CaptureScript::FailOpen(_) => Err(CaptureError::Empty),
        }
    }

    async fn abort(&mut self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lets a test hold a worker call open until it decides otherwise
struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            open: Mutex::new(false),
            cv: Condvar::new(),
        })
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }

    fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

struct StubTranscriber {
    result: Result<String, TranscribeError>,
    calls: Arc<AtomicU32>,
    gate: Option<Arc<Gate>>,
}

impl Transcriber for StubTranscriber {
    fn transcribe(&self, _samples: &[f32]) -> Result<String, TranscribeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref gate) = self.gate {
            gate.wait();
        }
        self.result.clone()
    }
}

struct StubEditor {
    result: Result<String, EditError>,
    calls: Arc<AtomicU32>,
    instructions_seen: Arc<Mutex<Vec<String>>>,
}

impl Editor for StubEditor {
    fn edit(&self, instructions: &str, _transcript: &str) -> Result<String, EditError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.instructions_seen
            .lock()
            .unwrap()
            .push(instructions.to_string());
        self.result.clone()
    }
}

struct StubSink {
    delivered: Arc<Mutex<Vec<String>>>,
    copy_fails: bool,
    paste_warning: Option<String>,
}

impl DeliverySink for StubSink {
    fn capture_focus(&self) -> Option<FocusTarget> {
        None
    }

    fn deliver(
        &self,
        text: &str,
        _flags: &DeliveryConfig,
        _target: Option<&FocusTarget>,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        if self.copy_fails {
            return Err(DeliveryError::Clipboard("stub clipboard unavailable".into()));
        }
        self.delivered.lock().unwrap().push(text.to_string());
        Ok(DeliveryOutcome {
            pasted: self.paste_warning.is_none(),
            warning: self.paste_warning.clone(),
        })
    }
}

// === Harness ===

struct Fixture {
    capture: CaptureScript,
    transcribe: Result<String, TranscribeError>,
    transcribe_gate: Option<Arc<Gate>>,
    edit: Result<String, EditError>,
    copy_fails: bool,
    paste_warning: Option<String>,
    prompts: PromptLibrary,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            capture: CaptureScript::Samples(vec![0.1; 16000]),
            transcribe: Ok("hello world".to_string()),
            transcribe_gate: None,
            edit: Ok("Hello, world.".to_string()),
            copy_fails: false,
            paste_warning: None,
            prompts: PromptLibrary::from_config(&Config::default()),
        }
    }
}

struct Harness {
    control_tx: mpsc::Sender<ControlEvent>,
    notice_rx: mpsc::Receiver<Notice>,
    transcriber_calls: Arc<AtomicU32>,
    editor_calls: Arc<AtomicU32>,
    instructions_seen: Arc<Mutex<Vec<String>>>,
    delivered: Arc<Mutex<Vec<String>>>,
    aborts: Arc<AtomicU32>,
    recordings_dir: tempfile::TempDir,
}

fn spawn_orchestrator(fixture: Fixture) -> Harness {
    let transcriber_calls = Arc::new(AtomicU32::new(0));
    let editor_calls = Arc::new(AtomicU32::new(0));
    let instructions_seen = Arc::new(Mutex::new(Vec::new()));
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let aborts = Arc::new(AtomicU32::new(0));

    let recordings_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordingStore::new(&RecordingsConfig {
        location: recordings_dir.path().to_string_lossy().to_string(),
        file_handling: FileHandling::Overwrite,
    }));

    let (control_tx, control_rx) = mpsc::channel(16);
    let (notice_tx, notice_rx) = mpsc::channel(64);

    let orchestrator = Orchestrator::new(
        OrchestratorConfig {
            retry: RetryPolicy::new(2, Duration::from_millis(1), 2.0),
            delivery: DeliveryConfig::default(),
            sample_rate: 16000,
            max_duration: Duration::from_secs(60),
        },
        Collaborators {
            capture: Box::new(StubCaptureFactory {
                script: fixture.capture,
                aborts: aborts.clone(),
            }),
            transcriber: Arc::new(StubTranscriber {
                result: fixture.transcribe,
                calls: transcriber_calls.clone(),
                gate: fixture.transcribe_gate,
            }),
            editor: Arc::new(StubEditor {
                result: fixture.edit,
                calls: editor_calls.clone(),
                instructions_seen: instructions_seen.clone(),
            }),
            delivery: Arc::new(StubSink {
                delivered: delivered.clone(),
                copy_fails: fixture.copy_fails,
                paste_warning: fixture.paste_warning,
            }),
            store,
        },
        fixture.prompts,
        control_rx,
        notice_tx,
    );

    tokio::spawn(orchestrator.run());

    Harness {
        control_tx,
        notice_rx,
        transcriber_calls,
        editor_calls,
        instructions_seen,
        delivered,
        aborts,
        recordings_dir,
    }
}

impl Harness {
    async fn send(&self, event: ControlEvent) {
        self.control_tx.send(event).await.unwrap();
    }

    /// Next session notice, skipping prompt notices
    async fn next_session(&mut self) -> SessionNotice {
        loop {
            let notice = timeout(Duration::from_secs(5), self.notice_rx.recv())
                .await
                .expect("timed out waiting for a notice")
                .expect("notice channel closed");
            if let Notice::Session(notice) = notice {
                return notice;
            }
        }
    }

    /// Session notices until (and including) the given stage
    async fn collect_until(&mut self, stage: Stage) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        loop {
            let notice = self.next_session().await;
            let done = notice.stage == stage;
            notices.push(notice);
            if done {
                return notices;
            }
        }
    }

    async fn assert_no_notice(&mut self, within: Duration) {
        assert!(
            timeout(within, self.notice_rx.recv()).await.is_err(),
            "expected no further notices"
        );
    }
}

fn stages(notices: &[SessionNotice]) -> Vec<Stage> {
    notices.iter().map(|n| n.stage).collect()
}

// === Scenarios ===

#[tokio::test(flavor = "multi_thread")]
async fn edit_and_transcribe_delivers_edited_text() {
    let mut h = spawn_orchestrator(Fixture::default());

    h.send(ControlEvent::Trigger(Mode::EditAndTranscribe)).await;
    h.send(ControlEvent::Stop).await;

    let notices = h.collect_until(Stage::Delivered).await;
    assert_eq!(
        stages(&notices),
        vec![
            Stage::Recording,
            Stage::Stopping,
            Stage::Transcribing,
            Stage::Editing,
            Stage::Delivering,
            Stage::Delivered,
        ]
    );

    let terminal = notices.last().unwrap();
    assert_eq!(terminal.id, 1);
    assert_eq!(terminal.text.as_deref(), Some("Hello, world."));
    assert!(terminal.warning.is_none());
    assert!(terminal.error.is_none());

    assert_eq!(h.transcriber_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.editor_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*h.delivered.lock().unwrap(), vec!["Hello, world."]);
}

#[tokio::test(flavor = "multi_thread")]
async fn transcribe_only_never_invokes_editor() {
    let mut h = spawn_orchestrator(Fixture {
        transcribe: Ok("test".to_string()),
        ..Fixture::default()
    });

    h.send(ControlEvent::Trigger(Mode::TranscribeOnly)).await;
    h.send(ControlEvent::Stop).await;

    let notices = h.collect_until(Stage::Delivered).await;
    assert_eq!(
        stages(&notices),
        vec![
            Stage::Recording,
            Stage::Stopping,
            Stage::Transcribing,
            Stage::Delivering,
            Stage::Delivered,
        ]
    );

    assert_eq!(notices.last().unwrap().text.as_deref(), Some("test"));
    assert_eq!(h.editor_calls.load(Ordering::SeqCst), 0);
    assert_eq!(*h.delivered.lock().unwrap(), vec!["test"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn second_trigger_while_active_is_ignored() {
    let mut h = spawn_orchestrator(Fixture::default());

    h.send(ControlEvent::Trigger(Mode::EditAndTranscribe)).await;
    let first = h.next_session().await;
    assert_eq!(first.stage, Stage::Recording);
    assert_eq!(first.id, 1);

    // Neither mode restarts or queues while a session is active
    h.send(ControlEvent::Trigger(Mode::EditAndTranscribe)).await;
    h.send(ControlEvent::Trigger(Mode::TranscribeOnly)).await;
    h.assert_no_notice(Duration::from_millis(300)).await;

    h.send(ControlEvent::Cancel).await;
    let cancelled = h.next_session().await;
    assert_eq!(cancelled.stage, Stage::Cancelled);
    assert_eq!(cancelled.id, 1);

    // The ignored triggers consumed no session ids
    h.send(ControlEvent::Trigger(Mode::TranscribeOnly)).await;
    let next = h.next_session().await;
    assert_eq!(next.stage, Stage::Recording);
    assert_eq!(next.id, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_during_recording_makes_no_network_calls() {
    let mut h = spawn_orchestrator(Fixture::default());

    h.send(ControlEvent::Trigger(Mode::EditAndTranscribe)).await;
    assert_eq!(h.next_session().await.stage, Stage::Recording);

    h.send(ControlEvent::Cancel).await;
    let cancelled = h.next_session().await;
    assert_eq!(cancelled.stage, Stage::Cancelled);

    h.assert_no_notice(Duration::from_millis(300)).await;
    assert_eq!(h.aborts.load(Ordering::SeqCst), 1);
    assert_eq!(h.transcriber_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.editor_calls.load(Ordering::SeqCst), 0);
    assert!(h.delivered.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_during_transcription_discards_the_result() {
    let gate = Gate::new();
    let mut h = spawn_orchestrator(Fixture {
        transcribe_gate: Some(gate.clone()),
        ..Fixture::default()
    });

    h.send(ControlEvent::Trigger(Mode::EditAndTranscribe)).await;
    h.send(ControlEvent::Stop).await;
    let notices = h.collect_until(Stage::Transcribing).await;
    assert_eq!(notices.last().unwrap().stage, Stage::Transcribing);

    // The remote call is in flight and not cancellable; cancel anyway
    h.send(ControlEvent::Cancel).await;
    let cancelled = h.next_session().await;
    assert_eq!(cancelled.stage, Stage::Cancelled);
    assert_eq!(cancelled.id, 1);

    // Let the "remote call" complete late; its result must vanish
    gate.release();
    h.assert_no_notice(Duration::from_millis(500)).await;
    assert_eq!(h.transcriber_calls.load(Ordering::SeqCst), 1);
    assert!(h.delivered.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn too_short_recording_fails_without_network() {
    let mut h = spawn_orchestrator(Fixture {
        capture: CaptureScript::FailStop(CaptureError::TooShort {
            got_ms: 120,
            min_ms: 300,
        }),
        ..Fixture::default()
    });

    h.send(ControlEvent::Trigger(Mode::EditAndTranscribe)).await;
    h.send(ControlEvent::Stop).await;

    let notices = h.collect_until(Stage::Failed).await;
    assert_eq!(
        stages(&notices),
        vec![Stage::Recording, Stage::Stopping, Stage::Failed]
    );
    assert!(matches!(
        notices.last().unwrap().error,
        Some(SessionError::Capture(CaptureError::TooShort { .. }))
    ));
    assert_eq!(h.transcriber_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn device_error_fails_with_no_surviving_session() {
    let mut h = spawn_orchestrator(Fixture {
        capture: CaptureScript::FailOpen(DeviceError::NotFound("default".into())),
        ..Fixture::default()
    });

    h.send(ControlEvent::Trigger(Mode::EditAndTranscribe)).await;
    let failed = h.next_session().await;
    assert_eq!(failed.stage, Stage::Failed);
    assert!(matches!(failed.error, Some(SessionError::Device(_))));

    // Nothing persists: the orchestrator is back in Idle, but the capture
    // device is still broken, so the next trigger fails the same way
    h.send(ControlEvent::Trigger(Mode::TranscribeOnly)).await;
    let failed_again = h.next_session().await;
    assert_eq!(failed_again.stage, Stage::Failed);
    assert_eq!(failed_again.id, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_failure_degrades_to_raw_transcript() {
    let mut h = spawn_orchestrator(Fixture {
        edit: Err(EditError::Server {
            status: 500,
            body: "overloaded".into(),
        }),
        ..Fixture::default()
    });

    h.send(ControlEvent::Trigger(Mode::EditAndTranscribe)).await;
    h.send(ControlEvent::Stop).await;

    let notices = h.collect_until(Stage::Delivered).await;
    let terminal = notices.last().unwrap();
    // Never Failed: the transcription exists and must be delivered
    assert!(stages(&notices).contains(&Stage::Editing));
    assert_eq!(terminal.text.as_deref(), Some("hello world"));
    assert!(terminal.warning.as_deref().unwrap().contains("editing failed"));

    // Transient server errors were retried before degrading
    assert_eq!(h.editor_calls.load(Ordering::SeqCst), 3);
    assert_eq!(*h.delivered.lock().unwrap(), vec!["hello world"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn transcription_failure_fails_but_audio_survives_on_disk() {
    let mut h = spawn_orchestrator(Fixture {
        transcribe: Err(TranscribeError::Network("connection reset".into())),
        ..Fixture::default()
    });

    h.send(ControlEvent::Trigger(Mode::EditAndTranscribe)).await;
    h.send(ControlEvent::Stop).await;

    let notices = h.collect_until(Stage::Failed).await;
    assert!(matches!(
        notices.last().unwrap().error,
        Some(SessionError::Transcribe(_))
    ));
    // Retried to exhaustion: 1 try + 2 retries
    assert_eq!(h.transcriber_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.editor_calls.load(Ordering::SeqCst), 0);

    // The WAV was persisted before the network call, so manual retry works
    let saved = h.recordings_dir.path().join("recording.wav");
    assert!(saved.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn auth_failure_is_not_retried() {
    let mut h = spawn_orchestrator(Fixture {
        transcribe: Err(TranscribeError::Auth { status: 401 }),
        ..Fixture::default()
    });

    h.send(ControlEvent::Trigger(Mode::TranscribeOnly)).await;
    h.send(ControlEvent::Stop).await;

    h.collect_until(Stage::Failed).await;
    assert_eq!(h.transcriber_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn clipboard_failure_fails_the_session() {
    let mut h = spawn_orchestrator(Fixture {
        copy_fails: true,
        ..Fixture::default()
    });

    h.send(ControlEvent::Trigger(Mode::TranscribeOnly)).await;
    h.send(ControlEvent::Stop).await;

    let notices = h.collect_until(Stage::Failed).await;
    assert!(stages(&notices).contains(&Stage::Delivering));
    assert!(matches!(
        notices.last().unwrap().error,
        Some(SessionError::Delivery(DeliveryError::Clipboard(_)))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn paste_failure_is_a_warning_not_a_failure() {
    let mut h = spawn_orchestrator(Fixture {
        paste_warning: Some("paste failed: no input permission".to_string()),
        ..Fixture::default()
    });

    h.send(ControlEvent::Trigger(Mode::TranscribeOnly)).await;
    h.send(ControlEvent::Stop).await;

    let notices = h.collect_until(Stage::Delivered).await;
    let terminal = notices.last().unwrap();
    assert!(terminal.error.is_none());
    assert!(terminal.warning.as_deref().unwrap().contains("paste failed"));
    // The copy stands regardless of the paste outcome
    assert_eq!(h.delivered.lock().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn prompt_is_snapshotted_at_session_start() {
    let mut config = Config::default();
    config.prompt_profiles = vec![
        PromptProfileConfig {
            name: "First".into(),
            instructions: "Use the first style.".into(),
        },
        PromptProfileConfig {
            name: "Second".into(),
            instructions: "Use the second style.".into(),
        },
    ];
    config.selected_prompt = "First".into();

    let mut h = spawn_orchestrator(Fixture {
        prompts: PromptLibrary::from_config(&config),
        ..Fixture::default()
    });

    h.send(ControlEvent::Trigger(Mode::EditAndTranscribe)).await;
    assert_eq!(h.next_session().await.stage, Stage::Recording);

    // Cycling mid-session must not affect the in-flight session
    h.send(ControlEvent::NextPrompt).await;
    h.send(ControlEvent::Stop).await;
    h.collect_until(Stage::Delivered).await;

    assert_eq!(
        *h.instructions_seen.lock().unwrap(),
        vec!["Use the first style.".to_string()]
    );

    // The next session picks up the cycled selection
    h.send(ControlEvent::Trigger(Mode::EditAndTranscribe)).await;
    h.send(ControlEvent::Stop).await;
    h.collect_until(Stage::Delivered).await;

    assert_eq!(
        h.instructions_seen.lock().unwrap().last().unwrap(),
        "Use the second style."
    );
}
