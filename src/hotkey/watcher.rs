//! Hotkey watcher: binding supervision and event translation
//!
//! Consumes matched key events from the platform backend and emits the
//! orchestrator's control events. Runs the periodic health probe over the
//! registrations and forces a refresh when the system watcher reports an
//! unlock, since those are the moments OS hooks silently die.

use super::{bindings_from_config, ActionEvent, Binding, HotkeyAction, HotkeyBackend};
use crate::config::{ActivationMode, HotkeyConfig};
use crate::error::RegistrationError;
use crate::orchestrator::ControlEvent;
use crate::session::Mode;
use crate::system_events::SystemEvent;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Minimum spacing between forced refreshes (unlock events can arrive in
/// bursts)
const FORCED_REFRESH_MIN_INTERVAL: Duration = Duration::from_secs(3);

/// Diagnostics emitted alongside control events
#[derive(Debug, Clone)]
pub enum WatcherNotice {
    /// A dead binding was found by the health probe and re-registered
    Refreshed { action: HotkeyAction },
    /// All bindings were re-registered after a session unlock
    ForcedRefresh,
    /// A binding could not be registered; the others remain usable
    RegistrationFailed {
        action: HotkeyAction,
        error: RegistrationError,
    },
}

/// Supervises hotkey registrations and feeds the orchestrator
pub struct HotkeyWatcher {
    backend: Box<dyn HotkeyBackend>,
    bindings: Vec<Binding>,
    mode: ActivationMode,
    probe_interval: Duration,
    action_rx: mpsc::Receiver<ActionEvent>,
    control_tx: mpsc::Sender<ControlEvent>,
    system_rx: mpsc::Receiver<SystemEvent>,
    notice_tx: mpsc::Sender<WatcherNotice>,
    /// Toggle-mode latch: a record combo is "on" until its second press
    latched: bool,
    last_forced: Option<Instant>,
}

impl HotkeyWatcher {
    pub fn new(
        config: &HotkeyConfig,
        backend: Box<dyn HotkeyBackend>,
        action_rx: mpsc::Receiver<ActionEvent>,
        control_tx: mpsc::Sender<ControlEvent>,
        system_rx: mpsc::Receiver<SystemEvent>,
        notice_tx: mpsc::Sender<WatcherNotice>,
    ) -> Self {
        let (bindings, parse_failures) = bindings_from_config(config);
        for (action, error) in parse_failures {
            tracing::warn!("Skipping binding {}: {}", action, error);
            let _ = notice_tx.try_send(WatcherNotice::RegistrationFailed { action, error });
        }

        Self {
            backend,
            bindings,
            mode: config.mode,
            probe_interval: Duration::from_secs(config.probe_interval_secs.max(1)),
            action_rx,
            control_tx,
            system_rx,
            notice_tx,
            latched: false,
            last_forced: None,
        }
    }

    /// Register the full binding set; per-binding failures are reported and
    /// do not block the rest.
    fn register_all(&mut self) {
        for (action, error) in self.backend.register(&self.bindings) {
            tracing::warn!("Failed to register {}: {}", action, error);
            let _ = self
                .notice_tx
                .try_send(WatcherNotice::RegistrationFailed { action, error });
        }
    }

    /// One health-probe pass: re-register if any binding died, emitting one
    /// Refreshed notice per dead binding. Returns the dead actions.
    fn probe_pass(&mut self) -> Vec<HotkeyAction> {
        let dead: Vec<HotkeyAction> = self
            .bindings
            .iter()
            .map(|b| b.action)
            .filter(|&action| !self.backend.probe(action))
            .collect();

        if !dead.is_empty() {
            tracing::info!("Health probe found {} dead binding(s), refreshing", dead.len());
            self.register_all();
            for &action in &dead {
                let _ = self.notice_tx.try_send(WatcherNotice::Refreshed { action });
            }
        }

        dead
    }

    /// Unconditional re-registration, throttled against unlock-event bursts
    fn forced_refresh(&mut self) {
        if let Some(last) = self.last_forced {
            if last.elapsed() < FORCED_REFRESH_MIN_INTERVAL {
                tracing::debug!("Skipping forced refresh, too soon since the last one");
                return;
            }
        }
        self.last_forced = Some(Instant::now());

        tracing::info!("Session unlock detected, refreshing hotkey registrations");
        self.backend.unregister();
        self.register_all();
        let _ = self.notice_tx.try_send(WatcherNotice::ForcedRefresh);
    }

    /// Translate a matched binding event into a control event.
    ///
    /// Push-to-talk: record combo press triggers, release stops.
    /// Toggle: first press triggers, second press of either record combo
    /// stops. Cancel clears the latch either way.
    fn map_action(&mut self, event: ActionEvent) -> Option<ControlEvent> {
        match (event.action, event.pressed) {
            (HotkeyAction::RecordEdit, true) | (HotkeyAction::RecordTranscribe, true) => {
                let mode = match event.action {
                    HotkeyAction::RecordEdit => Mode::EditAndTranscribe,
                    _ => Mode::TranscribeOnly,
                };
                match self.mode {
                    ActivationMode::PushToTalk => Some(ControlEvent::Trigger(mode)),
                    ActivationMode::Toggle => {
                        if self.latched {
                            self.latched = false;
                            Some(ControlEvent::Stop)
                        } else {
                            self.latched = true;
                            Some(ControlEvent::Trigger(mode))
                        }
                    }
                }
            }
            (HotkeyAction::RecordEdit, false) | (HotkeyAction::RecordTranscribe, false) => {
                match self.mode {
                    ActivationMode::PushToTalk => Some(ControlEvent::Stop),
                    ActivationMode::Toggle => None,
                }
            }
            (HotkeyAction::Cancel, true) => {
                self.latched = false;
                Some(ControlEvent::Cancel)
            }
            (HotkeyAction::PrevPrompt, true) => Some(ControlEvent::PrevPrompt),
            (HotkeyAction::NextPrompt, true) => Some(ControlEvent::NextPrompt),
            _ => None,
        }
    }

    /// Run the watcher until the control channel closes
    pub async fn run(mut self) {
        self.register_all();

        let mut probe = tokio::time::interval(self.probe_interval);
        probe.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; registration just happened
        probe.tick().await;

        // Once the system watcher goes away, stop polling its channel and
        // rely on the probe alone
        let mut system_open = true;

        loop {
            tokio::select! {
                event = self.action_rx.recv() => {
                    let Some(event) = event else { break };
                    if let Some(control) = self.map_action(event) {
                        tracing::debug!("Hotkey {} -> {:?}", event.action, control);
                        if self.control_tx.send(control).await.is_err() {
                            break;
                        }
                    }
                }

                system = self.system_rx.recv(), if system_open => {
                    match system {
                        Some(SystemEvent::SessionUnlocked) => self.forced_refresh(),
                        None => system_open = false,
                    }
                }

                _ = probe.tick() => {
                    self.probe_pass();
                }
            }
        }

        self.backend.unregister();
        tracing::debug!("Hotkey watcher stopped");
    }
}
