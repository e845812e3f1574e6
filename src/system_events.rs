//! System session event watcher
//!
//! Detects OS session lock/unlock cycles, which are the moments global
//! hotkey hooks silently die. Rather than per-OS session APIs, this uses a
//! monotonic-clock stall probe: a worker sleeps in short ticks and treats a
//! large gap between wakeups as evidence the machine was locked or
//! suspended, emitting a SessionUnlocked event on the way back. The hotkey
//! watcher consumes these to force an immediate registration refresh; the
//! periodic health probe remains the backstop for anything the stall probe
//! misses.

use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Events fed to the hotkey watcher's refresh logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    /// The session came back from a lock/suspend cycle
    SessionUnlocked,
}

/// Tick length for the stall probe
const TICK: Duration = Duration::from_secs(2);

/// A wakeup this much later than scheduled counts as a stall
const STALL_THRESHOLD: Duration = Duration::from_secs(5);

/// Watches for session lock/unlock cycles
pub struct SystemEventWatcher {
    tx: mpsc::Sender<SystemEvent>,
}

impl SystemEventWatcher {
    pub fn new(tx: mpsc::Sender<SystemEvent>) -> Self {
        Self { tx }
    }

    /// Run the stall probe until the receiver is dropped
    pub async fn run(self) {
        let mut last_tick = Instant::now();

        loop {
            tokio::time::sleep(TICK).await;

            let elapsed = last_tick.elapsed();
            last_tick = Instant::now();

            if is_stall(elapsed) {
                tracing::info!(
                    "Detected session stall ({:.0}s), assuming lock/suspend cycle",
                    elapsed.as_secs_f32()
                );
                if self.tx.send(SystemEvent::SessionUnlocked).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Classification used by the probe loop; split out so the threshold logic
/// is testable without sleeping.
pub fn is_stall(elapsed: Duration) -> bool {
    elapsed > TICK + STALL_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_tick_is_not_a_stall() {
        assert!(!is_stall(Duration::from_secs(2)));
        assert!(!is_stall(Duration::from_secs(6)));
    }

    #[test]
    fn test_long_gap_is_a_stall() {
        assert!(is_stall(Duration::from_secs(8)));
        assert!(is_stall(Duration::from_secs(300)));
    }
}
