// Coalesces bursts of change signals into one deferred sync

use std::time::Duration;

use tokio::time::Instant;

/// Either idle or holding exactly one deadline.
///
/// The scheduler never runs anything itself: the host loop awaits
/// [`DebounceScheduler::expired`] next to its other event sources and calls
/// back into the engine, so deferred syncs run on the same control flow as
/// everything else.
#[derive(Debug)]
pub struct DebounceScheduler {
    window: Duration,
    due: Option<Instant>,
}

impl DebounceScheduler {
    pub fn new(window: Duration) -> Self {
        Self { window, due: None }
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.due
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// Arms the timer, replacing any pending deadline.
    pub fn on_change_signal(&mut self) -> Instant {
        let due = Instant::now() + self.window;
        if self.due.replace(due).is_some() {
            tracing::debug!("re-armed pending sync");
        }
        due
    }

    /// Drops the pending deadline. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.due.take().is_some()
    }

    /// Resolves once the pending deadline has passed; never while idle.
    pub async fn expired(&self) {
        match self.due {
            Some(due) => tokio::time::sleep_until(due).await,
            None => std::future::pending().await,
        }
    }

    /// Consumes the deadline if it has passed.
    pub fn take_expired(&mut self) -> bool {
        match self.due {
            Some(due) if Instant::now() >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}
