// Bounded retry with fixed backoff

use std::time::Duration;

use super::{RemoteHandleCache, RowsAffected, SyncError};
use crate::remote::RemoteService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(150),
        }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Runs `op` until it succeeds or the attempts are used up. Between
    /// attempts the binding is invalidated and the backoff slept.
    ///
    /// Exhaustion yields 0 and a warning; it is never an error for the caller.
    pub async fn run<S: RemoteService + ?Sized>(
        &self,
        service: &S,
        cache: &mut RemoteHandleCache,
        mut op: impl AsyncFnMut(&mut RemoteHandleCache) -> Result<RowsAffected, SyncError>,
    ) -> RowsAffected {
        let attempts = self.attempts();
        for attempt in 1..=attempts {
            match op(&mut *cache).await {
                Ok(rows) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "sync succeeded after retry");
                    }
                    return rows;
                }
                Err(e) if attempt == attempts => {
                    tracing::warn!(attempts, error = %e, "giving up on sync");
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "sync attempt failed, retrying");
                    cache.invalidate(service).await;
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
        0
    }
}
