//! Wake debounce gate
//!
//! Sits in front of the on-demand wake path. At most one wake runs per
//! window no matter how many requests arrive; everyone else is told the
//! environment is already waking. The window starts when a run is
//! admitted, so a failed or timed-out run still holds off new ones until
//! the window passes.

use crate::error::SnoozeError;
use crate::observability::{SnoozeLogger, SnoozeMetrics};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum interval between two wake runs
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(10);

/// Upper bound on a single wake run
pub const WAKE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, PartialEq, Eq)]
pub enum WakeOutcome<T> {
    /// This caller ran the wake
    Executed(T),
    /// A wake ran recently; nothing was done
    Coalesced,
}

pub struct WakeGate {
    window: Duration,
    timeout: Duration,
    last_wake: Mutex<Option<Instant>>,
    metrics: SnoozeMetrics,
    logger: SnoozeLogger,
}

impl Default for WakeGate {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW, WAKE_TIMEOUT)
    }
}

impl WakeGate {
    pub fn new(window: Duration, timeout: Duration) -> Self {
        Self {
            window,
            timeout,
            last_wake: Mutex::new(None),
            metrics: SnoozeMetrics::new(),
            logger: SnoozeLogger::new("wake-gate"),
        }
    }

    /// Claim the window. Returns the time since the last run when the
    /// window is still closed.
    async fn admit(&self) -> Result<(), Duration> {
        let mut last_wake = self.last_wake.lock().await;
        let now = Instant::now();
        if let Some(previous) = *last_wake {
            let since = now.duration_since(previous);
            if since < self.window {
                return Err(since);
            }
        }
        *last_wake = Some(now);
        Ok(())
    }

    /// Run `wake` unless another run was admitted within the window.
    ///
    /// `wake` is only polled when admitted, and is dropped if it exceeds
    /// the timeout. Work it already did is not undone.
    pub async fn trigger<F, T>(&self, wake: F) -> Result<WakeOutcome<T>, SnoozeError>
    where
        F: Future<Output = Result<T, SnoozeError>>,
    {
        if let Err(since) = self.admit().await {
            self.logger.log_wake_coalesced(since.as_millis());
            self.metrics.inc_wake_request("coalesced");
            return Ok(WakeOutcome::Coalesced);
        }

        match tokio::time::timeout(self.timeout, wake).await {
            Ok(Ok(value)) => {
                self.metrics.inc_wake_request("executed");
                Ok(WakeOutcome::Executed(value))
            }
            Ok(Err(e)) => {
                self.metrics.inc_wake_request("failed");
                Err(e)
            }
            Err(_) => {
                self.metrics.inc_wake_request("failed");
                Err(SnoozeError::Timeout(self.timeout))
            }
        }
    }
}
