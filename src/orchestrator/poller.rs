//! Status poller: the pull-side feed into a [`TaskTracker`].

use crate::errors::PullError;
use crate::protocol::TaskStatus;
use crate::pull::PullChannel;
use crate::tracker::{ApplyOutcome, EventSource, TaskTracker};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default interval between status polls (2 seconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default number of consecutive poll failures before the poller gives up.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Default base delay for the linear retry backoff.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Polling behaviour for one scenario.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Poll alongside the push channel. Pull-only scenarios always poll.
    pub enabled: bool,
    pub interval: Duration,
    pub max_consecutive_failures: u32,
    /// Base delay; the n-th consecutive failure waits `n * retry_delay`.
    pub retry_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl PollSettings {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Why the poller stopped.
#[derive(Debug)]
pub enum PollExit {
    /// The tracker settled, by this poller or by the push channel.
    Settled,
    /// Too many consecutive failures, or the server reported the task id
    /// as unknown. The last error is attached.
    GaveUp(PullError),
}

/// Poll `tracker`'s task until it settles or polling gives up.
///
/// Each successful poll is applied to the tracker as a pull-sourced event.
/// A `completed` status without a result body triggers one `fetch_result`
/// so the completion carries its payload.
pub async fn poll_until_settled(
    pull: Arc<dyn PullChannel>,
    tracker: Arc<TaskTracker>,
    settings: PollSettings,
) -> PollExit {
    let task_id = tracker.task_id().to_string();
    let mut failures: u32 = 0;
    let mut delay = settings.interval;

    loop {
        tokio::time::sleep(delay).await;
        if tracker.signal().is_some() {
            return PollExit::Settled;
        }

        match poll_once(pull.as_ref(), &tracker).await {
            Ok(ApplyOutcome::Terminal) | Ok(ApplyOutcome::Discarded) => return PollExit::Settled,
            Ok(ApplyOutcome::Applied) => {
                failures = 0;
                delay = settings.interval;
            }
            Err(e) if e.is_unknown_task() => {
                warn!(task_id = %task_id, error = %e, "Server does not know the task, polling stopped");
                return PollExit::GaveUp(e);
            }
            Err(e) => {
                failures += 1;
                if failures >= settings.max_consecutive_failures {
                    warn!(
                        task_id = %task_id,
                        failures,
                        error = %e,
                        "Status polling gave up"
                    );
                    return PollExit::GaveUp(e);
                }
                delay = settings.retry_delay * failures;
                debug!(
                    task_id = %task_id,
                    failures,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Status poll failed, retrying"
                );
            }
        }
    }
}

async fn poll_once(pull: &dyn PullChannel, tracker: &TaskTracker) -> Result<ApplyOutcome, PullError> {
    let task_id = tracker.task_id();
    let mut event = pull.fetch_status(task_id).await?;

    if event.status == TaskStatus::Completed && event.payload.is_none() {
        event.payload = Some(pull.fetch_result(task_id).await?);
    }

    // A malformed completion has already settled the tracker as a fault.
    Ok(tracker
        .apply(event, EventSource::Pull)
        .unwrap_or(ApplyOutcome::Terminal))
}
