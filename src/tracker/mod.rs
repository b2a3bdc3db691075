//! Task tracker: merges progress events from both channels into one
//! coherent record and resolves to a terminal outcome exactly once.
//!
//! ## State machine
//!
//! ```text
//! Pending ──processing──▶ Processing ──completed──▶ Completed
//!    │                        │
//!    └────────failed──────────┴──────failed───────▶ Failed
//! ```
//!
//! `Completed` and `Failed` are terminal: the record freezes and later
//! events (duplicates, late pushes, in-flight polls) are discarded. The
//! tracker is the single synchronization point between the push pump and
//! the status poller; the terminal check-and-set happens under its lock.

pub mod observer;
pub mod record;
pub mod settle;

pub use observer::TrackerObserver;
pub use record::{EventSource, TaskRecord, TaskState, TrackerSnapshot};
pub use settle::{Settlement, Signal};

use crate::errors::TrackerError;
use crate::protocol::{ProgressEvent, TaskId, TaskStatus};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// What `apply` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Recorded; the task is still running.
    Applied,
    /// Recorded, and it moved the tracker into a terminal state.
    Terminal,
    /// Ignored because the record was already frozen.
    Discarded,
}

struct Inner {
    record: TaskRecord,
    state: TaskState,
    max_percentage: f64,
}

/// Owns one task's lifecycle.
pub struct TaskTracker {
    task_id: TaskId,
    inner: Mutex<Inner>,
    settlement: Settlement,
    observers: Vec<Arc<dyn TrackerObserver>>,
}

impl TaskTracker {
    pub fn new(task_id: impl Into<TaskId>) -> Self {
        let task_id = task_id.into();
        Self {
            inner: Mutex::new(Inner {
                record: TaskRecord::new(task_id.clone()),
                state: TaskState::Pending,
                max_percentage: 0.0,
            }),
            task_id,
            settlement: Settlement::new(),
            observers: Vec::new(),
        }
    }

    /// Register an observer. Observers are fixed once the tracker is shared.
    pub fn with_observer(mut self, observer: Arc<dyn TrackerObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    pub fn is_terminal(&self) -> bool {
        self.lock().record.terminal
    }

    pub fn max_percentage(&self) -> f64 {
        self.lock().max_percentage
    }

    pub fn event_count(&self) -> usize {
        self.lock().record.history.len()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let inner = self.lock();
        TrackerSnapshot {
            record: inner.record.clone(),
            state: inner.state,
            max_percentage: inner.max_percentage,
        }
    }

    /// Wait for the first settling signal: a terminal outcome or a fault.
    pub async fn settled(&self) -> Signal {
        self.settlement.wait().await
    }

    /// The settling signal, if one has fired.
    pub fn signal(&self) -> Option<Signal> {
        self.settlement.peek()
    }

    /// Merge one normalized event.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MalformedCompletion`] for a `completed` event
    /// without a payload. The tracker does not transition in that case, but
    /// the fault settles the tracker's signal if nothing else has.
    pub fn apply(
        &self,
        event: ProgressEvent,
        source: EventSource,
    ) -> Result<ApplyOutcome, TrackerError> {
        let mut inner = self.lock();

        if inner.record.terminal {
            drop(inner);
            debug!(
                task_id = %self.task_id,
                %source,
                status = %event.status,
                "Discarding event after terminal state"
            );
            for observer in &self.observers {
                observer.on_discarded(&self.task_id, source, &event);
            }
            return Ok(ApplyOutcome::Discarded);
        }

        if event.status == TaskStatus::Completed && event.payload.is_none() {
            let err = TrackerError::MalformedCompletion {
                task_id: self.task_id.clone(),
            };
            inner.record.faulted = true;
            self.settlement.settle(Signal::Fault(err.clone()));
            drop(inner);

            warn!(task_id = %self.task_id, %source, "Completion event carried no payload");
            for observer in &self.observers {
                observer.on_fault(&self.task_id, &err);
            }
            return Err(err);
        }

        inner.record.history.push(event.clone());
        if event.progress_percentage > inner.max_percentage {
            inner.max_percentage = event.progress_percentage;
        }
        let max_percentage = inner.max_percentage;

        let terminal = match event.status {
            TaskStatus::Queued => None,
            TaskStatus::Processing => {
                inner.state = TaskState::Processing;
                None
            }
            TaskStatus::Completed => {
                inner.state = TaskState::Completed;
                // Presence checked above.
                event
                    .payload
                    .clone()
                    .map(|payload| Signal::Completed { payload })
            }
            TaskStatus::Failed => {
                inner.state = TaskState::Failed;
                Some(Signal::Failed {
                    reason: event.current_step.clone(),
                })
            }
        };

        if let Some(signal) = &terminal {
            inner.record.terminal = true;
            inner.record.finished_at = Some(Utc::now());
            // Settled under the lock so the winning signal matches the frozen record.
            self.settlement.settle(signal.clone());
        }
        inner.record.latest = Some(event.clone());
        let state = inner.state;
        drop(inner);

        debug!(
            task_id = %self.task_id,
            %source,
            %state,
            pct = event.progress_percentage,
            step = %event.current_step,
            "Progress"
        );
        for observer in &self.observers {
            observer.on_progress(&self.task_id, source, &event, max_percentage);
        }

        match terminal {
            Some(signal) => {
                info!(task_id = %self.task_id, %source, %state, "Task reached terminal state");
                for observer in &self.observers {
                    observer.on_terminal(&self.task_id, &signal);
                }
                Ok(ApplyOutcome::Terminal)
            }
            None => Ok(ApplyOutcome::Applied),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic inside apply cannot leave Inner half-updated in a way later
        // readers care about, so poisoning is ignored.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}
