use crate::protocol::{ProgressEvent, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tracker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Processing => write!(f, "processing"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Failed => write!(f, "failed"),
        }
    }
}

/// Which channel delivered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Push,
    Pull,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSource::Push => write!(f, "push"),
            EventSource::Pull => write!(f, "pull"),
        }
    }
}

/// Everything one tracker knows about its task.
///
/// Once `terminal` is set the record is frozen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    /// Append-only, for diagnostics.
    pub history: Vec<ProgressEvent>,
    pub latest: Option<ProgressEvent>,
    pub terminal: bool,
    /// Set when a completion without payload was rejected.
    #[serde(default)]
    pub faulted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            history: Vec::new(),
            latest: None,
            terminal: false,
            faulted: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Point-in-time copy of a tracker.
#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    pub record: TaskRecord,
    pub state: TaskState,
    /// Highest percentage seen on any event, for display.
    pub max_percentage: f64,
}
