//! Typed error hierarchy for the harness.
//!
//! Four enums cover the subsystems:
//! - `PushError`: push channel handshake and send failures
//! - `PullError`: request/response call failures
//! - `TrackerError`: protocol-contract violations seen by a task tracker
//! - `HarnessError`: run-level failures surfaced to the bootstrap

use thiserror::Error;

/// Errors from the push channel adapter.
#[derive(Debug, Clone, Error)]
pub enum PushError {
    #[error("Push connection failed: {detail}")]
    Connection { detail: String },

    #[error("Push channel is not connected")]
    NotConnected,
}

/// Errors from the pull channel adapter.
///
/// Every variant carries a best-effort human detail: the server-reported
/// error body when one was returned, the transport message otherwise.
#[derive(Debug, Clone, Error)]
pub enum PullError {
    #[error("Failed to start analysis: {detail}")]
    Start { detail: String },

    #[error("Failed to fetch status: {detail}")]
    Status {
        detail: String,
        /// HTTP status when the server answered at all.
        http_status: Option<u16>,
    },

    #[error("Failed to fetch result: {detail}")]
    Result { detail: String },
}

impl PullError {
    /// The detail string without the operation prefix.
    pub fn detail(&self) -> &str {
        match self {
            PullError::Start { detail }
            | PullError::Status { detail, .. }
            | PullError::Result { detail } => detail,
        }
    }

    /// True when a status lookup was answered with 404 (unknown task id).
    pub fn is_unknown_task(&self) -> bool {
        matches!(
            self,
            PullError::Status {
                http_status: Some(404),
                ..
            }
        )
    }
}

/// Errors raised by a task tracker when an event breaks the protocol contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("Task {task_id} reported completion without a result payload")]
    MalformedCompletion { task_id: String },
}

/// Run-level failures.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Analysis server at {url} is not reachable: {detail}")]
    ServerUnreachable { url: String, detail: String },
}
