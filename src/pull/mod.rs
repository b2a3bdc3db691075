//! Pull channel adapter: request/response calls against the analysis API.
//!
//! All operations are stateless and safe to call concurrently for
//! different task ids.

pub mod http;

use crate::errors::{HarnessError, PullError};
use crate::identity::ClientIdentity;
use crate::protocol::{ProgressEvent, TaskId};
use async_trait::async_trait;
use serde_json::Value;

pub use http::HttpPullChannel;

#[async_trait]
pub trait PullChannel: Send + Sync {
    /// Submit a new analysis and return the server-issued task id.
    async fn start_task(
        &self,
        identity: &ClientIdentity,
        portfolio_types: &[String],
        calculation_type: &str,
    ) -> Result<TaskId, PullError>;

    /// Current status of a task, normalized.
    async fn fetch_status(&self, task_id: &str) -> Result<ProgressEvent, PullError>;

    /// Final result object. Only meaningful once the task has completed;
    /// this is not validated here.
    async fn fetch_result(&self, task_id: &str) -> Result<Value, PullError>;

    /// Check that the server answers at all.
    async fn check_health(&self) -> Result<(), HarnessError>;
}
