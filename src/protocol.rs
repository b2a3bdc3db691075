//! Wire shapes exchanged with the analysis server, and their normalization
//! into the single [`ProgressEvent`] shape consumed by the tracker.
//!
//! ## Message Mapping
//!
//! | Direction | Channel | Shape |
//! |-----------|---------|-------|
//! | client → server | pull | [`StartRequest`] |
//! | server → client | pull | [`StartResponse`], [`StatusResponse`], result object |
//! | client → server | push | [`ClientMessage`] |
//! | server → client | push | [`ServerMessage`] |

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-issued task identifier, the correlation key across both channels.
pub type TaskId = String;

/// Server-reported task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[serde(alias = "initializing", alias = "started", alias = "pending")]
    Queued,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Normalized progress notification, independent of the channel it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: TaskStatus,
    pub processed_items: u64,
    pub total_items: u64,
    /// Clamped to `[0, 100]`.
    pub progress_percentage: f64,
    pub current_step: String,
    /// Result object; only meaningful when `status == Completed`.
    pub payload: Option<Value>,
}

impl ProgressEvent {
    /// `total_portfolio_value` from the payload, if present and numeric.
    pub fn total_value(&self) -> Option<f64> {
        self.payload.as_ref().and_then(total_portfolio_value)
    }
}

/// Extract `total_portfolio_value` from a result object.
pub fn total_portfolio_value(result: &Value) -> Option<f64> {
    result.get("total_portfolio_value").and_then(Value::as_f64)
}

/// Extract `processing_summary.processing_time` from a result object.
pub fn processing_time(result: &Value) -> Option<&str> {
    result
        .get("processing_summary")
        .and_then(|s| s.get("processing_time"))
        .and_then(Value::as_str)
}

/// Body of the start-task call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub user_id: String,
    pub portfolio_types: Vec<String>,
    pub calculation_type: String,
}

/// Response of the start-task call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub task_id: String,
    #[serde(default)]
    pub websocket_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Status fields shared by the pull status response and push progress messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: TaskStatus,
    #[serde(default)]
    pub processed_items: u64,
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub progress_percentage: f64,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub task_id: Option<String>,
    /// Result object; the server attaches it once the task has completed.
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<StatusResponse> for ProgressEvent {
    fn from(resp: StatusResponse) -> Self {
        let pct = if resp.progress_percentage.is_finite() {
            resp.progress_percentage.clamp(0.0, 100.0)
        } else {
            0.0
        };
        // A payload is only carried for completed events.
        let payload = match resp.status {
            TaskStatus::Completed => resp.data.filter(|d| !d.is_null()),
            _ => None,
        };
        ProgressEvent {
            status: resp.status,
            processed_items: resp.processed_items,
            total_items: resp.total_items,
            progress_percentage: pct,
            current_step: resp.current_step,
            payload,
        }
    }
}

/// Progress message pushed by the server for one task.
#[derive(Debug, Clone)]
pub struct ProgressMessage {
    pub task_id: String,
    pub event: ProgressEvent,
}

/// Decoded server-to-client push message.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    Pong { timestamp: Option<String> },
    Progress(ProgressMessage),
    /// Valid JSON the harness has no use for.
    Other(Value),
}

/// Error decoding a push frame.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Undecodable push message: {0}")]
pub struct DecodeError(pub String);

impl ServerMessage {
    /// Decode a raw text frame.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| DecodeError(e.to_string()))?;

        if value.get("type").and_then(Value::as_str) == Some("pong") {
            let timestamp = value
                .get("timestamp")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Ok(ServerMessage::Pong { timestamp });
        }

        if value.get("task_id").and_then(Value::as_str).is_some() {
            let resp: StatusResponse =
                serde_json::from_value(value).map_err(|e| DecodeError(e.to_string()))?;
            let task_id = resp.task_id.clone().unwrap_or_default();
            return Ok(ServerMessage::Progress(ProgressMessage {
                task_id,
                event: resp.into(),
            }));
        }

        Ok(ServerMessage::Other(value))
    }
}

/// Client-to-server push message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Liveness probe; the server echoes `{type: "pong"}`.
    Ping,
    /// Ask the server to push the current status of a task.
    GetStatus { task_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_aliases_map_to_queued() {
        for raw in ["\"queued\"", "\"initializing\"", "\"started\"", "\"pending\""] {
            let status: TaskStatus = serde_json::from_str(raw).unwrap();
            assert_eq!(status, TaskStatus::Queued);
        }
        assert!(serde_json::from_str::<TaskStatus>("\"exploded\"").is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
    }

    #[test]
    fn test_status_response_normalizes_payload_only_when_completed() {
        let resp: StatusResponse = serde_json::from_value(json!({
            "status": "processing",
            "processed_items": 2,
            "total_items": 5,
            "progress_percentage": 40.0,
            "current_step": "Processing stocks",
            "data": {"total_portfolio_value": 1.0}
        }))
        .unwrap();
        let event = ProgressEvent::from(resp);
        assert_eq!(event.status, TaskStatus::Processing);
        assert_eq!(event.processed_items, 2);
        assert!(event.payload.is_none());
    }

    #[test]
    fn test_status_response_null_data_is_no_payload() {
        let resp: StatusResponse = serde_json::from_value(json!({
            "status": "completed",
            "progress_percentage": 100.0,
            "current_step": "Analysis completed",
            "data": null
        }))
        .unwrap();
        assert!(ProgressEvent::from(resp).payload.is_none());
    }

    #[test]
    fn test_percentage_is_clamped() {
        let resp: StatusResponse = serde_json::from_value(json!({
            "status": "processing",
            "progress_percentage": 140.0
        }))
        .unwrap();
        assert_eq!(ProgressEvent::from(resp).progress_percentage, 100.0);

        let resp: StatusResponse = serde_json::from_value(json!({
            "status": "processing",
            "progress_percentage": -3.0
        }))
        .unwrap();
        assert_eq!(ProgressEvent::from(resp).progress_percentage, 0.0);
    }

    #[test]
    fn test_decode_pong() {
        let msg = ServerMessage::decode(r#"{"type":"pong","timestamp":"2024-01-01T00:00:00"}"#)
            .unwrap();
        match msg {
            ServerMessage::Pong { timestamp } => {
                assert_eq!(timestamp.as_deref(), Some("2024-01-01T00:00:00"))
            }
            other => panic!("Expected Pong, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_completed_progress_with_payload() {
        let raw = json!({
            "task_id": "T1",
            "user_id": "user_1",
            "status": "completed",
            "processed_items": 5,
            "total_items": 5,
            "progress_percentage": 100.0,
            "current_step": "Analysis completed",
            "data": {
                "total_portfolio_value": 125000,
                "processing_summary": {"processing_time": "5.0 seconds"}
            }
        })
        .to_string();
        match ServerMessage::decode(&raw).unwrap() {
            ServerMessage::Progress(p) => {
                assert_eq!(p.task_id, "T1");
                assert_eq!(p.event.total_value(), Some(125000.0));
                assert_eq!(
                    processing_time(p.event.payload.as_ref().unwrap()),
                    Some("5.0 seconds")
                );
            }
            other => panic!("Expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_invalid_json_is_error() {
        assert!(ServerMessage::decode("not json {").is_err());
    }

    #[test]
    fn test_decode_unknown_status_is_error() {
        let raw = r#"{"task_id":"T1","status":"exploded"}"#;
        assert!(ServerMessage::decode(raw).is_err());
    }

    #[test]
    fn test_decode_unrelated_json_is_other() {
        let msg = ServerMessage::decode(r#"{"type":"broadcast","text":"hi"}"#).unwrap();
        assert!(matches!(msg, ServerMessage::Other(_)));
    }

    #[test]
    fn test_client_message_serialization() {
        assert_eq!(
            serde_json::to_string(&ClientMessage::Ping).unwrap(),
            r#"{"type":"ping"}"#
        );
        let get = ClientMessage::GetStatus {
            task_id: "T9".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&get).unwrap(),
            r#"{"type":"get_status","task_id":"T9"}"#
        );
    }
}
