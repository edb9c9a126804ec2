//! IPC message types for daemon communication
//!
//! JSON-over-newline protocol. Each message is a single line of JSON followed by `\n`.
//!
//! A connection either sends one control message and reads one
//! [`DaemonResponse`], or opens with [`DaemonMessage::Hello`] and stays attached
//! as a front-end: it then receives [`ClientEvent`](crate::bridge::ClientEvent)
//! frames and answers requests with [`DaemonMessage::Response`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::BridgeMetrics;
use planstore::{Entry, Plan, PlanKind, PlanStatus, StoredPlan};

/// Messages to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum DaemonMessage {
    /// Attach as a front-end under `client_id`
    Hello { client_id: String },

    /// Answer to a request received on an attached connection
    Response {
        correlation_id: String,
        #[serde(default)]
        data: Value,
    },

    /// Ping to check if daemon is alive
    Ping,

    /// Request daemon to stop gracefully
    Shutdown,

    /// Connected clients and bridge counters
    Status,

    BeginTask { media_folder_path: String, kind: PlanKind },

    AddEntry { task_id: String, entry: Entry },

    EndTask { task_id: String },

    UpdatePlanStatus { plan_id: String, status: PlanStatus },

    GetPlan { task_id: String },

    ListPending,

    /// Send a correlated request to a front-end and return its answer
    Retrieve {
        event: String,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        client_id: Option<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Push an event to one front-end or all of them
    BroadcastMessage {
        event: String,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        client_id: Option<String>,
    },
}

/// A plan and the task it is stored under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub task_id: String,
    pub plan: Plan,
}

impl From<StoredPlan> for PlanSummary {
    fn from(stored: StoredPlan) -> Self {
        Self {
            task_id: stored.task_id,
            plan: stored.plan,
        }
    }
}

/// Responses from the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum DaemonResponse {
    /// Acknowledgment
    Ok,

    /// Pong response to ping
    Pong { version: String },

    /// Error response
    Error { message: String },

    Status { clients: Vec<String>, metrics: BridgeMetrics },

    TaskStarted { task_id: String },

    PlanReady { task_id: String, plan_file_path: String },

    Plan(PlanSummary),

    Plans { plans: Vec<PlanSummary> },

    /// A front-end's answer to a retrieve
    Data { data: Value },
}

impl DaemonResponse {
    pub fn error(message: impl ToString) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hello_layout() {
        let msg = DaemonMessage::Hello {
            client_id: "ui-1".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"Hello","clientId":"ui-1"}"#
        );
    }

    #[test]
    fn test_response_without_data() {
        let msg: DaemonMessage = serde_json::from_str(r#"{"type":"Response","correlationId":"c"}"#).unwrap();
        assert_eq!(
            msg,
            DaemonMessage::Response {
                correlation_id: "c".to_string(),
                data: Value::Null
            }
        );
    }

    #[test]
    fn test_add_entry_carries_untagged_entry() {
        let json = r#"{"type":"AddEntry","taskId":"t","entry":{"season":1,"episode":4,"path":"/m/e4.mkv"}}"#;
        let msg: DaemonMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            DaemonMessage::AddEntry {
                task_id: "t".to_string(),
                entry: Entry::recognition(1, 4, "/m/e4.mkv"),
            }
        );
    }

    #[test]
    fn test_retrieve_defaults() {
        let msg: DaemonMessage =
            serde_json::from_str(r#"{"type":"Retrieve","event":"getSelectedMediaMetadata"}"#).unwrap();
        assert_eq!(
            msg,
            DaemonMessage::Retrieve {
                event: "getSelectedMediaMetadata".to_string(),
                data: Value::Null,
                client_id: None,
                timeout_ms: None,
            }
        );
    }

    #[test]
    fn test_responses_serialize() {
        assert_eq!(serde_json::to_string(&DaemonResponse::Ok).unwrap(), r#"{"type":"Ok"}"#);
        assert_eq!(
            serde_json::to_value(DaemonResponse::TaskStarted {
                task_id: "t".to_string()
            })
            .unwrap(),
            json!({"type": "TaskStarted", "taskId": "t"})
        );
        assert_eq!(
            serde_json::to_value(DaemonResponse::error("boom")).unwrap(),
            json!({"type": "Error", "message": "boom"})
        );
    }

    #[test]
    fn test_plan_response_roundtrip() {
        let resp = DaemonResponse::Plan(PlanSummary {
            task_id: "t".to_string(),
            plan: Plan::new(PlanKind::RenameMediaFile, "/media/Show"),
        });
        let json = serde_json::to_string(&resp).unwrap();
        let parsed: DaemonResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, resp);
    }
}
