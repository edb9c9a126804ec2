//! Message types for the Bridge

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Frames delivered to an attached front-end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Correlated request; the client answers with the same correlation id
    Request {
        event: String,
        data: Value,
        #[serde(rename = "correlationId")]
        correlation_id: String,
    },

    /// Notification, no answer expected
    Event { event: String, data: Value },
}

impl ClientEvent {
    pub fn event_name(&self) -> &str {
        match self {
            Self::Request { event, .. } | Self::Event { event, .. } => event,
        }
    }
}

/// Errors from bridge operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// No connected client matched the target (or none are connected at all)
    #[error("No client available{}", .target.as_ref().map(|t| format!(" (wanted {})", t)).unwrap_or_default())]
    NoClientAvailable { target: Option<String> },

    #[error("Request {event} timed out after {timeout:?}")]
    RequestTimeout { event: String, timeout: Duration },

    #[error("Client {0} disconnected before responding")]
    ClientDisconnected(String),

    /// The client's outbound queue is full
    #[error("Client {0} is not keeping up with requests")]
    ClientBusy(String),

    #[error("Invalid response to {event}: {message}")]
    InvalidResponse { event: String, message: String },

    #[error("Bridge channel closed")]
    ChannelError,
}

/// Result of a bridge request
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Internal requests to the Bridge task
#[derive(Debug)]
pub enum BridgeRequest {
    /// A front-end connected
    Register {
        client_id: String,
        tx: mpsc::Sender<ClientEvent>,
    },

    /// Forget a client, whatever connection it is on
    Unregister { client_id: String },

    /// A specific connection closed; ignored if the id was re-registered since
    Disconnected {
        client_id: String,
        tx: mpsc::Sender<ClientEvent>,
    },

    /// Send a correlated request and reply when it is answered
    Request {
        correlation_id: String,
        event: String,
        data: Value,
        target_client_id: Option<String>,
        timeout: Duration,
        reply_tx: oneshot::Sender<BridgeResult<Value>>,
    },

    /// A client answered a request
    Response { correlation_id: String, data: Value },

    /// Give up on a request; the caller sees a timeout
    Cancel { correlation_id: String },

    /// Deadline timer fired (internal)
    RequestTimeout { correlation_id: String },

    /// Notify one client or all of them
    Broadcast {
        event: String,
        data: Value,
        target_client_id: Option<String>,
    },

    /// Connected client ids in connection order
    ListClients { reply_tx: oneshot::Sender<Vec<String>> },

    GetMetrics { reply_tx: oneshot::Sender<BridgeMetrics> },

    Shutdown,
}

/// Bridge counters for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMetrics {
    pub registered_clients: usize,
    pub pending_requests: usize,
    pub requests_sent: u64,
    pub responses_matched: u64,
    pub late_responses: u64,
    pub request_timeouts: u64,
    pub requests_cancelled: u64,
    pub broadcasts_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_frame_layout() {
        let msg = ClientEvent::Request {
            event: "askForConfirmation".to_string(),
            data: json!({"message": "Rename 3 files?"}),
            correlation_id: "c-1".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"Request","event":"askForConfirmation","data":{"message":"Rename 3 files?"},"correlationId":"c-1"}"#
        );
    }

    #[test]
    fn test_event_frame_roundtrip() {
        let msg = ClientEvent::Event {
            event: "planReady".to_string(),
            data: json!({"taskId": "t"}),
        };
        let parsed: ClientEvent = serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(parsed.event_name(), "planReady");
    }

    #[test]
    fn test_no_client_message() {
        let err = BridgeError::NoClientAvailable { target: None };
        assert_eq!(err.to_string(), "No client available");
        let err = BridgeError::NoClientAvailable {
            target: Some("ui-1".to_string()),
        };
        assert_eq!(err.to_string(), "No client available (wanted ui-1)");
    }
}
