//! BridgeHandle - client interface for the Bridge task

use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use super::messages::{BridgeError, BridgeMetrics, BridgeRequest, BridgeResult, ClientEvent};

/// Cloneable handle to the Bridge task
///
/// Used by the transport to register clients and deliver responses, and by
/// application code to send requests and broadcasts.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<BridgeRequest>,
    default_timeout: Duration,
}

/// A request that has been handed to the bridge
///
/// Awaiting [`PendingReply::wait`] yields the client's response or the
/// reason there will not be one.
#[derive(Debug)]
pub struct PendingReply {
    correlation_id: String,
    rx: oneshot::Receiver<BridgeResult<Value>>,
}

impl PendingReply {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub async fn wait(self) -> BridgeResult<Value> {
        self.rx.await.unwrap_or(Err(BridgeError::ChannelError))
    }
}

impl BridgeHandle {
    pub(crate) fn new(tx: mpsc::Sender<BridgeRequest>, default_timeout: Duration) -> Self {
        Self { tx, default_timeout }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    async fn send(&self, req: BridgeRequest) -> BridgeResult<()> {
        self.tx.send(req).await.map_err(|_| BridgeError::ChannelError)
    }

    /// Register a client; frames for it are delivered on `tx`
    pub async fn register(&self, client_id: &str, tx: mpsc::Sender<ClientEvent>) -> BridgeResult<()> {
        debug!(%client_id, "BridgeHandle::register: called");
        self.send(BridgeRequest::Register {
            client_id: client_id.to_string(),
            tx,
        })
        .await
    }

    /// Remove a client and fail its in-flight requests
    pub async fn unregister(&self, client_id: &str) -> BridgeResult<()> {
        debug!(%client_id, "BridgeHandle::unregister: called");
        self.send(BridgeRequest::Unregister {
            client_id: client_id.to_string(),
        })
        .await
    }

    /// Report that the connection feeding `tx` closed
    pub async fn disconnected(&self, client_id: &str, tx: mpsc::Sender<ClientEvent>) -> BridgeResult<()> {
        debug!(%client_id, "BridgeHandle::disconnected: called");
        self.send(BridgeRequest::Disconnected {
            client_id: client_id.to_string(),
            tx,
        })
        .await
    }

    /// Hand a request to the bridge without waiting for the answer
    ///
    /// `timeout` falls back to the configured default.
    pub async fn send_request(
        &self,
        event: &str,
        data: Value,
        target_client_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> BridgeResult<PendingReply> {
        let correlation_id = Uuid::now_v7().to_string();
        let timeout = timeout.unwrap_or(self.default_timeout);
        debug!(%event, %correlation_id, ?target_client_id, ?timeout, "BridgeHandle::send_request: called");

        let (reply_tx, rx) = oneshot::channel();
        self.send(BridgeRequest::Request {
            correlation_id: correlation_id.clone(),
            event: event.to_string(),
            data,
            target_client_id: target_client_id.map(str::to_string),
            timeout,
            reply_tx,
        })
        .await?;

        Ok(PendingReply { correlation_id, rx })
    }

    /// Send a request and wait for its response using the default timeout
    pub async fn request(&self, event: &str, data: Value, target_client_id: Option<&str>) -> BridgeResult<Value> {
        self.send_request(event, data, target_client_id, None).await?.wait().await
    }

    pub async fn request_with_timeout(
        &self,
        event: &str,
        data: Value,
        target_client_id: Option<&str>,
        timeout: Duration,
    ) -> BridgeResult<Value> {
        self.send_request(event, data, target_client_id, Some(timeout))
            .await?
            .wait()
            .await
    }

    /// Deliver a client's response; unknown ids are discarded by the bridge
    pub async fn respond(&self, correlation_id: &str, data: Value) -> BridgeResult<()> {
        debug!(%correlation_id, "BridgeHandle::respond: called");
        self.send(BridgeRequest::Response {
            correlation_id: correlation_id.to_string(),
            data,
        })
        .await
    }

    /// Abandon a pending request
    pub async fn cancel(&self, correlation_id: &str) -> BridgeResult<()> {
        debug!(%correlation_id, "BridgeHandle::cancel: called");
        self.send(BridgeRequest::Cancel {
            correlation_id: correlation_id.to_string(),
        })
        .await
    }

    /// Send an event to one client, or to every client when no target is given
    pub async fn broadcast(&self, event: &str, data: Value, target_client_id: Option<&str>) -> BridgeResult<()> {
        debug!(%event, ?target_client_id, "BridgeHandle::broadcast: called");
        self.send(BridgeRequest::Broadcast {
            event: event.to_string(),
            data,
            target_client_id: target_client_id.map(str::to_string),
        })
        .await
    }

    /// Connected client ids, earliest first
    pub async fn clients(&self) -> BridgeResult<Vec<String>> {
        let (reply_tx, rx) = oneshot::channel();
        self.send(BridgeRequest::ListClients { reply_tx }).await?;
        rx.await.map_err(|_| BridgeError::ChannelError)
    }

    pub async fn metrics(&self) -> BridgeResult<BridgeMetrics> {
        let (reply_tx, rx) = oneshot::channel();
        self.send(BridgeRequest::GetMetrics { reply_tx }).await?;
        rx.await.map_err(|_| BridgeError::ChannelError)
    }

    pub async fn shutdown(&self) -> BridgeResult<()> {
        debug!("BridgeHandle::shutdown: called");
        self.send(BridgeRequest::Shutdown).await
    }
}
