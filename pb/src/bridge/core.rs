//! Main Bridge task implementation

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::BridgeConfig;
use super::handle::BridgeHandle;
use super::messages::{BridgeError, BridgeMetrics, BridgeRequest, BridgeResult, ClientEvent};
use super::registry::ClientRegistry;

/// A request waiting for its response
struct PendingRequest {
    event: String,
    client_id: String,
    /// The connection the request went out on
    connection: mpsc::Sender<ClientEvent>,
    timeout: Duration,
    deadline: Instant,
    reply_tx: oneshot::Sender<BridgeResult<Value>>,
}

impl PendingRequest {
    fn fail(self, error: BridgeError) {
        let _ = self.reply_tx.send(Err(error));
    }

    fn timed_out(self) {
        let error = BridgeError::RequestTimeout {
            event: self.event.clone(),
            timeout: self.timeout,
        };
        self.fail(error);
    }
}

/// The Bridge owns the client registry and the pending request table
///
/// Every mutation goes through its request channel, so correlation,
/// timeouts and client removal never race with each other.
pub struct Bridge {
    config: BridgeConfig,
    tx: mpsc::Sender<BridgeRequest>,
    rx: mpsc::Receiver<BridgeRequest>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        Self { config, tx, rx }
    }

    /// Create a handle for talking to this bridge
    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle::new(self.tx.clone(), self.config.request_timeout())
    }

    /// Start the bridge on the current runtime
    pub fn spawn(config: BridgeConfig) -> (BridgeHandle, JoinHandle<()>) {
        let bridge = Self::new(config);
        let handle = bridge.handle();
        let task = tokio::spawn(bridge.run());
        (handle, task)
    }

    /// Run the Bridge task until a `Shutdown` request arrives
    pub async fn run(mut self) {
        let bridge_tx = self.tx.clone();
        let mut registry = ClientRegistry::new();
        let mut pending: HashMap<String, PendingRequest> = HashMap::new();
        let mut metrics = BridgeMetrics::default();

        info!("Bridge started");

        // The loop holds its own sender for timers, so recv only ends on Shutdown
        while let Some(req) = self.rx.recv().await {
            match req {
                BridgeRequest::Register { client_id, tx } => {
                    info!(%client_id, "Client registered");
                    registry.register(client_id, tx);
                }

                BridgeRequest::Unregister { client_id } => {
                    if registry.unregister(&client_id).is_some() {
                        info!(%client_id, "Client unregistered");
                        fail_client_requests(&mut pending, &client_id);
                    }
                }

                BridgeRequest::Disconnected { client_id, tx } => {
                    if registry.unregister_connection(&client_id, &tx).is_some() {
                        info!(%client_id, "Client disconnected");
                    }
                    // A superseded connection still owns the requests it was sent
                    fail_connection_requests(&mut pending, &client_id, &tx);
                }

                BridgeRequest::Request {
                    correlation_id,
                    event,
                    data,
                    target_client_id,
                    timeout,
                    reply_tx,
                } => {
                    let Some(conn) = registry.resolve(target_client_id.as_deref()) else {
                        debug!(%event, ?target_client_id, "No client for request");
                        let _ = reply_tx.send(Err(BridgeError::NoClientAvailable {
                            target: target_client_id,
                        }));
                        continue;
                    };
                    let client_id = conn.client_id().to_string();
                    let connection = conn.sender().clone();

                    let frame = ClientEvent::Request {
                        event: event.clone(),
                        data,
                        correlation_id: correlation_id.clone(),
                    };

                    match connection.try_send(frame) {
                        Ok(()) => {
                            debug!(%correlation_id, %event, %client_id, ?timeout, "Request sent");
                            metrics.requests_sent += 1;
                            pending.insert(
                                correlation_id.clone(),
                                PendingRequest {
                                    event,
                                    client_id,
                                    connection,
                                    timeout,
                                    deadline: Instant::now() + timeout,
                                    reply_tx,
                                },
                            );

                            let timeout_tx = bridge_tx.clone();
                            tokio::spawn(async move {
                                tokio::time::sleep(timeout).await;
                                let _ = timeout_tx.send(BridgeRequest::RequestTimeout { correlation_id }).await;
                            });
                        }
                        Err(TrySendError::Full(_)) => {
                            warn!(%client_id, %event, "Client queue full, request refused");
                            let _ = reply_tx.send(Err(BridgeError::ClientBusy(client_id)));
                        }
                        Err(TrySendError::Closed(_)) => {
                            warn!(%client_id, %event, "Client channel closed, dropping client");
                            registry.unregister(&client_id);
                            fail_client_requests(&mut pending, &client_id);
                            let _ = reply_tx.send(Err(BridgeError::ClientDisconnected(client_id)));
                        }
                    }
                }

                BridgeRequest::Response { correlation_id, data } => match pending.remove(&correlation_id) {
                    Some(req) if Instant::now() >= req.deadline => {
                        // Deadline passed but the timer has not been processed yet
                        warn!(%correlation_id, event = %req.event, "Response arrived after deadline");
                        metrics.request_timeouts += 1;
                        metrics.late_responses += 1;
                        req.timed_out();
                    }
                    Some(req) => {
                        debug!(%correlation_id, event = %req.event, client_id = %req.client_id, "Response matched");
                        metrics.responses_matched += 1;
                        let _ = req.reply_tx.send(Ok(data));
                    }
                    None => {
                        debug!(%correlation_id, "Discarding response for unknown or expired request");
                        metrics.late_responses += 1;
                    }
                },

                BridgeRequest::Cancel { correlation_id } => {
                    if let Some(req) = pending.remove(&correlation_id) {
                        debug!(%correlation_id, event = %req.event, "Request cancelled");
                        metrics.requests_cancelled += 1;
                        req.timed_out();
                    }
                }

                BridgeRequest::RequestTimeout { correlation_id } => {
                    if let Some(req) = pending.remove(&correlation_id) {
                        warn!(%correlation_id, event = %req.event, client_id = %req.client_id, "Request timed out");
                        metrics.request_timeouts += 1;
                        req.timed_out();
                    }
                }

                BridgeRequest::Broadcast {
                    event,
                    data,
                    target_client_id,
                } => {
                    let recipients = match target_client_id.as_deref() {
                        Some(client_id) => registry.find_by_client_id(client_id).into_iter().collect(),
                        None => registry.connections(),
                    };
                    if recipients.is_empty() {
                        debug!(%event, ?target_client_id, "Broadcast has no recipients");
                    }

                    let frame = ClientEvent::Event { event, data };
                    let mut closed = Vec::new();
                    for conn in recipients {
                        match conn.sender().try_send(frame.clone()) {
                            Ok(()) => metrics.broadcasts_sent += 1,
                            Err(TrySendError::Full(_)) => {
                                warn!(client_id = %conn.client_id(), event = %frame.event_name(), "Client queue full, event dropped");
                            }
                            Err(TrySendError::Closed(_)) => closed.push(conn.client_id().to_string()),
                        }
                    }
                    for client_id in closed {
                        info!(%client_id, "Client channel closed, dropping client");
                        registry.unregister(&client_id);
                        fail_client_requests(&mut pending, &client_id);
                    }
                }

                BridgeRequest::ListClients { reply_tx } => {
                    let _ = reply_tx.send(registry.client_ids());
                }

                BridgeRequest::GetMetrics { reply_tx } => {
                    metrics.registered_clients = registry.len();
                    metrics.pending_requests = pending.len();
                    let _ = reply_tx.send(metrics.clone());
                }

                BridgeRequest::Shutdown => {
                    info!("Bridge shutting down");
                    break;
                }
            }
        }

        for (_, req) in pending.drain() {
            req.fail(BridgeError::ChannelError);
        }
        info!(
            requests_sent = metrics.requests_sent,
            request_timeouts = metrics.request_timeouts,
            "Bridge stopped"
        );
    }
}

/// Fail every pending request that was sent to `client_id`
fn fail_client_requests(pending: &mut HashMap<String, PendingRequest>, client_id: &str) {
    let orphaned: Vec<String> = pending
        .iter()
        .filter(|(_, req)| req.client_id == client_id)
        .map(|(id, _)| id.clone())
        .collect();

    for correlation_id in orphaned {
        if let Some(req) = pending.remove(&correlation_id) {
            debug!(%correlation_id, %client_id, "Failing request for departed client");
            req.fail(BridgeError::ClientDisconnected(client_id.to_string()));
        }
    }
}

/// Fail every pending request that went out on the connection fed by `tx`
fn fail_connection_requests(
    pending: &mut HashMap<String, PendingRequest>,
    client_id: &str,
    tx: &mpsc::Sender<ClientEvent>,
) {
    let orphaned: Vec<String> = pending
        .iter()
        .filter(|(_, req)| req.connection.same_channel(tx))
        .map(|(id, _)| id.clone())
        .collect();

    for correlation_id in orphaned {
        if let Some(req) = pending.remove(&correlation_id) {
            debug!(%correlation_id, %client_id, "Failing request for closed connection");
            req.fail(BridgeError::ClientDisconnected(client_id.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> BridgeConfig {
        BridgeConfig {
            request_timeout_ms: 1_000,
            ..BridgeConfig::default()
        }
    }

    async fn next_request(rx: &mut mpsc::Receiver<ClientEvent>) -> (String, String, Value) {
        match rx.recv().await.expect("client channel closed") {
            ClientEvent::Request {
                event,
                data,
                correlation_id,
            } => (correlation_id, event, data),
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let (bridge, _task) = Bridge::spawn(test_config());
        let (tx, mut rx) = mpsc::channel(8);
        bridge.register("ui", tx).await.unwrap();

        let responder = bridge.clone();
        tokio::spawn(async move {
            let (correlation_id, event, data) = next_request(&mut rx).await;
            assert_eq!(event, "getSelectedMediaMetadata");
            assert_eq!(data, json!({}));
            responder
                .respond(&correlation_id, json!({"mediaFolderPath": "/media/Show"}))
                .await
                .unwrap();
        });

        let result = bridge
            .request("getSelectedMediaMetadata", json!({}), None)
            .await
            .unwrap();
        assert_eq!(result["mediaFolderPath"], "/media/Show");

        let metrics = bridge.metrics().await.unwrap();
        assert_eq!(metrics.requests_sent, 1);
        assert_eq!(metrics.responses_matched, 1);
        assert_eq!(metrics.pending_requests, 0);
    }

    #[tokio::test]
    async fn test_no_client_fails_immediately() {
        let (bridge, _task) = Bridge::spawn(test_config());
        let err = bridge.request("anything", Value::Null, None).await.unwrap_err();
        assert_eq!(err, BridgeError::NoClientAvailable { target: None });

        let (tx, _rx) = mpsc::channel(8);
        bridge.register("ui", tx).await.unwrap();
        let err = bridge.request("anything", Value::Null, Some("other")).await.unwrap_err();
        assert_eq!(
            err,
            BridgeError::NoClientAvailable {
                target: Some("other".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_unregister_fails_in_flight_requests() {
        let (bridge, _task) = Bridge::spawn(test_config());
        let (tx, mut rx) = mpsc::channel(8);
        bridge.register("ui", tx).await.unwrap();

        let pending = bridge
            .send_request("askForConfirmation", json!({"message": "ok?"}), None, None)
            .await
            .unwrap();
        next_request(&mut rx).await;
        bridge.unregister("ui").await.unwrap();

        assert_eq!(
            pending.wait().await.unwrap_err(),
            BridgeError::ClientDisconnected("ui".to_string())
        );
    }

    #[tokio::test]
    async fn test_superseded_connection_fails_its_requests() {
        let (bridge, _task) = Bridge::spawn(BridgeConfig {
            request_timeout_ms: 30_000,
            ..BridgeConfig::default()
        });
        let (old_tx, mut old_rx) = mpsc::channel(8);
        bridge.register("ui", old_tx.clone()).await.unwrap();

        let pending = bridge.send_request("x", Value::Null, None, None).await.unwrap();
        next_request(&mut old_rx).await;

        // Same id reconnects, then the old connection goes away
        let (new_tx, mut new_rx) = mpsc::channel(8);
        bridge.register("ui", new_tx).await.unwrap();
        drop(old_rx);
        bridge.disconnected("ui", old_tx).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), pending.wait())
            .await
            .expect("request should fail before its deadline");
        assert_eq!(result.unwrap_err(), BridgeError::ClientDisconnected("ui".to_string()));

        // The new connection stays registered and usable
        assert_eq!(bridge.clients().await.unwrap(), vec!["ui"]);
        let pending = bridge.send_request("y", Value::Null, None, None).await.unwrap();
        let (correlation_id, event, _) = next_request(&mut new_rx).await;
        assert_eq!(event, "y");
        bridge.respond(&correlation_id, json!(true)).await.unwrap();
        assert_eq!(pending.wait().await.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn test_cancel_fails_like_timeout() {
        let (bridge, _task) = Bridge::spawn(test_config());
        let (tx, mut rx) = mpsc::channel(8);
        bridge.register("ui", tx).await.unwrap();

        let pending = bridge.send_request("slow", Value::Null, None, None).await.unwrap();
        let (correlation_id, _, _) = next_request(&mut rx).await;
        assert_eq!(pending.correlation_id(), correlation_id);
        bridge.cancel(&correlation_id).await.unwrap();

        assert!(matches!(
            pending.wait().await,
            Err(BridgeError::RequestTimeout { ref event, .. }) if event == "slow"
        ));
        assert_eq!(bridge.metrics().await.unwrap().requests_cancelled, 1);
    }

    #[tokio::test]
    async fn test_closed_client_channel_is_dropped() {
        let (bridge, _task) = Bridge::spawn(test_config());
        let (tx, rx) = mpsc::channel(8);
        bridge.register("gone", tx).await.unwrap();
        drop(rx);

        let err = bridge.request("x", Value::Null, None).await.unwrap_err();
        assert_eq!(err, BridgeError::ClientDisconnected("gone".to_string()));
        assert!(bridge.clients().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_client_queue_is_busy() {
        let (bridge, _task) = Bridge::spawn(test_config());
        let (tx, _rx) = mpsc::channel(1);
        bridge.register("ui", tx).await.unwrap();

        bridge.broadcast("fill", Value::Null, None).await.unwrap();
        let err = bridge.request("x", Value::Null, None).await.unwrap_err();
        assert_eq!(err, BridgeError::ClientBusy("ui".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_or_target() {
        let (bridge, _task) = Bridge::spawn(test_config());
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        bridge.register("a", tx_a).await.unwrap();
        bridge.register("b", tx_b).await.unwrap();

        bridge.broadcast("hello", json!(1), None).await.unwrap();
        bridge.broadcast("only-b", json!(2), Some("b")).await.unwrap();
        bridge.broadcast("nobody", json!(3), Some("zzz")).await.unwrap();

        assert_eq!(
            rx_a.recv().await.unwrap(),
            ClientEvent::Event {
                event: "hello".to_string(),
                data: json!(1)
            }
        );
        assert_eq!(rx_b.recv().await.unwrap().event_name(), "hello");
        assert_eq!(rx_b.recv().await.unwrap().event_name(), "only-b");

        assert_eq!(bridge.metrics().await.unwrap().broadcasts_sent, 3);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_fails_pending() {
        let (bridge, task) = Bridge::spawn(test_config());
        let (tx, _rx) = mpsc::channel(8);
        bridge.register("ui", tx).await.unwrap();

        let pending = bridge.send_request("x", Value::Null, None, None).await.unwrap();
        bridge.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(pending.wait().await.unwrap_err(), BridgeError::ChannelError);
        assert_eq!(bridge.metrics().await.unwrap_err(), BridgeError::ChannelError);
    }
}
