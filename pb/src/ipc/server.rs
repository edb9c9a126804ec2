//! IPC server: accepts front-end attachments and control messages

use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use serde_json::json;
use tokio::io::BufReader;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use planstore::path::to_posix;

use super::listener::{read_line, read_message, write_frame};
use super::messages::{DaemonMessage, DaemonResponse, PlanSummary};
use crate::bridge::{BridgeHandle, BridgeMetrics, BridgeResult, ClientEvent};
use crate::events::WELCOME;
use crate::state::PlanManager;

/// Serves the daemon socket
///
/// Each accepted connection runs on its own task. The server only translates
/// between the wire and the bridge/plan handles; it keeps no state of its own.
pub struct IpcServer {
    bridge: BridgeHandle,
    plans: PlanManager,
    max_message_size: usize,
    client_channel_buffer: usize,
    shutdown_tx: watch::Sender<bool>,
}

impl IpcServer {
    pub fn new(
        bridge: BridgeHandle,
        plans: PlanManager,
        max_message_size: usize,
        client_channel_buffer: usize,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            bridge,
            plans,
            max_message_size,
            client_channel_buffer,
            shutdown_tx,
        }
    }

    /// Receiver that flips to `true` when a client asks the daemon to stop
    pub fn shutdown_requested(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Stop accepting connections
    pub fn request_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Accept connections until shutdown is requested
    pub async fn run(self: Arc<Self>, listener: UnixListener) {
        let mut shutdown_rx = self.shutdown_requested();
        info!("IPC server accepting connections");

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let server = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream).await {
                                debug!(error = %e, "IPC connection ended with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "Failed to accept IPC connection"),
                },
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("IPC server stopped");
    }

    async fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let msg = match read_message(&mut reader, self.max_message_size).await {
            Ok(Some(msg)) => msg,
            Ok(None) => return Ok(()),
            Err(e) => {
                write_frame(&mut write_half, &DaemonResponse::error(format!("{:#}", e))).await?;
                return Err(e);
            }
        };

        match msg {
            DaemonMessage::Hello { client_id } => self.attach(client_id, reader, write_half).await,
            other => {
                let response = self.dispatch(other).await;
                write_frame(&mut write_half, &response).await
            }
        }
    }

    /// Serve an attached front-end until it disconnects
    async fn attach(&self, client_id: String, mut reader: BufReader<OwnedReadHalf>, writer: OwnedWriteHalf) -> Result<()> {
        let (tx, rx) = mpsc::channel(self.client_channel_buffer);

        // Queued before registering so it precedes anything the bridge sends,
        // and written only once registration is enqueued
        let welcome = ClientEvent::Event {
            event: WELCOME.to_string(),
            data: json!({ "clientId": client_id }),
        };
        let _ = tx.send(welcome).await;
        self.bridge.register(&client_id, tx.clone()).await?;
        info!(%client_id, "Front-end attached");

        let writer_task = tokio::spawn(write_frames(writer, rx));

        loop {
            let line = match read_line(&mut reader, self.max_message_size).await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(%client_id, error = %e, "Dropping front-end connection");
                    break;
                }
            };

            match serde_json::from_str::<DaemonMessage>(line.trim()) {
                Ok(DaemonMessage::Response { correlation_id, data }) => {
                    self.bridge.respond(&correlation_id, data).await?;
                }
                Ok(DaemonMessage::Ping) => debug!(%client_id, "Ping on attached connection"),
                Ok(other) => warn!(%client_id, ?other, "Ignoring control message on attached connection"),
                Err(e) => warn!(%client_id, error = %e, "Ignoring unparseable frame"),
            }
        }

        info!(%client_id, "Front-end detached");
        self.bridge.disconnected(&client_id, tx).await?;
        writer_task.abort();
        Ok(())
    }

    async fn status(&self) -> BridgeResult<(Vec<String>, BridgeMetrics)> {
        Ok((self.bridge.clients().await?, self.bridge.metrics().await?))
    }

    /// Handle one control message
    pub async fn dispatch(&self, msg: DaemonMessage) -> DaemonResponse {
        debug!(?msg, "dispatch: called");
        match msg {
            DaemonMessage::Ping => DaemonResponse::Pong {
                version: env!("CARGO_PKG_VERSION").to_string(),
            },

            DaemonMessage::Shutdown => {
                info!("Shutdown requested over IPC");
                self.request_shutdown();
                DaemonResponse::Ok
            }

            DaemonMessage::Status => match self.status().await {
                Ok((clients, metrics)) => DaemonResponse::Status { clients, metrics },
                Err(e) => DaemonResponse::error(e),
            },

            DaemonMessage::BeginTask { media_folder_path, kind } => {
                match self.plans.begin(&media_folder_path, kind).await {
                    Ok(task_id) => DaemonResponse::TaskStarted { task_id },
                    Err(e) => DaemonResponse::error(e),
                }
            }

            DaemonMessage::AddEntry { task_id, entry } => match self.plans.add(&task_id, entry).await {
                Ok(()) => DaemonResponse::Ok,
                Err(e) => DaemonResponse::error(e),
            },

            DaemonMessage::EndTask { task_id } => match self.plans.end(&task_id).await {
                Ok(path) => DaemonResponse::PlanReady {
                    task_id,
                    plan_file_path: to_posix(&path.to_string_lossy()),
                },
                Err(e) => DaemonResponse::error(e),
            },

            DaemonMessage::UpdatePlanStatus { plan_id, status } => {
                match self.plans.update_status(&plan_id, status).await {
                    Ok(stored) => DaemonResponse::Plan(stored.into()),
                    Err(e) => DaemonResponse::error(e),
                }
            }

            DaemonMessage::GetPlan { task_id } => match self.plans.get_plan(&task_id).await {
                Ok(Some(plan)) => DaemonResponse::Plan(PlanSummary { task_id, plan }),
                Ok(None) => DaemonResponse::error(format!("Task not found: {}", task_id)),
                Err(e) => DaemonResponse::error(e),
            },

            DaemonMessage::ListPending => match self.plans.list_pending().await {
                Ok(plans) => DaemonResponse::Plans {
                    plans: plans.into_iter().map(PlanSummary::from).collect(),
                },
                Err(e) => DaemonResponse::error(e),
            },

            DaemonMessage::Retrieve {
                event,
                data,
                client_id,
                timeout_ms,
            } => {
                let target = client_id.as_deref();
                let reply = match timeout_ms {
                    Some(ms) => {
                        self.bridge
                            .request_with_timeout(&event, data, target, Duration::from_millis(ms))
                            .await
                    }
                    None => self.bridge.request(&event, data, target).await,
                };
                match reply {
                    Ok(data) => DaemonResponse::Data { data },
                    Err(e) => DaemonResponse::error(e),
                }
            }

            DaemonMessage::BroadcastMessage { event, data, client_id } => {
                match self.bridge.broadcast(&event, data, client_id.as_deref()).await {
                    Ok(()) => DaemonResponse::Ok,
                    Err(e) => DaemonResponse::error(e),
                }
            }

            DaemonMessage::Hello { .. } | DaemonMessage::Response { .. } => {
                DaemonResponse::error("Hello and Response are only valid on an attached connection")
            }
        }
    }
}

/// Drain a front-end's queue onto its socket
async fn write_frames(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<ClientEvent>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            debug!(error = %e, "write_frames: connection closed");
            break;
        }
    }
}
