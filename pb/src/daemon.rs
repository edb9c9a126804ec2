//! Daemon assembly and lifecycle
//!
//! Wires the bridge, plan manager and IPC server together and runs them until
//! a signal or an IPC `Shutdown` arrives.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::{Bridge, BridgeHandle};
use crate::config::Config;
use crate::ipc::{DaemonClient, IpcServer, cleanup_socket, create_listener_at};
use crate::state::PlanManager;
use crate::ui::UiClient;

/// A running daemon
pub struct Daemon {
    bridge: BridgeHandle,
    plans: PlanManager,
    server: Arc<IpcServer>,
    socket_path: PathBuf,
    bridge_task: JoinHandle<()>,
    server_task: JoinHandle<()>,
}

impl Daemon {
    /// Start all components and begin accepting connections
    pub async fn start(config: &Config) -> Result<Self> {
        config.validate()?;
        let socket_path = config.ipc.socket_path.clone();
        debug!(?socket_path, plans_dir = ?config.store.plans_dir, "Daemon::start: called");

        let probe = DaemonClient::with_socket_path(socket_path.clone());
        if probe.socket_exists() && probe.ping().await.is_ok() {
            return Err(eyre::eyre!("A daemon is already listening on {}", socket_path.display()));
        }

        let (listener, socket_path) = create_listener_at(&socket_path).context("Failed to create IPC listener")?;

        let (bridge, bridge_task) = Bridge::spawn(config.bridge.clone());
        let plans = PlanManager::spawn(&config.store.plans_dir, bridge.clone());
        let server = Arc::new(IpcServer::new(
            bridge.clone(),
            plans.clone(),
            config.ipc.max_message_size,
            config.bridge.client_channel_buffer,
        ));
        let server_task = tokio::spawn(Arc::clone(&server).run(listener));

        info!(socket = %socket_path.display(), plans_dir = %config.store.plans_dir.display(), "Daemon started");
        Ok(Self {
            bridge,
            plans,
            server,
            socket_path,
            bridge_task,
            server_task,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn bridge(&self) -> &BridgeHandle {
        &self.bridge
    }

    pub fn plans(&self) -> &PlanManager {
        &self.plans
    }

    pub fn ui(&self) -> UiClient {
        UiClient::new(self.bridge.clone())
    }

    /// Flips to `true` once a client sends `Shutdown`
    pub fn shutdown_requested(&self) -> watch::Receiver<bool> {
        self.server.shutdown_requested()
    }

    /// Stop accepting connections, stop the actors and remove the socket
    pub async fn stop(self) -> Result<()> {
        info!("Daemon shutting down...");
        self.server.request_shutdown();
        if let Err(e) = self.server_task.await {
            warn!(error = %e, "IPC server task failed");
        }

        if let Err(e) = self.plans.shutdown().await {
            debug!(error = %e, "PlanManager already stopped");
        }
        if let Err(e) = self.bridge.shutdown().await {
            debug!(error = %e, "Bridge already stopped");
        }
        if let Err(e) = self.bridge_task.await {
            warn!(error = %e, "Bridge task failed");
        }

        cleanup_socket(&self.socket_path);
        info!("Daemon stopped");
        Ok(())
    }
}

/// Run the daemon in the foreground until told to stop
pub async fn run_daemon(config: &Config) -> Result<()> {
    let daemon = Daemon::start(config).await?;
    let mut shutdown_rx = daemon.shutdown_requested();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received"),
        _ = sigterm.recv() => info!("SIGTERM received"),
        _ = shutdown_rx.wait_for(|stop| *stop) => info!("Shutdown requested"),
    }

    daemon.stop().await
}
