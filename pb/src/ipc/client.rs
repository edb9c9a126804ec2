//! IPC client for communicating with the daemon
//!
//! [`DaemonClient`] sends one control message per connection. [`AttachedClient`]
//! keeps a connection open as a front-end and answers the daemon's requests.

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use serde_json::Value;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use super::get_socket_path;
use super::listener::{read_line, write_frame};
use super::messages::{DaemonMessage, DaemonResponse, PlanSummary};
use crate::bridge::{BridgeConfig, BridgeMetrics, ClientEvent};
use crate::events::WELCOME;
use planstore::{Entry, PlanKind, PlanStatus};

/// Default timeout for IPC operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);


/// Default maximum line size
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

fn daemon_error(response: DaemonResponse) -> eyre::Report {
    match response {
        DaemonResponse::Error { message } => eyre::eyre!("Daemon error: {}", message),
        other => eyre::eyre!("Unexpected response: {:?}", other),
    }
}

/// Client for communicating with the daemon via IPC
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
    /// The daemon's bridge request timeout, used when a retrieve names none
    request_timeout: Duration,
    max_message_size: usize,
}

/// Milliseconds for the wire, saturating instead of wrapping
fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(get_socket_path())
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
            request_timeout: BridgeConfig::default().request_timeout(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Match the daemon's `bridge.request-timeout-ms`
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Check if the daemon socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Check if daemon is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("DaemonClient: pinging daemon");
        match self.send_message(DaemonMessage::Ping).await? {
            DaemonResponse::Pong { version } => Ok(version),
            other => Err(daemon_error(other)),
        }
    }

    /// Request daemon to shutdown gracefully
    pub async fn shutdown(&self) -> Result<()> {
        debug!("DaemonClient: requesting daemon shutdown");
        match self.send_message(DaemonMessage::Shutdown).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(daemon_error(other)),
        }
    }

    pub async fn status(&self) -> Result<(Vec<String>, BridgeMetrics)> {
        match self.send_message(DaemonMessage::Status).await? {
            DaemonResponse::Status { clients, metrics } => Ok((clients, metrics)),
            other => Err(daemon_error(other)),
        }
    }

    /// Start a task; returns its id
    pub async fn begin_task(&self, media_folder_path: &str, kind: PlanKind) -> Result<String> {
        let msg = DaemonMessage::BeginTask {
            media_folder_path: media_folder_path.to_string(),
            kind,
        };
        match self.send_message(msg).await? {
            DaemonResponse::TaskStarted { task_id } => Ok(task_id),
            other => Err(daemon_error(other)),
        }
    }

    pub async fn add_entry(&self, task_id: &str, entry: Entry) -> Result<()> {
        let msg = DaemonMessage::AddEntry {
            task_id: task_id.to_string(),
            entry,
        };
        match self.send_message(msg).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(daemon_error(other)),
        }
    }

    /// Finish a task; returns the plan file path
    pub async fn end_task(&self, task_id: &str) -> Result<String> {
        let msg = DaemonMessage::EndTask {
            task_id: task_id.to_string(),
        };
        match self.send_message(msg).await? {
            DaemonResponse::PlanReady { plan_file_path, .. } => Ok(plan_file_path),
            other => Err(daemon_error(other)),
        }
    }

    pub async fn update_plan_status(&self, plan_id: &str, status: PlanStatus) -> Result<PlanSummary> {
        let msg = DaemonMessage::UpdatePlanStatus {
            plan_id: plan_id.to_string(),
            status,
        };
        match self.send_message(msg).await? {
            DaemonResponse::Plan(summary) => Ok(summary),
            other => Err(daemon_error(other)),
        }
    }

    pub async fn get_plan(&self, task_id: &str) -> Result<PlanSummary> {
        let msg = DaemonMessage::GetPlan {
            task_id: task_id.to_string(),
        };
        match self.send_message(msg).await? {
            DaemonResponse::Plan(summary) => Ok(summary),
            other => Err(daemon_error(other)),
        }
    }

    pub async fn list_pending(&self) -> Result<Vec<PlanSummary>> {
        match self.send_message(DaemonMessage::ListPending).await? {
            DaemonResponse::Plans { plans } => Ok(plans),
            other => Err(daemon_error(other)),
        }
    }

    /// Ask a front-end for data and wait for its answer
    pub async fn retrieve(
        &self,
        event: &str,
        data: Value,
        client_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let wait = self.retrieve_wait(timeout);
        let msg = DaemonMessage::Retrieve {
            event: event.to_string(),
            data,
            client_id: client_id.map(str::to_string),
            timeout_ms: timeout.map(duration_ms),
        };
        match self.send_message_with_timeout(msg, wait).await? {
            DaemonResponse::Data { data } => Ok(data),
            other => Err(daemon_error(other)),
        }
    }

    pub async fn broadcast_message(&self, event: &str, data: Value, client_id: Option<&str>) -> Result<()> {
        let msg = DaemonMessage::BroadcastMessage {
            event: event.to_string(),
            data,
            client_id: client_id.map(str::to_string),
        };
        match self.send_message(msg).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(daemon_error(other)),
        }
    }

    /// How long to wait for a retrieve: the daemon's deadline plus the IPC timeout
    fn retrieve_wait(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or(self.request_timeout).saturating_add(self.timeout)
    }

    /// Attach to the daemon as a front-end
    pub async fn attach(&self, client_id: &str) -> Result<AttachedClient> {
        debug!(%client_id, "DaemonClient: attaching");
        let stream = self.connect().await?;
        let (read_half, write_half) = stream.into_split();
        let mut attached = AttachedClient {
            client_id: client_id.to_string(),
            reader: BufReader::new(read_half),
            writer: write_half,
            max_message_size: self.max_message_size,
        };

        let hello = DaemonMessage::Hello {
            client_id: client_id.to_string(),
        };
        tokio::time::timeout(self.timeout, write_frame(&mut attached.writer, &hello))
            .await
            .context("Write timeout")??;

        let welcome = tokio::time::timeout(self.timeout, attached.next_frame())
            .await
            .context("Timed out waiting for welcome")??;
        match welcome {
            Some(ClientEvent::Event { event, .. }) if event == WELCOME => Ok(attached),
            other => Err(eyre::eyre!("Expected welcome, got {:?}", other)),
        }
    }

    async fn connect(&self) -> Result<UnixStream> {
        tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to daemon socket")
    }

    /// Send a message to the daemon and wait for response
    pub async fn send_message(&self, msg: DaemonMessage) -> Result<DaemonResponse> {
        self.send_message_with_timeout(msg, self.timeout).await
    }

    async fn send_message_with_timeout(&self, msg: DaemonMessage, wait: Duration) -> Result<DaemonResponse> {
        debug!(?self.socket_path, ?msg, "DaemonClient: sending message");
        let stream = self.connect().await?;
        let (read_half, mut write_half) = stream.into_split();

        tokio::time::timeout(self.timeout, write_frame(&mut write_half, &msg))
            .await
            .context("Write timeout")??;

        let mut reader = BufReader::new(read_half);
        let line = tokio::time::timeout(wait, read_line(&mut reader, self.max_message_size))
            .await
            .context("Read timeout")??
            .ok_or_else(|| eyre::eyre!("Daemon closed the connection without responding"))?;

        let response: DaemonResponse =
            serde_json::from_str(line.trim()).context("Failed to parse daemon response")?;
        debug!(?response, "DaemonClient: received response");
        Ok(response)
    }
}

/// A connection attached to the daemon as a front-end
#[derive(Debug)]
pub struct AttachedClient {
    client_id: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    max_message_size: usize,
}

impl AttachedClient {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Next request or event from the daemon, or `None` once it hangs up
    pub async fn next_frame(&mut self) -> Result<Option<ClientEvent>> {
        let Some(line) = read_line(&mut self.reader, self.max_message_size).await? else {
            return Ok(None);
        };
        let frame = serde_json::from_str(line.trim()).context("Failed to parse frame")?;
        Ok(Some(frame))
    }

    /// Answer a request
    pub async fn respond(&mut self, correlation_id: &str, data: Value) -> Result<()> {
        debug!(client_id = %self.client_id, %correlation_id, "AttachedClient: responding");
        let msg = DaemonMessage::Response {
            correlation_id: correlation_id.to_string(),
            data,
        };
        write_frame(&mut self.writer, &msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::listener::{create_listener_at, read_message};
    use tempfile::TempDir;

    #[test]
    fn test_client_default() {
        let client = DaemonClient::default();
        assert!(client.socket_path().ends_with("planbridge.sock"));
    }

    #[test]
    fn test_client_builders() {
        let path = PathBuf::from("/custom/path/planbridge.sock");
        let client = DaemonClient::with_socket_path(path.clone())
            .with_timeout(Duration::from_secs(1))
            .with_max_message_size(10);
        assert_eq!(client.socket_path(), &path);
        assert_eq!(client.timeout, Duration::from_secs(1));
        assert_eq!(client.max_message_size, 10);
    }

    #[test]
    fn test_retrieve_wait_follows_daemon_timeout() {
        let client = DaemonClient::with_socket_path(PathBuf::from("/tmp/x.sock"))
            .with_timeout(Duration::from_secs(5))
            .with_request_timeout(Duration::from_secs(120));
        assert_eq!(client.retrieve_wait(None), Duration::from_secs(125));
        assert_eq!(client.retrieve_wait(Some(Duration::from_secs(2))), Duration::from_secs(7));
        assert_eq!(client.retrieve_wait(Some(Duration::MAX)), Duration::MAX);

        let default = DaemonClient::with_socket_path(PathBuf::from("/tmp/x.sock"));
        assert_eq!(default.retrieve_wait(None), Duration::from_secs(35));
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_ping_without_daemon_fails() {
        let temp = TempDir::new().unwrap();
        let client = DaemonClient::with_socket_path(temp.path().join("missing.sock"));
        assert!(!client.socket_exists());
        assert!(client.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_end_to_end_ping_pong() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("test.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        let mock_daemon = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let msg = read_message(&mut reader, 1024).await.unwrap();
            assert_eq!(msg, Some(DaemonMessage::Ping));
            let response = DaemonResponse::Pong {
                version: "test-version".to_string(),
            };
            write_frame(&mut write_half, &response).await.unwrap();
        });

        let client = DaemonClient::with_socket_path(socket_path);
        assert_eq!(client.ping().await.unwrap(), "test-version");
        mock_daemon.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_response_becomes_error() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("test.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            read_message(&mut reader, 1024).await.unwrap();
            write_frame(&mut write_half, &DaemonResponse::error("Task not found: t"))
                .await
                .unwrap();
        });

        let client = DaemonClient::with_socket_path(socket_path);
        let err = client.end_task("t").await.unwrap_err();
        assert!(err.to_string().contains("Task not found: t"));
    }
}
