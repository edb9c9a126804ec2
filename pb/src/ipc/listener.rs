//! IPC socket setup and line framing

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tracing::{debug, warn};

use super::messages::DaemonMessage;

/// Create a listener at `socket_path`, replacing a stale socket file
pub fn create_listener_at(socket_path: &Path) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener: creating IPC socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind IPC socket")?;
    debug!(?socket_path, "create_listener: socket bound successfully");

    Ok((listener, socket_path.to_path_buf()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Read one line, or `None` at end of stream
pub async fn read_line<R>(reader: &mut R, max_message_size: usize) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let bytes_read = reader
        .read_line(&mut line)
        .await
        .context("Failed to read IPC message")?;

    if bytes_read == 0 {
        return Ok(None);
    }
    if bytes_read > max_message_size {
        return Err(eyre::eyre!("Message too large: {} bytes", bytes_read));
    }
    Ok(Some(line))
}

/// Read and parse one message, or `None` at end of stream
pub async fn read_message<R>(reader: &mut R, max_message_size: usize) -> Result<Option<DaemonMessage>>
where
    R: AsyncBufRead + Unpin,
{
    let Some(line) = read_line(reader, max_message_size).await? else {
        return Ok(None);
    };
    let msg: DaemonMessage = serde_json::from_str(line.trim()).context("Failed to parse IPC message")?;
    debug!(?msg, "read_message: parsed message");
    Ok(Some(msg))
}

/// Write one JSON line and flush
pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut json = serde_json::to_string(frame).context("Failed to serialize frame")?;
    json.push('\n');
    writer
        .write_all(json.as_bytes())
        .await
        .context("Failed to write frame")?;
    writer.flush().await.context("Failed to flush frame")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::messages::DaemonResponse;
    use tempfile::TempDir;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_create_listener_creates_parent_dir() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("subdir").join("planbridge.sock");

        let (_, path) = create_listener_at(&socket_path).unwrap();
        assert_eq!(path, socket_path);
        assert!(socket_path.exists());
    }

    #[tokio::test]
    async fn test_create_listener_removes_stale_socket() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("planbridge.sock");
        std::fs::write(&socket_path, "stale").unwrap();

        assert!(create_listener_at(&socket_path).is_ok());
    }

    #[test]
    fn test_cleanup_socket() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("planbridge.sock");
        std::fs::write(&socket_path, "test").unwrap();

        cleanup_socket(&socket_path);
        assert!(!socket_path.exists());
        // Missing file is fine
        cleanup_socket(&socket_path);
    }

    #[tokio::test]
    async fn test_read_message_sequence() {
        let input = b"{\"type\":\"Ping\"}\n{\"type\":\"ListPending\"}\n";
        let mut reader = BufReader::new(&input[..]);

        assert_eq!(read_message(&mut reader, 1024).await.unwrap(), Some(DaemonMessage::Ping));
        assert_eq!(
            read_message(&mut reader, 1024).await.unwrap(),
            Some(DaemonMessage::ListPending)
        );
        assert_eq!(read_message(&mut reader, 1024).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_line_rejected() {
        let input = format!("{{\"type\":\"Retrieve\",\"event\":\"{}\"}}\n", "x".repeat(100));
        let mut reader = BufReader::new(input.as_bytes());
        assert!(read_message(&mut reader, 64).await.is_err());
    }

    #[tokio::test]
    async fn test_write_frame_appends_newline() {
        let mut out = Vec::new();
        write_frame(&mut out, &DaemonResponse::Ok).await.unwrap();
        assert_eq!(out, b"{\"type\":\"Ok\"}\n");
    }
}
