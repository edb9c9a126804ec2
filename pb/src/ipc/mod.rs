//! Inter-Process Communication with the daemon
//!
//! Unix Domain Socket carrying newline-delimited JSON. Front-ends attach and
//! stay connected to receive bridge requests and events; the CLI sends one
//! control message per connection.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;
pub mod server;

pub use client::{AttachedClient, DaemonClient};
pub use listener::{cleanup_socket, create_listener_at};
pub use messages::{DaemonMessage, DaemonResponse, PlanSummary};
pub use server::IpcServer;

/// Default socket path for daemon IPC
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("planbridge")
        .join("planbridge.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_ends_with_planbridge_sock() {
        let path = get_socket_path();
        assert!(path.ends_with("planbridge/planbridge.sock"));
    }
}
