//! Bridge configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Default request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms", rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Channel buffer size for bridge requests
    #[serde(default = "default_channel_buffer", rename = "channel-buffer")]
    pub channel_buffer: usize,

    /// Per-client buffer of frames waiting to be written
    #[serde(default = "default_client_channel_buffer", rename = "client-channel-buffer")]
    pub client_channel_buffer: usize,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_channel_buffer() -> usize {
    1000
}

fn default_client_channel_buffer() -> usize {
    100
}

impl Default for BridgeConfig {
    fn default() -> Self {
        debug!("BridgeConfig::default: called");
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            channel_buffer: default_channel_buffer(),
            client_channel_buffer: default_client_channel_buffer(),
        }
    }
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
