//! Bridge - correlated requests and broadcasts to connected front-ends
//!
//! The Bridge runs as a single task that owns the client registry and the
//! table of requests awaiting a response. Callers talk to it through a
//! cloneable [`BridgeHandle`]:
//!
//! - **request**: send an event to one client and await its correlated response
//! - **broadcast**: push an event to one client or all of them
//! - **register / unregister**: track which front-ends are connected
//!
//! Requests fail fast with [`BridgeError::NoClientAvailable`] when nobody is
//! connected, and every request ends in exactly one of: response, timeout,
//! cancellation or client disconnect.

mod config;
mod core;
mod handle;
mod messages;
mod registry;

pub use config::BridgeConfig;
pub use self::core::Bridge;
pub use handle::{BridgeHandle, PendingReply};
pub use messages::{BridgeError, BridgeMetrics, BridgeResult, ClientEvent};
pub use registry::{ClientConnection, ClientRegistry};
