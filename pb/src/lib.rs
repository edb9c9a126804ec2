//! planbridge - staged media file plans approved through a connected UI
//!
//! A daemon that sits between automation (which proposes batches of file
//! renames or episode recognitions) and one or more attached front-ends
//! (which show them to a person and report the decision).
//!
//! # Architecture
//!
//! ```text
//!   pb task/plan/retrieve            front-end (attached)
//!          |                           ^        |
//!          | one-shot                  | frames | responses
//!          v                           |        v
//!   +--------------------------- IpcServer ----------------------+
//!   |        |                                     |             |
//!   |        v                                     v             |
//!   |   PlanManager  --planReady/statusChanged-->  Bridge        |
//!   |        |                                  (registry,       |
//!   |        v                                   pending table)  |
//!   |   PlanStore (one JSON file per task)                       |
//!   +------------------------------------------------------------+
//! ```
//!
//! - [`bridge`]: client registry, correlated requests with timeouts, broadcasts
//! - [`state`]: the plan manager actor (begin/add/end, status changes)
//! - [`ipc`]: Unix socket protocol, server and client
//! - [`ui`]: typed requests to a front-end
//! - [`daemon`]: wiring and lifecycle

pub mod bridge;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod events;
pub mod ipc;
pub mod state;
pub mod ui;

pub use bridge::{Bridge, BridgeConfig, BridgeError, BridgeHandle, ClientEvent};
pub use config::Config;
pub use daemon::{Daemon, run_daemon};
pub use state::{PlanError, PlanManager};
pub use ui::{SelectedMediaMetadata, UiClient};
