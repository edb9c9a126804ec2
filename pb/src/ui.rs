//! Typed front-end calls on top of the bridge

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use planstore::path::to_posix;

use crate::bridge::{BridgeError, BridgeHandle, BridgeResult};
use crate::events::{ASK_FOR_CONFIRMATION, ConfirmationReply, ConfirmationRequest, GET_SELECTED_MEDIA_METADATA};

/// The media folder currently selected in a front-end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedMediaMetadata {
    pub media_folder_path: String,

    /// Whatever else the front-end reports about the selection
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Requests the application makes of a connected UI
#[derive(Debug, Clone)]
pub struct UiClient {
    bridge: BridgeHandle,
}

impl UiClient {
    pub fn new(bridge: BridgeHandle) -> Self {
        Self { bridge }
    }

    /// The folder selected in the UI, or `None` if nothing is selected
    ///
    /// The returned path is in POSIX form.
    pub async fn selected_media_metadata(&self, client_id: Option<&str>) -> BridgeResult<Option<SelectedMediaMetadata>> {
        debug!(?client_id, "selected_media_metadata: called");
        let data = self
            .bridge
            .request(GET_SELECTED_MEDIA_METADATA, Value::Object(Map::new()), client_id)
            .await?;
        if data.is_null() {
            return Ok(None);
        }

        let mut selected: SelectedMediaMetadata = decode(GET_SELECTED_MEDIA_METADATA, data)?;
        selected.media_folder_path = to_posix(&selected.media_folder_path);
        Ok(Some(selected))
    }

    /// Ask the user a yes/no question; anything but an explicit yes is a no
    pub async fn ask_for_confirmation(&self, message: &str, client_id: Option<&str>) -> BridgeResult<bool> {
        debug!(%message, ?client_id, "ask_for_confirmation: called");
        let request = ConfirmationRequest {
            message: message.to_string(),
        };
        let data = serde_json::to_value(request).map_err(|e| invalid(ASK_FOR_CONFIRMATION, e))?;
        let reply = self.bridge.request(ASK_FOR_CONFIRMATION, data, client_id).await?;
        if reply.is_null() {
            return Ok(false);
        }
        let reply: ConfirmationReply = decode(ASK_FOR_CONFIRMATION, reply)?;
        Ok(reply.confirmed)
    }

    /// Send an arbitrary request and return the raw answer
    pub async fn retrieve(
        &self,
        event: &str,
        data: Value,
        client_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> BridgeResult<Value> {
        match timeout {
            Some(timeout) => self.bridge.request_with_timeout(event, data, client_id, timeout).await,
            None => self.bridge.request(event, data, client_id).await,
        }
    }

    /// Push an arbitrary event to one client or all of them
    pub async fn broadcast_message(&self, event: &str, data: Value, client_id: Option<&str>) -> BridgeResult<()> {
        self.bridge.broadcast(event, data, client_id).await
    }
}

fn invalid(event: &str, e: serde_json::Error) -> BridgeError {
    BridgeError::InvalidResponse {
        event: event.to_string(),
        message: e.to_string(),
    }
}

fn decode<T: DeserializeOwned>(event: &str, data: Value) -> BridgeResult<T> {
    serde_json::from_value(data).map_err(|e| invalid(event, e))
}
