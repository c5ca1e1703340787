pub mod client;
pub mod server;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::widgets::notifications::view::PopupState;

pub const SOCKET_FILE_NAME: &str = "hlybar.sock";

pub fn get_socket_path() -> String {
    format!(
        "{}/{}",
        crate::utils::filesystem::get_xdg_runtime_directory(),
        SOCKET_FILE_NAME
    )
}

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum IpcRequest {
    Dismiss { id: u32 },
    Invoke { id: u32, action: String },
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpcResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popups: Option<serde_json::Value>,
}

impl IpcResponse {
    pub fn ok() -> Self {
        IpcResponse { ok: true, message: None, popups: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        IpcResponse { ok: false, message: Some(message.into()), popups: None }
    }

    pub fn popups(state: &PopupState) -> Self {
        match serde_json::to_value(state) {
            Ok(popups) => IpcResponse { ok: true, message: None, popups: Some(popups) },
            Err(err) => IpcResponse::error(err.to_string()),
        }
    }
}
