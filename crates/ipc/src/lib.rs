//! winlayout IPC Protocol
//!
//! Shared types for daemon-CLI communication over Windows named pipes.
//! Each request and each response is one JSON object on its own line.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Named pipe path for IPC communication.
pub const PIPE_NAME: &str = r"\\.\pipe\winlayout";

/// Upper bound on one request or response line, newline included.
pub const MAX_IPC_MESSAGE_SIZE: usize = 1024 * 1024;

/// Clients must send their request within this period.
pub const IPC_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands that can be sent from the CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcCommand {
    /// Capture the current windows under a name.
    SaveLayout { name: String },
    /// Start restoring a saved layout.
    RestoreLayout {
        name: String,
        /// Overrides `restore.launch_missing` from the config when set.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        launch_missing: Option<bool>,
    },
    /// List saved layouts.
    ListLayouts,
    /// Delete a saved layout.
    DeleteLayout { name: String },
    /// List the prior versions of a layout.
    LayoutHistory { name: String },
    /// Make a prior version of a layout current again.
    RestoreVersion { name: String, index: usize },
    /// Query daemon and restore status.
    QueryStatus,
    /// Reload configuration from file.
    Reload,
    /// Stop the daemon.
    Stop,
}

/// A saved window that a restore could not find.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedWindow {
    pub process: String,
    pub class: String,
    pub title: String,
}

/// Outcome of a finished restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub layout: String,
    pub placed: usize,
    pub total: usize,
    /// Retry rounds after the initial pass.
    pub attempts: u32,
    #[serde(default)]
    pub unresolved: Vec<UnresolvedWindow>,
    #[serde(default)]
    pub placement_failures: usize,
    #[serde(default)]
    pub launched: usize,
}

impl RestoreSummary {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty() && self.placement_failures == 0
    }
}

/// One saved layout as listed by `list_layouts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSummary {
    pub name: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub windows: usize,
    pub history: usize,
    pub monitor_fingerprint: String,
}

/// One prior version of a layout; index 0 is the newest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub index: usize,
    pub timestamp: u64,
    pub windows: usize,
}

/// Responses from the daemon to the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully.
    Ok,
    /// Command failed with an error.
    Error {
        /// Error message describing what went wrong.
        message: String,
    },
    /// A layout was captured.
    Saved {
        name: String,
        windows: usize,
        /// True when an existing layout was overwritten.
        replaced: bool,
    },
    /// A restore is running and will finish in the background.
    RestoreStarted {
        name: String,
        placed: usize,
        total: usize,
    },
    /// A restore completed within the request.
    RestoreFinished { report: RestoreSummary },
    LayoutList { layouts: Vec<LayoutSummary> },
    History {
        name: String,
        versions: Vec<VersionSummary>,
    },
    Status {
        /// Layout currently being restored.
        active_restore: Option<String>,
        /// Last layout restored without `no_profile_update`.
        last_restored: Option<String>,
        last_report: Option<RestoreSummary>,
        layouts: usize,
        monitor_fingerprint: String,
        uptime_secs: u64,
    },
}

impl IpcResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Errors framing or parsing a protocol line.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("Empty message")]
    Empty,

    #[error("Message of {0} bytes exceeds the {MAX_IPC_MESSAGE_SIZE} byte limit")]
    TooLarge(usize),

    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a message as one newline-terminated JSON line.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, IpcError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    if line.len() > MAX_IPC_MESSAGE_SIZE {
        return Err(IpcError::TooLarge(line.len()));
    }
    Ok(line)
}

/// Parse one JSON line, ignoring surrounding whitespace.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, IpcError> {
    if line.len() > MAX_IPC_MESSAGE_SIZE {
        return Err(IpcError::TooLarge(line.len()));
    }
    let line = line.trim();
    if line.is_empty() {
        return Err(IpcError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}
