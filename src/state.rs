//! OCI container state as handed to hooks.
//!
//! The runtime writes the container's state document to the hook's stdin
//! before invoking it. The hook only needs `bundle`, but the full document
//! is decoded so malformed input is rejected early.
//!
//! Ref: https://github.com/opencontainers/runtime-spec/blob/main/runtime.md#state

use crate::constants::MAX_STATE_SIZE;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

/// OCI Runtime Spec container status.
///
/// Runtimes may report statuses of their own (runc's `paused`); anything
/// unrecognised decodes as [`ContainerStatus::Unknown`] since the hook never
/// acts on the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Container is being created.
    Creating,
    /// Container has been created but not started.
    Created,
    /// Container is running.
    Running,
    /// Container has stopped.
    Stopped,
    /// Container is paused (runc extension).
    Paused,
    /// Any runtime-defined status not listed above.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => write!(f, "creating"),
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Paused => write!(f, "paused"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// OCI Runtime Spec container state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerState {
    /// OCI version of the state schema.
    pub oci_version: String,
    /// Container ID.
    pub id: String,
    /// Container status.
    pub status: ContainerStatus,
    /// Process ID of the container (if created).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Absolute path to the bundle directory.
    pub bundle: PathBuf,
    /// Annotations from the container config.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl ContainerState {
    /// Decodes a state document from `reader`, reading at most
    /// [`MAX_STATE_SIZE`] bytes.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut buf = Vec::new();
        reader.take(MAX_STATE_SIZE + 1).read_to_end(&mut buf)?;
        if buf.len() as u64 > MAX_STATE_SIZE {
            return Err(Error::InvalidState(format!(
                "state exceeds {} bytes",
                MAX_STATE_SIZE
            )));
        }

        let state: Self =
            serde_json::from_slice(&buf).map_err(|e| Error::InvalidState(e.to_string()))?;

        if state.bundle.as_os_str().is_empty() {
            return Err(Error::InvalidState("bundle path is empty".to_string()));
        }
        Ok(state)
    }
}
