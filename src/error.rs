//! Error types for the device-grant hook.
//!
//! Two layers:
//! - [`DeviceError`]: the closed taxonomy used by device inspection and
//!   scanning. Scanner call sites match on it to decide between skipping an
//!   entry and aborting the walk.
//! - [`Error`]: everything the hook can fail with, surfaced to the CLI.

use std::io;
use std::path::{Path, PathBuf};

/// Result type alias for hook operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classified failure of a device lookup or directory walk.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The path does not exist.
    #[error("no such device node: {}", .0.display())]
    NotFound(PathBuf),

    /// The node exists but is not a block, character or FIFO device.
    #[error("not a device node: {}", .0.display())]
    NotADevice(PathBuf),

    /// The node or directory could not be read.
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// Any other I/O fault.
    #[error("I/O error at {}: {source}", .path.display())]
    Other {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeviceError {
    /// Classifies an I/O error raised while reading `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Other {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Returns the path the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(path) | Self::NotADevice(path) | Self::PermissionDenied(path) => path,
            Self::Other { path, .. } => path,
        }
    }

    /// Returns true for permission failures.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

/// Errors that can occur while running the hook.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Discovery Errors
    // =========================================================================
    /// Device discovery failed; the grant is aborted.
    #[error("device discovery failed: {0}")]
    Device(#[from] DeviceError),

    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Container state from the runtime could not be decoded.
    #[error("could not decode container state: {0}")]
    InvalidState(String),

    /// Bundle is unusable (missing config.json, empty path).
    #[error("invalid bundle at {}: {reason}", .path.display())]
    InvalidBundle { path: PathBuf, reason: String },

    /// config.json is malformed or has an unexpected shape.
    #[error("invalid OCI config: {0}")]
    InvalidConfig(String),

    /// config.json exceeds the size bound.
    #[error("OCI config too large: {size} > {limit} bytes")]
    ConfigTooLarge { size: u64, limit: u64 },

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// Writing the patched config back failed.
    #[error("failed to persist OCI config at {}: {reason}", .path.display())]
    PersistFailed { path: PathBuf, reason: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
