//! # Device Tree Scanner
//!
//! Walks a host device directory and collects every node a container should
//! be granted, with paths rewritten to where the container will see them.
//!
//! ## Walk Policy
//!
//! ```text
//! root is not a directory ──► single lookup, every error propagates
//! root is a directory ──► for each entry, in listing order:
//!   directory  ── excluded name? ──► skip
//!              └─ recurse; EACCES inside a user namespace ──► drop subtree
//!   "console"  ──► skip
//!   other      ── inspect:
//!                   not a device / vanished ──► skip
//!                   EACCES inside a user namespace ──► skip
//!                   FIFO ──► skip
//!                   block / char ──► collect
//! ```
//!
//! Any error not listed above aborts the whole walk: a partial grant is worse
//! than a container that fails to start.
//!
//! Each level of the recursion owns its result vector and hands it back to
//! its parent, which appends it to its own. Nothing is shared between
//! sibling subtrees.

use crate::constants::{CONSOLE_DEVICE_NAME, is_excluded_dir};
use crate::device::{DeviceInspector, DeviceKind, HostDeviceInspector, LinuxDevice};
use crate::error::DeviceError;
use crate::userns::{HostUserNamespace, UserNamespace};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Recursive device discovery over a host directory tree.
#[derive(Debug, Clone)]
pub struct DeviceScanner<I, U> {
    inspector: I,
    userns: U,
}

impl DeviceScanner<HostDeviceInspector, HostUserNamespace> {
    /// Creates a scanner reading the real filesystem and the current
    /// process's user namespace.
    pub fn host() -> Self {
        Self::new(HostDeviceInspector, HostUserNamespace::new())
    }
}

impl<I: DeviceInspector, U: UserNamespace> DeviceScanner<I, U> {
    /// Creates a scanner with explicit inspection and namespace capabilities.
    pub fn new(inspector: I, userns: U) -> Self {
        Self { inspector, userns }
    }

    /// Returns every grantable device under `root`.
    ///
    /// With `container_path` set, device paths are rewritten under it:
    /// `root/a/b` becomes `container_path/a/b`. When `root` is itself a
    /// device, the result path is exactly `container_path`. Without it (or
    /// with an empty path) host paths are kept.
    pub fn scan(
        &self,
        root: &Path,
        container_path: Option<&Path>,
    ) -> Result<Vec<LinuxDevice>, DeviceError> {
        let prefix = container_path.filter(|p| !p.as_os_str().is_empty());

        let meta = fs::metadata(root).map_err(|e| DeviceError::from_io(root, e))?;
        if !meta.is_dir() {
            let mut device = self.inspector.inspect(root)?;
            if let Some(prefix) = prefix {
                device.path = prefix.to_path_buf();
            }
            return Ok(vec![device]);
        }

        let devices = self.walk(root, prefix)?;
        debug!("found {} device(s) under {}", devices.len(), root.display());
        Ok(devices)
    }

    fn walk(&self, dir: &Path, prefix: Option<&Path>) -> Result<Vec<LinuxDevice>, DeviceError> {
        let mut out = Vec::new();

        let entries = self
            .inspector
            .read_dir(dir)
            .map_err(|e| DeviceError::from_io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| DeviceError::from_io(dir, e))?;
            let name = entry.file_name();
            let path = entry.path();
            let child_prefix: Option<PathBuf> = prefix.map(|p| p.join(&name));

            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => match DeviceError::from_io(&path, e) {
                    DeviceError::NotFound(_) => {
                        debug!("skipping vanished entry {}", path.display());
                        continue;
                    }
                    err => {
                        self.forgive(err)?;
                        continue;
                    }
                },
            };

            if file_type.is_dir() {
                if name.to_str().is_some_and(is_excluded_dir) {
                    debug!("skipping excluded directory {}", path.display());
                    continue;
                }
                match self.walk(&path, child_prefix.as_deref()) {
                    Ok(sub) => out.extend(sub),
                    Err(err) => self.forgive(err)?,
                }
                continue;
            }

            if name == CONSOLE_DEVICE_NAME {
                debug!("skipping console {}", path.display());
                continue;
            }

            let mut device = match self.inspector.inspect(&path) {
                Ok(device) => device,
                Err(DeviceError::NotADevice(_)) | Err(DeviceError::NotFound(_)) => continue,
                Err(err) => {
                    self.forgive(err)?;
                    continue;
                }
            };

            if device.kind == DeviceKind::Fifo {
                debug!("skipping named pipe {}", path.display());
                continue;
            }
            if let Some(child_prefix) = child_prefix {
                device.path = child_prefix;
            }
            out.push(device);
        }

        Ok(out)
    }

    /// Swallows `err` if it is a permission failure inside a user namespace,
    /// otherwise hands it back.
    fn forgive(&self, err: DeviceError) -> Result<(), DeviceError> {
        if err.is_permission_denied() && self.userns.running_in_user_ns() {
            warn!("ignoring {} (rootless)", err);
            return Ok(());
        }
        Err(err)
    }
}
