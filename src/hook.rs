//! # Prestart Hook
//!
//! Glue between the OCI runtime and the device-grant core:
//!
//! ```text
//! stdin state ──► <bundle>/config.json ──► scan device root ──► patch ──► atomic write
//! ```
//!
//! The config is only rewritten after the scan and the patch both succeed.
//! A failed scan leaves `config.json` byte-for-byte as the runtime wrote it,
//! so the runtime refuses to start the container instead of starting it with
//! a partial grant.

use crate::constants::{INFINIBAND_DEV_DIR, MAX_CONFIG_SIZE, OCI_CONFIG_FILE};
use crate::device::DeviceInspector;
use crate::error::{Error, Result};
use crate::patch::ConfigDocument;
use crate::scanner::DeviceScanner;
use crate::state::ContainerState;
use crate::userns::UserNamespace;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Hook settings.
#[derive(Debug, Clone)]
pub struct HookConfig {
    /// Host directory (or single device) to grant.
    pub device_root: PathBuf,
    /// Where the devices appear in the container; `None` keeps host paths.
    pub container_path: Option<PathBuf>,
    /// Upper bound on config.json size.
    pub max_config_size: u64,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            device_root: PathBuf::from(INFINIBAND_DEV_DIR),
            container_path: None,
            max_config_size: MAX_CONFIG_SIZE,
        }
    }
}

/// Runs the prestart hook against the host, reading the container state
/// from `state_reader`. Returns the number of devices granted.
pub fn prestart<R: Read>(state_reader: R, config: &HookConfig) -> Result<usize> {
    let state = ContainerState::from_reader(state_reader)?;
    prestart_with(&state, config, &DeviceScanner::host())
}

/// Grants the devices found by `scanner` to the container described by
/// `state`.
pub fn prestart_with<I, U>(
    state: &ContainerState,
    config: &HookConfig,
    scanner: &DeviceScanner<I, U>,
) -> Result<usize>
where
    I: DeviceInspector,
    U: UserNamespace,
{
    debug!(
        "prestart for container {} (bundle {})",
        state.id,
        state.bundle.display()
    );

    let config_path = state.bundle.join(OCI_CONFIG_FILE);
    let mut document = load_config(&config_path, config.max_config_size)?;

    let devices = scanner.scan(&config.device_root, config.container_path.as_deref())?;
    document.patch(&devices)?;
    persist_config(&config_path, &document)?;

    info!(
        "granted {} device(s) from {} to container {}",
        devices.len(),
        config.device_root.display(),
        state.id
    );
    Ok(devices.len())
}

/// Reads and parses a bundle's config.json.
pub fn load_config(path: &Path, max_size: u64) -> Result<ConfigDocument> {
    let meta = fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::InvalidBundle {
            path: path.parent().unwrap_or(path).to_path_buf(),
            reason: format!("missing {}", OCI_CONFIG_FILE),
        },
        _ => Error::Io(e),
    })?;

    if meta.len() > max_size {
        return Err(Error::ConfigTooLarge {
            size: meta.len(),
            limit: max_size,
        });
    }

    let bytes = fs::read(path)?;
    ConfigDocument::from_slice(&bytes)
}

/// Replaces `path` with the serialized document via write-to-temp + rename,
/// keeping the original file's permissions.
pub fn persist_config(path: &Path, document: &ConfigDocument) -> Result<()> {
    let bytes = document.to_vec()?;
    let persist_err = |e: io::Error| Error::PersistFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    // Unique name so concurrent hooks on the same bundle never share a temp file.
    let temp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::now_v7()));
    fs::write(&temp_path, &bytes).map_err(persist_err)?;

    let result = fs::metadata(path)
        .and_then(|meta| fs::set_permissions(&temp_path, meta.permissions()))
        .and_then(|()| fs::rename(&temp_path, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(persist_err(e));
    }

    debug!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
