//! # Device Node Inspection
//!
//! Turns a single filesystem path into an OCI [`LinuxDevice`] descriptor.
//!
//! ## Semantics
//!
//! - The node's own metadata is read (`lstat`); symlinks are never followed,
//!   so a link to a device is reported as [`DeviceError::NotADevice`].
//! - Only block, character and FIFO nodes are devices. Regular files,
//!   directories, sockets and symlinks are not.
//! - Major/minor numbers come from the C library's `major()`/`minor()`,
//!   which know the kernel's split of `dev_t` on the target (the 12/20-bit
//!   layout with the wider extensions, not a plain shift).
//! - The reported mode keeps only the low 12 permission bits.
//!
//! Inspection is exposed through the [`DeviceInspector`] trait so the
//! scanner can run against fakes in tests.

use crate::constants::DEVICE_MODE_MASK;
use crate::error::DeviceError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

// =============================================================================
// Device Kind
// =============================================================================

/// Kind of device node, serialized with the OCI single-letter codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Block device (`b`).
    #[serde(rename = "b")]
    Block,
    /// Character device (`c`).
    #[serde(rename = "c")]
    Char,
    /// Named pipe (`p`).
    #[serde(rename = "p")]
    Fifo,
}

impl DeviceKind {
    /// Returns the OCI type code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "b",
            Self::Char => "c",
            Self::Fifo => "p",
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Device Descriptor
// =============================================================================

/// A discovered device node, in the shape of an OCI `linux.devices` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxDevice {
    /// Path inside the container (host path unless rewritten).
    pub path: PathBuf,
    /// Node kind.
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Major device number.
    pub major: u64,
    /// Minor device number.
    pub minor: u64,
    /// Permission bits (`mode & 0o7777`).
    pub file_mode: u32,
    /// Owning user.
    pub uid: u32,
    /// Owning group.
    pub gid: u32,
}

// =============================================================================
// Inspector
// =============================================================================

/// Classifies a filesystem path as a device.
pub trait DeviceInspector {
    /// Returns the device at `path`, without following symlinks.
    fn inspect(&self, path: &Path) -> Result<LinuxDevice, DeviceError>;

    /// Lists the entries of directory `dir`.
    fn read_dir(&self, dir: &Path) -> io::Result<fs::ReadDir> {
        fs::read_dir(dir)
    }
}

impl<T: DeviceInspector + ?Sized> DeviceInspector for &T {
    fn inspect(&self, path: &Path) -> Result<LinuxDevice, DeviceError> {
        (**self).inspect(path)
    }

    fn read_dir(&self, dir: &Path) -> io::Result<fs::ReadDir> {
        (**self).read_dir(dir)
    }
}

/// Inspector backed by the host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDeviceInspector;

impl DeviceInspector for HostDeviceInspector {
    fn inspect(&self, path: &Path) -> Result<LinuxDevice, DeviceError> {
        device_from_path(path)
    }
}

/// Reads the device node at `path`.
pub fn device_from_path(path: &Path) -> Result<LinuxDevice, DeviceError> {
    let meta = fs::symlink_metadata(path).map_err(|e| DeviceError::from_io(path, e))?;
    let file_type = meta.file_type();

    let kind = if file_type.is_block_device() {
        DeviceKind::Block
    } else if file_type.is_char_device() {
        DeviceKind::Char
    } else if file_type.is_fifo() {
        DeviceKind::Fifo
    } else {
        return Err(DeviceError::NotADevice(path.to_path_buf()));
    };

    let (major, minor) = split_dev(meta.rdev());

    Ok(LinuxDevice {
        path: path.to_path_buf(),
        kind,
        major,
        minor,
        file_mode: meta.mode() & DEVICE_MODE_MASK,
        uid: meta.uid(),
        gid: meta.gid(),
    })
}

/// Splits a raw `st_rdev` into (major, minor) using the platform encoding.
pub fn split_dev(rdev: u64) -> (u64, u64) {
    // `dev_t` is 32 bits on some targets (mips); the truncation matches the
    // width the kernel handed us.
    #[allow(clippy::unnecessary_cast, clippy::useless_conversion)]
    let dev = rdev as libc::dev_t;
    (u64::from(libc::major(dev)), u64::from(libc::minor(dev)))
}

/// Builds a raw device number from (major, minor) using the platform encoding.
#[allow(clippy::unnecessary_cast)]
pub fn make_dev(major: u32, minor: u32) -> u64 {
    libc::makedev(major, minor) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_kind_codes() {
        assert_eq!(DeviceKind::Block.as_str(), "b");
        assert_eq!(DeviceKind::Char.as_str(), "c");
        assert_eq!(DeviceKind::Fifo.as_str(), "p");
        assert_eq!(format!("{}", DeviceKind::Char), "c");
    }

    #[test]
    fn test_split_dev_inverts_make_dev() {
        // 231:192 is a typical uverbs node; 4095:1048575 exercises the wide fields.
        for (major, minor) in [(231, 192), (1, 3), (4095, 1_048_575)] {
            assert_eq!(split_dev(make_dev(major, minor)), (major as u64, minor as u64));
        }
    }

    #[test]
    fn test_dev_null_is_char_device() {
        let dev = device_from_path(Path::new("/dev/null")).unwrap();
        assert_eq!(dev.kind, DeviceKind::Char);
        assert_eq!((dev.major, dev.minor), (1, 3));
        assert_eq!(dev.path, PathBuf::from("/dev/null"));
        assert_eq!(dev.file_mode & !DEVICE_MODE_MASK, 0);
    }
}
