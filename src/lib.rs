//! # ibhook
//!
//! **OCI prestart hook granting InfiniBand devices to containers**
//!
//! The hook runs after the runtime has created the container and before its
//! process starts. It snapshots the host's InfiniBand device nodes and
//! appends them, with matching device-cgroup allow rules, to the bundle's
//! `config.json`.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            ibhook                                │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  hook::prestart                                                  │
//! │    stdin state ─► config.json ─► scan ─► patch ─► atomic write   │
//! │                                   │        │                     │
//! │  ┌────────────────────────────────┼──┐  ┌──┼──────────────────┐  │
//! │  │ DeviceScanner                  │  │  │ ConfigDocument      │  │
//! │  │  exclusion set │ console skip  │  │  │  linux.devices      │  │
//! │  │  rootless EACCES forgiveness   │  │  │  resources.devices  │  │
//! │  └──────────────┬─────────────────┘  │  └─────────────────────┘  │
//! │                 │                    │                           │
//! │  ┌──────────────┴──────┐  ┌──────────┴──────────┐                │
//! │  │ DeviceInspector     │  │ UserNamespace       │                │
//! │  │  lstat │ major/minor│  │  /proc/self/uid_map │                │
//! │  └─────────────────────┘  └─────────────────────┘                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Rootless Operation
//!
//! Inside a user namespace some device subtrees are unreadable by design.
//! Permission errors there drop the affected entries instead of failing the
//! hook; everywhere else any unexpected error fails the whole grant.
//!
//! # Example
//!
//! ```rust,ignore
//! use ibhook::{ConfigDocument, DeviceScanner};
//! use std::path::Path;
//!
//! let devices = DeviceScanner::host().scan(Path::new("/dev/infiniband"), None)?;
//! let mut config = ConfigDocument::from_slice(&std::fs::read("config.json")?)?;
//! config.patch(&devices)?;
//! ```
//!
//! Linux only.

pub mod constants;
pub mod device;
pub mod error;
pub mod hook;
pub mod patch;
pub mod scanner;
pub mod state;
pub mod userns;

// Re-exports
pub use constants::*;
pub use device::{DeviceInspector, DeviceKind, HostDeviceInspector, LinuxDevice, device_from_path};
pub use error::{DeviceError, Error, Result};
pub use hook::{HookConfig, prestart, prestart_with};
pub use patch::{ConfigDocument, LinuxDeviceCgroup, patch};
pub use scanner::DeviceScanner;
pub use state::{ContainerState, ContainerStatus};
pub use userns::{HostUserNamespace, UserNamespace};
