//! # Hook Constants
//!
//! Paths, exclusion policy, cgroup access strings and input bounds used by
//! the device-grant hook. These are the single source of truth for which
//! parts of the host device tree are ever considered for a grant.
//!
//! ## Cross-References
//!
//! - [`crate::scanner`]: uses the exclusion set and `console` skip
//! - [`crate::patch`]: uses the cgroup access string
//! - [`crate::hook`]: uses the default device root and config bounds

// =============================================================================
// Device Tree
// =============================================================================

/// Host directory holding the InfiniBand device nodes (uverbs, umad, rdma_cm).
pub const INFINIBAND_DEV_DIR: &str = "/dev/infiniband";

/// Directory names never descended into during a device walk.
///
/// - `pts`, `shm`, `fd`, `mqueue`: pseudo-terminal, shared memory, fd and
///   message queue pseudo-directories that never hold grantable devices.
/// - `.lxc`, `.lxd-mounts`: bind-mount artifacts left by LXC/LXD
///   (lxc/lxd#2825).
/// - `.udev`: udev database left under /dev on some hosts
///   (opencontainers/runc#2093).
pub const EXCLUDED_DEVICE_DIRS: &[&str] = &[
    "pts",
    "shm",
    "fd",
    "mqueue",
    ".lxc",
    ".lxd-mounts",
    ".udev",
];

/// Entry name skipped regardless of its node type.
pub const CONSOLE_DEVICE_NAME: &str = "console";

/// Returns true if a directory with this name must not be walked.
pub fn is_excluded_dir(name: &str) -> bool {
    EXCLUDED_DEVICE_DIRS.contains(&name)
}

// =============================================================================
// Device Cgroup
// =============================================================================

/// Access granted by every generated device cgroup rule: read, write, mknod.
pub const DEVICE_CGROUP_ACCESS: &str = "rwm";

/// Mask selecting the permission bits (including setuid/setgid/sticky) of
/// a node's mode.
pub const DEVICE_MODE_MASK: u32 = 0o7777;

// =============================================================================
// OCI Bundle
// =============================================================================

/// Runtime config file inside an OCI bundle.
pub const OCI_CONFIG_FILE: &str = "config.json";

/// Maximum size of config.json accepted by the hook (1 MiB).
///
/// **Security**: the bundle is runtime-provided, but the hook runs with the
/// runtime's privileges; an unbounded read would let a hostile bundle exhaust
/// memory before the container even starts.
pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Maximum size of the container state read from stdin (1 MiB).
pub const MAX_STATE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// User Namespaces
// =============================================================================

/// uid_map of the current process, consulted for user-namespace detection.
pub const SELF_UID_MAP: &str = "/proc/self/uid_map";

/// uid_map contents of a process in the initial user namespace.
pub const INITIAL_UID_MAP: (u32, u32, u32) = (0, 0, u32::MAX);

// =============================================================================
// Environment
// =============================================================================

/// Env var overriding the default log filter.
pub const LOG_ENV_VAR: &str = "IBHOOK_LOG";

/// Env var overriding the host device root.
pub const DEVICE_ROOT_ENV_VAR: &str = "IBHOOK_DEVICE_ROOT";

/// Env var overriding the container-side path prefix.
pub const CONTAINER_PATH_ENV_VAR: &str = "IBHOOK_CONTAINER_PATH";
