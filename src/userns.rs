//! User-namespace detection.
//!
//! Rootless runtimes run hooks inside a user namespace, where some device
//! subtrees are legitimately unreadable. The scanner asks a [`UserNamespace`]
//! whether that is the case before forgiving a permission error.
//!
//! The host probe mirrors what runc/containerd do: a process is in the
//! initial user namespace iff `/proc/self/uid_map` is exactly the identity
//! mapping `0 0 4294967295`.

use crate::constants::{INITIAL_UID_MAP, SELF_UID_MAP};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Answers "is the current process running inside a user namespace?".
pub trait UserNamespace {
    /// Returns true when running inside a non-initial user namespace.
    fn running_in_user_ns(&self) -> bool;
}

impl<T: UserNamespace + ?Sized> UserNamespace for &T {
    fn running_in_user_ns(&self) -> bool {
        (**self).running_in_user_ns()
    }
}

impl UserNamespace for bool {
    fn running_in_user_ns(&self) -> bool {
        *self
    }
}

/// Detector reading a uid_map file (by default the current process's).
///
/// The answer is computed on first use and cached for the detector's
/// lifetime.
#[derive(Debug)]
pub struct HostUserNamespace {
    uid_map: PathBuf,
    cached: OnceLock<bool>,
}

impl HostUserNamespace {
    /// Creates a detector for the current process.
    pub fn new() -> Self {
        Self::with_uid_map(SELF_UID_MAP)
    }

    /// Creates a detector reading a specific uid_map file.
    pub fn with_uid_map(path: impl Into<PathBuf>) -> Self {
        Self {
            uid_map: path.into(),
            cached: OnceLock::new(),
        }
    }

    fn detect(path: &Path) -> bool {
        match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => {
                // Same as containerd: an empty map reads as the initial namespace.
                debug!("uid_map {} is empty", path.display());
                false
            }
            Ok(content) => {
                let in_ns = !is_initial_uid_map(&content);
                debug!("uid_map {}: in user namespace = {}", path.display(), in_ns);
                in_ns
            }
            Err(e) => {
                // No uid_map means no user namespace support at all.
                debug!("cannot read {}: {}", path.display(), e);
                false
            }
        }
    }
}

impl Default for HostUserNamespace {
    fn default() -> Self {
        Self::new()
    }
}

impl UserNamespace for HostUserNamespace {
    fn running_in_user_ns(&self) -> bool {
        *self.cached.get_or_init(|| Self::detect(&self.uid_map))
    }
}

/// Returns true if `content` is the uid_map of the initial user namespace.
pub fn is_initial_uid_map(content: &str) -> bool {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(first) = lines.next() else {
        return false;
    };
    if lines.next().is_some() {
        return false;
    }

    let fields: Vec<u32> = match first
        .split_whitespace()
        .map(str::parse::<u32>)
        .collect::<std::result::Result<_, _>>()
    {
        Ok(fields) => fields,
        Err(_) => return false,
    };

    let (inside, outside, count) = INITIAL_UID_MAP;
    fields == [inside, outside, count]
}
