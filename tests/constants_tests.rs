//! Tests for constants module.
//!
//! Pins the exclusion policy and the grant format the runtime relies on.

use ibhook::*;

// =============================================================================
// Exclusion Policy Tests
// =============================================================================

#[test]
fn test_pseudo_directories_excluded() {
    for name in ["pts", "shm", "fd", "mqueue"] {
        assert!(is_excluded_dir(name), "{} should be excluded", name);
    }
}

#[test]
fn test_runtime_artifact_directories_excluded() {
    for name in [".lxc", ".lxd-mounts", ".udev"] {
        assert!(is_excluded_dir(name), "{} should be excluded", name);
    }
}

#[test]
fn test_device_directories_not_excluded() {
    for name in ["infiniband", "by-path", "mlx5_0", "PTS", "shm0"] {
        assert!(!is_excluded_dir(name), "{} should be walked", name);
    }
}

#[test]
fn test_exclusion_set_has_no_duplicates() {
    let mut names = EXCLUDED_DEVICE_DIRS.to_vec();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), EXCLUDED_DEVICE_DIRS.len());
}

// =============================================================================
// Grant Format Tests
// =============================================================================

#[test]
fn test_cgroup_access_is_full() {
    assert_eq!(DEVICE_CGROUP_ACCESS, "rwm");
}

#[test]
fn test_mode_mask_is_twelve_bits() {
    assert_eq!(DEVICE_MODE_MASK, 0o7777);
    assert_eq!(DEVICE_MODE_MASK.count_ones(), 12);
}

#[test]
fn test_default_paths() {
    assert_eq!(INFINIBAND_DEV_DIR, "/dev/infiniband");
    assert_eq!(OCI_CONFIG_FILE, "config.json");
    assert_eq!(CONSOLE_DEVICE_NAME, "console");
}

#[test]
fn test_size_limits_reasonable() {
    // Real config.json files are a few KiB; allow generous headroom.
    assert!(MAX_CONFIG_SIZE >= 64 * 1024, "config limit too restrictive");
    assert!(MAX_CONFIG_SIZE <= 16 * 1024 * 1024, "config limit too permissive");
    assert!(MAX_STATE_SIZE >= 4 * 1024, "state limit too restrictive");
}
