//! Tests for the prestart hook.
//!
//! Runs the full state -> config.json -> scan -> patch -> persist flow
//! against temporary bundles.

use ibhook::{
    ContainerState, ContainerStatus, DeviceError, DeviceInspector, DeviceKind, DeviceScanner,
    Error, HookConfig, LinuxDevice, OCI_CONFIG_FILE, device_from_path, prestart, prestart_with,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

/// Reports listed paths as char devices (or errors); defers to the host
/// for everything else.
#[derive(Default)]
struct FakeInspector {
    nodes: HashMap<PathBuf, Result<(u64, u64), ()>>,
}

impl DeviceInspector for FakeInspector {
    fn inspect(&self, path: &Path) -> Result<LinuxDevice, DeviceError> {
        match self.nodes.get(path) {
            Some(Ok((major, minor))) => Ok(LinuxDevice {
                path: path.to_path_buf(),
                kind: DeviceKind::Char,
                major: *major,
                minor: *minor,
                file_mode: 0o666,
                uid: 0,
                gid: 0,
            }),
            Some(Err(())) => Err(DeviceError::Other {
                path: path.to_path_buf(),
                source: std::io::Error::other("input/output error"),
            }),
            None => device_from_path(path),
        }
    }
}

struct Fixture {
    _temp: TempDir,
    bundle: PathBuf,
    device_root: PathBuf,
}

impl Fixture {
    fn new(config: &Value) -> Self {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("bundle");
        let device_root = temp.path().join("infiniband");
        fs::create_dir_all(&bundle).unwrap();
        fs::create_dir_all(&device_root).unwrap();
        fs::write(
            bundle.join(OCI_CONFIG_FILE),
            serde_json::to_vec_pretty(config).unwrap(),
        )
        .unwrap();
        Self {
            _temp: temp,
            bundle,
            device_root,
        }
    }

    fn node(&self, name: &str) -> PathBuf {
        let path = self.device_root.join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    fn state(&self) -> ContainerState {
        ContainerState {
            oci_version: "1.0.2".to_string(),
            id: "rdma-job".to_string(),
            status: ContainerStatus::Created,
            pid: Some(4242),
            bundle: self.bundle.clone(),
            annotations: HashMap::new(),
        }
    }

    fn hook_config(&self, container_path: Option<&str>) -> HookConfig {
        HookConfig {
            device_root: self.device_root.clone(),
            container_path: container_path.map(PathBuf::from),
            ..HookConfig::default()
        }
    }

    fn config_bytes(&self) -> Vec<u8> {
        fs::read(self.bundle.join(OCI_CONFIG_FILE)).unwrap()
    }

    fn config(&self) -> Value {
        serde_json::from_slice(&self.config_bytes()).unwrap()
    }
}

fn base_config() -> Value {
    json!({
        "ociVersion": "1.0.2",
        "root": {"path": "rootfs"},
        "linux": {"namespaces": [{"type": "mount"}]}
    })
}

// =============================================================================
// Prestart Tests
// =============================================================================

#[test]
fn test_prestart_grants_devices() {
    let fx = Fixture::new(&base_config());
    let mut inspector = FakeInspector::default();
    inspector.nodes.insert(fx.node("uverbs0"), Ok((231, 192)));
    inspector.nodes.insert(fx.node("rdma_cm"), Ok((10, 58)));

    let granted = prestart_with(
        &fx.state(),
        &fx.hook_config(Some("/dev/infiniband")),
        &DeviceScanner::new(&inspector, false),
    )
    .unwrap();
    assert_eq!(granted, 2);

    let config = fx.config();
    let devices = config["linux"]["devices"].as_array().unwrap();
    let rules = config["linux"]["resources"]["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(rules.len(), 2);

    let mut paths: Vec<&str> = devices.iter().map(|d| d["path"].as_str().unwrap()).collect();
    paths.sort();
    assert_eq!(paths, ["/dev/infiniband/rdma_cm", "/dev/infiniband/uverbs0"]);
    assert!(rules.iter().all(|r| r["allow"] == true && r["access"] == "rwm"));

    assert_eq!(config["linux"]["namespaces"], base_config()["linux"]["namespaces"]);
    assert_eq!(config["root"], base_config()["root"]);
}

#[test]
fn test_failed_scan_leaves_config_untouched() {
    let fx = Fixture::new(&base_config());
    let mut inspector = FakeInspector::default();
    inspector.nodes.insert(fx.node("uverbs0"), Ok((231, 192)));
    inspector.nodes.insert(fx.node("umad0"), Err(()));
    let before = fx.config_bytes();

    let err = prestart_with(
        &fx.state(),
        &fx.hook_config(None),
        &DeviceScanner::new(&inspector, true),
    )
    .unwrap_err();

    assert!(matches!(err, Error::Device(DeviceError::Other { .. })));
    assert_eq!(fx.config_bytes(), before);
}

#[test]
fn test_missing_device_root_fails() {
    let fx = Fixture::new(&base_config());
    fs::remove_dir(&fx.device_root).unwrap();
    let before = fx.config_bytes();

    let err = prestart_with(&fx.state(), &fx.hook_config(None), &DeviceScanner::host())
        .unwrap_err();

    assert!(matches!(err, Error::Device(DeviceError::NotFound(_))));
    assert_eq!(fx.config_bytes(), before);
}

#[test]
fn test_no_devices_leaves_config_equivalent() {
    let fx = Fixture::new(&base_config());
    fx.node("README");

    let granted = prestart_with(&fx.state(), &fx.hook_config(None), &DeviceScanner::host())
        .unwrap();

    assert_eq!(granted, 0);
    assert_eq!(fx.config(), base_config());
}

#[test]
fn test_missing_config_is_invalid_bundle() {
    let fx = Fixture::new(&base_config());
    fs::remove_file(fx.bundle.join(OCI_CONFIG_FILE)).unwrap();

    let err = prestart_with(&fx.state(), &fx.hook_config(None), &DeviceScanner::host())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidBundle { .. }));
}

#[test]
fn test_malformed_config_is_invalid_config() {
    let fx = Fixture::new(&base_config());
    fs::write(fx.bundle.join(OCI_CONFIG_FILE), b"{\"ociVersion\":").unwrap();

    let err = prestart_with(&fx.state(), &fx.hook_config(None), &DeviceScanner::host())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_prestart_reads_state_from_reader() {
    let fx = Fixture::new(&base_config());
    let state = serde_json::to_vec(&fx.state()).unwrap();
    let config = HookConfig {
        device_root: PathBuf::from("/dev/null"),
        container_path: Some(PathBuf::from("/dev/ib-null")),
        ..HookConfig::default()
    };

    let granted = prestart(&state[..], &config).unwrap();
    assert_eq!(granted, 1);

    let written = fx.config();
    assert_eq!(written["linux"]["devices"][0]["path"], "/dev/ib-null");
    assert_eq!(written["linux"]["devices"][0]["major"], 1);
    assert_eq!(written["linux"]["devices"][0]["minor"], 3);
    assert_eq!(written["linux"]["resources"]["devices"][0]["type"], "c");
}

#[test]
fn test_prestart_rejects_bad_state() {
    let err = prestart(&b"not a state"[..], &HookConfig::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[test]
fn test_default_hook_config() {
    let config = HookConfig::default();
    assert_eq!(config.device_root, PathBuf::from("/dev/infiniband"));
    assert!(config.container_path.is_none());
}
