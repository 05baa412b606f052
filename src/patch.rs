//! # OCI Config Patching
//!
//! Appends discovered devices to a container's runtime configuration:
//!
//! ```json
//! {
//!   "linux": {
//!     "devices": [
//!       { "path": "/dev/infiniband/uverbs0", "type": "c", "major": 231, "minor": 192,
//!         "fileMode": 438, "uid": 0, "gid": 0 }
//!     ],
//!     "resources": {
//!       "devices": [
//!         { "allow": true, "type": "c", "major": 231, "minor": 192, "access": "rwm" }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! The document is held as a JSON tree rather than a typed OCI spec so that
//! fields this hook does not know about survive the round trip, in their
//! original order. Only `linux.devices` and `linux.resources.devices` are
//! ever written, and only by appending.
//!
//! Patching is additive: applying the same devices twice grants them twice.

use crate::constants::DEVICE_CGROUP_ACCESS;
use crate::device::{DeviceKind, LinuxDevice};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

// =============================================================================
// Device Cgroup Rule
// =============================================================================

/// An OCI `linux.resources.devices` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxDeviceCgroup {
    /// Allow (true) or deny (false).
    pub allow: bool,
    /// Device kind.
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Major device number.
    pub major: u64,
    /// Minor device number.
    pub minor: u64,
    /// Access string (`r`, `w`, `m` combination).
    pub access: String,
}

impl From<&LinuxDevice> for LinuxDeviceCgroup {
    fn from(device: &LinuxDevice) -> Self {
        Self {
            allow: true,
            kind: device.kind,
            major: device.major,
            minor: device.minor,
            access: DEVICE_CGROUP_ACCESS.to_string(),
        }
    }
}

// =============================================================================
// Config Document
// =============================================================================

/// A parsed OCI runtime config (`config.json`).
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    root: Value,
}

impl ConfigDocument {
    /// Wraps an already parsed JSON value, which must be an object.
    pub fn from_value(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(Error::InvalidConfig(format!(
                "expected a JSON object, found {}",
                json_kind(&root)
            )));
        }
        Ok(Self { root })
    }

    /// Parses a config from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let root: Value =
            serde_json::from_slice(bytes).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Self::from_value(root)
    }

    /// Serializes the config to JSON bytes.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut bytes =
            serde_json::to_vec(&self.root).map_err(|e| Error::Serialization(e.to_string()))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Returns the underlying JSON tree.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Consumes the document, returning the JSON tree.
    pub fn into_value(self) -> Value {
        self.root
    }

    /// Number of entries in `linux.devices`.
    pub fn device_count(&self) -> usize {
        array_len(self.root.pointer("/linux/devices"))
    }

    /// Number of entries in `linux.resources.devices`.
    pub fn device_rule_count(&self) -> usize {
        array_len(self.root.pointer("/linux/resources/devices"))
    }

    /// Appends `devices` and one `rwm` allow rule per device.
    ///
    /// An empty `devices` slice leaves the document as it is. Missing
    /// `linux`, `linux.devices`, `linux.resources` and
    /// `linux.resources.devices` members are created. If any of them exists
    /// with the wrong JSON type the document is left untouched.
    pub fn patch(&mut self, devices: &[LinuxDevice]) -> Result<()> {
        self.check_shape()?;
        if devices.is_empty() {
            return Ok(());
        }

        let mut entries = Vec::with_capacity(devices.len());
        let mut rules = Vec::with_capacity(devices.len());
        for device in devices {
            entries.push(to_json(device)?);
            rules.push(to_json(&LinuxDeviceCgroup::from(device))?);
        }

        let linux = child_object(root_object(&mut self.root)?, "linux")?;
        child_array(linux, "devices")?.extend(entries);
        let resources = child_object(linux, "resources")?;
        child_array(resources, "devices")?.extend(rules);

        info!("granted {} device(s) in OCI config", devices.len());
        Ok(())
    }

    fn check_shape(&self) -> Result<()> {
        let expectations: [(&str, fn(&Value) -> bool, &str); 4] = [
            ("/linux", Value::is_object, "an object"),
            ("/linux/devices", Value::is_array, "an array"),
            ("/linux/resources", Value::is_object, "an object"),
            ("/linux/resources/devices", Value::is_array, "an array"),
        ];

        for (pointer, expected, what) in expectations {
            match self.root.pointer(pointer) {
                None | Some(Value::Null) => {}
                Some(value) if expected(value) => {}
                Some(value) => {
                    return Err(Error::InvalidConfig(format!(
                        "{} must be {}, found {}",
                        pointer.trim_start_matches('/').replace('/', "."),
                        what,
                        json_kind(value)
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Returns `document` with `devices` granted.
pub fn patch(mut document: ConfigDocument, devices: &[LinuxDevice]) -> Result<ConfigDocument> {
    document.patch(devices)?;
    Ok(document)
}

// =============================================================================
// JSON Helpers
// =============================================================================

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn root_object(root: &mut Value) -> Result<&mut Map<String, Value>> {
    root.as_object_mut()
        .ok_or_else(|| Error::InvalidConfig("config root must be an object".to_string()))
}

fn child_object<'a>(
    parent: &'a mut Map<String, Value>,
    key: &str,
) -> Result<&'a mut Map<String, Value>> {
    let slot = parent.entry(key).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut()
        .ok_or_else(|| Error::InvalidConfig(format!("{} must be an object", key)))
}

fn child_array<'a>(parent: &'a mut Map<String, Value>, key: &str) -> Result<&'a mut Vec<Value>> {
    let slot = parent.entry(key).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut()
        .ok_or_else(|| Error::InvalidConfig(format!("{} must be an array", key)))
}

fn array_len(value: Option<&Value>) -> usize {
    value.and_then(Value::as_array).map_or(0, Vec::len)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
