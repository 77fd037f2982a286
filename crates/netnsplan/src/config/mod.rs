//! Desired-state configuration.
//!
//! The desired state is read from every `*.yaml` file in a directory. Files
//! are merged in file-name order: mappings merge key by key, any other value
//! in a later file replaces the earlier one. This lets a base document declare
//! a namespace and a drop-in file add devices to it:
//!
//! ```yaml
//! # 00-base.yaml
//! netns:
//!   ns1:
//!     ethernets:
//!       eth0:
//!         addresses: [192.168.0.1/24]
//!
//! # 10-dummy.yaml
//! netns:
//!   ns1:
//!     dummy-devices:
//!       dummy0:
//!         addresses: [10.0.0.1/8]
//! ```
//!
//! The merged tree is an immutable input to one reconciliation pass.

mod types;
mod validation;

pub use types::*;
pub use validation::{
    IFNAMSIZ, ValidationResult, validate_cidr, validate_ifname, validate_netns_name,
};

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::{Error, Result};

/// Default configuration directory.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/netnsplan";

/// Load and merge every `*.yaml` file in `dir`.
///
/// A directory without YAML files yields an empty desired state.
pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<DesiredState> {
    let dir = dir.as_ref();
    let mut merged = Value::Null;

    for path in yaml_files(dir)? {
        let text = fs::read_to_string(&path)
            .map_err(|e| Error::Io(e).with_context(format!("read {}", path.display())))?;
        let value: Value = serde_yaml::from_str(&text)
            .map_err(|e| Error::Yaml(e).with_context(format!("parse {}", path.display())))?;
        tracing::debug!(path = %path.display(), "load config file");
        merge_values(&mut merged, value);
    }

    if merged.is_null() {
        return Ok(DesiredState::default());
    }
    Ok(serde_yaml::from_value(merged)?)
}

/// `*.yaml` files directly under `dir`, sorted by name.
fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::Io(e).with_context(format!("read config dir {}", dir.display())))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "yaml") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Deep-merge `src` into `dst`.
///
/// Mappings merge recursively; any other `src` value replaces `dst`. A null
/// `src` (an empty document) leaves `dst` untouched.
pub fn merge_values(dst: &mut Value, src: Value) {
    match (dst, src) {
        (_, Value::Null) => {}
        (Value::Mapping(dst_map), Value::Mapping(src_map)) => {
            for (key, src_value) in src_map {
                match dst_map.get_mut(&key) {
                    Some(dst_value) => merge_values(dst_value, src_value),
                    None => {
                        dst_map.insert(key, src_value);
                    }
                }
            }
        }
        (dst, src) => *dst = src,
    }
}

impl DesiredState {
    /// Parse a single YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Serialize as YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
