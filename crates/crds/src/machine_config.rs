//! MachineConfig CRD
//!
//! Declares the desired host configuration for a node: files, systemd units,
//! kernel arguments and the OS image. Cluster-scoped, referenced by name from
//! the node's `desiredConfig` annotation.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "MachineConfig",
    shortname = "mc"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfigSpec {
    /// OS image the node should be running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_image_url: Option<String>,

    /// Files to write on the host filesystem
    #[serde(default)]
    pub files: Vec<MachineConfigFile>,

    /// Systemd units to install or toggle
    #[serde(default)]
    pub systemd_units: Vec<SystemdUnit>,

    /// Extra kernel command line arguments
    #[serde(default)]
    pub kernel_arguments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfigFile {
    /// Absolute path on the host (e.g., "/etc/chrony.conf")
    pub path: String,

    /// File contents
    #[serde(default)]
    pub contents: String,

    /// Octal permission bits (defaults to 0644 when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,

    /// Replace the file if it already exists
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

fn default_overwrite() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SystemdUnit {
    /// Unit name including suffix (e.g., "kubelet.service")
    pub name: String,

    /// Whether the unit should be enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Unit file contents; absent means only toggle the existing unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
}

impl MachineConfigSpec {
    /// True when the spec carries nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.os_image_url.is_none()
            && self.files.is_empty()
            && self.systemd_units.is_empty()
            && self.kernel_arguments.is_empty()
    }
}
