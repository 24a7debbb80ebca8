//! Bootstrap configuration.
//!
//! Configuration moves through three values, each produced from the last:
//! - [`StartOptions`]: raw `start` flags as parsed from the command line
//! - [`BootstrapConfig`]: validated options with the node identity resolved
//! - [`EngineConfig`]: what the reconciliation engine sees once the process
//!   runs inside the host root; only the root transition can produce it

use crate::error::IdentityError;
use crate::identity::resolve_node_name;
use std::path::{Component, Path, PathBuf};

/// Component name sent as the client User-Agent
pub const COMPONENT_NAME: &str = "node-config-daemon";

/// Where the host root filesystem is mounted inside the daemon's container
pub const DEFAULT_ROOT_PREFIX: &str = "/rootfs";

/// Environment variable consulted when `--node-name` is empty
pub const NODE_NAME_ENV: &str = "NODE_NAME";

/// Raw `start` subcommand options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    /// Kubeconfig file to access a remote cluster (testing only)
    pub kubeconfig: Option<PathBuf>,
    /// Kubernetes node name the daemon is managing
    pub node_name: String,
    /// Where the node's root filesystem is mounted
    pub root_prefix: PathBuf,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            node_name: String::new(),
            root_prefix: PathBuf::from(DEFAULT_ROOT_PREFIX),
        }
    }
}

/// Validated bootstrap configuration, before the root transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    credential_path: Option<PathBuf>,
    node_name: String,
    root_prefix: PathBuf,
}

impl BootstrapConfig {
    /// Resolves the node identity and freezes the options.
    ///
    /// An empty `--kubeconfig` is normalised to `None` so the credential
    /// source is decided by a single check.
    pub fn resolve<L>(options: StartOptions, lookup: L) -> Result<Self, IdentityError>
    where
        L: FnOnce(&str) -> Option<String>,
    {
        let node_name = resolve_node_name(&options.node_name, lookup)?;
        let credential_path = options
            .kubeconfig
            .filter(|path| !path.as_os_str().is_empty());

        Ok(Self {
            credential_path,
            node_name,
            root_prefix: options.root_prefix,
        })
    }

    pub fn credential_path(&self) -> Option<&Path> {
        self.credential_path.as_deref()
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn root_prefix(&self) -> &Path {
        &self.root_prefix
    }

    /// Consumes the config once the process is inside the host root.
    pub(crate) fn into_rooted(self) -> EngineConfig {
        EngineConfig {
            node_name: self.node_name,
            root_prefix: String::new(),
        }
    }
}

/// Configuration handed to the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    node_name: String,
    root_prefix: String,
}

impl EngineConfig {
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Prefix to put in front of host paths; empty once inside the chroot.
    pub fn root_prefix(&self) -> &str {
        &self.root_prefix
    }

    /// Resolves an absolute host path against the root prefix.
    ///
    /// `Path::join` replaces the base when given an absolute path, so the
    /// leading `/` is stripped before joining a non-empty prefix.
    pub fn host_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if self.root_prefix.is_empty() {
            return path.to_path_buf();
        }
        let relative: PathBuf = path
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        Path::new(&self.root_prefix).join(relative)
    }
}

#[cfg(test)]
impl EngineConfig {
    pub(crate) fn with_prefix(node_name: &str, root_prefix: &str) -> Self {
        Self {
            node_name: node_name.to_string(),
            root_prefix: root_prefix.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(kubeconfig: Option<&str>, node_name: &str) -> StartOptions {
        StartOptions {
            kubeconfig: kubeconfig.map(PathBuf::from),
            node_name: node_name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_root_prefix() {
        assert_eq!(StartOptions::default().root_prefix, PathBuf::from("/rootfs"));
    }

    #[test]
    fn test_empty_kubeconfig_normalised_to_none() {
        let config = BootstrapConfig::resolve(options(Some(""), "worker-1"), |_| None)
            .expect("explicit node name should resolve");
        assert_eq!(config.credential_path(), None);
    }

    #[test]
    fn test_kubeconfig_path_kept() {
        let config = BootstrapConfig::resolve(options(Some("/etc/kube/config"), "worker-1"), |_| None)
            .expect("explicit node name should resolve");
        assert_eq!(config.credential_path(), Some(Path::new("/etc/kube/config")));
        assert_eq!(config.node_name(), "worker-1");
        assert_eq!(config.root_prefix(), Path::new("/rootfs"));
    }

    #[test]
    fn test_resolve_fails_without_identity() {
        let result = BootstrapConfig::resolve(options(None, ""), |_| None);
        assert!(matches!(result, Err(IdentityError::MissingNodeName { .. })));
    }

    #[test]
    fn test_into_rooted_clears_prefix() {
        let config = BootstrapConfig::resolve(options(None, "worker-1"), |_| None)
            .expect("explicit node name should resolve");
        let rooted = config.into_rooted();
        assert_eq!(rooted.root_prefix(), "");
        assert_eq!(rooted.node_name(), "worker-1");
    }

    #[test]
    fn test_host_path_without_prefix() {
        let config = EngineConfig::with_prefix("worker-1", "");
        assert_eq!(config.host_path("/etc/os-release"), PathBuf::from("/etc/os-release"));
    }

    #[test]
    fn test_host_path_with_prefix_is_not_replaced() {
        let config = EngineConfig::with_prefix("worker-1", "/rootfs");
        assert_eq!(
            config.host_path("/etc/os-release"),
            PathBuf::from("/rootfs/etc/os-release")
        );
    }
}
