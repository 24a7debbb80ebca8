//! Daemon error types.
//!
//! Every bootstrap error is terminal for the process: each variant names the
//! step that failed and the path or name involved, so the message alone is
//! enough to diagnose the environment.

use std::path::PathBuf;
use thiserror::Error;
use kube::config::{InClusterError, KubeconfigError};
use kube::Error as KubeError;

/// Node identity could not be determined.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Neither the flag nor the environment supplied a node name
    #[error("node-name is required: pass --node-name or set the {env} environment variable")]
    MissingNodeName {
        /// Environment variable that was consulted
        env: &'static str,
    },
}

/// Cluster credentials could not be loaded or turned into a client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Explicit kubeconfig file was unreadable or malformed
    #[error("failed to load kubeconfig from {}: {source}", .path.display())]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    /// In-cluster service account credentials were missing or invalid
    #[error("failed to load in-cluster config: {0}")]
    InCluster(#[from] InClusterError),

    /// Component name cannot be sent as a User-Agent header
    #[error("invalid component name {name:?} for user agent: {source}")]
    InvalidComponentName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },

    /// Client construction from a loaded config failed
    #[error("failed to create {kind} client: {source}")]
    Build {
        kind: &'static str,
        #[source]
        source: KubeError,
    },
}

/// Host root filesystem transition failed.
#[derive(Debug, Error)]
pub enum RootError {
    /// Mount path does not exist
    #[error("rootPrefix {} does not exist", .path.display())]
    NotFound { path: PathBuf },

    /// Mount path exists but could not be inspected
    #[error("unable to verify rootPrefix {} exists: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Mount path is not a directory
    #[error("rootPrefix {} is not a directory", .path.display())]
    NotADirectory { path: PathBuf },

    /// chroot(2) failed
    #[error("unable to chroot to {}: {source}", .path.display())]
    Chroot {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    /// chdir(2) into the new root failed
    #[error("unable to change directory to {}: {source}", .path.display())]
    Chdir {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },
}

/// Errors raised by the reconciliation engine.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// The managed node is not registered with the cluster
    #[error("node {0} not found")]
    NodeNotFound(String),

    /// Engine was constructed with unusable configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

/// Terminal bootstrap failure, tagged with the step that produced it.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("resolving node identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("creating clients: {0}")]
    Clients(#[from] ClientError),

    #[error("transitioning to host root: {0}")]
    RootTransition(#[from] RootError),

    #[error("failed to initialize daemon: {0}")]
    EngineInit(#[source] DaemonError),

    #[error("failed to run: {0}")]
    Engine(#[source] DaemonError),
}
