//! Node Config Daemon CRD Definitions
//!
//! Kubernetes Custom Resource Definitions consumed by the node config daemon,
//! plus the node annotation keys the daemon reads to track config rollout.

pub mod machine_config;
pub mod node_annotations;

pub use machine_config::*;
pub use node_annotations::*;
