//! Reconciliation engine.
//!
//! The bootstrap hands off to a [`ReconcileEngine`] once the process is inside
//! the host root. [`Daemon`] is the production engine: it watches the managed
//! Node and reports config rollouts requested through the node annotations.
//! Applying a `MachineConfig` to the host is outside this crate.

use crate::backoff::FibonacciBackoff;
use crate::clients::{ClientSet, MachineConfigClient};
use crate::config::EngineConfig;
use crate::error::DaemonError;
use crate::signal::StopHandle;
use async_trait::async_trait;
use crds::{
    CURRENT_CONFIG_ANNOTATION, DESIRED_CONFIG_ANNOTATION, NodeConfigState, STATE_ANNOTATION,
};
use futures::TryStreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::Api;
use kube_runtime::watcher;
use tracing::{debug, info, warn};

const OS_RELEASE: &str = "/etc/os-release";

/// Long-running reconciliation loop started by the bootstrap.
#[async_trait]
pub trait ReconcileEngine: Send {
    /// Runs until `stop` fires or an unrecoverable error occurs.
    async fn run(&mut self, stop: StopHandle) -> Result<(), DaemonError>;
}

/// Config rollout requested on a Node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfig {
    pub current: Option<String>,
    pub desired: String,
}

/// Returns the rollout the node annotations ask for, if any.
pub fn pending_config(node: &Node) -> Option<PendingConfig> {
    let annotations = node.metadata.annotations.as_ref()?;
    let desired = annotations
        .get(DESIRED_CONFIG_ANNOTATION)
        .filter(|name| !name.is_empty())?;
    let current = annotations.get(CURRENT_CONFIG_ANNOTATION);

    if current == Some(desired) {
        return None;
    }
    Some(PendingConfig {
        current: current.cloned(),
        desired: desired.clone(),
    })
}

/// Rollout state from the node annotations; missing or unknown reads as `None`.
pub fn node_state(node: &Node) -> Option<NodeConfigState> {
    node.metadata
        .annotations
        .as_ref()?
        .get(STATE_ANNOTATION)?
        .parse()
        .ok()
}

/// `PRETTY_NAME` (or `NAME`) from an os-release file.
fn os_release_name(contents: &str) -> Option<&str> {
    let value = |key: &str| {
        contents.lines().find_map(|line| {
            line.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|v| v.trim_matches('"'))
        })
    };
    value("PRETTY_NAME").or_else(|| value("NAME"))
}

/// Watches the managed Node for config rollouts.
pub struct Daemon {
    config: EngineConfig,
    nodes: Api<Node>,
    machine_configs: MachineConfigClient,
    backoff: FibonacciBackoff,
}

impl Daemon {
    /// Creates the engine for the node named in `config`.
    pub fn new(config: EngineConfig, clients: ClientSet) -> Result<Self, DaemonError> {
        if config.node_name().is_empty() {
            return Err(DaemonError::InvalidConfig("node name must not be empty".to_string()));
        }

        Ok(Self {
            nodes: Api::all(clients.kube_client().clone()),
            machine_configs: clients.config_client().clone(),
            backoff: FibonacciBackoff::default(),
            config,
        })
    }

    async fn log_host_os(&self) {
        let path = self.config.host_path(OS_RELEASE);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => info!(
                path = %path.display(),
                os = os_release_name(&contents).unwrap_or("unknown"),
                "Host OS detected"
            ),
            Err(e) => warn!(path = %path.display(), "Unable to read host os-release: {}", e),
        }
    }

    async fn reconcile_node(&self, node: &Node) -> Result<(), DaemonError> {
        let Some(pending) = pending_config(node) else {
            debug!(node = self.config.node_name(), "Node config up to date");
            return Ok(());
        };

        match self.machine_configs.get(&pending.desired).await? {
            Some(machine_config) => info!(
                node = self.config.node_name(),
                current = pending.current.as_deref().unwrap_or("<none>"),
                desired = %pending.desired,
                files = machine_config.spec.files.len(),
                units = machine_config.spec.systemd_units.len(),
                kernel_arguments = machine_config.spec.kernel_arguments.len(),
                "MachineConfig update pending"
            ),
            None => warn!(
                node = self.config.node_name(),
                desired = %pending.desired,
                "Desired MachineConfig not found"
            ),
        }
        Ok(())
    }

    async fn watch_node(&self) -> Result<(), DaemonError> {
        let name = self.config.node_name();
        let watch_config = watcher::Config::default().fields(&format!("metadata.name={name}"));
        let mut stream = Box::pin(watcher(self.nodes.clone(), watch_config));

        while let Some(event) = stream
            .try_next()
            .await
            .map_err(|e| DaemonError::Watch(format!("Node watcher stream error: {}", e)))?
        {
            match event {
                watcher::Event::Apply(node) | watcher::Event::InitApply(node) => {
                    if let Err(e) = self.reconcile_node(&node).await {
                        warn!("Failed to reconcile Node {}: {}", name, e);
                    }
                }
                watcher::Event::Delete(_) => {
                    warn!("Node {} deleted", name);
                }
                watcher::Event::Init => {
                    debug!("Node watcher initialized");
                }
                watcher::Event::InitDone => {
                    debug!("Node watcher initialization complete");
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ReconcileEngine for Daemon {
    async fn run(&mut self, mut stop: StopHandle) -> Result<(), DaemonError> {
        let name = self.config.node_name().to_string();
        info!(node = %name, root_prefix = self.config.root_prefix(), "Node config daemon running");

        self.log_host_os().await;

        if stop.is_stopped() {
            info!("Stop requested before startup completed");
            return Ok(());
        }

        let node = self
            .nodes
            .get_opt(&name)
            .await?
            .ok_or_else(|| DaemonError::NodeNotFound(name.clone()))?;
        info!(
            node = %name,
            state = %node_state(&node).unwrap_or_default(),
            "Node registered"
        );

        loop {
            let result = tokio::select! {
                () = stop.stopped() => {
                    info!("Stop requested, shutting down daemon");
                    return Ok(());
                }
                result = self.watch_node() => result,
            };

            let delay = match result {
                Ok(()) => {
                    self.backoff.reset();
                    debug!("Node watch ended, restarting");
                    self.backoff.next_backoff()
                }
                Err(e) => {
                    let delay = self.backoff.next_backoff();
                    warn!("{}; retrying in {}s", e, delay.as_secs());
                    delay
                }
            };

            tokio::select! {
                () = stop.stopped() => {
                    info!("Stop requested, shutting down daemon");
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
