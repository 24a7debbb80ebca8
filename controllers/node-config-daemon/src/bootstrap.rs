//! Bootstrap orchestration.
//!
//! Runs the privileged startup sequence and hands off to the reconciliation
//! engine:
//!
//! `Init → IdentityResolved → ClientsReady → RootTransitioned → EngineRunning → {Stopped | Failed}`
//!
//! Each step runs exactly once, in order. Any failure ends the sequence;
//! nothing is retried here because every failure is an environment or
//! configuration problem that needs fixing outside the process.

use crate::clients::{ClientBuilder, ClientSet, CredentialSource};
use crate::config::{BootstrapConfig, COMPONENT_NAME, EngineConfig, StartOptions};
use crate::daemon::ReconcileEngine;
use crate::error::{BootstrapError, DaemonError};
use crate::rootfs::{self, RootOps};
use crate::signal::StopSignal;
use std::fmt;
use std::future::Future;
use tracing::info;

/// Bootstrap progress, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Init,
    IdentityResolved,
    ClientsReady,
    RootTransitioned,
    EngineRunning,
    Stopped,
    Failed,
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "Init",
            Self::IdentityResolved => "IdentityResolved",
            Self::ClientsReady => "ClientsReady",
            Self::RootTransitioned => "RootTransitioned",
            Self::EngineRunning => "EngineRunning",
            Self::Stopped => "Stopped",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Startup sequence for the node config daemon.
///
/// `root_ops` performs the chroot; `env_lookup` supplies environment
/// variables. Both are injected so the sequence can run unprivileged.
pub struct Bootstrap<R, L> {
    root_ops: R,
    env_lookup: L,
}

impl<R, L> Bootstrap<R, L>
where
    R: RootOps,
    L: Fn(&str) -> Option<String>,
{
    pub fn new(root_ops: R, env_lookup: L) -> Self {
        Self { root_ops, env_lookup }
    }

    /// Runs the sequence and blocks on the engine until it returns.
    ///
    /// `make_engine` receives the post-chroot configuration and the clients.
    /// `shutdown` resolves when the process is asked to stop; it closes the
    /// stop signal passed to the engine.
    pub async fn run<E, F, S>(
        &self,
        options: StartOptions,
        make_engine: F,
        shutdown: S,
    ) -> Result<(), BootstrapError>
    where
        E: ReconcileEngine,
        F: FnOnce(EngineConfig, ClientSet) -> Result<E, DaemonError>,
        S: Future<Output = ()> + Send + 'static,
    {
        info!(state = %BootstrapState::Init, "Starting bootstrap");

        let config = BootstrapConfig::resolve(options, &self.env_lookup)?;
        info!(
            state = %BootstrapState::IdentityResolved,
            node = config.node_name(),
            "Node identity resolved"
        );

        let source = CredentialSource::from_path(config.credential_path());
        let clients = ClientBuilder::new(&source).await?.client_set(COMPONENT_NAME)?;
        info!(state = %BootstrapState::ClientsReady, component = COMPONENT_NAME, "Cluster clients ready");

        let engine_config = rootfs::transition(&self.root_ops, config)?;
        info!(state = %BootstrapState::RootTransitioned, "Running inside host root");

        let mut engine = make_engine(engine_config, clients).map_err(BootstrapError::EngineInit)?;

        match hand_off(&mut engine, shutdown).await {
            Ok(()) => {
                info!(state = %BootstrapState::Stopped, "Daemon exited");
                Ok(())
            }
            Err(e) => {
                info!(state = %BootstrapState::Failed, "Daemon failed");
                Err(BootstrapError::Engine(e))
            }
        }
    }
}

/// Runs the engine with a fresh stop signal and closes it on the way out.
async fn hand_off<E, S>(engine: &mut E, shutdown: S) -> Result<(), DaemonError>
where
    E: ReconcileEngine,
    S: Future<Output = ()> + Send + 'static,
{
    // Dropping the signal closes it, so an early return or unwind still
    // releases the engine.
    let signal = StopSignal::new();
    let trigger = signal.trigger();
    let listener = tokio::spawn(async move {
        shutdown.await;
        if trigger.close() {
            info!("Shutdown requested, stopping daemon");
        }
    });

    info!(state = %BootstrapState::EngineRunning, "Handing off to daemon");
    let result = engine.run(signal.handle()).await;

    listener.abort();
    signal.close();
    result
}

#[cfg(test)]
#[path = "bootstrap_test.rs"]
mod bootstrap_test;
