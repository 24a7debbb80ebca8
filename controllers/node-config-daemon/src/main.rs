//! Node Config Daemon
//!
//! Runs on every node with the host root filesystem mounted into its
//! container. The `start` subcommand resolves which node it manages, builds
//! cluster clients, chroots into the host root, and then hands off to the
//! reconciliation loop until the process is told to stop.

mod backoff;
mod bootstrap;
mod clients;
mod config;
mod daemon;
mod error;
mod identity;
mod rootfs;
mod signal;
#[cfg(test)]
mod test_utils;

use bootstrap::Bootstrap;
use clap::{Args, Parser, Subcommand};
use config::{DEFAULT_ROOT_PREFIX, StartOptions};
use daemon::Daemon;
use rootfs::Syscalls;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Node Config Daemon
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Starts Node Config Daemon
    Start(StartArgs),
}

#[derive(Args)]
struct StartArgs {
    /// Kubeconfig file to access a remote cluster (testing only)
    #[arg(long, default_value = "")]
    kubeconfig: String,

    /// Kubernetes node name daemon is managing
    #[arg(long, default_value = "")]
    node_name: String,

    /// Where the node's root filesystem is mounted, for the file stage
    #[arg(long, default_value = DEFAULT_ROOT_PREFIX)]
    root_prefix: PathBuf,
}

impl From<StartArgs> for StartOptions {
    fn from(args: StartArgs) -> Self {
        Self {
            kubeconfig: (!args.kubeconfig.is_empty()).then(|| PathBuf::from(args.kubeconfig)),
            node_name: args.node_name,
            root_prefix: args.root_prefix,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // To help debugging, immediately log version
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Start(args) => {
            let bootstrap = Bootstrap::new(Syscalls, identity::process_env);
            match bootstrap.run(args.into(), Daemon::new, shutdown_signal()).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Resolves on SIGTERM or Ctrl-C.
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!("Unable to install SIGTERM handler: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Unable to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    tokio::select! {
        _ = terminate.recv() => info!("Received SIGTERM"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Received Ctrl-C"),
            Err(e) => {
                warn!("Unable to listen for Ctrl-C: {}", e);
                terminate.recv().await;
                info!("Received SIGTERM");
            }
        },
    }
}
