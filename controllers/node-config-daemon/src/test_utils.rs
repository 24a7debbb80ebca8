//! Test utilities for the bootstrap sequence
//!
//! Stand-ins for the privileged syscalls and the reconciliation engine, plus
//! helpers for kubeconfig files and Node objects.

use crate::clients::{ClientBuilder, ClientSet};
use crate::config::EngineConfig;
use crate::daemon::ReconcileEngine;
use crate::error::DaemonError;
use crate::rootfs::RootOps;
use crate::signal::StopHandle;
use async_trait::async_trait;
use crds::{CURRENT_CONFIG_ANNOTATION, DESIRED_CONFIG_ANNOTATION, STATE_ANNOTATION};
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const TEST_KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: test
  cluster:
    server: http://127.0.0.1:6443
contexts:
- name: test
  context:
    cluster: test
    user: test
current-context: test
users:
- name: test
  user:
    token: test-token
"#;

/// Writes `contents` to `dir/name` and returns the path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write test file");
    path
}

/// Writes a token-auth kubeconfig pointing at a local plain-HTTP server.
pub fn write_kubeconfig(dir: &Path) -> PathBuf {
    write_file(dir, "kubeconfig", TEST_KUBECONFIG)
}

/// Clients against a server that is never contacted. Needs a Tokio runtime.
pub fn test_client_set() -> ClientSet {
    let config = kube::Config::new("http://127.0.0.1:6443".parse().expect("valid uri"));
    ClientBuilder::from_config(config)
        .client_set("node-config-daemon-test")
        .expect("failed to build test clients")
}

/// Helper to create a test Node with config rollout annotations
pub fn create_test_node(
    name: &str,
    current: Option<&str>,
    desired: Option<&str>,
    state: Option<&str>,
) -> Node {
    let mut annotations = BTreeMap::new();
    for (key, value) in [
        (CURRENT_CONFIG_ANNOTATION, current),
        (DESIRED_CONFIG_ANNOTATION, desired),
        (STATE_ANNOTATION, state),
    ] {
        if let Some(value) = value {
            annotations.insert(key.to_string(), value.to_string());
        }
    }

    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Syscall recorded by [`RecordingRootOps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootCall {
    ChangeRoot(PathBuf),
    ChangeDir(PathBuf),
}

/// [`RootOps`] that records calls instead of touching the process root.
///
/// Clones share the call log, so a test can keep one and hand the other to
/// the code under test.
#[derive(Clone, Default)]
pub struct RecordingRootOps {
    calls: Arc<Mutex<Vec<RootCall>>>,
    chroot_error: Option<nix::Error>,
    chdir_error: Option<nix::Error>,
}

impl RecordingRootOps {
    pub fn failing_chroot(error: nix::Error) -> Self {
        Self {
            chroot_error: Some(error),
            ..Default::default()
        }
    }

    pub fn failing_chdir(error: nix::Error) -> Self {
        Self {
            chdir_error: Some(error),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<RootCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    fn record(&self, call: RootCall, error: Option<nix::Error>) -> nix::Result<()> {
        self.calls.lock().expect("call log poisoned").push(call);
        error.map_or(Ok(()), Err)
    }
}

impl RootOps for RecordingRootOps {
    fn change_root(&self, path: &Path) -> nix::Result<()> {
        self.record(RootCall::ChangeRoot(path.to_path_buf()), self.chroot_error)
    }

    fn change_dir(&self, path: &Path) -> nix::Result<()> {
        self.record(RootCall::ChangeDir(path.to_path_buf()), self.chdir_error)
    }
}

/// What a [`ScriptedEngine`] observed, shared with the test.
#[derive(Clone, Default)]
pub struct EngineProbe {
    config: Arc<Mutex<Option<EngineConfig>>>,
    stop: Arc<Mutex<Option<StopHandle>>>,
}

impl EngineProbe {
    /// Config the engine was constructed with, `None` if never constructed.
    pub fn config(&self) -> Option<EngineConfig> {
        self.config.lock().expect("probe poisoned").clone()
    }

    /// Whether the stop handle given to `run` has been closed.
    pub fn stop_closed(&self) -> Option<bool> {
        self.stop
            .lock()
            .expect("probe poisoned")
            .as_ref()
            .map(StopHandle::is_stopped)
    }
}

/// Engine whose behaviour is fixed up front.
pub struct ScriptedEngine {
    probe: EngineProbe,
    wait_for_stop: bool,
    error: Option<String>,
}

impl ScriptedEngine {
    /// Engine constructor that records into `probe`.
    pub fn factory(
        probe: &EngineProbe,
        wait_for_stop: bool,
        error: Option<&str>,
    ) -> impl FnOnce(EngineConfig, ClientSet) -> Result<ScriptedEngine, DaemonError> {
        let probe = probe.clone();
        let error = error.map(str::to_string);
        move |config, _clients| {
            *probe.config.lock().expect("probe poisoned") = Some(config);
            Ok(ScriptedEngine {
                probe,
                wait_for_stop,
                error,
            })
        }
    }
}

#[async_trait]
impl ReconcileEngine for ScriptedEngine {
    async fn run(&mut self, mut stop: StopHandle) -> Result<(), DaemonError> {
        *self.probe.stop.lock().expect("probe poisoned") = Some(stop.clone());
        if self.wait_for_stop {
            stop.stopped().await;
        }
        match &self.error {
            Some(message) => Err(DaemonError::Watch(message.clone())),
            None => Ok(()),
        }
    }
}
