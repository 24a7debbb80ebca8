//! Cluster client construction.
//!
//! Exactly one credential source is active per process: an explicit
//! kubeconfig file (testing against a remote cluster) or the in-cluster
//! service account (production). Every client built here carries the
//! component name as its User-Agent so API server audit logs can attribute
//! requests; the tag plays no part in authorization.

use crate::error::ClientError;
use crds::MachineConfig;
use http::header::{HeaderValue, USER_AGENT};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where cluster credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Kubeconfig file at the given path
    Kubeconfig(PathBuf),
    /// Service account token and CA mounted into the pod
    InCluster,
}

impl CredentialSource {
    /// Selects the source from the `--kubeconfig` value alone.
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(path) if !path.as_os_str().is_empty() => Self::Kubeconfig(path.to_path_buf()),
            _ => Self::InCluster,
        }
    }

    /// Loads a client config from this source.
    pub async fn load(&self) -> Result<Config, ClientError> {
        match self {
            Self::Kubeconfig(path) => {
                debug!(path = %path.display(), "Loading kube client config from path");
                let kubeconfig = Kubeconfig::read_from(path).map_err(|source| ClientError::Kubeconfig {
                    path: path.clone(),
                    source,
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|source| ClientError::Kubeconfig {
                        path: path.clone(),
                        source,
                    })
            }
            Self::InCluster => {
                debug!("Using in-cluster kube client config");
                Ok(Config::incluster()?)
            }
        }
    }
}

/// Builds tagged clients from a single loaded config.
#[derive(Clone)]
pub struct ClientBuilder {
    config: Config,
}

impl ClientBuilder {
    /// Loads credentials from `source`.
    ///
    /// No retry: a bad credential source needs reprovisioning, not another
    /// attempt against the API server.
    pub async fn new(source: &CredentialSource) -> Result<Self, ClientError> {
        let config = source.load().await?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        install_crypto_provider();
        Self { config }
    }

    /// Copy of the base config with `User-Agent: <component>/<version>`.
    pub fn config_for(&self, component: &str) -> Result<Config, ClientError> {
        let agent = format!("{}/{}", component, env!("CARGO_PKG_VERSION"));
        let value = HeaderValue::from_str(&agent).map_err(|source| ClientError::InvalidComponentName {
            name: component.to_string(),
            source,
        })?;

        let mut config = self.config.clone();
        config.headers.retain(|(name, _)| *name != USER_AGENT);
        config.headers.push((USER_AGENT, value));
        Ok(config)
    }

    /// Client for the `MachineConfig` API.
    pub fn config_client(&self, component: &str) -> Result<MachineConfigClient, ClientError> {
        let client = Client::try_from(self.config_for(component)?)
            .map_err(|source| ClientError::Build { kind: "machine config", source })?;
        Ok(MachineConfigClient::new(client))
    }

    /// Client for the core Kubernetes APIs.
    pub fn kube_client(&self, component: &str) -> Result<Client, ClientError> {
        Client::try_from(self.config_for(component)?)
            .map_err(|source| ClientError::Build { kind: "kubernetes", source })
    }

    pub fn client_set(&self, component: &str) -> Result<ClientSet, ClientError> {
        Ok(ClientSet {
            config: self.config_client(component)?,
            kube: self.kube_client(component)?,
        })
    }
}

/// Typed access to cluster-scoped `MachineConfig` resources.
#[derive(Clone)]
pub struct MachineConfigClient {
    client: Client,
}

impl MachineConfigClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn api(&self) -> Api<MachineConfig> {
        Api::all(self.client.clone())
    }

    /// Fetches a `MachineConfig` by name, `None` if it does not exist.
    pub async fn get(&self, name: &str) -> Result<Option<MachineConfig>, kube::Error> {
        self.api().get_opt(name).await
    }
}

/// The two clients handed to the reconciliation engine.
#[derive(Clone)]
pub struct ClientSet {
    config: MachineConfigClient,
    kube: Client,
}

impl ClientSet {
    pub fn config_client(&self) -> &MachineConfigClient {
        &self.config
    }

    pub fn kube_client(&self) -> &Client {
        &self.kube
    }
}

// kube selects rustls without a default provider; pick ring once per process.
fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }
}
