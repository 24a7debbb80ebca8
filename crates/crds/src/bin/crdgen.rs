//! Prints the CRD manifests for the node config daemon.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/machine-config.yaml`

use crds::MachineConfig;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&MachineConfig::crd())?);
    Ok(())
}
