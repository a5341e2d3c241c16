//! Prints the CRD manifests as YAML
//!
//! Usage: `cargo run -p crds --bin crdgen > metalport-crd.yaml`

use crds::MetalPort;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&MetalPort::crd())?);
    Ok(())
}
