//! Prints the fabric CRD manifests as a YAML stream
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/fabric.yaml`

use crds::{IP, Inventory, Subnet, Switch, SwitchConfig};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        Switch::crd(),
        SwitchConfig::crd(),
        Inventory::crd(),
        Subnet::crd(),
        IP::crd(),
    ];

    for crd in &crds {
        print!("---\n{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
