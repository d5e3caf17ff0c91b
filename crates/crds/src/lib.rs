//! DCops fabric CRD definitions
//!
//! Kubernetes Custom Resource Definitions for the switch fabric controllers:
//! switches, their shared config policy, hardware inventory, and the address-pool
//! resources (subnets and IPs) the controllers request.

pub mod inventory;
pub mod ipam;
pub mod labels;
pub mod network;
pub mod references;
pub mod selectors;
pub mod switch;
pub mod switch_config;

pub use inventory::*;
pub use ipam::*;
pub use network::*;
pub use references::*;
pub use selectors::*;
pub use switch::*;
pub use switch_config::*;
