//! Address-pool CRDs
//!
//! Resources served by the external address-pool service:
//! - Subnets (CIDR reservations, optionally carved from a parent subnet)
//! - IPs (single address reservations from a subnet)
//!
//! The switch controller only creates and deletes these and reads back their
//! allocation state; it never performs allocation itself.

pub mod ip;
pub mod subnet;

pub use ip::*;
pub use subnet::*;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Allocation state reported by the address-pool service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum AllocationState {
    #[serde(alias = "processing")]
    Processing,
    #[serde(alias = "finished")]
    Finished,
    #[serde(alias = "failed")]
    Failed,
}
