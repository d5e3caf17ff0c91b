//! Fabric object-store client
//!
//! Typed access to the resources the switch controllers read and write:
//! switches, switch configs, inventories, and the subnet/IP address-pool
//! resources.
//!
//! # Example
//!
//! ```no_run
//! use fabric_client::{FabricClient, FabricClientTrait, ListQuery};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let kube_client = kube::Client::try_default().await?;
//! let client = FabricClient::new(kube_client);
//!
//! // All switches in a namespace
//! let switches = client.list_switches("default", &ListQuery::all()).await?;
//! println!("{} switches", switches.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod fabric_trait;
pub mod query;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::FabricClient;
pub use error::FabricError;
pub use fabric_trait::FabricClientTrait;
pub use query::ListQuery;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockFabricClient;
