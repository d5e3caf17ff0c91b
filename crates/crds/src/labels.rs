//! Label and annotation vocabulary
//!
//! Keys written on (and read from) fabric resources. Address-pool resources created
//! by the controller carry the owner, purpose and generated-by labels so they can be
//! found again without a local cache.

/// Marks a switch that has completed onboarding; siblings are listed by this label
pub const ONBOARDED: &str = "dcops.microscaler.io/onboarded";

/// Hardware chassis ID of a switch, matched against LLDP chassis IDs of neighbors
pub const CHASSIS_ID_ANNOTATION: &str = "dcops.microscaler.io/chassis-id";

/// Layer label used as the fallback config selector
pub const LAYER: &str = "dcops.microscaler.io/layer";

/// Name of the switch owning an address-pool resource
pub const OWNER: &str = "dcops.microscaler.io/owner";

/// Purpose of an address-pool resource (see the `PURPOSE_*` values)
pub const PURPOSE: &str = "dcops.microscaler.io/purpose";

/// Manager that generated an address-pool resource
pub const GENERATED_BY: &str = "dcops.microscaler.io/generated-by";

/// Interface name a per-port subnet was created for
pub const INTERFACE_NAME: &str = "dcops.microscaler.io/interface-name";

/// Purpose value for loopback IP requests
pub const PURPOSE_LOOPBACK: &str = "loopback";

/// Purpose value for aggregate south subnets
pub const PURPOSE_SOUTH_SUBNET: &str = "south-subnet";

/// Purpose value for per-port subnets
pub const PURPOSE_SWITCH_PORT: &str = "switch-port";

/// Fixed manager identity: the generated-by label value and the server-side apply field manager
pub const MANAGER: &str = "switch-controller";
