//! Address math for switch ports and loopbacks.
//!
//! Pure functions: ASN derivation, per-port block layout inside a south subnet,
//! address demand, and the deterministic names of address-pool resources.

use crds::{AddressFamily, InterfaceStatus, IpAddressStatus, PortParameters};
use ipnetwork::IpNetwork;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// Name prefix of switch ports; the remainder of the name is the port index
pub const PORT_PREFIX: &str = "Ethernet";

/// Address computation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid CIDR '{0}'")]
    InvalidCidr(String),

    #[error("invalid IP address '{0}'")]
    InvalidAddress(String),

    #[error("prefix length /{prefix} is not valid for {family}")]
    InvalidPrefix { family: AddressFamily, prefix: u8 },

    #[error("address family mismatch: expected {expected}, got {actual}")]
    FamilyMismatch {
        expected: AddressFamily,
        actual: AddressFamily,
    },

    #[error("port {port} has no {family} prefix length")]
    MissingPrefix { port: String, family: AddressFamily },

    #[error("subnet {cidr} exhausted while placing port {port}")]
    SubnetExhausted { cidr: String, port: String },

    #[error("no IPv4 loopback address")]
    MissingIpv4Loopback,

    #[error("ASN {0} is out of range")]
    AsnOutOfRange(u64),
}

/// Numeric index of a switch port name ("Ethernet12" -> 12)
pub fn port_index(name: &str) -> Option<u32> {
    name.strip_prefix(PORT_PREFIX)?.parse().ok()
}

/// Switch-port name for an index
pub fn port_name(index: u32) -> String {
    format!("{}{}", PORT_PREFIX, index)
}

/// Chassis ID with separators removed, for comparing LLDP data with annotations
pub fn normalize_chassis_id(chassis_id: &str) -> String {
    chassis_id
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Parse an address given either bare or in CIDR notation
pub fn parse_address(address: &str) -> Result<IpAddr, AddressError> {
    let bare = address.split('/').next().unwrap_or(address).trim();
    bare.parse()
        .map_err(|_| AddressError::InvalidAddress(address.to_string()))
}

/// Parse a CIDR (or an address in CIDR notation)
pub fn parse_network(cidr: &str) -> Result<IpNetwork, AddressError> {
    cidr.trim()
        .parse()
        .map_err(|_| AddressError::InvalidCidr(cidr.to_string()))
}

/// The network an address in CIDR notation belongs to ("10.0.0.5/30" -> "10.0.0.4/30")
pub fn network_of(address: &str) -> Result<IpNetwork, AddressError> {
    let net = parse_network(address)?;
    IpNetwork::new(net.network(), net.prefix())
        .map_err(|_| AddressError::InvalidCidr(address.to_string()))
}

fn family_of(ip: &IpAddr) -> AddressFamily {
    match ip {
        IpAddr::V4(_) => AddressFamily::IPv4,
        IpAddr::V6(_) => AddressFamily::IPv6,
    }
}

fn to_u128(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// `ip + offset`, staying within the address family
pub fn offset_address(ip: IpAddr, offset: u128) -> Result<IpAddr, AddressError> {
    let overflow = || AddressError::InvalidAddress(format!("{} + {}", ip, offset));
    let value = to_u128(ip).checked_add(offset).ok_or_else(overflow)?;
    match ip {
        IpAddr::V4(_) => {
            let v4 = u32::try_from(value).map_err(|_| overflow())?;
            Ok(IpAddr::V4(Ipv4Addr::from(v4)))
        }
        IpAddr::V6(_) => Ok(IpAddr::V6(Ipv6Addr::from(value))),
    }
}

/// Number of addresses in a network of the given prefix length
pub fn block_size(family: AddressFamily, prefix: u8) -> Result<u128, AddressError> {
    let bits = family.bits();
    if prefix > bits {
        return Err(AddressError::InvalidPrefix { family, prefix });
    }
    1u128
        .checked_shl(u32::from(bits - prefix))
        .ok_or(AddressError::InvalidPrefix { family, prefix })
}

/// Smallest `n` with `2^n >= value`
pub fn ceil_log2(value: u128) -> u32 {
    if value <= 1 {
        0
    } else {
        128 - (value - 1).leading_zeros()
    }
}

/// Prefix length of the smallest network holding `demand` addresses
pub fn prefix_for_demand(family: AddressFamily, demand: u128) -> u8 {
    let needed = ceil_log2(demand.max(1));
    let bits = u32::from(family.bits());
    u8::try_from(bits.saturating_sub(needed)).unwrap_or(0)
}

/// Offset of the switch-side host within a port network
///
/// Point-to-point networks (/31, /127) use both addresses; others skip the network address.
pub fn host_offset(family: AddressFamily, prefix: u8) -> u128 {
    if prefix + 1 >= family.bits() { 0 } else { 1 }
}

/// Derive the ASN from the first IPv4 loopback: `base + o2 * 65536 + o3 * 256 + o4`
pub fn derive_asn(base: u32, loopbacks: &[IpAddressStatus]) -> Result<u32, AddressError> {
    let loopback = loopbacks
        .iter()
        .find(|lo| lo.address_family == AddressFamily::IPv4)
        .ok_or(AddressError::MissingIpv4Loopback)?;

    let octets = match parse_address(&loopback.address)? {
        IpAddr::V4(v4) => v4.octets(),
        IpAddr::V6(_) => {
            return Err(AddressError::FamilyMismatch {
                expected: AddressFamily::IPv4,
                actual: AddressFamily::IPv6,
            });
        }
    };

    let asn = u64::from(base)
        + u64::from(octets[1]) * 65_536
        + u64::from(octets[2]) * 256
        + u64::from(octets[3]);
    u32::try_from(asn).map_err(|_| AddressError::AsnOutOfRange(asn))
}

/// South-facing switch ports in ascending index order
pub fn south_ports(interfaces: &BTreeMap<String, InterfaceStatus>) -> Vec<(u32, &String, &InterfaceStatus)> {
    let mut ports: Vec<_> = interfaces
        .iter()
        .filter(|(_, iface)| iface.direction == crds::Direction::South)
        .filter_map(|(name, iface)| port_index(name).map(|idx| (idx, name, iface)))
        .collect();
    ports.sort_by_key(|(idx, _, _)| *idx);
    ports
}

fn lanes(params: &PortParameters) -> u128 {
    u128::from(params.lanes.unwrap_or(1).max(1))
}

/// A south port's aligned placement, as offsets from the start of the subnet
struct Placement<'a> {
    name: &'a String,
    prefix: u8,
    start: u128,
    end: u128,
}

/// Place every south port in index order
///
/// Each port consumes `lanes` blocks of its own size, starting at the next
/// offset aligned to that size.
fn place_south_ports(
    interfaces: &BTreeMap<String, InterfaceStatus>,
    family: AddressFamily,
) -> Result<Vec<Placement<'_>>, AddressError> {
    let mut offset: u128 = 0;
    let mut placements = Vec::new();

    for (_, name, iface) in south_ports(interfaces) {
        let prefix = iface
            .parameters
            .prefix_length(family)
            .ok_or_else(|| AddressError::MissingPrefix {
                port: name.clone(),
                family,
            })?;
        let size = block_size(family, prefix)?;
        let start = offset.div_ceil(size).saturating_mul(size);
        let end = start.saturating_add(size.saturating_mul(lanes(&iface.parameters)));
        placements.push(Placement {
            name,
            prefix,
            start,
            end,
        });
        offset = end;
    }

    Ok(placements)
}

/// Addresses needed by all south ports: the end of the aligned layout
///
/// Equals the sum of `2^(bits - prefix) * lanes` when all ports share a mask
/// length; mixed lengths add the alignment gaps.
pub fn south_demand(
    interfaces: &BTreeMap<String, InterfaceStatus>,
    family: AddressFamily,
) -> Result<u128, AddressError> {
    Ok(place_south_ports(interfaces, family)?
        .last()
        .map_or(0, |p| p.end))
}

/// A south port's network and the switch-side address within it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBlock {
    pub port: String,
    pub network: IpNetwork,
    pub address: IpNetwork,
}

/// Lay out every south port inside `subnet`
///
/// Ports are placed in index order; each consumes `lanes` blocks of its own size
/// and uses the first block as its network.
pub fn layout_south_ports(
    subnet: &IpNetwork,
    interfaces: &BTreeMap<String, InterfaceStatus>,
) -> Result<Vec<PortBlock>, AddressError> {
    let family = family_of(&subnet.network());
    let capacity = block_size(family, subnet.prefix())?;
    let base = subnet.network();
    let mut blocks = Vec::new();

    for placement in place_south_ports(interfaces, family)? {
        let prefix = placement.prefix;
        if placement.end > capacity {
            return Err(AddressError::SubnetExhausted {
                cidr: subnet.to_string(),
                port: placement.name.clone(),
            });
        }

        let network_ip = offset_address(base, placement.start)?;
        let host_ip = offset_address(network_ip, host_offset(family, prefix))?;
        blocks.push(PortBlock {
            port: placement.name.clone(),
            network: IpNetwork::new(network_ip, prefix)
                .map_err(|_| AddressError::InvalidPrefix { family, prefix })?,
            address: IpNetwork::new(host_ip, prefix)
                .map_err(|_| AddressError::InvalidPrefix { family, prefix })?,
        });
    }

    Ok(blocks)
}

/// The far-end address mirroring a peer's port address: the next address in the same network
pub fn mirror_address(peer_address: &str) -> Result<IpNetwork, AddressError> {
    let net = parse_network(peer_address)?;
    let next = offset_address(net.ip(), 1)?;
    let mirrored = IpNetwork::new(next, net.prefix())
        .map_err(|_| AddressError::InvalidCidr(peer_address.to_string()))?;
    if !network_of(peer_address)?.contains(next) {
        return Err(AddressError::SubnetExhausted {
            cidr: network_of(peer_address)?.to_string(),
            port: peer_address.to_string(),
        });
    }
    Ok(mirrored)
}

/// Name of the loopback IP requested for a switch
pub fn loopback_ip_name(switch: &str, family: AddressFamily) -> String {
    format!("{}-lo-{}", switch, family.as_str().to_lowercase())
}

/// Name of the south subnet requested for a switch
pub fn south_subnet_name(switch: &str, family: AddressFamily) -> String {
    format!("{}-sn-{}", switch, family.as_str().to_lowercase())
}

/// Name of the per-port subnet backing `cidr` on `port`
pub fn port_subnet_name(switch: &str, port: &str, cidr: &str) -> String {
    let digest = Md5::digest(cidr.as_bytes());
    format!(
        "{}-{}-{}",
        switch,
        port.to_lowercase(),
        hex::encode(&digest[..4])
    )
}
