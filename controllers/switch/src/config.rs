//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Default base of the ASN derived from a switch's IPv4 loopback
pub const DEFAULT_ASN_BASE: u32 = 4_200_000_000;

/// Runtime settings of the switch controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace the controllers operate in
    pub namespace: String,
    /// Base constant of the ASN derivation
    pub asn_base: u32,
    /// Create per-port subnets for south port addresses
    pub enable_port_subnets: bool,
    /// Page size used when listing sibling switches
    pub switch_list_limit: u32,
    /// Concurrent reconciliations per controller
    pub reconcile_concurrency: u16,
    /// Debounce applied to controller triggers
    pub reconcile_debounce: Duration,
    /// Bind address of the probes/metrics server
    pub metrics_addr: SocketAddr,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            asn_base: DEFAULT_ASN_BASE,
            enable_port_subnets: true,
            switch_list_limit: 500,
            reconcile_concurrency: 4,
            reconcile_debounce: Duration::from_secs(1),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|e| {
            ControllerError::InvalidConfig(format!("{} has invalid value '{}': {}", key, raw, e))
        }),
        _ => Ok(default),
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let defaults = Self::default();

        let namespace = lookup("WATCH_NAMESPACE")
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or(defaults.namespace);

        let switch_list_limit = parse(&lookup, "SWITCH_LIST_LIMIT", defaults.switch_list_limit)?;
        if switch_list_limit == 0 {
            return Err(ControllerError::InvalidConfig(
                "SWITCH_LIST_LIMIT must be greater than zero".to_string(),
            ));
        }

        let reconcile_concurrency = parse(&lookup, "RECONCILE_CONCURRENCY", defaults.reconcile_concurrency)?;
        if reconcile_concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            namespace,
            asn_base: parse(&lookup, "ASN_BASE", defaults.asn_base)?,
            enable_port_subnets: parse(&lookup, "ENABLE_PORT_SUBNETS", defaults.enable_port_subnets)?,
            switch_list_limit,
            reconcile_concurrency,
            reconcile_debounce: Duration::from_secs(parse(
                &lookup,
                "RECONCILE_DEBOUNCE_SECONDS",
                defaults.reconcile_debounce.as_secs(),
            )?),
            metrics_addr: parse(&lookup, "METRICS_ADDR", defaults.metrics_addr)?,
        })
    }
}
