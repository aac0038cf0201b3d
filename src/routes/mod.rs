// Routes module - desired routing state and the live route table read-back

pub mod netmask;
pub mod parser;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

/// A network adapter as configured by the operator.
///
/// `ifindex` is only known after resolution and is never carried across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adapter {
    pub key: String,
    pub display_name: String,
    pub metric: Option<u32>,
    pub ifindex: Option<u32>,
}

impl Adapter {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Adapter {
            key: key.into(),
            display_name: display_name.into(),
            metric: None,
            ifindex: None,
        }
    }

    pub fn with_metric(mut self, metric: u32) -> Self {
        self.metric = Some(metric);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gateway(pub Ipv4Addr);

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub destination: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Gateway,
    pub metric: u32,
}

impl fmt::Display for StaticRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} via {} metric {}",
            netmask::to_cidr(self.destination, self.mask),
            self.gateway,
            self.metric
        )
    }
}

/// A 0.0.0.0/0 route pinned to one adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRoute {
    pub adapter: String,
    pub gateway: Gateway,
    pub metric: u32,
}

impl fmt::Display for DefaultRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0.0.0.0/0 via {} on {} metric {}",
            self.gateway, self.adapter, self.metric
        )
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("static route {destination}: mask {mask} is not a contiguous prefix mask")]
    NonContiguousMask { destination: Ipv4Addr, mask: Ipv4Addr },

    #[error("static route {destination}: host bits set for mask {mask}")]
    HostBitsSet { destination: Ipv4Addr, mask: Ipv4Addr },

    #[error("adapter '{0}' is the target of more than one default route")]
    DuplicateDefaultRoute(String),

    #[error("adapter '{0}' has an empty display name")]
    EmptyDisplayName(String),

    #[error("adapters '{first}' and '{second}' both name the OS adapter '{name}'")]
    DuplicateDisplayName {
        name: String,
        first: String,
        second: String,
    },

    #[error("static route 0.0.0.0/0 via {0} would be unbound, declare it under [[default_routes]]")]
    DefaultRouteAsStatic(Ipv4Addr),
}

/// The complete desired routing state for one reconciliation run.
///
/// Built once from configuration and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    adapters: BTreeMap<String, Adapter>,
    static_routes: Vec<StaticRoute>,
    default_routes: Vec<DefaultRoute>,
    fallback_metric: u32,
}

impl DesiredState {
    pub fn new(
        adapters: BTreeMap<String, Adapter>,
        static_routes: Vec<StaticRoute>,
        default_routes: Vec<DefaultRoute>,
        fallback_metric: u32,
    ) -> Result<Self, ValidationError> {
        // Windows adapter names compare case-insensitively
        let mut names: HashMap<String, &str> = HashMap::new();
        for adapter in adapters.values() {
            if adapter.display_name.trim().is_empty() {
                return Err(ValidationError::EmptyDisplayName(adapter.key.clone()));
            }
            let folded = adapter.display_name.trim().to_ascii_lowercase();
            if let Some(first) = names.insert(folded, adapter.key.as_str()) {
                return Err(ValidationError::DuplicateDisplayName {
                    name: adapter.display_name.clone(),
                    first: first.to_string(),
                    second: adapter.key.clone(),
                });
            }
        }

        for route in &static_routes {
            if netmask::prefix_len(route.mask).is_none() {
                return Err(ValidationError::NonContiguousMask {
                    destination: route.destination,
                    mask: route.mask,
                });
            }
            if route.mask.is_unspecified() {
                return Err(ValidationError::DefaultRouteAsStatic(route.gateway.0));
            }
            if !netmask::is_network_address(route.destination, route.mask) {
                return Err(ValidationError::HostBitsSet {
                    destination: route.destination,
                    mask: route.mask,
                });
            }
        }

        let mut bound = HashSet::new();
        for route in &default_routes {
            if !bound.insert(route.adapter.as_str()) {
                return Err(ValidationError::DuplicateDefaultRoute(route.adapter.clone()));
            }
        }

        Ok(DesiredState {
            adapters,
            static_routes,
            default_routes,
            fallback_metric,
        })
    }

    pub fn adapters(&self) -> &BTreeMap<String, Adapter> {
        &self.adapters
    }

    pub fn static_routes(&self) -> &[StaticRoute] {
        &self.static_routes
    }

    pub fn default_routes(&self) -> &[DefaultRoute] {
        &self.default_routes
    }

    /// Adapter keys named by default routes but absent from the adapter table.
    /// Not a validation error: the installer skips those routes and reports it.
    pub fn unknown_adapter_keys(&self) -> Vec<&str> {
        self.default_routes
            .iter()
            .map(|r| r.adapter.as_str())
            .filter(|key| !self.adapters.contains_key(*key))
            .collect()
    }

    /// Interface metric to pin on an adapter.
    ///
    /// Explicit adapter metric first, then the best metric of its default
    /// route, then the configured fallback.
    pub fn interface_metric(&self, adapter: &Adapter) -> u32 {
        adapter
            .metric
            .or_else(|| {
                self.default_routes
                    .iter()
                    .filter(|r| r.adapter == adapter.key)
                    .map(|r| r.metric)
                    .min()
            })
            .unwrap_or(self.fallback_metric)
    }
}

/// One entry of the live IPv4 route table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub destination: String, // CIDR notation
    pub netmask: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>, // None for on-link routes
    pub interface: Option<String>,
    pub metric: u32,
    pub persistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingTable {
    pub hostname: String,
    pub routes: Vec<Route>,
    pub timestamp: String,
}

impl RoutingTable {
    pub fn new(routes: Vec<Route>) -> Self {
        RoutingTable {
            hostname: get_hostname(),
            routes,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn persistent(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| r.persistent)
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Route table on {} at {}", self.hostname, self.timestamp)?;
        writeln!(
            f,
            "{:<20} {:<16} {:<16} {:<16} {:>6}  {}",
            "Destination", "Netmask", "Gateway", "Interface", "Metric", "Persistent"
        )?;
        for route in &self.routes {
            writeln!(
                f,
                "{:<20} {:<16} {:<16} {:<16} {:>6}  {}",
                route.destination,
                route.netmask.to_string(),
                route
                    .gateway
                    .map(|g| g.to_string())
                    .unwrap_or_else(|| "On-link".to_string()),
                route.interface.as_deref().unwrap_or("-"),
                route.metric,
                if route.persistent { "yes" } else { "no" }
            )?;
        }
        Ok(())
    }
}

fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
