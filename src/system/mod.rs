//! Capability interface over the host's routing subsystem.
//!
//! [`RoutingSystem`] covers every OS operation the reconciliation needs:
//! - adapter lookup by display name
//! - full route table flush
//! - persistent route add, optionally bound to an interface index
//! - interface metric pinning (automatic metric disabled)
//! - adapter link reset
//! - route table read-back
//!
//! Production code uses [`windows::WindowsRoutingSystem`].
//! Tests use the stateful fake in `mock`.
//!
//! **Limitation:** IPv4 only.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

use crate::command;
use crate::routes::{netmask, RoutingTable};

pub mod windows;

#[cfg(test)]
pub mod mock;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Command(#[from] command::Error),

    #[error("route add rejected: {0}")]
    RouteRejected(String),

    #[error("unexpected output from {command}: {detail}")]
    UnexpectedOutput { command: String, detail: String },

    #[error("{0}")]
    General(String),
}

impl Error {
    /// Short reason for a per-item result record
    pub fn reason(&self) -> String {
        match self {
            Error::Command(e) => e.reason(),
            Error::RouteRejected(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// A single persistent route to install
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSpec {
    pub destination: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub metric: u32,
    /// Interface index the route is bound to; None lets the OS choose
    pub ifindex: Option<u32>,
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} via {} metric {}",
            netmask::to_cidr(self.destination, self.mask),
            self.gateway,
            self.metric
        )?;
        if let Some(ifindex) = self.ifindex {
            write!(f, " if {}", ifindex)?;
        }
        Ok(())
    }
}

/// Abstraction over the OS routing table and adapter configuration.
///
/// Calls are made strictly one at a time; implementations may assume
/// exclusive ownership of the route table for the duration of a run.
#[async_trait]
pub trait RoutingSystem: Send + Sync {
    /// Current interface index for an adapter display name.
    /// `Ok(None)` when the adapter is missing or disabled.
    async fn interface_index(&self, display_name: &str) -> Result<Option<u32>, Error>;

    /// Remove every gateway route from the table, managed or not.
    async fn flush_routes(&self) -> Result<(), Error>;

    /// Add a persistent route.
    async fn add_route(&self, route: &RouteSpec) -> Result<(), Error>;

    /// Disable automatic metric and pin an explicit interface metric.
    async fn set_interface_metric(&self, display_name: &str, metric: u32) -> Result<(), Error>;

    /// Disable then re-enable the adapter link.
    async fn restart_adapter(&self, display_name: &str) -> Result<(), Error>;

    /// Read back the current IPv4 route table.
    async fn list_routes(&self) -> Result<RoutingTable, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_spec_display() {
        let spec = RouteSpec {
            destination: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::new(10, 0, 0, 1),
            metric: 20,
            ifindex: Some(5),
        };
        assert_eq!(spec.to_string(), "0.0.0.0/0 via 10.0.0.1 metric 20 if 5");
    }

    #[test]
    fn test_error_reason_uses_os_message() {
        let err = Error::Command(command::Error::Failed {
            program: "route".to_string(),
            code: Some(1),
            message: "The route addition failed: Element not found.".to_string(),
        });
        assert_eq!(err.reason(), "The route addition failed: Element not found.");
    }
}
