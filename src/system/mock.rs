//! Stateful fake of the host routing subsystem.
//!
//! Tracks adapters, the route table, interface metrics and an ordered call
//! log, so tests can assert on the resulting state as well as the sequence
//! of operations. Failures are injected per operation name.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use super::{Error, RouteSpec, RoutingSystem};
use crate::routes::{netmask, Route, RoutingTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    InterfaceIndex(String),
    FlushRoutes,
    AddRoute(RouteSpec),
    SetInterfaceMetric(String, u32),
    RestartAdapter(String),
    ListRoutes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeAdapter {
    pub ifindex: u32,
    pub enabled: bool,
    pub metric: u32,
    pub automatic_metric: bool,
}

#[derive(Debug, Default)]
pub struct SystemState {
    pub adapters: BTreeMap<String, FakeAdapter>,
    pub routes: Vec<RouteSpec>,
    pub calls: Vec<Call>,
    /// Map of operation name -> error message. If set, the operation will fail.
    pub fail_on: HashMap<String, String>,
    /// Routes whose add fails, keyed by destination
    pub reject_routes: HashMap<std::net::Ipv4Addr, String>,
    /// Adapters whose restart fails
    pub broken_links: Vec<String>,
}

impl SystemState {
    fn check_fail(&self, op: &str) -> Result<(), Error> {
        if let Some(msg) = self.fail_on.get(op) {
            Err(Error::General(msg.clone()))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone)]
pub struct FakeRoutingSystem {
    pub state: Arc<Mutex<SystemState>>,
}

impl FakeRoutingSystem {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SystemState::default())),
        }
    }

    pub fn with_adapter(self, name: &str, ifindex: u32) -> Self {
        self.state.lock().unwrap().adapters.insert(
            name.to_string(),
            FakeAdapter {
                ifindex,
                enabled: true,
                metric: 25,
                automatic_metric: true,
            },
        );
        self
    }

    pub fn with_disabled_adapter(self, name: &str, ifindex: u32) -> Self {
        let fake = self.with_adapter(name, ifindex);
        if let Some(a) = fake.state.lock().unwrap().adapters.get_mut(name) {
            a.enabled = false;
        }
        fake
    }

    pub fn fail_on(self, op: &str, msg: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_on
            .insert(op.to_string(), msg.to_string());
        self
    }

    pub fn with_route(self, route: RouteSpec) -> Self {
        self.state.lock().unwrap().routes.push(route);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn routes(&self) -> Vec<RouteSpec> {
        self.state.lock().unwrap().routes.clone()
    }

    pub fn adapter(&self, name: &str) -> Option<FakeAdapter> {
        self.state.lock().unwrap().adapters.get(name).cloned()
    }
}

#[async_trait]
impl RoutingSystem for FakeRoutingSystem {
    async fn interface_index(&self, display_name: &str) -> Result<Option<u32>, Error> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::InterfaceIndex(display_name.to_string()));
        s.check_fail("interface_index")?;
        Ok(s
            .adapters
            .get(display_name)
            .filter(|a| a.enabled)
            .map(|a| a.ifindex))
    }

    async fn flush_routes(&self) -> Result<(), Error> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::FlushRoutes);
        s.check_fail("flush_routes")?;
        s.routes.clear();
        Ok(())
    }

    async fn add_route(&self, route: &RouteSpec) -> Result<(), Error> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::AddRoute(route.clone()));
        s.check_fail("add_route")?;

        if let Some(msg) = s.reject_routes.get(&route.destination) {
            return Err(Error::RouteRejected(msg.clone()));
        }

        // Same destination, mask, gateway and interface is the same entry
        let exists = s.routes.iter().any(|r| {
            r.destination == route.destination
                && r.mask == route.mask
                && r.gateway == route.gateway
                && r.ifindex == route.ifindex
        });
        if exists {
            return Err(Error::RouteRejected(
                "The route addition failed: The object already exists.".into(),
            ));
        }

        // Binding a default route turns automatic metric back on for that interface
        if let Some(ifindex) = route.ifindex {
            for a in s.adapters.values_mut().filter(|a| a.ifindex == ifindex) {
                a.automatic_metric = true;
            }
        }

        s.routes.push(route.clone());
        Ok(())
    }

    async fn set_interface_metric(&self, display_name: &str, metric: u32) -> Result<(), Error> {
        let mut s = self.state.lock().unwrap();
        s.calls
            .push(Call::SetInterfaceMetric(display_name.to_string(), metric));
        s.check_fail("set_interface_metric")?;
        let adapter = s
            .adapters
            .get_mut(display_name)
            .ok_or_else(|| Error::General(format!("adapter not found: {display_name}")))?;
        adapter.automatic_metric = false;
        adapter.metric = metric;
        Ok(())
    }

    async fn restart_adapter(&self, display_name: &str) -> Result<(), Error> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::RestartAdapter(display_name.to_string()));
        s.check_fail("restart_adapter")?;
        if s.broken_links.iter().any(|n| n == display_name) {
            return Err(Error::General(format!("link reset failed: {display_name}")));
        }
        if !s.adapters.contains_key(display_name) {
            return Err(Error::General(format!("adapter not found: {display_name}")));
        }
        Ok(())
    }

    async fn list_routes(&self) -> Result<RoutingTable, Error> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(Call::ListRoutes);
        s.check_fail("list_routes")?;
        let routes = s
            .routes
            .iter()
            .map(|r| Route {
                destination: netmask::to_cidr(r.destination, r.mask),
                netmask: r.mask,
                gateway: Some(r.gateway),
                interface: r.ifindex.map(|i| i.to_string()),
                metric: r.metric,
                persistent: true,
            })
            .collect();
        Ok(RoutingTable::new(routes))
    }
}
