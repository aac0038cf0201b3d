// Route installation: static routes, then interface-bound default routes

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;

use super::report::{Item, Outcome, ReconciliationResult};
use crate::routes::{Adapter, DefaultRoute, StaticRoute};
use crate::system::{RouteSpec, RoutingSystem};

/// Install static routes in configuration order.
///
/// Each route is independent: a rejected route is recorded as failed and
/// the rest of the batch is still attempted.
pub async fn install_static<S>(system: &S, routes: &[StaticRoute]) -> Vec<ReconciliationResult>
where
    S: RoutingSystem + ?Sized,
{
    let mut results = Vec::with_capacity(routes.len());

    for route in routes {
        let spec = RouteSpec {
            destination: route.destination,
            mask: route.mask,
            gateway: route.gateway.0,
            metric: route.metric,
            ifindex: None,
        };

        let outcome = apply(system, &spec).await;
        results.push(ReconciliationResult::new(Item::Static(route.clone()), outcome));
    }

    results
}

/// Install default routes, each bound to its adapter's interface index.
///
/// A route whose adapter did not resolve is skipped rather than added
/// unbound: with several default routes an unbound one leaves interface
/// selection to the OS.
pub async fn install_default<S>(
    system: &S,
    routes: &[DefaultRoute],
    resolved: &BTreeMap<String, Adapter>,
) -> Vec<ReconciliationResult>
where
    S: RoutingSystem + ?Sized,
{
    let mut results = Vec::with_capacity(routes.len());
    let mut bound: HashSet<u32> = HashSet::new();

    for route in routes {
        let Some(adapter) = resolved.get(&route.adapter) else {
            tracing::warn!(
                adapter = %route.adapter,
                "Skipping default route via {}: adapter is not configured",
                route.gateway
            );
            results.push(ReconciliationResult::new(
                Item::Default {
                    route: route.clone(),
                    ifindex: None,
                },
                Outcome::SkippedUnknownAdapter,
            ));
            continue;
        };

        let Some(ifindex) = adapter.ifindex else {
            tracing::warn!(
                adapter = %route.adapter,
                name = %adapter.display_name,
                "Skipping default route via {}: adapter did not resolve to an interface",
                route.gateway
            );
            results.push(ReconciliationResult::new(
                Item::Default {
                    route: route.clone(),
                    ifindex: None,
                },
                Outcome::SkippedUnresolvedAdapter,
            ));
            continue;
        };

        // One default route per interface, whichever key resolved to it first
        if bound.contains(&ifindex) {
            let reason = format!("interface {} already has a default route", ifindex);
            tracing::warn!(
                adapter = %route.adapter,
                name = %adapter.display_name,
                "Skipping default route via {}: {}",
                route.gateway,
                reason
            );
            results.push(ReconciliationResult::new(
                Item::Default {
                    route: route.clone(),
                    ifindex: Some(ifindex),
                },
                Outcome::Failed(reason),
            ));
            continue;
        }

        let spec = RouteSpec {
            destination: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            gateway: route.gateway.0,
            metric: route.metric,
            ifindex: Some(ifindex),
        };

        let outcome = apply(system, &spec).await;
        if outcome == Outcome::Applied {
            bound.insert(ifindex);
        }
        results.push(ReconciliationResult::new(
            Item::Default {
                route: route.clone(),
                ifindex: Some(ifindex),
            },
            outcome,
        ));
    }

    results
}

async fn apply<S>(system: &S, spec: &RouteSpec) -> Outcome
where
    S: RoutingSystem + ?Sized,
{
    match system.add_route(spec).await {
        Ok(()) => {
            tracing::info!("Added route {}", spec);
            Outcome::Applied
        }
        Err(e) => {
            tracing::warn!(error = %e, "Skipping route {}: {}", spec, e.reason());
            Outcome::Failed(e.reason())
        }
    }
}
