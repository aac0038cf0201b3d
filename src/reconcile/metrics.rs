// Interface metric pinning

use std::collections::BTreeMap;

use super::report::{Item, Outcome, ReconciliationResult};
use crate::routes::Adapter;
use crate::system::RoutingSystem;

/// Disable automatic metric and pin an explicit metric on every adapter.
///
/// Adapters are looked up by display name, not by the index resolved at the
/// start of the run. Must run after all route installation: binding a
/// default route can switch automatic metric back on.
pub async fn enforce<S, F>(
    system: &S,
    adapters: &BTreeMap<String, Adapter>,
    metric_for: F,
) -> Vec<ReconciliationResult>
where
    S: RoutingSystem + ?Sized,
    F: Fn(&Adapter) -> u32,
{
    let mut results = Vec::with_capacity(adapters.len());

    for adapter in adapters.values() {
        let metric = metric_for(adapter);
        let item = Item::InterfaceMetric {
            adapter: adapter.key.clone(),
            display_name: adapter.display_name.clone(),
            metric,
        };

        let outcome = match system.interface_index(&adapter.display_name).await {
            Ok(Some(_)) => match system.set_interface_metric(&adapter.display_name, metric).await {
                Ok(()) => {
                    tracing::info!(adapter = %adapter.key, metric, "Pinned interface metric");
                    Outcome::Applied
                }
                Err(e) => {
                    tracing::warn!(
                        adapter = %adapter.key,
                        metric,
                        error = %e,
                        "Skipping interface metric: {}",
                        e.reason()
                    );
                    Outcome::Failed(e.reason())
                }
            },
            Ok(None) => {
                tracing::warn!(
                    adapter = %adapter.key,
                    name = %adapter.display_name,
                    "Skipping interface metric: adapter not found"
                );
                Outcome::SkippedUnresolvedAdapter
            }
            Err(e) => {
                tracing::warn!(
                    adapter = %adapter.key,
                    error = %e,
                    "Skipping interface metric: adapter lookup failed"
                );
                Outcome::Failed(e.reason())
            }
        };

        results.push(ReconciliationResult::new(item, outcome));
    }

    results
}
