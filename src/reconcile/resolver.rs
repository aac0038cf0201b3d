// Adapter resolution: display name -> current interface index

use std::collections::BTreeMap;

use crate::routes::Adapter;
use crate::system::RoutingSystem;

/// Point-in-time lookup of every adapter's interface index.
///
/// Returns updated copies. An adapter that is missing, disabled, or whose
/// lookup errors keeps `ifindex: None`; that is reported but never fatal.
pub async fn resolve<S>(system: &S, adapters: &BTreeMap<String, Adapter>) -> BTreeMap<String, Adapter>
where
    S: RoutingSystem + ?Sized,
{
    let mut resolved = BTreeMap::new();

    for (key, adapter) in adapters {
        let mut adapter = adapter.clone();
        adapter.ifindex = match system.interface_index(&adapter.display_name).await {
            Ok(Some(ifindex)) => {
                tracing::info!(adapter = %key, name = %adapter.display_name, ifindex, "Resolved adapter");
                Some(ifindex)
            }
            Ok(None) => {
                tracing::warn!(
                    adapter = %key,
                    name = %adapter.display_name,
                    "Adapter not found or disabled, routes bound to it will be skipped"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    adapter = %key,
                    name = %adapter.display_name,
                    error = %e,
                    "Adapter lookup failed, routes bound to it will be skipped"
                );
                None
            }
        };
        resolved.insert(key.clone(), adapter);
    }

    resolved
}
