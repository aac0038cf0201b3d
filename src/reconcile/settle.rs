// Adapter link reset and quiescence wait

use std::time::Duration;

use crate::routes::Adapter;
use crate::system::RoutingSystem;

/// Restart every adapter's link, then wait `delay` for the stack to settle.
///
/// There is no portable "link is stable" signal, so the wait is a fixed
/// timed pause. Restart failures are logged and never block other adapters.
/// Returns the number of adapters that failed to restart.
pub async fn settle<'a, S, I>(system: &S, adapters: I, delay: Duration) -> usize
where
    S: RoutingSystem + ?Sized,
    I: IntoIterator<Item = &'a Adapter>,
{
    let mut failed = 0;

    for adapter in adapters {
        match system.restart_adapter(&adapter.display_name).await {
            Ok(()) => {
                tracing::info!(adapter = %adapter.key, name = %adapter.display_name, "Restarted adapter");
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(
                    adapter = %adapter.key,
                    name = %adapter.display_name,
                    error = %e,
                    "Skipping adapter restart"
                );
            }
        }
    }

    if !delay.is_zero() {
        tracing::info!("Waiting {}s for adapters to settle", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }

    failed
}
