// Route table reset

use crate::system::{Error, RoutingSystem};

/// Flush the whole route table, including routes this tool does not manage.
///
/// Must complete before any route is installed. The caller aborts the run
/// on error since the resulting baseline is unknown.
pub async fn reset<S>(system: &S) -> Result<(), Error>
where
    S: RoutingSystem + ?Sized,
{
    tracing::info!("Flushing route table");
    system.flush_routes().await?;
    tracing::info!("Route table flushed");
    Ok(())
}
