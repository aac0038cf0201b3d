// Reconciliation engine - converges the host route table to a desired state
//
// Stage order is fixed and each stage finishes before the next starts:
// resolve -> reset -> settle -> static -> default -> settle -> metrics -> read-back

pub mod installer;
pub mod metrics;
pub mod report;
pub mod reset;
pub mod resolver;
pub mod settle;

use std::time::Duration;
use tracing::Instrument;

use crate::error::{AppError, AppResult};
use crate::routes::DesiredState;
use crate::system::RoutingSystem;

pub use report::{Item, Outcome, RunReport};

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Quiescence wait after adapter restarts; None skips both settle stages
    pub settle_delay: Option<Duration>,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        ReconcileSettings {
            settle_delay: Some(Duration::from_secs(10)),
        }
    }
}

pub struct Reconciler<'a, S: RoutingSystem + ?Sized> {
    system: &'a S,
    settings: ReconcileSettings,
}

impl<'a, S: RoutingSystem + ?Sized> Reconciler<'a, S> {
    pub fn new(system: &'a S, settings: ReconcileSettings) -> Self {
        Reconciler { system, settings }
    }

    /// Run one full reconciliation.
    ///
    /// Only a failed reset is fatal. Everything else is recorded in the
    /// report and the run carries on. An interruption between reset and
    /// installation leaves the host without routes until the next run.
    pub async fn run(&self, desired: &DesiredState) -> AppResult<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("reconcile", run_id = %run_id);
        self.run_stages(desired, run_id).instrument(span).await
    }

    async fn run_stages(&self, desired: &DesiredState, run_id: String) -> AppResult<RunReport> {
        let started_at = chrono::Utc::now().to_rfc3339();

        tracing::info!(
            adapters = desired.adapters().len(),
            static_routes = desired.static_routes().len(),
            default_routes = desired.default_routes().len(),
            "Starting reconciliation"
        );

        tracing::info!("[1/7] Resolving adapters");
        let resolved = resolver::resolve(self.system, desired.adapters()).await;

        tracing::info!("[2/7] Resetting route table");
        if let Err(e) = reset::reset(self.system).await {
            tracing::error!(error = %e, "Route table reset failed, aborting");
            return Err(AppError::ResetFailed(e));
        }

        self.settle("[3/7] Restarting adapters for a clean link state", desired)
            .await;

        tracing::info!("[4/7] Installing static routes");
        let mut routes = installer::install_static(self.system, desired.static_routes()).await;

        tracing::info!("[5/7] Installing default routes");
        routes.extend(
            installer::install_default(self.system, desired.default_routes(), &resolved).await,
        );

        self.settle("[6/7] Restarting adapters to register new routes", desired)
            .await;

        tracing::info!("[7/7] Pinning interface metrics");
        let metrics =
            metrics::enforce(self.system, desired.adapters(), |a| desired.interface_metric(a))
                .await;

        tracing::info!("Reading back route table");
        let table = match self.system.list_routes().await {
            Ok(table) => Some(table),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read back route table");
                None
            }
        };

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            adapters: resolved.into_values().collect(),
            routes,
            metrics,
            table,
        })
    }

    async fn settle(&self, stage: &str, desired: &DesiredState) {
        match self.settings.settle_delay {
            Some(delay) => {
                tracing::info!("{}", stage);
                let failed = settle::settle(self.system, desired.adapters().values(), delay).await;
                if failed > 0 {
                    tracing::warn!(failed, "Some adapters could not be restarted");
                }
            }
            None => tracing::info!("{} (disabled)", stage),
        }
    }
}
