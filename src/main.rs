mod command;
mod config;
mod error;
mod reconcile;
mod routes;
mod system;

use std::process::ExitCode;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::AppError;
use reconcile::{ReconcileSettings, Reconciler, RunReport};
use system::windows::WindowsRoutingSystem;

const EXIT_DEGRADED: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            let message = e
                .downcast_ref::<AppError>()
                .map(|app| format!("{}\n{}", app, app.user_message()))
                .unwrap_or_else(|| format!("{:#}", e));
            eprintln!("{}", message);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    // Initialize logging; RUST_LOG directives take precedence over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(config.log_level).into())
                .from_env_lossy(),
        )
        .init();

    tracing::info!("multihome-routes starting");
    tracing::info!("Loaded configuration from: {}", config.source.display());
    for key in config.desired.unknown_adapter_keys() {
        tracing::warn!(adapter = %key, "Default route references an adapter that is not configured");
    }

    if config.check_only {
        let desired = &config.desired;
        tracing::info!(
            adapters = desired.adapters().len(),
            static_routes = desired.static_routes().len(),
            default_routes = desired.default_routes().len(),
            "Configuration is valid"
        );
        return ExitCode::SUCCESS;
    }

    if !cfg!(windows) {
        tracing::error!("Only the Windows route table is supported on this host");
        return ExitCode::from(EXIT_FATAL);
    }

    let system = WindowsRoutingSystem::new(config.command_timeout);
    let settings = ReconcileSettings {
        settle_delay: config.settle_delay,
    };

    let report = match Reconciler::new(&system, settings).run(&config.desired).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e.user_message());
            return ExitCode::from(EXIT_FATAL);
        }
    };

    print_report(&report);

    if let Some(path) = &config.report {
        match report.write_json(path) {
            Ok(()) => tracing::info!("Run report written to {}", path.display()),
            Err(e) => tracing::error!("Failed to write run report: {}", e),
        }
    }

    if report.is_converged() {
        tracing::info!("Routing state converged");
        ExitCode::SUCCESS
    } else {
        tracing::warn!("Routing state only partially applied, see skipped and failed items above");
        ExitCode::from(EXIT_DEGRADED)
    }
}

fn print_report(report: &RunReport) {
    println!();
    for result in report.routes.iter().chain(report.metrics.iter()) {
        println!("{:<70} {}", result.item.to_string(), result.outcome);
    }

    let summary = report.summary();
    println!(
        "\n{} applied, {} skipped, {} failed",
        summary.applied, summary.skipped, summary.failed
    );

    match &report.table {
        Some(table) => {
            println!("\n{}", table);
            tracing::info!(
                total = table.routes.len(),
                persistent = table.persistent().count(),
                "Route table read back"
            );
        }
        None => println!("\nRoute table could not be read back"),
    }
}
