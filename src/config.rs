// Configuration management for multihome-routes
// Supports CLI arguments, config file (TOML), and environment variables

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

use crate::error::{AppError, AppResult};
use crate::routes::{Adapter, DefaultRoute, DesiredState, StaticRoute};

/// Pin static routes, per-adapter default routes and interface metrics on a multi-homed host.
///
/// Every run flushes the whole route table and re-applies the configured
/// routes. If a run is interrupted between the flush and the route
/// installation the host is left without routes; running the tool again
/// restores the configured state.
#[derive(Parser, Debug, Clone)]
#[command(name = "multihome-routes")]
#[command(author, version, about, long_about)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, env = "MHR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, env = "MHR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Seconds to wait after restarting adapters
    #[arg(long, env = "MHR_SETTLE_DELAY")]
    pub settle_delay: Option<u64>,

    /// Skip adapter restarts and the settle wait
    #[arg(long, env = "MHR_NO_SETTLE")]
    pub no_settle: bool,

    /// Seconds before an OS command is killed
    #[arg(long, env = "MHR_COMMAND_TIMEOUT")]
    pub command_timeout: Option<u64>,

    /// Write a JSON run report to this path
    #[arg(long, env = "MHR_REPORT")]
    pub report: Option<PathBuf>,

    /// Validate the configuration and exit without touching the host
    #[arg(long)]
    pub check: bool,
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Adapters keyed by the name routes refer to them by
    #[serde(default)]
    pub adapters: BTreeMap<String, AdapterConfig>,

    #[serde(default)]
    pub static_routes: Vec<StaticRoute>,

    #[serde(default)]
    pub default_routes: Vec<DefaultRoute>,

    #[serde(default)]
    pub settle: SettleConfig,

    #[serde(default)]
    pub commands: CommandConfig,

    #[serde(default)]
    pub interface_metrics: InterfaceMetricConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Adapter name as shown by the OS
    pub name: String,

    /// Interface metric to pin; derived from the default route when unset
    #[serde(default)]
    pub metric: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_settle_delay")]
    pub delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default = "default_command_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceMetricConfig {
    /// Metric for adapters with neither an explicit metric nor a default route
    #[serde(default = "default_interface_metric")]
    pub fallback: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_settle_delay() -> u64 {
    10
}
fn default_command_timeout() -> u64 {
    30
}
fn default_interface_metric() -> u32 {
    50
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SettleConfig {
    fn default() -> Self {
        SettleConfig {
            enabled: default_true(),
            delay_secs: default_settle_delay(),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        CommandConfig {
            timeout_secs: default_command_timeout(),
        }
    }
}

impl Default for InterfaceMetricConfig {
    fn default() -> Self {
        InterfaceMetricConfig {
            fallback: default_interface_metric(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

impl ConfigFile {
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str::<ConfigFile>(&content)?)
    }

    /// Build the immutable desired state, validating it on the way
    pub fn desired_state(&self) -> AppResult<DesiredState> {
        let adapters = self
            .adapters
            .iter()
            .map(|(key, cfg)| {
                let adapter = Adapter::new(key.clone(), cfg.name.clone());
                let adapter = match cfg.metric {
                    Some(metric) => adapter.with_metric(metric),
                    None => adapter,
                };
                (key.clone(), adapter)
            })
            .collect();

        Ok(DesiredState::new(
            adapters,
            self.static_routes.clone(),
            self.default_routes.clone(),
            self.interface_metrics.fallback,
        )?)
    }
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub source: PathBuf,
    pub log_level: Level,
    pub settle_delay: Option<Duration>,
    pub command_timeout: Duration,
    pub report: Option<PathBuf>,
    pub check_only: bool,
    pub desired: DesiredState,
}

impl Config {
    /// Load configuration from all sources (CLI args, config file, defaults)
    /// Priority: CLI args > Environment variables > Config file > Defaults
    pub fn load() -> anyhow::Result<Self> {
        let cli_args = CliArgs::parse();
        let source = locate_config(cli_args.config.as_deref())?;
        let config_file = ConfigFile::from_path(&source)?;
        Ok(Self::merge(cli_args, config_file, source)?)
    }

    pub fn merge(cli_args: CliArgs, config_file: ConfigFile, source: PathBuf) -> AppResult<Self> {
        let log_level = parse_log_level(
            cli_args
                .log_level
                .as_deref()
                .unwrap_or(&config_file.logging.level),
        )?;

        let settle_enabled = !cli_args.no_settle && config_file.settle.enabled;
        let settle_delay = settle_enabled.then(|| {
            Duration::from_secs(cli_args.settle_delay.unwrap_or(config_file.settle.delay_secs))
        });

        let command_timeout = Duration::from_secs(
            cli_args
                .command_timeout
                .unwrap_or(config_file.commands.timeout_secs),
        );
        if command_timeout.is_zero() {
            return Err(AppError::Config("command timeout must be at least 1s".to_string()));
        }

        let desired = config_file.desired_state()?;

        Ok(Config {
            source,
            log_level,
            settle_delay,
            command_timeout,
            report: cli_args.report,
            check_only: cli_args.check,
            desired,
        })
    }
}

fn locate_config(explicit: Option<&Path>) -> AppResult<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    // Try loading from default locations
    let default_paths = [
        PathBuf::from("multihome-routes.toml"),
        PathBuf::from("config.toml"),
    ];
    default_paths
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| {
            AppError::Config(
                "no configuration file given and none found in the working directory".to_string(),
            )
        })
}

fn parse_log_level(level_str: &str) -> AppResult<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(AppError::Config(format!("Invalid log level: {}", level_str))),
    }
}
