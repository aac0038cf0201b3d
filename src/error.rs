// Error types for multihome-routes

use thiserror::Error;

use crate::routes::ValidationError;
use crate::system;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid desired state: {0}")]
    InvalidDesiredState(#[from] ValidationError),

    #[error("Route table reset failed: {0}")]
    ResetFailed(#[source] system::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Convert error to user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(_) | AppError::ConfigParse(_) => {
                "Configuration error. Check your config file or command-line arguments.".to_string()
            }
            AppError::InvalidDesiredState(e) => {
                format!("The route configuration was rejected before any change was made: {}", e)
            }
            AppError::ResetFailed(_) => {
                "Could not flush the route table. No routes were installed. \
                 Make sure the tool runs from an elevated prompt."
                    .to_string()
            }
            AppError::Io(_) => "File system error. Check permissions and disk space.".to_string(),
            AppError::Serialization(_) => {
                "Data format error. This might be a bug, please report it.".to_string()
            }
        }
    }
}
