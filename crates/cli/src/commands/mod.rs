pub mod chat;
pub mod config_cmd;
pub mod ingest;

use anmi_config::AppConfig;
use std::path::Path;

/// Load configuration, turning the error into an operator-facing message.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load_with(path).map_err(|e| format!("Failed to load config: {e}").into())
}
