//! `anmi config` — Configuration management.

use anmi_config::AppConfig;
use std::path::Path;

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    println!("{config:#?}");

    let mut warnings = Vec::new();
    if config.require_api_key().is_err() {
        warnings.push("No API key set (ANMI_API_KEY or GEMINI_API_KEY)".to_string());
    }
    if let Err(e) = config.require_search() {
        warnings.push(format!("Index not configured: {e}"));
    }
    if !warnings.is_empty() {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }
    Ok(())
}

pub async fn init(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    if path.exists() {
        println!("   Config already exists at {}", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, AppConfig::default_toml()).await?;
    println!("   ✅ Wrote default config to {}", path.display());
    Ok(())
}
