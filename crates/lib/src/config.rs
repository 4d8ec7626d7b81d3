//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.parley/config.json`) and
//! environment. Kept minimal: handler name, gateway bind/port, matching mode.

use crate::matching::MatchingMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Handler registration settings.
    #[serde(default)]
    pub handler: HandlerConfig,

    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Recipient matching settings.
    #[serde(default)]
    pub matching: MatchingConfig,
}

/// Handler registration: the well-known name announced on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerConfig {
    /// Well-known handler name. Overridden by PARLEY_HANDLER_NAME env when set.
    #[serde(default = "default_handler_name")]
    pub name: String,
}

/// Gateway bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the HTTP ingest surface (default 15252).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

/// How remote uids are compared when deduplicating conversations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingConfig {
    /// "phone" (default): formatted phone numbers for the same line compare
    /// equal. "exact": plain string equality.
    #[serde(default)]
    pub mode: MatchingMode,
}

fn default_handler_name() -> String {
    "org.nemomobile.Parley".to_string()
}

fn default_gateway_port() -> u16 {
    15252
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            name: default_handler_name(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Resolve the handler name: env PARLEY_HANDLER_NAME overrides config.
pub fn resolve_handler_name(config: &Config) -> String {
    std::env::var("PARLEY_HANDLER_NAME")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config.handler.name.trim().to_string())
}

/// Resolve config path from env or default (~/.parley/config.json).
pub fn default_config_path() -> PathBuf {
    std::env::var("PARLEY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".parley").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the default path (or PARLEY_CONFIG_PATH). Missing file =>
/// default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Create the config directory and a default config.json if absent. Returns
/// the config directory.
pub fn init_config_dir(path: &PathBuf) -> Result<PathBuf> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."))
        .to_path_buf();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating config directory {}", dir.display()))?;
    if !path.exists() {
        let default = serde_json::to_string_pretty(&Config::default())?;
        std::fs::write(path, default)
            .with_context(|| format!("writing default config to {}", path.display()))?;
    }
    Ok(dir)
}
