// src/config.rs

//! Configuration loading utilities.
//!
//! Reads the TOML file and then applies environment overrides, so a
//! container can change the source, gateway and destination without
//! shipping a new file.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::Config;

/// Environment variables that override file settings.
pub const ENV_SOURCE_URL: &str = "SOURCE_URL";
pub const ENV_TRANSPORT_URL: &str = "TRANSPORT_URL";
pub const ENV_DESTINATION: &str = "DESTINATION";
pub const ENV_LEDGER_PATH: &str = "LEDGER_PATH";
pub const ENV_PORT: &str = "PORT";

/// Load configuration from a TOML file and the process environment.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load(path)?;
    apply_env_overrides(&mut config, process_env);
    Ok(config)
}

/// Default configuration with the process environment applied, used when
/// the file cannot be loaded.
pub fn default_config() -> Config {
    let mut config = Config::default();
    apply_env_overrides(&mut config, process_env);
    config
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Apply overrides from `lookup`; blank values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(url) = get(ENV_SOURCE_URL) {
        config.source.url = url;
    }
    if let Some(endpoint) = get(ENV_TRANSPORT_URL) {
        config.transport.endpoint = endpoint;
    }
    if let Some(destination) = get(ENV_DESTINATION) {
        config.delivery.destination = destination;
    }
    if let Some(path) = get(ENV_LEDGER_PATH) {
        config.storage.ledger_path = PathBuf::from(path);
    }
    if let Some(port) = get(ENV_PORT) {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => log::warn!("Ignoring invalid {}={:?}", ENV_PORT, port),
        }
    }
}
