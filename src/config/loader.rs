//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{RelayConfig, TenantMapping};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable {name} is invalid: {message}")]
    Env { name: &'static str, message: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override from the environment, and validate a TOML file.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: RelayConfig = toml::from_str(&content)?;
    finish(config)
}

/// Defaults plus environment overrides, for runs without a config file.
pub fn load_from_env() -> Result<RelayConfig, ConfigError> {
    finish(RelayConfig::default())
}

fn finish(mut config: RelayConfig) -> Result<RelayConfig, ConfigError> {
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `PORT`, `RELAY_LOCAL` and `Destination_Mapping` from `lookup`.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            name: "PORT",
            message: format!("'{}' is not a port number", port),
        })?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }

    if let Some(local) = lookup("RELAY_LOCAL") {
        config.runtime.local = Some(match local.trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                return Err(ConfigError::Env {
                    name: "RELAY_LOCAL",
                    message: format!("'{}' is not a boolean", other),
                })
            }
        });
    }

    if let Some(mapping) = lookup("Destination_Mapping") {
        config.tenants = parse_destination_mapping(&mapping)?;
    }

    Ok(())
}

/// Parse the JSON tenant table, e.g. `[{"tenant":"…","destination":"…"}]`.
pub fn parse_destination_mapping(raw: &str) -> Result<Vec<TenantMapping>, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Env {
        name: "Destination_Mapping",
        message: e.to_string(),
    })
}
