//! Service configuration management
//!
//! Defaults, then an optional TOML file, then `CLUB_*` environment
//! variables, then validation.

use crate::error::{Result, ServiceError};
use persistence::{BackendKind, PersistenceConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service-level configuration
    pub service: ServiceSettings,

    /// Persistence configuration
    pub persistence: PersistenceConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Token to account mapping
    pub auth: AuthConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Club name printed in report headers
    pub club_name: String,

    /// Currency label printed next to amounts
    pub currency: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

/// Static token map used by the shipped auth provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token to account id
    pub tokens: BTreeMap<String, String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            club_name: "Badminton Club".to_string(),
            currency: "THB".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn".to_string(), format: "compact".to_string() }
    }
}

/// Load configuration from an optional file and the environment
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    dotenv::dotenv().ok();

    let path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("CLUB_CONFIG").ok().map(PathBuf::from));
    let mut config = match path {
        Some(path) => load_from_file(&path)?,
        None => ServiceConfig::default(),
    };

    // Override with environment variables
    apply_env(&mut config, |key| std::env::var(key).ok())?;

    // Validate configuration
    validate_config(&config)?;

    Ok(config)
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path) -> Result<ServiceConfig> {
    tracing::debug!("Loading configuration from file: {:?}", path);
    let content = std::fs::read_to_string(path).map_err(|e| {
        ServiceError::configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    toml::from_str(&content)
        .map_err(|e| ServiceError::configuration(format!("cannot parse {}: {e}", path.display())))
}

/// Apply `CLUB_*` overrides read through `lookup`
pub fn apply_env(
    config: &mut ServiceConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(level) = lookup("CLUB_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Some(format) = lookup("CLUB_LOG_FORMAT") {
        config.logging.format = format;
    }

    if let Some(data_dir) = lookup("CLUB_DATA_DIR") {
        config.persistence.data_dir = PathBuf::from(data_dir);
    }

    if let Some(backend) = lookup("CLUB_BACKEND") {
        config.persistence.backend = match backend.to_ascii_lowercase().as_str() {
            "local" => BackendKind::Local,
            "memory" => BackendKind::Memory,
            other => {
                return Err(ServiceError::configuration(format!("Invalid backend: {other}")))
            }
        };
    }

    // CLUB_TOKENS="token=account,token2=account2"
    if let Some(tokens) = lookup("CLUB_TOKENS") {
        for pair in tokens.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (token, account) = pair.split_once('=').ok_or_else(|| {
                ServiceError::configuration(format!(
                    "CLUB_TOKENS entry {pair:?} is not token=account"
                ))
            })?;
            config.auth.tokens.insert(token.trim().to_string(), account.trim().to_string());
        }
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    // Validate log level
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => {
            return Err(ServiceError::configuration(format!(
                "Invalid log level: {}",
                config.logging.level
            )))
        }
    }

    // Validate log format
    match config.logging.format.as_str() {
        "json" | "pretty" | "compact" => {}
        _ => {
            return Err(ServiceError::configuration(format!(
                "Invalid log format: {}",
                config.logging.format
            )))
        }
    }

    config.persistence.validate().map_err(ServiceError::configuration)?;

    // Validate data directory
    if config.persistence.backend == BackendKind::Local && !config.persistence.data_dir.exists() {
        std::fs::create_dir_all(&config.persistence.data_dir).map_err(|e| {
            ServiceError::configuration(format!(
                "Failed to create data directory {:?}: {e}",
                config.persistence.data_dir
            ))
        })?;
    }

    Ok(())
}
