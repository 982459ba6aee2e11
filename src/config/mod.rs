use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

/// Environment variable prefix; nested keys are separated by `__`
/// (e.g. `BIRDNET_SPECIES_CACHE__TTL=12h`).
pub const ENV_PREFIX: &str = "BIRDNET_";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub species_cache: SpeciesCacheConfig,
    #[serde(default)]
    pub station: StationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
    #[serde(with = "duration_serde::duration", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    #[serde(with = "duration_serde::duration", default = "default_acquire_timeout")]
    pub acquire_timeout: Duration,
}

/// Species cache tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesCacheConfig {
    /// How long a full load stays fresh before `is_expired` reports true
    #[serde(with = "duration_serde::duration", default = "default_species_cache_ttl")]
    pub ttl: Duration,
    /// Upper bound on the bulk listing issued by `refresh`
    #[serde(default = "default_refresh_limit")]
    pub refresh_limit: u64,
    /// Refresh the cache once at startup when it is expired
    #[serde(default = "default_warm_on_startup")]
    pub warm_on_startup: bool,
}

/// Station settings stamped onto every detection built from classifier output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Source node identity persisted with each detection
    pub node_name: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}
fn default_acquire_timeout() -> Duration {
    Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS)
}
fn default_species_cache_ttl() -> Duration {
    Duration::from_secs(DEFAULT_SPECIES_CACHE_TTL_SECS)
}
fn default_refresh_limit() -> u64 {
    DEFAULT_SPECIES_REFRESH_LIMIT
}
fn default_warm_on_startup() -> bool {
    DEFAULT_WARM_ON_STARTUP
}
fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}
fn default_sensitivity() -> f64 {
    DEFAULT_SENSITIVITY
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
            connect_timeout: default_connect_timeout(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// Single-connection in-memory SQLite, used by tests and dry runs
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: Some(1),
            ..Self::default()
        }
    }
}

impl Default for SpeciesCacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_species_cache_ttl(),
            refresh_limit: default_refresh_limit(),
            warm_on_startup: default_warm_on_startup(),
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            node_name: DEFAULT_NODE_NAME.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            threshold: default_threshold(),
            sensitivity: default_sensitivity(),
        }
    }
}

impl Config {
    /// Defaults, overlaid by the TOML file (if present), overlaid by `BIRDNET_*` env vars
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !Path::new(config_file).exists() {
            info!("Config file {} not found, using defaults", config_file);
        }

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {config_file}"))
    }

    /// Write the default configuration as pretty TOML
    pub fn write_default(config_file: &str) -> Result<()> {
        let contents = toml::to_string_pretty(&Self::default())?;
        std::fs::write(config_file, contents)
            .with_context(|| format!("Failed to write default config to {config_file}"))?;
        info!("Created default config file: {}", config_file);
        Ok(())
    }
}
