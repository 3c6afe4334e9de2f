use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::query::{
    QueryDefaults, DEFAULT_LIMIT, DEFAULT_LOOK_BACK_DELTA_MS, DEFAULT_MAX_HOPS,
    DEFAULT_MAX_SERIES_POINTS, DEFAULT_STEP_MS, MAX_ALLOWED_HOPS,
};

/// Env var naming the config file; defaults to `./relgraph.toml`.
pub const CONFIG_ENV: &str = "RELGRAPH_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "relgraph.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relation: RelationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Traversal and query defaults
#[derive(Debug, Clone, Deserialize)]
pub struct RelationConfig {
    #[serde(default = "default_max_hops")]
    pub default_max_hops: usize,
    #[serde(default = "default_max_allowed_hops")]
    pub max_allowed_hops: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_look_back_delta_ms")]
    pub default_look_back_delta_ms: i64,
    #[serde(default = "default_step_ms")]
    pub default_step_ms: i64,
    #[serde(default = "default_max_series_points")]
    pub max_series_points: usize,
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            default_max_hops: default_max_hops(),
            max_allowed_hops: default_max_allowed_hops(),
            default_limit: default_limit(),
            default_look_back_delta_ms: default_look_back_delta_ms(),
            default_step_ms: default_step_ms(),
            max_series_points: default_max_series_points(),
        }
    }
}

fn default_max_hops() -> usize {
    DEFAULT_MAX_HOPS
}

fn default_max_allowed_hops() -> usize {
    MAX_ALLOWED_HOPS
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_look_back_delta_ms() -> i64 {
    DEFAULT_LOOK_BACK_DELTA_MS
}

fn default_step_ms() -> i64 {
    DEFAULT_STEP_MS
}

fn default_max_series_points() -> usize {
    DEFAULT_MAX_SERIES_POINTS
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads `.env` (if present) first, then reads the file named by
    /// `RELGRAPH_CONFIG`, or `./relgraph.toml`.
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = Self::config_path();
        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = Self::config_path();
        if !config_path.exists() {
            log::debug!(
                "no config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn config_path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let relation = &self.relation;

        if relation.default_max_hops == 0 {
            anyhow::bail!("relation.default_max_hops must be greater than 0");
        }

        if relation.max_allowed_hops < relation.default_max_hops {
            anyhow::bail!(
                "relation.max_allowed_hops ({}) must be at least default_max_hops ({})",
                relation.max_allowed_hops,
                relation.default_max_hops
            );
        }

        if relation.default_limit == 0 {
            anyhow::bail!("relation.default_limit must be greater than 0");
        }

        if relation.default_look_back_delta_ms <= 0 {
            anyhow::bail!("relation.default_look_back_delta_ms must be greater than 0");
        }

        if relation.default_step_ms <= 0 {
            anyhow::bail!("relation.default_step_ms must be greater than 0");
        }

        if relation.max_series_points == 0 {
            anyhow::bail!("relation.max_series_points must be greater than 0");
        }

        Ok(())
    }

    /// Query defaults described by the `[relation]` section.
    pub fn query_defaults(&self) -> QueryDefaults {
        QueryDefaults {
            default_max_hops: self.relation.default_max_hops,
            max_allowed_hops: self.relation.max_allowed_hops,
            default_limit: self.relation.default_limit,
            default_look_back_delta_ms: self.relation.default_look_back_delta_ms,
            default_step_ms: self.relation.default_step_ms,
            max_series_points: self.relation.max_series_points,
        }
    }

    /// Install the `[relation]` values as the process-wide query defaults.
    pub fn apply(&self) {
        self.query_defaults().install();
    }
}
