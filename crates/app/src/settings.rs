//! Settings of the operator binary.
//!
//! Values come from an optional `settings.toml` (or the file given with
//! `--config`), then from `TRIMLEDGER__*` environment variables, e.g.
//! `TRIMLEDGER__ENGINE__MIN_SETTLEMENT_AMOUNT=100000`.
use config::{Config, ConfigError, Environment, File};
use engine::EngineConfig;
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    /// Level for the `trimledger` and `engine` targets.
    pub level: String,
    pub engine: EngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./trimledger.db?mode=rwc".to_string(),
            level: "info".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path.unwrap_or(DEFAULT_CONFIG_PATH)).required(false))
            .add_source(Environment::with_prefix("TRIMLEDGER").separator("__"))
            .build()?
            .try_deserialize()
    }
}
