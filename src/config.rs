use std::path::PathBuf;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::features::{DEFAULT_REFERENCE_YEAR, FeatureDeriver};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub network: NetworkConfig,
    pub features: FeaturesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Session token attached as a bearer token, if logged in
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeaturesConfig {
    /// First calendar year encoded as `yr = 1`; tied to the model's training data
    pub reference_year: i32,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            reference_year: DEFAULT_REFERENCE_YEAR,
        }
    }
}

impl FeaturesConfig {
    pub fn deriver(&self) -> FeatureDeriver {
        if self.reference_year != DEFAULT_REFERENCE_YEAR {
            tracing::warn!(
                "Using reference year {} instead of {}",
                self.reference_year,
                DEFAULT_REFERENCE_YEAR
            );
        }
        FeatureDeriver::new(self.reference_year)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bikecast");

        let builder = Config::builder()
            // 1. Load default values
            // API
            .set_default("api.base_url", "http://localhost:5000/api")?
            .set_default("api.token", None::<String>)?
            // Network
            .set_default("network.request_timeout_secs", 30)?
            .set_default("network.connect_timeout_secs", 10)?
            // Features
            .set_default("features.reference_year", DEFAULT_REFERENCE_YEAR)?

            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))

            // 4. Load from Environment variables (BIKECAST__API__BASE_URL=...)
            .add_source(Environment::with_prefix("BIKECAST").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }
}
