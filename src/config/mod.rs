// Configuration
// Layered loading: optional TOML file, CONFLUENCE_* environment variables,
// plus the documented plain env vars (SERVER_PORT, SERVICE_MODE,
// POLL_INTERVAL) for container deployments.

mod exchanges;
mod sections;

pub use exchanges::{
    default_exchange_weight, default_quote_currencies, load_exchange_descriptors,
    ExchangeDescriptor, SymbolFormat,
};
pub use sections::{
    InfluxConfig, OutlierConfig, PollerConfig, PostgresConfig, ServerConfig, ServiceMode,
    SinkConfig, VwapConfig,
};

use std::env;
use std::path::{Path, PathBuf};

use config::{Config as RawConfig, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{ConfluenceError, ConfluenceResult};
use crate::logging::LoggingConfig;

/// Trait implemented by individual configuration sections.
///
/// Each section provides its key in the TOML document and semantic
/// validation; missing sections fall back to `Default`.
pub trait ConfigSection: DeserializeOwned + Default + Send + Sync {
    const KEY: &'static str;

    fn validate(&self) -> ConfluenceResult<()>;
}

/// Fully loaded process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub poller: PollerConfig,
    pub postgres: PostgresConfig,
    pub influx: InfluxConfig,
    pub vwap: VwapConfig,
    pub outlier: OutlierConfig,
    pub sink: SinkConfig,
}

impl Config {
    pub fn load(loader: &ConfigLoader) -> ConfluenceResult<Self> {
        let mut cfg = Self {
            server: loader.load_section()?,
            logging: loader.load_section()?,
            poller: loader.load_section()?,
            postgres: loader.load_section()?,
            influx: loader.load_section()?,
            vwap: loader.load_section()?,
            outlier: loader.load_section()?,
            sink: loader.load_section()?,
        };
        cfg.apply_process_env()?;
        Ok(cfg)
    }

    /// Documented plain environment variables override file values.
    fn apply_process_env(&mut self) -> ConfluenceResult<()> {
        if let Ok(port) = env::var("SERVER_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfluenceError::invalid_config_value("SERVER_PORT", port.clone()))?;
        }
        if let Ok(mode) = env::var("SERVICE_MODE") {
            self.server.service_mode = mode
                .parse()
                .map_err(|_| ConfluenceError::invalid_config_value("SERVICE_MODE", mode.clone()))?;
        }
        if let Ok(interval) = env::var("POLL_INTERVAL") {
            let secs: u64 = interval.trim().parse().map_err(|_| {
                ConfluenceError::invalid_config_value("POLL_INTERVAL", interval.clone())
            })?;
            if secs == 0 {
                return Err(ConfluenceError::invalid_config_value("POLL_INTERVAL", "0"));
            }
            self.poller.interval_secs = secs;
        }
        Ok(())
    }
}

/// Locates and builds the layered configuration sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    environment: String,
    explicit_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        Self {
            environment,
            explicit_file: None,
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_path(&self) -> PathBuf {
        match &self.explicit_file {
            Some(path) => path.clone(),
            None => default_path_for_environment(&self.environment),
        }
    }

    pub fn load_section<T>(&self) -> ConfluenceResult<T>
    where
        T: ConfigSection,
    {
        let raw = self.build()?;

        let section = match raw.get::<T>(T::KEY) {
            Ok(section) => section,
            Err(config::ConfigError::NotFound(_)) => T::default(),
            Err(e) => {
                return Err(ConfluenceError::configuration(format!(
                    "Failed to load '{}' configuration section: {e}",
                    T::KEY
                )))
            }
        };

        section.validate()?;
        Ok(section)
    }

    pub fn load_section_from_path<T>(path: impl AsRef<Path>) -> ConfluenceResult<T>
    where
        T: ConfigSection,
    {
        ConfigLoader::new()
            .with_file(path.as_ref().to_path_buf())
            .load_section::<T>()
    }

    pub fn build(&self) -> ConfluenceResult<RawConfig> {
        let mut builder = config::Config::builder();

        let path = self.config_path();
        if path.exists() {
            let path_str = path.to_string_lossy().into_owned();
            builder = builder.add_source(File::new(&path_str, FileFormat::Toml).required(true));
        } else {
            warn!(
                "Configuration file not found at {} - falling back to defaults and environment variables",
                path.display()
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("CONFLUENCE")
                .prefix_separator("_")
                .separator("__"),
        );

        builder.build().map_err(|e| {
            ConfluenceError::configuration(format!("Failed to build configuration sources: {e}"))
        })
    }
}

fn default_path_for_environment(environment: &str) -> PathBuf {
    match environment {
        "production" => PathBuf::from("config/production.toml"),
        "staging" => PathBuf::from("config/staging.toml"),
        _ => PathBuf::from("config/development.toml"),
    }
}
