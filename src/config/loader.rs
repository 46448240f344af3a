//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered in order:
//! `fabflow.toml`, then `fabflow.{environment}.toml`, then `FABFLOW__SECTION__KEY`
//! environment variables. Missing files are skipped, so defaults always apply.

use super::error::{ConfigResult, ConfigurationError};
use super::FabflowConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base file name for configuration sources
const CONFIG_FILE_STEM: &str = "fabflow";

/// Loaded, validated configuration plus where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: FabflowConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with an explicit environment
    ///
    /// An explicitly given directory must exist; the default directory may be absent.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = match config_dir {
            Some(dir) => {
                if !dir.is_dir() {
                    return Err(ConfigurationError::DirectoryNotFound { path: dir });
                }
                dir
            }
            None => Self::default_config_directory(),
        };

        debug!(
            environment = environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::build_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = environment,
            max_concurrent_workflows = config.orchestration.max_concurrent_workflows,
            step_max_retries = config.orchestration.step_max_retries,
            queue_capacity = ?config.queue.capacity,
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an in-code configuration after validating it
    pub fn from_config(config: FabflowConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: Self::default_config_directory(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &FabflowConfig {
        &self.config
    }

    /// Get the environment the configuration was loaded for
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect environment: FABFLOW_ENV, then APP_ENV, then "development"
    pub fn detect_environment() -> String {
        env::var("FABFLOW_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("FABFLOW_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn build_config(config_directory: &Path, environment: &str) -> ConfigResult<FabflowConfig> {
        let base = config_directory.join(format!("{CONFIG_FILE_STEM}.toml"));
        let overlay = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.toml"));

        let settings = Config::builder()
            .add_source(File::from(base).required(false))
            .add_source(File::from(overlay).required(false))
            .add_source(
                Environment::with_prefix("FABFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_failed(environment, e.to_string()))?;

        settings
            .try_deserialize::<FabflowConfig>()
            .map_err(|e| ConfigurationError::load_failed(environment, e.to_string()))
    }
}
