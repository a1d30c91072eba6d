//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles YAML file discovery,
//! environment detection, environment-section merging and the
//! `READYSET_URL` / `DATABASE_URL` overrides.

use super::error::{ConfigResult, ConfigurationError};
use super::ReadysetConfig;
use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

const ENVIRONMENT_SECTIONS: [&str; 3] = ["development", "test", "production"];

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: ReadysetConfig,
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

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let mut config = Self::load_and_merge_config(&config_directory, environment)?;
        Self::apply_env_overrides(&mut config, |name| env::var(name).ok());
        config.validate()?;

        info!(
            environment = %environment,
            shard = %config.shard,
            failover_enabled = config.failover.enabled,
            error_window_size = config.failover.error_window_size,
            "Configuration loaded successfully"
        );
        debug!(
            "Configuration: {}",
            serde_json::to_string(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration (validated first)
    pub fn from_config(config: ReadysetConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ReadysetConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with credentials masked, safe to print or log
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    /// Safely read a configuration file with a size limit
    fn read_config_file_safely(path: &Path) -> ConfigResult<String> {
        const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

        let metadata = std::fs::metadata(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigurationError::invalid_value(
                "file_size",
                metadata.len().to_string(),
                format!("Configuration file larger than {MAX_CONFIG_FILE_SIZE} bytes"),
            ));
        }

        if !metadata.is_file() {
            return Err(ConfigurationError::invalid_value(
                "file_type",
                "directory or special file",
                "Configuration path must point to a regular file",
            ));
        }

        std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }

    fn sanitize_config_for_logging(config: &ReadysetConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        Self::sanitize_json_recursive(&mut config_json);
        config_json
    }

    /// Mask passwords embedded in connection URLs
    fn sanitize_json_recursive(value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (_, val) in map.iter_mut() {
                    Self::sanitize_json_recursive(val);
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item);
                }
            }
            serde_json::Value::String(s) => {
                *s = mask_url_password(s);
            }
            _ => {}
        }
    }

    /// Detect current environment from environment variables
    fn detect_environment() -> String {
        env::var("READYSET_ENV")
            .or_else(|_| env::var("RAILS_ENV"))
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var("READYSET_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        let mut searched_paths = Vec::new();

        for name in ["readyset.yaml", "readyset.yml"] {
            let config_path = config_directory.join(name);
            searched_paths.push(config_path.clone());

            if config_path.exists() {
                debug!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        Err(ConfigurationError::config_file_not_found(searched_paths))
    }

    /// Load the file and merge the section for `environment` over the base values
    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<ReadysetConfig> {
        let config_file = Self::find_config_file(config_directory)?;
        let yaml_content = Self::read_config_file_safely(&config_file)?;
        Self::parse_with_environment(&yaml_content, environment)
            .map_err(|e| match e {
                ConfigurationError::InvalidYaml { message, .. } => {
                    ConfigurationError::invalid_yaml(config_file.display().to_string(), message)
                }
                other => other,
            })
    }

    fn parse_with_environment(yaml_content: &str, environment: &str) -> ConfigResult<ReadysetConfig> {
        let mut yaml_data: YamlValue = serde_yaml::from_str(yaml_content)
            .map_err(|e| ConfigurationError::invalid_yaml("<inline>", e))?;

        if yaml_data.is_null() {
            yaml_data = YamlValue::Mapping(Default::default());
        }

        if let Some(env_overrides) = yaml_data
            .get(YamlValue::String(environment.to_string()))
            .cloned()
        {
            debug!("Applying environment-specific overrides for: {}", environment);
            Self::merge_yaml_values(&mut yaml_data, env_overrides);
        }

        if let YamlValue::Mapping(ref mut map) = yaml_data {
            for section in ENVIRONMENT_SECTIONS {
                map.remove(YamlValue::String(section.to_string()));
            }
        }

        serde_yaml::from_value(yaml_data).map_err(|e| {
            ConfigurationError::invalid_yaml(
                "<inline>",
                format!("Failed to deserialize configuration: {e}"),
            )
        })
    }

    /// Recursively merge YAML values (environment overrides into base config)
    fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) {
        match (&mut *base, override_value) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    if let Some(existing_value) = base_map.get_mut(&key) {
                        Self::merge_yaml_values(existing_value, value);
                    } else {
                        base_map.insert(key, value);
                    }
                }
            }
            (base_ref, override_val) => {
                *base_ref = override_val;
            }
        }
    }

    /// `READYSET_URL` and `DATABASE_URL` win over file values
    fn apply_env_overrides(config: &mut ReadysetConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("READYSET_URL").filter(|url| !url.is_empty()) {
            debug!("Using READYSET_URL from environment");
            config.readyset_url = Some(url);
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|url| !url.is_empty()) {
            debug!("Using DATABASE_URL from environment");
            config.primary_url = Some(url);
        }
    }
}

/// Mask credentials in a connection URL: the userinfo password and any
/// `password` query parameter become `***`. Values that are not URLs, or
/// carry no credentials, come back unchanged.
pub fn mask_url_password(value: &str) -> String {
    const MASK: &str = "***";

    let Ok(mut url) = Url::parse(value) else {
        return value.to_string();
    };
    let mut masked = false;

    if url.password().is_some() {
        if url.set_password(Some(MASK)).is_err() {
            return value.to_string();
        }
        masked = true;
    }

    if url.query_pairs().any(|(key, _)| key == "password") {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, val)| {
                let val = if key == "password" { MASK.to_string() } else { val.into_owned() };
                (key.into_owned(), val)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        masked = true;
    }

    if masked {
        url.to_string()
    } else {
        value.to_string()
    }
}
