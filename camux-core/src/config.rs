use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "CAMUX_CONFIG_PATH";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "camux.yaml";

/// Interval between grant extensions. The upstream grant lives about five
/// minutes; renewing at four leaves a minute of margin.
pub const DEFAULT_EXTENSION_INTERVAL: Duration = Duration::from_secs(240);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Settings for a viewer talking to the stream proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Base URL of the proxy exposing `/api/stream/...` and `/api/devices`
    pub api_base_url: String,
    /// Sent as `Authorization: Bearer ...` when set
    pub bearer_token: Option<String>,
    pub request_timeout_seconds: u64,
    pub extension_interval_seconds: u64,
    pub logging: LoggingConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            bearer_token: None,
            request_timeout_seconds: 30,
            extension_interval_seconds: DEFAULT_EXTENSION_INTERVAL.as_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        load_layered(config_file)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    #[must_use]
    pub const fn extension_interval(&self) -> Duration {
        Duration::from_secs(self.extension_interval_seconds)
    }

    /// Validate configuration, returning every problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if url::Url::parse(&self.api_base_url).is_err() {
            errors.push(format!("api_base_url is not a valid URL: {}", self.api_base_url));
        }
        if self.request_timeout_seconds == 0 {
            errors.push("request_timeout_seconds must be greater than zero".to_string());
        }
        if self.extension_interval_seconds == 0 {
            errors.push("extension_interval_seconds must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Layer an optional file under `CAMUX_*` environment variables.
///
/// Nested keys use `__` so field names keep their underscores
/// (`CAMUX_LOGGING__LEVEL`).
pub fn load_layered<T: serde::de::DeserializeOwned>(
    config_file: Option<&str>,
) -> Result<T, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    if let Some(path) = config_file {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("CAMUX")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// Config file search order:
/// 1. `CAMUX_CONFIG_PATH` environment variable (explicit path)
/// 2. `./camux.yaml`
/// 3. None (environment variables only)
#[must_use]
pub fn discover_config_path() -> Option<String> {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| Path::new(p).exists())
        .or_else(|| {
            Path::new(DEFAULT_CONFIG_FILE)
                .exists()
                .then(|| DEFAULT_CONFIG_FILE.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.extension_interval(), Duration::from_secs(240));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_all_errors() {
        let config = ViewerConfig {
            api_base_url: "nope".to_string(),
            request_timeout_seconds: 0,
            extension_interval_seconds: 0,
            ..ViewerConfig::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("viewer.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "api_base_url: http://proxy.local:5000\nextension_interval_seconds: 60\nlogging:\n  level: debug"
        )
        .unwrap();

        let config = ViewerConfig::load(path.to_str()).unwrap();
        assert_eq!(config.api_base_url, "http://proxy.local:5000");
        assert_eq!(config.extension_interval_seconds, 60);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.request_timeout_seconds, 30);
    }
}
