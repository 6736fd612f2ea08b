//! Proxy configuration

use anyhow::Result;
use camux_core::config::{discover_config_path, load_layered, LoggingConfig};
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SDM_BASE_URL: &str = "https://smartdevicemanagement.googleapis.com/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub host: String,
    pub http_port: u16,
    /// Device Access project; device names are `enterprises/{project_id}/devices/{id}`
    pub project_id: String,
    pub sdm_base_url: String,
    /// Allowed CORS origin, credentials included
    pub frontend_url: String,
    pub request_timeout_seconds: u64,
    pub logging: LoggingConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 5000,
            project_id: String::new(),
            sdm_base_url: DEFAULT_SDM_BASE_URL.to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            request_timeout_seconds: 30,
            logging: LoggingConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (`CAMUX_PROJECT_ID`, `CAMUX_LOGGING__LEVEL`, ...)
    /// 2. Config file (if provided)
    /// 3. Defaults
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        load_layered(config_file)
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.project_id.trim().is_empty() {
            errors.push("project_id is required".to_string());
        }
        if url::Url::parse(&self.sdm_base_url).is_err() {
            errors.push(format!("sdm_base_url is not a valid URL: {}", self.sdm_base_url));
        }
        if url::Url::parse(&self.frontend_url).is_err() {
            errors.push(format!("frontend_url is not a valid URL: {}", self.frontend_url));
        }
        if self.request_timeout_seconds == 0 {
            errors.push("request_timeout_seconds must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Load configuration from a config file or environment variables
///
/// Config file search order:
/// 1. explicit path (command line or `CAMUX_CONFIG_PATH`)
/// 2. ./camux.yaml
/// 3. Fall back to environment variables only
pub fn load_config(explicit_path: Option<&str>) -> Result<ProxyConfig> {
    let config_path = explicit_path
        .map(ToString::to_string)
        .or_else(discover_config_path);

    let config = match config_path {
        Some(ref path) => {
            eprintln!("Loading config from {path}");
            ProxyConfig::load(Some(path))?
        }
        None => {
            eprintln!("No config file found, using environment variables");
            ProxyConfig::load(None)?
        }
    };

    if let Err(errors) = config.validate() {
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}
