//! API endpoint configuration
//!
//! Supports loading the CRM service location from (in order of priority):
//! 1. JSON file (~/.config/leadline/api.json)
//! 2. Runtime environment variables (fallback)

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::api::{LcpClient, RequestGateway, UreqTransport};

/// Config filename in the Leadline config directory
const API_CONFIG_FILE: &str = "api.json";

/// Location and credentials of the CRM service
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL all endpoint paths are resolved against
    pub base_url: Url,
    /// Bearer token, when the deployment requires one
    pub api_key: Option<String>,
}

/// On-disk config file format
#[derive(Deserialize)]
struct ApiConfigFile {
    base_url: String,
    #[serde(default)]
    api_key: Option<String>,
}

impl ApiConfig {
    /// Load configuration using the following priority:
    /// 1. JSON file (~/.config/leadline/api.json)
    /// 2. Runtime environment variables
    pub fn load() -> Result<Self> {
        if config::config_exists(API_CONFIG_FILE) {
            let file: ApiConfigFile = config::load_json(API_CONFIG_FILE)?;
            return Self::from_file_format(file);
        }

        Self::from_env()
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ApiConfigFile =
            serde_json::from_str(json).context("Failed to parse API config JSON")?;
        Self::from_file_format(file)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("LEADLINE_API_URL")
            .context("LEADLINE_API_URL environment variable not set")?;
        Self::from_file_format(ApiConfigFile {
            base_url,
            api_key: std::env::var("LEADLINE_API_KEY").ok(),
        })
    }

    /// Check if configuration is available (file or env vars)
    pub fn is_available() -> bool {
        config::config_exists(API_CONFIG_FILE) || std::env::var("LEADLINE_API_URL").is_ok()
    }

    /// Build a fully wired client for this configuration
    pub fn client(&self) -> LcpClient {
        let transport = Arc::new(UreqTransport::new(
            self.base_url.clone(),
            self.api_key.clone(),
        ));
        LcpClient::new(Arc::new(RequestGateway::new(transport)))
    }

    fn from_file_format(file: ApiConfigFile) -> Result<Self> {
        // Endpoint paths are relative, so the base must end with a slash
        // or Url::join would drop the last path segment.
        let mut raw = file.base_url;
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw).with_context(|| format!("Invalid API base URL: {raw}"))?;

        Ok(Self {
            base_url,
            api_key: file.api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_with_key() {
        let json = r#"{
            "base_url": "https://api.leadline.example/v1",
            "api_key": "test-key"
        }"#;

        let config = ApiConfig::from_json(json).unwrap();
        assert_eq!(config.base_url.as_str(), "https://api.leadline.example/v1/");
        assert_eq!(config.api_key.as_deref(), Some("test-key"));
    }

    #[test]
    fn test_parse_config_without_key() {
        let json = r#"{ "base_url": "https://api.leadline.example/" }"#;

        let config = ApiConfig::from_json(json).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_base_url_join_keeps_path() {
        let config =
            ApiConfig::from_json(r#"{ "base_url": "https://api.leadline.example/v1" }"#).unwrap();
        let joined = config.base_url.join("lcp/get_all_threads").unwrap();
        assert_eq!(
            joined.as_str(),
            "https://api.leadline.example/v1/lcp/get_all_threads"
        );
    }

    #[test]
    fn test_invalid_json() {
        assert!(ApiConfig::from_json(r#"{ "other": true }"#).is_err());
        assert!(ApiConfig::from_json(r#"{ "base_url": "not a url" }"#).is_err());
    }
}
