use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_AUTOSAVE_INTERVAL_SECS, DEFAULT_PORT, DEFAULT_UPSTREAM_BASE_URL};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub proxy: ProxyConfig,
    pub upstream: UpstreamConfig,
    pub usage: UsageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub port: u16,
    /// Model names advertised on `GET /v1/models`.
    pub models: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            models: vec![
                "claude-sonnet-4-5".to_string(),
                "claude-opus-4-1".to_string(),
                "claude-haiku-4-5".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: String,
    /// Credential label stamped onto captured rate-limit records.
    pub source: String,
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            api_key: String::new(),
            source: "default".to_string(),
            request_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    /// Where rate-limit snapshots persist. Relative paths resolve against the
    /// data directory; empty means `<data_dir>/ratelimit.json`.
    pub ratelimit_file: String,
    pub autosave_interval_secs: u64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            ratelimit_file: String::new(),
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: AppConfig = serde_json::from_str("{}").expect("empty config should parse");
        assert_eq!(config.proxy.port, DEFAULT_PORT);
        assert_eq!(config.upstream.base_url, DEFAULT_UPSTREAM_BASE_URL);
        assert_eq!(
            config.usage.autosave_interval_secs,
            DEFAULT_AUTOSAVE_INTERVAL_SECS
        );
    }

    #[test]
    fn partial_config_keeps_unrelated_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"proxy":{"port":9099}}"#).expect("config should parse");
        assert_eq!(config.proxy.port, 9099);
        assert!(!config.proxy.models.is_empty());
        assert_eq!(config.upstream.source, "default");
    }
}
