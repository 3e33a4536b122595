use std::time::Duration;

use crate::constants::{user_agent, ANTHROPIC_VERSION};
use crate::error::AppResult;
use crate::models::UpstreamConfig;

/// Thin wrapper over the shared HTTP client that speaks the Claude Messages
/// protocol to the configured provider.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    source: String,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .user_agent(user_agent())
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            source: config.source.clone(),
        }
    }

    /// Credential label stamped onto captured rate-limit records.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub async fn send_messages(&self, body: Vec<u8>) -> AppResult<reqwest::Response> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("x-api-key", &self.api_key)
            .body(body)
            .send()
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let config = UpstreamConfig {
            base_url: "https://api.example.com/".to_string(),
            ..Default::default()
        };
        let client = UpstreamClient::new(&config);
        assert_eq!(client.base_url, "https://api.example.com");
    }
}
