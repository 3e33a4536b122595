mod config;

pub use config::{AppConfig, ProxyConfig, UpstreamConfig, UsageConfig};
