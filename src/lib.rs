pub mod constants;
pub mod error;
pub mod models;
pub mod modules;
pub mod proxy;
#[cfg(test)]
mod test_utils;
pub mod usage;

use std::time::Duration;

use tracing::{error, info, warn};

use crate::models::AppConfig;

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(port) = std::env::var("PORT") {
        let trimmed = port.trim();
        if !trimmed.is_empty() {
            match trimmed.parse::<u16>() {
                Ok(p) if p > 0 => {
                    config.proxy.port = p;
                    info!("Using proxy port from environment: {}", p);
                }
                _ => warn!("Ignoring invalid PORT value: {}", port),
            }
        }
    }

    if let Ok(key) = std::env::var("UPSTREAM_API_KEY") {
        if !key.trim().is_empty() {
            info!("Using upstream API key from environment");
            config.upstream.api_key = key;
        }
    }

    if let Ok(url) = std::env::var("UPSTREAM_BASE_URL") {
        if !url.trim().is_empty() {
            info!("Using upstream base URL from environment: {}", url);
            config.upstream.base_url = url;
        }
    }
}

pub fn run() {
    modules::system::logger::init_logger();

    let mut config = match modules::system::config::load_app_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    apply_env_overrides(&mut config);

    match modules::system::config::resolve_ratelimit_file(&config) {
        Ok(path) => {
            usage::set_rate_limit_file_path(path);
            if let Err(e) = usage::RateLimitStore::global().load() {
                warn!("Failed to restore rate-limit history: {}", e);
            }
        }
        Err(e) => warn!("Rate-limit persistence disabled: {}", e),
    }

    let autosave_interval = Duration::from_secs(config.usage.autosave_interval_secs.max(1));

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    runtime.block_on(async {
        usage::start_auto_save(autosave_interval);

        if let Err(e) = proxy::start_server(&config).await {
            error!("Proxy server failed: {}", e);
        }

        usage::stop_auto_save();
        info!("Shutdown complete");
    });
}

#[cfg(test)]
mod tests {
    use super::apply_env_overrides;
    use crate::models::AppConfig;
    use crate::test_utils::{lock_env, ScopedEnvVar};

    #[test]
    fn env_port_overrides_config_port() {
        let _guard = lock_env();
        let _port = ScopedEnvVar::set("PORT", "8045");
        let _key = ScopedEnvVar::unset("UPSTREAM_API_KEY");
        let _url = ScopedEnvVar::unset("UPSTREAM_BASE_URL");

        let mut config = AppConfig::default();
        config.proxy.port = 8145;
        apply_env_overrides(&mut config);

        assert_eq!(config.proxy.port, 8045);
    }

    #[test]
    fn invalid_env_port_is_ignored() {
        let _guard = lock_env();
        let _port = ScopedEnvVar::set("PORT", "not-a-port");
        let _key = ScopedEnvVar::unset("UPSTREAM_API_KEY");
        let _url = ScopedEnvVar::unset("UPSTREAM_BASE_URL");

        let mut config = AppConfig::default();
        config.proxy.port = 8145;
        apply_env_overrides(&mut config);

        assert_eq!(config.proxy.port, 8145);
    }

    #[test]
    fn env_upstream_key_overrides_config() {
        let _guard = lock_env();
        let _port = ScopedEnvVar::unset("PORT");
        let _key = ScopedEnvVar::set("UPSTREAM_API_KEY", "sk-test-override");
        let _url = ScopedEnvVar::unset("UPSTREAM_BASE_URL");

        let mut config = AppConfig::default();
        apply_env_overrides(&mut config);

        assert_eq!(config.upstream.api_key, "sk-test-override");
    }
}
