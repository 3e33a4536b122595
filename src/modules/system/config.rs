use std::fs;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

const CONFIG_FILE: &str = "config.json";

pub fn get_data_dir() -> AppResult<PathBuf> {
    if let Ok(dir) = std::env::var("TRESTLE_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = dirs::home_dir()
        .ok_or_else(|| AppError::Config("cannot resolve home directory".to_string()))?;
    Ok(home.join(".trestle"))
}

pub fn load_app_config() -> AppResult<AppConfig> {
    let data_dir = get_data_dir()?;
    let config_path = data_dir.join(CONFIG_FILE);

    if !config_path.exists() {
        let config = AppConfig::default();
        let _ = save_app_config(&config);
        return Ok(config);
    }

    let content = fs::read_to_string(&config_path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

pub fn save_app_config(config: &AppConfig) -> AppResult<()> {
    let data_dir = get_data_dir()?;
    fs::create_dir_all(&data_dir)?;
    let content = serde_json::to_string_pretty(config)?;
    fs::write(data_dir.join(CONFIG_FILE), content)?;
    Ok(())
}

/// Resolves the rate-limit snapshot path from the config: absolute paths win,
/// relative paths land under the data directory, empty falls back to
/// `ratelimit.json` in the data directory.
pub fn resolve_ratelimit_file(config: &AppConfig) -> AppResult<PathBuf> {
    let data_dir = get_data_dir()?;
    let raw = config.usage.ratelimit_file.trim();
    if raw.is_empty() {
        return Ok(data_dir.join("ratelimit.json"));
    }
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(data_dir.join(path))
    }
}
