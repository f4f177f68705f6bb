use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app::error::AppError;

pub const DEFAULT_BUGREPORT_DIR: &str = "/bugreports";
const DEFAULT_COMMAND_TIMEOUT: i32 = 30;
const DEFAULT_PULL_TIMEOUT: i32 = 300;
const LOG_LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectorSettings {
    pub bugreport_dir: String,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            bugreport_dir: DEFAULT_BUGREPORT_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceSettings {
    pub adb_path: String,
    pub serial: String,
    pub remote_bugreport_dir: String,
    pub command_timeout: i32,
    pub pull_timeout: i32,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            adb_path: String::new(),
            serial: String::new(),
            remote_bugreport_dir: DEFAULT_BUGREPORT_DIR.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub log_level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlagSettings {
    /// `name=true|false` dump used when no `--flags-file` is given.
    pub flag_dump_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsConfig {
    #[serde(default)]
    pub collector: CollectorSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub flags: FlagSettings,
    #[serde(default)]
    pub version: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            collector: CollectorSettings::default(),
            device: DeviceSettings::default(),
            logging: LoggingSettings::default(),
            flags: FlagSettings::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("BUGREPORT_METRICS_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bugreport_metrics_config.json")
}

pub fn backup_config_path(path: &Path) -> PathBuf {
    path.with_extension("backup.json")
}

pub fn load_config() -> Result<MetricsConfig, AppError> {
    load_config_from_path(&config_path())
}

pub fn save_config(config: &MetricsConfig) -> Result<(), AppError> {
    let path = config_path();
    save_config_to_path(config, &path, &backup_config_path(&path))
}

pub fn load_config_from_path(path: &Path) -> Result<MetricsConfig, AppError> {
    if !path.exists() {
        return Ok(MetricsConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), ""))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), ""))?;
    let config: MetricsConfig = match serde_json::from_value(value) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Config has unexpected field types; using defaults"
            );
            MetricsConfig::default()
        }
    };
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &MetricsConfig,
    path: &Path,
    backup_path: &Path,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), ""))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), ""))?;
    Ok(())
}

fn validate_config(mut config: MetricsConfig) -> MetricsConfig {
    if config.collector.bugreport_dir.trim().is_empty() {
        config.collector.bugreport_dir = DEFAULT_BUGREPORT_DIR.to_string();
    }
    if config.device.remote_bugreport_dir.trim().is_empty() {
        config.device.remote_bugreport_dir = DEFAULT_BUGREPORT_DIR.to_string();
    }
    if config.device.command_timeout < 1 {
        config.device.command_timeout = DEFAULT_COMMAND_TIMEOUT;
    }
    if config.device.pull_timeout < 1 {
        config.device.pull_timeout = DEFAULT_PULL_TIMEOUT;
    }
    let level = config.logging.log_level.trim().to_uppercase();
    config.logging.log_level = if LOG_LEVELS.contains(&level.as_str()) {
        level
    } else {
        "INFO".to_string()
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().expect("tmp");
        let config = load_config_from_path(&dir.path().join("absent.json")).expect("config");
        assert_eq!(config, MetricsConfig::default());
        assert_eq!(config.collector.bugreport_dir, "/bugreports");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            serde_json::json!({
                "collector": { "bugreport_dir": "/tmp/reports" },
                "device": { "serial": "emulator-5554" },
                "logging": { "log_level": "debug", "json": true }
            })
            .to_string(),
        )
        .expect("write");
        let config = load_config_from_path(&path).expect("config");
        assert_eq!(config.collector.bugreport_dir, "/tmp/reports");
        assert_eq!(config.logging.log_level, "DEBUG");
        assert!(config.logging.json);
        assert_eq!(config.device.serial, "emulator-5554");
        assert_eq!(config.device.command_timeout, 30);
    }

    #[test]
    fn clamps_invalid_values() {
        let mut config = MetricsConfig::default();
        config.collector.bugreport_dir = "  ".to_string();
        config.device.command_timeout = 0;
        config.device.pull_timeout = -5;
        config.logging.log_level = "loud".to_string();
        let validated = validate_config(config);
        assert_eq!(validated.collector.bugreport_dir, "/bugreports");
        assert_eq!(validated.device.command_timeout, 30);
        assert_eq!(validated.device.pull_timeout, 300);
        assert_eq!(validated.logging.log_level, "INFO");
    }

    #[test]
    fn reports_parse_errors() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");
        fs::write(&path, b"{not json").expect("write");
        let err = load_config_from_path(&path).expect_err("expected error");
        assert!(err.error.contains("Failed to parse config"));
    }

    #[test]
    fn save_keeps_backup_of_previous_file() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");
        let backup = backup_config_path(&path);

        let mut config = MetricsConfig::default();
        save_config_to_path(&config, &path, &backup).expect("first save");
        assert!(!backup.exists());

        config.collector.bugreport_dir = "/data/reports".to_string();
        save_config_to_path(&config, &path, &backup).expect("second save");
        assert!(backup.exists());

        let reloaded = load_config_from_path(&path).expect("reload");
        assert_eq!(reloaded.collector.bugreport_dir, "/data/reports");
        let previous = load_config_from_path(&backup).expect("backup");
        assert_eq!(previous.collector.bugreport_dir, "/bugreports");
    }
}
