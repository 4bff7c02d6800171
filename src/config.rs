use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::models::MAX_INTERVAL_SECS;
use crate::recorder::MIN_SESSION_SECS;

const MAX_INTERVAL_MINUTES: u64 = MAX_INTERVAL_SECS / 60;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub study_minutes: u64,
    pub break_minutes: u64,
    pub reminder_interval_mins: Option<u64>,
    pub min_session_secs: u64,
    pub auto_start_breaks: bool,
    pub notifications_enabled: bool,
    pub sound_enabled: bool,
    pub user_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            study_minutes: 25,
            break_minutes: 5,
            reminder_interval_mins: Some(20),
            min_session_secs: MIN_SESSION_SECS,
            auto_start_breaks: true,
            notifications_enabled: true,
            sound_enabled: true,
            user_id: "local".to_string(),
        }
    }
}

/// Timer settings after CLI overrides have been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerSettings {
    pub study_seconds: u64,
    pub break_seconds: u64,
    pub reminder_interval_mins: Option<u64>,
    pub min_session_secs: u64,
    pub auto_start_breaks: bool,
    pub user_id: String,
}

impl TimerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            study_seconds: config.study_minutes.clamp(1, MAX_INTERVAL_MINUTES) * 60,
            break_seconds: config.break_minutes.clamp(1, MAX_INTERVAL_MINUTES) * 60,
            reminder_interval_mins: config.reminder_interval_mins,
            min_session_secs: config.min_session_secs,
            auto_start_breaks: config.auto_start_breaks,
            user_id: config.user_id.clone(),
        }
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Parses a human duration such as `25m` or `1h30m` into whole seconds, at
/// most one day.
pub fn parse_duration_secs(value: &str) -> Result<u64> {
    let duration = humantime::parse_duration(value)
        .map_err(|e| anyhow::anyhow!("invalid duration '{}': {}", value, e))?;
    if duration.as_secs() == 0 {
        anyhow::bail!("duration '{}' must be at least one second", value);
    }
    if duration.as_secs() > MAX_INTERVAL_SECS {
        anyhow::bail!("duration '{}' is longer than 24 hours", value);
    }
    Ok(duration.as_secs())
}

pub fn load_config() -> Result<Config> {
    let path = crate::storage::get_base_dir()?.join("config.json");
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let config = Config::default();
        let data = serde_json::to_string_pretty(&config)?;
        fs::write(path, data)?;
        return Ok(config);
    }

    let data = fs::read_to_string(path)?;
    let config = serde_json::from_str(&data)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_writes_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");

        let config = load_config_from(&path)?;
        assert_eq!(config, Config::default());
        assert!(path.exists());

        Ok(())
    }

    #[test]
    fn test_load_config_fills_missing_fields() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "study_minutes": 50, "reminder_interval_mins": null }"#)?;

        let config = load_config_from(&path)?;
        assert_eq!(config.study_minutes, 50);
        assert_eq!(config.break_minutes, 5);
        assert_eq!(config.reminder_interval_mins, None);

        Ok(())
    }

    #[test]
    fn test_settings_from_config() {
        let settings = TimerSettings::default();
        assert_eq!(settings.study_seconds, 1500);
        assert_eq!(settings.break_seconds, 300);
        assert_eq!(settings.min_session_secs, 10);
    }

    #[test]
    fn test_parse_duration_secs() -> Result<()> {
        assert_eq!(parse_duration_secs("25m")?, 1500);
        assert_eq!(parse_duration_secs("1h 30m")?, 5400);
        assert!(parse_duration_secs("soon").is_err());
        assert!(parse_duration_secs("0s").is_err());
        assert_eq!(parse_duration_secs("24h")?, 86_400);
        assert!(parse_duration_secs("48h").is_err());
        assert!(parse_duration_secs("500000000years").is_err());
        Ok(())
    }

    #[test]
    fn test_settings_clamp_interval_minutes() {
        let config = Config {
            study_minutes: u64::MAX,
            break_minutes: 0,
            ..Config::default()
        };
        let settings = TimerSettings::from_config(&config);
        assert_eq!(settings.study_seconds, MAX_INTERVAL_SECS);
        assert_eq!(settings.break_seconds, 60);
    }
}
