use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::str::FromStr;

fn default_state_file() -> String {
    "ding.json".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    /// Path of the JSON state file (tasks, settings, checkpoint).
    pub state_file: String,
    /// Daemon log filter, tracing-subscriber EnvFilter syntax.
    pub log_filter: String,
    /// Timezone for recurrence wall-clock math; detected from the
    /// system when unset.
    pub timezone: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            log_filter: default_log_filter(),
            timezone: None,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("ding.toml"))
            .merge(Env::prefixed("DING_"))
            .extract()
    }

    /// The effective recurrence timezone: configured, else detected,
    /// else UTC.
    pub fn effective_timezone(&self) -> String {
        match &self.timezone {
            Some(tz) if validate_timezone(tz).is_ok() => tz.clone(),
            Some(tz) => {
                eprintln!("Warning: ignoring invalid timezone '{tz}' from config");
                detect_system_timezone()
            }
            None => detect_system_timezone(),
        }
    }
}

/// Validates that a timezone string is a valid IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<Tz, String> {
    Tz::from_str(timezone).map_err(|_| {
        format!("Invalid timezone: '{timezone}'. Use IANA timezone names like 'America/New_York'")
    })
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(tz) = std::fs::read_to_string("/etc/timezone") {
            let tz = tz.trim();
            if validate_timezone(tz).is_ok() {
                return tz.to_string();
            }
        }
    }

    if let Ok(local_tz) = iana_time_zone::get_timezone() {
        if validate_timezone(&local_tz).is_ok() {
            return local_tz;
        }
    }

    "UTC".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_config_file() {
        let config = Config::default();
        assert_eq!(config.state_file, "ding.json");
        assert_eq!(config.log_filter, "info");
        assert!(config.timezone.is_none());
    }

    #[test]
    fn invalid_configured_timezone_falls_back() {
        let config = Config {
            timezone: Some("Not/AZone".to_string()),
            ..Default::default()
        };
        // Falls back to detection, which always yields something valid.
        assert!(validate_timezone(&config.effective_timezone()).is_ok());
    }
}
