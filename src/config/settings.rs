//! Engine settings loading from config.toml
//!
//! Every key is optional; a missing file or a missing key falls back to the
//! defaults below. The timezone decides which calendar day "now" falls on, so
//! it is validated up front rather than at first use.

use crate::errors::{Error, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// IANA timezone used to derive "today" (e.g., `"Pacific/Auckland"`)
    pub timezone: String,
    /// Periods kept in the serialized dashboard history
    pub history_periods: usize,
    /// Periods shown on a budget detail page and persisted as rows
    pub detail_history_periods: usize,
    /// Bound of the aggregate refresh queue
    pub refresh_queue_capacity: usize,
    /// Trailing window used to average variable income
    pub variable_income_window_days: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            history_periods: 6,
            detail_history_periods: 52,
            refresh_queue_capacity: 256,
            variable_income_window_days: 60,
        }
    }
}

impl Settings {
    /// Parses the configured timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|e| Error::Config {
            message: format!("Unknown timezone {:?}: {e}", self.timezone),
        })
    }

    /// Checks the timezone and the numeric ranges.
    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        if self.refresh_queue_capacity == 0 {
            return Err(Error::Config {
                message: "refresh_queue_capacity must be at least 1".to_string(),
            });
        }
        if self.variable_income_window_days <= 0 {
            return Err(Error::Config {
                message: "variable_income_window_days must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    settings.validate()?;
    Ok(settings)
}

/// Loads settings from a TOML file, falling back to defaults when it does not exist.
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read
/// - The TOML syntax is invalid
/// - The timezone is unknown or a numeric setting is out of range
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No config file at {:?}, using defaults", path);
        return Ok(Settings::default());
    }
    debug!("Loading settings from {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_settings(&contents)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_settings() {
        let toml_str = r#"
            timezone = "Pacific/Auckland"
            history_periods = 12
            refresh_queue_capacity = 8
        "#;

        let settings = parse_settings(toml_str).unwrap();
        assert_eq!(settings.timezone, "Pacific/Auckland");
        assert_eq!(settings.history_periods, 12);
        assert_eq!(settings.refresh_queue_capacity, 8);
        // Unset keys keep their defaults
        assert_eq!(settings.detail_history_periods, 52);
        assert_eq!(settings.variable_income_window_days, 60);
        assert_eq!(settings.tz().unwrap(), chrono_tz::Pacific::Auckland);
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let result = parse_settings(r#"timezone = "Mars/Olympus_Mons""#);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_zero_queue_capacity_is_rejected() {
        let result = parse_settings("refresh_queue_capacity = 0");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = load_settings("definitely/not/here/config.toml").unwrap();
        assert_eq!(settings, Settings::default());
    }
}
