//! Runtime configuration from environment variables

use crate::alerts::AlertConfig;
use crate::clock::{OperatingHours, TimeZones};
use crate::error::Result;
use crate::recommender::RecommenderSettings;
use std::env;
use std::str::FromStr;

/// Configuration for the ratewatch binary
///
/// Loaded from environment variables (and `.env` via dotenv) with defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct RateWatchConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Days of raw samples to keep before rolling them up
    pub raw_retention_days: u32,

    /// Days of hourly rollups to keep (daily rollups are kept forever)
    pub hourly_retention_days: u32,

    pub partition_utc_offset_hours: i32,
    pub reference_utc_offset_hours: i32,

    pub operating_start_hour: u32,
    pub operating_end_hour: u32,

    /// Seconds between passes of `retention-daemon`
    pub retention_interval_secs: u64,

    pub alert_state_path: String,
    pub alert_high: f64,
    pub alert_low: f64,
    pub alert_change_percent: f64,
    pub alert_check_patterns: bool,
    pub alert_pattern_std_devs: f64,
    pub alert_cooldown_minutes: i64,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl RateWatchConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `RATEWATCH_DB_PATH` (default: data/rates.db)
    /// - `RATEWATCH_RAW_RETENTION_DAYS` (default: 90)
    /// - `RATEWATCH_HOURLY_RETENTION_DAYS` (default: 365)
    /// - `RATEWATCH_PARTITION_UTC_OFFSET_HOURS` (default: 8)
    /// - `RATEWATCH_REFERENCE_UTC_OFFSET_HOURS` (default: 8)
    /// - `RATEWATCH_OPERATING_START_HOUR` (default: 8)
    /// - `RATEWATCH_OPERATING_END_HOUR` (default: 22)
    /// - `RATEWATCH_RETENTION_INTERVAL_SECS` (default: 86400)
    /// - `RATEWATCH_ALERT_STATE_PATH` (default: data/alert_state.json)
    /// - `RATEWATCH_ALERT_HIGH`, `RATEWATCH_ALERT_LOW`,
    ///   `RATEWATCH_ALERT_CHANGE_PERCENT` (default: 0, disabled)
    /// - `RATEWATCH_ALERT_CHECK_PATTERNS` (default: false)
    /// - `RATEWATCH_ALERT_PATTERN_STD_DEVS` (default: 2.0)
    /// - `RATEWATCH_ALERT_COOLDOWN_MINUTES` (default: 30)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db_path: lookup("RATEWATCH_DB_PATH").unwrap_or_else(|| "data/rates.db".to_string()),
            raw_retention_days: parse_or(&lookup, "RATEWATCH_RAW_RETENTION_DAYS", 90),
            hourly_retention_days: parse_or(&lookup, "RATEWATCH_HOURLY_RETENTION_DAYS", 365),
            partition_utc_offset_hours: parse_or(&lookup, "RATEWATCH_PARTITION_UTC_OFFSET_HOURS", 8),
            reference_utc_offset_hours: parse_or(&lookup, "RATEWATCH_REFERENCE_UTC_OFFSET_HOURS", 8),
            operating_start_hour: parse_or(&lookup, "RATEWATCH_OPERATING_START_HOUR", 8),
            operating_end_hour: parse_or(&lookup, "RATEWATCH_OPERATING_END_HOUR", 22),
            retention_interval_secs: parse_or(&lookup, "RATEWATCH_RETENTION_INTERVAL_SECS", 86_400),
            alert_state_path: lookup("RATEWATCH_ALERT_STATE_PATH")
                .unwrap_or_else(|| "data/alert_state.json".to_string()),
            alert_high: parse_or(&lookup, "RATEWATCH_ALERT_HIGH", 0.0),
            alert_low: parse_or(&lookup, "RATEWATCH_ALERT_LOW", 0.0),
            alert_change_percent: parse_or(&lookup, "RATEWATCH_ALERT_CHANGE_PERCENT", 0.0),
            alert_check_patterns: parse_or(&lookup, "RATEWATCH_ALERT_CHECK_PATTERNS", false),
            alert_pattern_std_devs: parse_or(&lookup, "RATEWATCH_ALERT_PATTERN_STD_DEVS", 2.0),
            alert_cooldown_minutes: parse_or(&lookup, "RATEWATCH_ALERT_COOLDOWN_MINUTES", 30),
        }
    }

    pub fn time_zones(&self) -> Result<TimeZones> {
        TimeZones::from_hours(self.partition_utc_offset_hours, self.reference_utc_offset_hours)
    }

    pub fn operating_hours(&self) -> Result<OperatingHours> {
        OperatingHours::new(self.operating_start_hour, self.operating_end_hour)
    }

    pub fn recommender_settings(&self) -> Result<RecommenderSettings> {
        Ok(RecommenderSettings {
            operating_hours: self.operating_hours()?,
            ..Default::default()
        })
    }

    pub fn alert_config(&self) -> AlertConfig {
        AlertConfig {
            high_threshold: self.alert_high,
            low_threshold: self.alert_low,
            change_percent: self.alert_change_percent,
            check_patterns: self.alert_check_patterns,
            pattern_std_devs: self.alert_pattern_std_devs,
            cooldown_minutes: self.alert_cooldown_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> RateWatchConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RateWatchConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);

        assert_eq!(config.db_path, "data/rates.db");
        assert_eq!(config.raw_retention_days, 90);
        assert_eq!(config.hourly_retention_days, 365);
        assert_eq!(config.partition_utc_offset_hours, 8);
        assert_eq!(config.reference_utc_offset_hours, 8);
        assert_eq!(config.operating_start_hour, 8);
        assert_eq!(config.operating_end_hour, 22);
        assert_eq!(config.retention_interval_secs, 86_400);
        assert_eq!(config.alert_state_path, "data/alert_state.json");
        assert_eq!(config.alert_config(), AlertConfig::default());
        assert_eq!(config.time_zones().unwrap(), TimeZones::default());
        assert_eq!(config.operating_hours().unwrap(), OperatingHours::default());
    }

    #[test]
    fn test_custom_config() {
        let config = config_from(&[
            ("RATEWATCH_DB_PATH", "/tmp/test.db"),
            ("RATEWATCH_RAW_RETENTION_DAYS", "30"),
            ("RATEWATCH_REFERENCE_UTC_OFFSET_HOURS", "0"),
            ("RATEWATCH_OPERATING_END_HOUR", "20"),
            ("RATEWATCH_ALERT_HIGH", "7.35"),
            ("RATEWATCH_ALERT_CHECK_PATTERNS", "true"),
        ]);

        assert_eq!(config.db_path, "/tmp/test.db");
        assert_eq!(config.raw_retention_days, 30);
        assert_eq!(config.reference_utc_offset_hours, 0);
        assert_eq!(config.operating_hours().unwrap().last_hour(), 19);
        assert_eq!(config.alert_config().high_threshold, 7.35);
        assert!(config.alert_config().check_patterns);
    }

    #[test]
    fn test_unparseable_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("RATEWATCH_RAW_RETENTION_DAYS", "ninety"),
            ("RATEWATCH_ALERT_COOLDOWN_MINUTES", ""),
        ]);

        assert_eq!(config.raw_retention_days, 90);
        assert_eq!(config.alert_cooldown_minutes, 30);
    }

    #[test]
    fn test_invalid_operating_hours_rejected() {
        let config = config_from(&[
            ("RATEWATCH_OPERATING_START_HOUR", "22"),
            ("RATEWATCH_OPERATING_END_HOUR", "8"),
        ]);
        assert!(config.operating_hours().is_err());
        assert!(config.recommender_settings().is_err());
    }
}
