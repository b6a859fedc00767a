//! Rate alerts: thresholds, sudden moves and unusual hours
//!
//! Checking is a pure function of `(config, state, rate)`: the caller owns the
//! [`AlertState`] (cooldowns and the previous rate), passes it in and stores
//! the returned one. Delivery goes through the [`Notifier`] trait.

use crate::analytics::HourlyPattern;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum samples behind an hourly pattern before it can flag a deviation
pub const MIN_PATTERN_SAMPLES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ThresholdHigh,
    ThresholdLow,
    ChangeIncrease,
    ChangeDecrease,
    UnusualPattern,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::ThresholdHigh => "threshold_high",
            AlertType::ThresholdLow => "threshold_low",
            AlertType::ChangeIncrease => "change_increase",
            AlertType::ChangeDecrease => "change_decrease",
            AlertType::UnusualPattern => "unusual_pattern",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub message: String,
    pub rate: f64,
    /// Threshold crossed, or the hour's average for pattern alerts
    pub threshold: f64,
    /// Percent change for change alerts
    pub change: f64,
    pub timestamp: i64,
}

/// Alert rules. A zero threshold or change percent disables that rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub change_percent: f64,
    pub check_patterns: bool,
    pub pattern_std_devs: f64,
    pub cooldown_minutes: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.0,
            low_threshold: 0.0,
            change_percent: 0.0,
            check_patterns: false,
            pattern_std_devs: 2.0,
            cooldown_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastRate {
    pub rate: f64,
    pub at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    /// Alert type name → unix time it last fired
    pub last_alerts: BTreeMap<String, i64>,
    pub last_rate: Option<LastRate>,
}

impl AlertState {
    pub fn last_alert(&self, alert_type: AlertType) -> Option<i64> {
        self.last_alerts.get(alert_type.as_str()).copied()
    }

    fn can_fire(&self, alert_type: AlertType, at: i64, cooldown_minutes: i64) -> bool {
        if cooldown_minutes <= 0 {
            return true;
        }
        match self.last_alert(alert_type) {
            Some(last) => at - last >= cooldown_minutes * 60,
            None => true,
        }
    }

    fn mark(&mut self, alert_type: AlertType, at: i64) {
        self.last_alerts.insert(alert_type.as_str().to_string(), at);
    }
}

/// Evaluate every rule for `rate` observed at `at`.
///
/// `hour_pattern` is the historical pattern for the hour of `at`, if any.
/// The returned state carries updated cooldowns and `rate` as the new last
/// rate.
pub fn check(
    config: &AlertConfig,
    state: AlertState,
    rate: f64,
    at: i64,
    hour_pattern: Option<&HourlyPattern>,
) -> (Vec<Alert>, AlertState) {
    let mut state = state;
    let mut alerts = Vec::new();

    let mut fire = |state: &mut AlertState, alert: Alert| {
        if state.can_fire(alert.alert_type, at, config.cooldown_minutes) {
            state.mark(alert.alert_type, at);
            alerts.push(alert);
        }
    };

    if config.high_threshold > 0.0 && rate > config.high_threshold {
        fire(
            &mut state,
            Alert {
                alert_type: AlertType::ThresholdHigh,
                message: format!(
                    "Rate exceeded high threshold: {:.4} > {:.4} CNY",
                    rate, config.high_threshold
                ),
                rate,
                threshold: config.high_threshold,
                change: 0.0,
                timestamp: at,
            },
        );
    }

    if config.low_threshold > 0.0 && rate < config.low_threshold {
        fire(
            &mut state,
            Alert {
                alert_type: AlertType::ThresholdLow,
                message: format!(
                    "Rate dropped below low threshold: {:.4} < {:.4} CNY",
                    rate, config.low_threshold
                ),
                rate,
                threshold: config.low_threshold,
                change: 0.0,
                timestamp: at,
            },
        );
    }

    if let Some(last) = state.last_rate {
        if last.rate > 0.0 && config.change_percent > 0.0 {
            let change = (rate - last.rate) / last.rate * 100.0;
            if change.abs() >= config.change_percent {
                let (alert_type, direction) = if change < 0.0 {
                    (AlertType::ChangeDecrease, "decreased")
                } else {
                    (AlertType::ChangeIncrease, "increased")
                };
                let minutes = ((at - last.at) as f64 / 60.0).round();
                fire(
                    &mut state,
                    Alert {
                        alert_type,
                        message: format!(
                            "Rate {} by {:.2}% in {:.0}m: {:.4} → {:.4} CNY",
                            direction,
                            change.abs(),
                            minutes,
                            last.rate,
                            rate
                        ),
                        rate,
                        threshold: 0.0,
                        change,
                        timestamp: at,
                    },
                );
            }
        }
    }

    if config.check_patterns {
        if let Some(alert) = hour_pattern.and_then(|p| pattern_deviation(config, p, rate, at)) {
            fire(&mut state, alert);
        }
    }

    state.last_rate = Some(LastRate { rate, at });
    (alerts, state)
}

/// Standard deviation is approximated as range / 6 (normal distribution)
fn pattern_deviation(config: &AlertConfig, pattern: &HourlyPattern, rate: f64, at: i64) -> Option<Alert> {
    if pattern.sample_count < MIN_PATTERN_SAMPLES {
        return None;
    }
    let std_dev = (pattern.max_rate - pattern.min_rate) / 6.0;
    if std_dev <= 0.0 {
        return None;
    }

    let deviation = (rate - pattern.avg_rate) / std_dev;
    if deviation.abs() < config.pattern_std_devs {
        return None;
    }

    let direction = if deviation < 0.0 { "lower" } else { "higher" };
    Some(Alert {
        alert_type: AlertType::UnusualPattern,
        message: format!(
            "Unusual rate at {:02}:00: {:.4} CNY is {:.1} std devs {} than usual (avg: {:.4})",
            pattern.hour,
            rate,
            deviation.abs(),
            direction,
            pattern.avg_rate
        ),
        rate,
        threshold: pattern.avg_rate,
        change: 0.0,
        timestamp: at,
    })
}

/// Delivery seam for alerts (chat bots, mail, ...)
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, alert: &Alert) -> Result<()> {
        log::warn!(
            "🔔 [{}] {} (rate={:.4})",
            alert.alert_type.as_str(),
            alert.message,
            alert.rate
        );
        Ok(())
    }
}

/// Send every alert to every notifier; failures are logged and counted
pub async fn dispatch(notifiers: &[Box<dyn Notifier>], alerts: &[Alert]) -> usize {
    let mut failures = 0;
    for alert in alerts {
        for notifier in notifiers {
            if let Err(e) = notifier.notify(alert).await {
                log::error!("❌ Notifier '{}' failed: {}", notifier.name(), e);
                failures += 1;
            }
        }
    }
    failures
}
