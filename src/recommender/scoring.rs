//! Recommendation heuristics
//!
//! ## Scoring Algorithm
//!
//! **score** (0-100), three factors:
//! - Percentile in the 30-day window (up to 40): ≥90 → 40, ≥75 → 30, ≥50 → 15
//! - Current rate vs. this hour's historical average (up to 25): more than
//!   0.5% above → 25, at or slightly above → 15, below → 5. Skipped while the
//!   hour has no pattern.
//! - Optimal window timing (up to 35): already inside → 35, within 3 hours
//!   with a >0.3% expected gain → 5 (wait), within 3 hours otherwise → 20,
//!   later or no window → 10
//!
//! **action**: ≥75 EXCHANGE_NOW, 40-74 NEUTRAL, <40 WAIT
//!
//! **predictions**: `0.7 * hour_avg + 0.3 * (current + 0.3 * (current - current_hour_avg))`
//! for each of the next six operating hours that has a pattern. `current_hour_avg`
//! is 0 while the current hour has no pattern.

use super::types::{
    Action, Confidence, HistoricalContext, HourPrediction, RiskLevel, RiskReward, TimeWindow,
};
use crate::analytics::{DayOfWeekPattern, HourlyPattern};
use crate::clock::{day_name, OperatingHours};
use crate::stats::population_std_dev;
use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, Timelike};

pub const PATTERN_WEIGHT: f64 = 0.7;
pub const CURRENT_WEIGHT: f64 = 0.3;
pub const TREND_WEIGHT: f64 = 0.3;

pub const PREDICTION_HORIZON_HOURS: u32 = 6;

const BASE_PREDICTION_CONFIDENCE: f64 = 50.0;
const MAX_PREDICTION_CONFIDENCE: f64 = 85.0;

/// Expected gain (%) above which waiting for a near window is favoured
const WAIT_GAIN_THRESHOLD_PCT: f64 = 0.3;

/// Outcome of the weighted factors
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub total: f64,
    pub reasoning: Vec<String>,
}

pub fn build_context(
    values: &[f64],
    hourly: &[HourlyPattern],
    weekday: &[DayOfWeekPattern],
    now: &DateTime<FixedOffset>,
) -> HistoricalContext {
    let n = values.len().max(1) as f64;
    let avg = values.iter().sum::<f64>() / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let current_hour = now.hour();
    let current_weekday = now.weekday().num_days_from_sunday();

    HistoricalContext {
        avg_rate_30d: avg,
        min_rate_30d: min,
        max_rate_30d: max,
        std_dev_30d: population_std_dev(values),
        day_of_week: day_name(current_weekday).to_string(),
        current_hour,
        hourly_avg_rate: hourly
            .iter()
            .find(|p| p.hour == current_hour)
            .map_or(0.0, |p| p.avg_rate),
        weekday_avg_rate: weekday
            .iter()
            .find(|p| p.day_of_week == current_weekday)
            .map_or(0.0, |p| p.avg_rate),
    }
}

/// Predict the next operating hours from their hourly patterns.
///
/// `lookback_days` is the window the patterns were built over; it turns the
/// peak frequency into a share of days.
pub fn predict_next_hours(
    current_hour: u32,
    current_rate: f64,
    current_hour_avg: f64,
    hourly: &[HourlyPattern],
    operating: &OperatingHours,
    lookback_days: u32,
) -> Vec<HourPrediction> {
    // current_hour_avg is 0 while the hour has no pattern; the blend keeps it as is
    let trend = current_rate - current_hour_avg;

    let mut predictions = Vec::new();
    for i in 1..=PREDICTION_HORIZON_HOURS {
        let hour = (current_hour + i) % 24;
        if !operating.contains(hour) {
            break;
        }

        let pattern = match hourly.iter().find(|p| p.hour == hour) {
            Some(p) => p,
            None => continue,
        };

        let predicted_rate = PATTERN_WEIGHT * pattern.avg_rate
            + CURRENT_WEIGHT * (current_rate + TREND_WEIGHT * trend);

        let mut confidence = BASE_PREDICTION_CONFIDENCE;
        if pattern.sample_count > 100 {
            confidence += 20.0;
        }
        if pattern.avg_rate > 0.0 && (pattern.max_rate - pattern.min_rate) / pattern.avg_rate < 0.01 {
            confidence += 15.0;
        }
        let confidence = confidence.min(MAX_PREDICTION_CONFIDENCE);

        let mut reasoning = format!("Based on {} samples", pattern.sample_count);
        if pattern.peak_frequency > 0 && lookback_days > 0 {
            reasoning.push_str(&format!(
                ", peak hour {:.0}% of days",
                f64::from(pattern.peak_frequency) / f64::from(lookback_days) * 100.0
            ));
        }

        predictions.push(HourPrediction {
            hour,
            time_label: format!("{:02}:00", hour),
            predicted_rate,
            confidence,
            reasoning,
        });
    }

    predictions
}

/// Window around the best prediction (first one wins ties)
pub fn find_optimal_window(
    now: &DateTime<FixedOffset>,
    predictions: &[HourPrediction],
    operating: &OperatingHours,
    rollover_hour: u32,
) -> Option<TimeWindow> {
    let mut best: Option<&HourPrediction> = None;
    for prediction in predictions {
        if best.map_or(true, |b| prediction.predicted_rate > b.predicted_rate) {
            best = Some(prediction);
        }
    }
    let best = best?;

    let start_hour = best.hour;
    let end_hour = (best.hour + 1).min(operating.last_hour());

    let today = now.date_naive();
    let offset = *now.offset();
    let mut start_time = today
        .and_hms_opt(start_hour, 0, 0)?
        .and_local_timezone(offset)
        .single()?;
    let mut end_time = today
        .and_hms_opt(end_hour, 59, 59)?
        .and_local_timezone(offset)
        .single()?;

    if start_time < *now && now.hour() >= rollover_hour {
        start_time = start_time.checked_add_days(Days::new(1))?;
        end_time = end_time.checked_add_days(Days::new(1))?;
    }

    Some(TimeWindow {
        start_hour,
        end_hour,
        start_time,
        end_time,
        expected_rate: best.predicted_rate,
        probability: best.confidence,
        reasoning: format!(
            "Historical data shows {:02}:00-{:02}:00 typically has higher rates",
            start_hour, end_hour
        ),
    })
}

pub fn hours_until(window: &TimeWindow, now: &DateTime<FixedOffset>) -> f64 {
    (window.start_time - *now).num_seconds() as f64 / 3600.0
}

pub fn score(
    current_rate: f64,
    percentile: f64,
    hourly_avg_rate: f64,
    window: Option<&TimeWindow>,
    now: &DateTime<FixedOffset>,
) -> Score {
    let mut total = 0.0;
    let mut reasoning = Vec::new();

    // Factor 1: percentile (40)
    let (points, label) = if percentile >= 90.0 {
        (40.0, "excellent")
    } else if percentile >= 75.0 {
        (30.0, "good")
    } else if percentile >= 50.0 {
        (15.0, "average")
    } else {
        (0.0, "below average")
    };
    total += points;
    reasoning.push(format!(
        "Current rate is at {:.0}th percentile ({}, +{:.0})",
        percentile, label, points
    ));

    // Factor 2: hourly average (25)
    if hourly_avg_rate > 0.0 {
        let diff = current_rate - hourly_avg_rate;
        let diff_pct = diff / hourly_avg_rate * 100.0;
        let (points, text) = if diff >= 0.0 && diff_pct > 0.5 {
            (25.0, format!("Rate is {:.2}% above hourly average", diff_pct))
        } else if diff >= 0.0 {
            (15.0, "Rate matches hourly average".to_string())
        } else {
            (5.0, format!("Rate is {:.2}% below hourly average", -diff_pct))
        };
        total += points;
        reasoning.push(format!("{} (+{:.0})", text, points));
    }

    // Factor 3: optimal window (35)
    let (points, text) = match window {
        Some(w) => {
            let hours = hours_until(w, now);
            if hours <= 0.0 {
                (35.0, "Currently in predicted optimal time window".to_string())
            } else if hours <= 3.0 {
                let gain_pct = (w.expected_rate - current_rate) / current_rate * 100.0;
                if gain_pct > WAIT_GAIN_THRESHOLD_PCT {
                    (
                        5.0,
                        format!("Better rate predicted in {:.0} hours (+{:.2}%)", hours, gain_pct),
                    )
                } else {
                    (
                        20.0,
                        format!(
                            "Marginal improvement expected ({:.0} hours, {:+.2}%)",
                            hours, gain_pct
                        ),
                    )
                }
            } else {
                (10.0, "No significant improvement predicted in near term".to_string())
            }
        }
        None => (
            10.0,
            "No optimal window predicted within operating hours".to_string(),
        ),
    };
    total += points;
    reasoning.push(format!("{} (+{:.0})", text, points));

    Score { total, reasoning }
}

pub fn decide(score: f64) -> (Action, Confidence) {
    if score >= 75.0 {
        let confidence = if score >= 90.0 {
            Confidence::VeryHigh
        } else if score >= 80.0 {
            Confidence::High
        } else {
            Confidence::Medium
        };
        (Action::ExchangeNow, confidence)
    } else if score >= 40.0 {
        (Action::Neutral, Confidence::Medium)
    } else if score < 25.0 {
        (Action::Wait, Confidence::High)
    } else {
        (Action::Wait, Confidence::Medium)
    }
}

/// Gain/loss in CNY for exchanging `amount` USD now versus at the window.
///
/// Only evaluated when an amount is given and the window beats the current
/// rate; otherwise both are 0 and the risk is Low.
pub fn assess_risk_reward(
    amount: f64,
    current_rate: f64,
    window: Option<&TimeWindow>,
    context: &HistoricalContext,
) -> RiskReward {
    let window = match window {
        Some(w) if amount > 0.0 && w.expected_rate > current_rate => w,
        _ => {
            return RiskReward {
                potential_gain: 0.0,
                potential_loss: 0.0,
                risk_level: RiskLevel::Low,
            }
        }
    };

    let converted = |rate: f64| amount * rate;
    let volatility = if context.avg_rate_30d > 0.0 {
        context.std_dev_30d / context.avg_rate_30d
    } else {
        0.0
    };
    let risk_level = if volatility > 0.02 {
        RiskLevel::High
    } else if volatility > 0.01 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskReward {
        potential_gain: converted(window.expected_rate) - converted(current_rate),
        potential_loss: converted(current_rate) - converted(context.min_rate_30d),
        risk_level,
    }
}

pub fn next_check_time(
    now: &DateTime<FixedOffset>,
    action: Action,
    window: Option<&TimeWindow>,
) -> DateTime<FixedOffset> {
    match (action, window) {
        (Action::ExchangeNow, _) => *now + Duration::minutes(30),
        (Action::Wait, Some(w)) => w.start_time - Duration::minutes(30),
        _ => *now + Duration::hours(1),
    }
}
