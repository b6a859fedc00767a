//! Recommendation output types

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    ExchangeNow,
    Wait,
    Neutral,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ExchangeNow => "EXCHANGE_NOW",
            Action::Wait => "WAIT",
            Action::Neutral => "NEUTRAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::VeryHigh => "VERY_HIGH",
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Where a rate sits in its lookback window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateRanking {
    Excellent,
    VeryGood,
    Good,
    Average,
    BelowAverage,
    Poor,
}

impl RateRanking {
    pub fn from_percentile(percentile: f64) -> Self {
        if percentile >= 95.0 {
            RateRanking::Excellent
        } else if percentile >= 85.0 {
            RateRanking::VeryGood
        } else if percentile >= 70.0 {
            RateRanking::Good
        } else if percentile >= 50.0 {
            RateRanking::Average
        } else if percentile >= 30.0 {
            RateRanking::BelowAverage
        } else {
            RateRanking::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RateRanking::Excellent => "Excellent (top 5%)",
            RateRanking::VeryGood => "Very Good (top 15%)",
            RateRanking::Good => "Good (top 30%)",
            RateRanking::Average => "Average (median)",
            RateRanking::BelowAverage => "Below Average (bottom 70%)",
            RateRanking::Poor => "Poor (bottom 30%)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourPrediction {
    pub hour: u32,
    /// `HH:00`
    pub time_label: String,
    pub predicted_rate: f64,
    /// 50-85
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub expected_rate: f64,
    pub probability: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalContext {
    pub avg_rate_30d: f64,
    pub min_rate_30d: f64,
    pub max_rate_30d: f64,
    pub std_dev_30d: f64,
    pub day_of_week: String,
    pub current_hour: u32,
    /// 0 when the current hour has no pattern yet
    pub hourly_avg_rate: f64,
    /// 0 when the current weekday has no pattern yet
    pub weekday_avg_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReward {
    pub potential_gain: f64,
    pub potential_loss: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    pub confidence: Confidence,
    /// 0-100
    pub confidence_score: f64,
    pub current_rate: f64,
    pub percentile_rank: f64,
    /// USD to exchange, 0 when not supplied
    pub amount: f64,
    /// `amount * current_rate`
    pub converted_amount: f64,
    pub predictions: Vec<HourPrediction>,
    pub optimal_window: Option<TimeWindow>,
    pub reasoning: Vec<String>,
    pub risk_reward: RiskReward,
    pub next_check_time: DateTime<FixedOffset>,
    pub context: HistoricalContext,
}
