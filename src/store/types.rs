//! Row types for the three storage tiers

use crate::clock::TimeZones;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";

/// One raw observation from the poller.
///
/// `id` is assigned by the store; a sample built in memory carries `0` until
/// it is inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: i64,
    pub currency_code: String,
    pub value: f64,
    pub collected_at: i64,
    pub date_partition: String,
}

impl Sample {
    /// Build a USD sample, deriving the partition key from the partition zone
    pub fn new(value: f64, collected_at: i64, zones: &TimeZones) -> Self {
        Self {
            id: 0,
            currency_code: DEFAULT_CURRENCY.to_string(),
            value,
            collected_at,
            date_partition: zones.partition_date(collected_at),
        }
    }
}

/// Storage tier, ordered from finest to coarsest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Raw,
    Hourly,
    Daily,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Raw => "raw",
            Tier::Hourly => "hourly",
            Tier::Daily => "daily",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Tier::Raw => "exchange_rates",
            Tier::Hourly => "hourly_rates",
            Tier::Daily => "daily_rates",
        }
    }

    /// Daily rows are the long-term record and are never purged
    pub fn is_purgeable(&self) -> bool {
        !matches!(self, Tier::Daily)
    }

    pub fn all() -> [Tier; 3] {
        [Tier::Raw, Tier::Hourly, Tier::Daily]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyAggregate {
    pub date_partition: String,
    pub hour: u32,
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub sample_count: i64,
    pub first_collected_at: i64,
    pub last_collected_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date_partition: String,
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub peak_value: f64,
    pub peak_time: i64,
    /// max - min
    pub volatility: f64,
    pub sample_count: i64,
    pub first_collected_at: i64,
    pub last_collected_at: i64,
}

/// Row counts and oldest partition per tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionStats {
    pub raw_count: i64,
    pub hourly_count: i64,
    pub daily_count: i64,
    pub oldest_raw_date: Option<String>,
    pub oldest_hourly_date: Option<String>,
    pub oldest_daily_date: Option<String>,
}
