//! Time zones, operating hours and injectable clocks
//!
//! Two zones are in play and they are kept apart on purpose:
//! - **partition zone**: the producer's zone. `date_partition`, hourly rollup
//!   hours and "today" for retention cutoffs are computed here.
//! - **reference zone**: the market's zone. Operating-hours gating,
//!   current-hour lookups and hour-of-day / weekday patterns use this one.
//!
//! Both default to UTC+8 (the rate source publishes in China Standard Time).

use crate::error::{RateWatchError, Result};
use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Timelike, Utc};
use std::sync::Arc;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Unix-seconds clock shared by the engines.
///
/// Production code uses [`system_clock`]; tests pin time with a closure.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| Utc::now().timestamp())
}

/// Clock that always returns `ts`
pub fn fixed_clock(ts: i64) -> Clock {
    Arc::new(move || ts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeZones {
    pub partition: FixedOffset,
    pub reference: FixedOffset,
}

impl Default for TimeZones {
    fn default() -> Self {
        let cst = FixedOffset::east_opt(8 * 3600).expect("UTC+8 is in range");
        Self {
            partition: cst,
            reference: cst,
        }
    }
}

impl TimeZones {
    pub fn new(partition: FixedOffset, reference: FixedOffset) -> Self {
        Self {
            partition,
            reference,
        }
    }

    /// Build from whole-hour UTC offsets (e.g. `8` for UTC+8)
    pub fn from_hours(partition_hours: i32, reference_hours: i32) -> Result<Self> {
        Ok(Self::new(
            offset_from_hours(partition_hours)?,
            offset_from_hours(reference_hours)?,
        ))
    }

    pub fn partition_time(&self, ts: i64) -> DateTime<FixedOffset> {
        at_offset(ts, self.partition)
    }

    pub fn reference_time(&self, ts: i64) -> DateTime<FixedOffset> {
        at_offset(ts, self.reference)
    }

    /// `YYYY-MM-DD` partition key for a unix timestamp
    pub fn partition_date(&self, ts: i64) -> String {
        self.partition_time(ts).format(DATE_FORMAT).to_string()
    }

    pub fn partition_hour(&self, ts: i64) -> u32 {
        self.partition_time(ts).hour()
    }

    pub fn reference_hour(&self, ts: i64) -> u32 {
        self.reference_time(ts).hour()
    }

    pub fn reference_day(&self, ts: i64) -> NaiveDate {
        self.reference_time(ts).date_naive()
    }

    /// Weekday index with 0 = Sunday
    pub fn reference_weekday(&self, ts: i64) -> u32 {
        self.reference_time(ts).weekday().num_days_from_sunday()
    }

    /// Partition date `days` before today (today taken in the partition zone)
    pub fn partition_cutoff(&self, now: i64, days: u32) -> String {
        let today = self.partition_time(now).date_naive();
        today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN)
            .format(DATE_FORMAT)
            .to_string()
    }
}

fn offset_from_hours(hours: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(hours * 3600).ok_or_else(|| {
        RateWatchError::InvalidInput(format!("UTC offset out of range: {} hours", hours))
    })
}

fn at_offset(ts: i64, offset: FixedOffset) -> DateTime<FixedOffset> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_default()
        .with_timezone(&offset)
}

pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| RateWatchError::InvalidInput(format!("malformed date partition: {}", date)))
}

pub fn day_name(weekday: u32) -> &'static str {
    DAY_NAMES.get(weekday as usize).copied().unwrap_or("Unknown")
}

/// Half-open `[start, end)` band of reference-zone hours in which exchanging
/// is possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingHours {
    pub start: u32,
    pub end: u32,
}

impl Default for OperatingHours {
    fn default() -> Self {
        Self { start: 8, end: 22 }
    }
}

impl OperatingHours {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start >= end || end > 24 {
            return Err(RateWatchError::InvalidInput(format!(
                "operating hours must satisfy start < end <= 24 (got {}..{})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start && hour < self.end
    }

    /// Last hour at which an exchange window may end
    pub fn last_hour(&self) -> u32 {
        self.end - 1
    }
}
