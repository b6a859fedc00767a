//! Per-date statistics and multi-day comparisons

use crate::clock::{system_clock, Clock, TimeZones, DATE_FORMAT};
use crate::error::Result;
use crate::stats::RunningStats;
use crate::store::{Sample, SampleStore, Tier};
use chrono::Days;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How far back `latest_change` looks for the previous sample
const CHANGE_LOOKBACK_SECS: i64 = 2 * 3600;

/// Below this absolute day-over-day move the trend is reported as stable
const STABLE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: String,
    pub min_rate: f64,
    pub max_rate: f64,
    pub avg_rate: f64,
    /// collected_at of the first sample at the day's max
    pub peak_time: i64,
    pub sample_count: i64,
    /// Raw while samples exist, Daily once they have been rolled up and purged
    pub source: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayChange {
    pub from_date: String,
    pub to_date: String,
    pub change: f64,
    pub change_percent: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyComparison {
    pub days: usize,
    pub overall_avg: f64,
    pub overall_min: f64,
    pub overall_max: f64,
    pub total_range: f64,
    /// Chronological day-to-day changes of the daily average
    pub changes: Vec<DayChange>,
    pub avg_daily_range: f64,
    pub most_volatile_date: String,
    pub least_volatile_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateChange {
    pub current: Sample,
    pub previous: Sample,
    pub change: f64,
    pub change_percent: f64,
}

pub struct DailyHistory {
    store: Arc<dyn SampleStore>,
    zones: TimeZones,
    now_fn: Clock,
}

impl DailyHistory {
    pub fn new(store: Arc<dyn SampleStore>, zones: TimeZones) -> Self {
        Self::new_with_timestamp_fn(store, zones, system_clock())
    }

    pub fn new_with_timestamp_fn(store: Arc<dyn SampleStore>, zones: TimeZones, now_fn: Clock) -> Self {
        Self {
            store,
            zones,
            now_fn,
        }
    }

    /// Statistics for one partition, from raw samples or, once those are
    /// purged, from the daily rollup
    pub fn daily_stats(&self, date: &str) -> Result<Option<DailyStats>> {
        let samples = self.store.samples_for_date(date)?;
        if let Some(stats) = summarize_day(date, &samples) {
            return Ok(Some(stats));
        }

        Ok(self.store.daily_for_date(date)?.map(|row| DailyStats {
            date: row.date_partition,
            min_rate: row.min_value,
            max_rate: row.max_value,
            avg_rate: row.avg_value,
            peak_time: row.peak_time,
            sample_count: row.sample_count,
            source: Tier::Daily,
        }))
    }

    pub fn daily_peak(&self, date: &str) -> Result<Option<Sample>> {
        self.store.peak_for_date(date)
    }

    /// Today and the previous `days - 1` partition dates, newest first
    pub fn recent_dates(&self, days: u32) -> Vec<String> {
        let today = self.zones.partition_time((self.now_fn)()).date_naive();
        (0..days)
            .filter_map(|offset| today.checked_sub_days(Days::new(u64::from(offset))))
            .map(|date| date.format(DATE_FORMAT).to_string())
            .collect()
    }

    /// Stats for each of the recent dates that has data, newest first
    pub fn recent_stats(&self, days: u32) -> Result<Vec<DailyStats>> {
        let mut stats = Vec::new();
        for date in self.recent_dates(days) {
            if let Some(day) = self.daily_stats(&date)? {
                stats.push(day);
            }
        }
        Ok(stats)
    }

    /// Latest sample against the most recent one in the two hours before it
    pub fn latest_change(&self) -> Result<Option<RateChange>> {
        let current = match self.store.latest()? {
            Some(sample) => sample,
            None => return Ok(None),
        };

        let previous = self
            .store
            .by_time_range(
                current.collected_at - CHANGE_LOOKBACK_SECS,
                current.collected_at - 1,
            )?
            .pop();

        Ok(previous.map(|previous| {
            let change = current.value - previous.value;
            RateChange {
                change_percent: change / previous.value * 100.0,
                change,
                current,
                previous,
            }
        }))
    }
}

fn summarize_day(date: &str, samples: &[Sample]) -> Option<DailyStats> {
    let mut stats = RunningStats::new();
    for sample in samples {
        stats.push(sample.value, sample.collected_at);
    }
    if stats.is_empty() {
        return None;
    }

    let peak_time = samples
        .iter()
        .find(|s| s.value == stats.max)
        .map(|s| s.collected_at)?;

    Some(DailyStats {
        date: date.to_string(),
        min_rate: stats.min,
        max_rate: stats.max,
        avg_rate: stats.mean(),
        peak_time,
        sample_count: stats.count,
        source: Tier::Raw,
    })
}

/// Compare several days; input order does not matter. `None` when empty.
pub fn compare_days(stats: &[DailyStats]) -> Option<DailyComparison> {
    if stats.is_empty() {
        return None;
    }

    let mut days: Vec<&DailyStats> = stats.iter().collect();
    days.sort_by(|a, b| a.date.cmp(&b.date));

    let n = days.len() as f64;
    let overall_avg = days.iter().map(|d| d.avg_rate).sum::<f64>() / n;
    let overall_min = days.iter().map(|d| d.min_rate).fold(f64::INFINITY, f64::min);
    let overall_max = days
        .iter()
        .map(|d| d.max_rate)
        .fold(f64::NEG_INFINITY, f64::max);
    let avg_daily_range = days.iter().map(|d| d.max_rate - d.min_rate).sum::<f64>() / n;

    let changes = days
        .windows(2)
        .map(|pair| {
            let (from, to) = (pair[0], pair[1]);
            let change = to.avg_rate - from.avg_rate;
            let trend = if change > STABLE_EPSILON {
                Trend::Up
            } else if change < -STABLE_EPSILON {
                Trend::Down
            } else {
                Trend::Stable
            };
            DayChange {
                from_date: from.date.clone(),
                to_date: to.date.clone(),
                change,
                change_percent: if from.avg_rate > 0.0 {
                    change / from.avg_rate * 100.0
                } else {
                    0.0
                },
                trend,
            }
        })
        .collect();

    let range = |d: &&DailyStats| d.max_rate - d.min_rate;
    let mut most_volatile = days[0];
    let mut least_volatile = days[0];
    for day in &days[1..] {
        if range(day) > range(&most_volatile) {
            most_volatile = *day;
        }
        if range(day) < range(&least_volatile) {
            least_volatile = *day;
        }
    }

    Some(DailyComparison {
        days: days.len(),
        overall_avg,
        overall_min,
        overall_max,
        total_range: overall_max - overall_min,
        changes,
        avg_daily_range,
        most_volatile_date: most_volatile.date.clone(),
        least_volatile_date: least_volatile.date.clone(),
    })
}
