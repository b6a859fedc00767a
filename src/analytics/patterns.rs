//! Hour-of-day and day-of-week rate profiles
//!
//! Hours and weekdays are taken in the reference zone. Both profiles are
//! recomputed from raw samples on every call.

use crate::clock::{day_name, system_clock, Clock, TimeZones};
use crate::error::Result;
use crate::stats::RunningStats;
use crate::store::{Sample, SampleStore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPattern {
    pub hour: u32,
    pub avg_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub sample_count: i64,
    /// Days on which this hour held the day's maximum
    pub peak_frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOfWeekPattern {
    /// 0 = Sunday
    pub day_of_week: u32,
    pub day_name: String,
    pub avg_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub avg_range: f64,
    pub sample_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyInsights {
    pub best_hour: Option<HourlyPattern>,
    /// Absent when no hour ever held a daily peak
    pub most_peaks_hour: Option<HourlyPattern>,
    /// Absent when every hour is flat (max == min)
    pub most_volatile_hour: Option<HourlyPattern>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyInsights {
    pub best_day: Option<DayOfWeekPattern>,
    pub lowest_day: Option<DayOfWeekPattern>,
    /// best avg - lowest avg
    pub weekly_spread: f64,
    pub most_volatile_day: Option<DayOfWeekPattern>,
}

pub struct PatternAnalyzer {
    store: Arc<dyn SampleStore>,
    zones: TimeZones,
    now_fn: Clock,
}

impl PatternAnalyzer {
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

    fn samples_since(&self, days: i64) -> Result<Vec<Sample>> {
        let now = (self.now_fn)();
        self.store.by_time_range(now - days * SECS_PER_DAY, now)
    }

    /// Per-hour profile over the last `lookback_days`, ordered by hour
    pub fn hourly_patterns(&self, lookback_days: u32) -> Result<Vec<HourlyPattern>> {
        let samples = self.samples_since(i64::from(lookback_days))?;
        Ok(compute_hourly_patterns(&samples, &self.zones))
    }

    /// Per-weekday profile over the last `lookback_weeks * 7` days, Sunday first
    pub fn day_of_week_patterns(&self, lookback_weeks: u32) -> Result<Vec<DayOfWeekPattern>> {
        let samples = self.samples_since(i64::from(lookback_weeks) * 7)?;
        Ok(compute_day_of_week_patterns(&samples, &self.zones))
    }
}

pub fn compute_hourly_patterns(samples: &[Sample], zones: &TimeZones) -> Vec<HourlyPattern> {
    let mut by_hour: BTreeMap<u32, RunningStats> = BTreeMap::new();
    let mut day_max: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for sample in samples {
        let hour = zones.reference_hour(sample.collected_at);
        by_hour
            .entry(hour)
            .or_default()
            .push(sample.value, sample.collected_at);

        let max = day_max
            .entry(zones.reference_day(sample.collected_at))
            .or_insert(sample.value);
        if sample.value > *max {
            *max = sample.value;
        }
    }

    // every hour of a day that reached that day's max counts once
    let mut peak_hours: BTreeSet<(NaiveDate, u32)> = BTreeSet::new();
    for sample in samples {
        let day = zones.reference_day(sample.collected_at);
        if day_max.get(&day) == Some(&sample.value) {
            peak_hours.insert((day, zones.reference_hour(sample.collected_at)));
        }
    }

    let mut peak_frequency: BTreeMap<u32, u32> = BTreeMap::new();
    for (_, hour) in peak_hours {
        *peak_frequency.entry(hour).or_default() += 1;
    }

    by_hour
        .into_iter()
        .map(|(hour, stats)| HourlyPattern {
            hour,
            avg_rate: stats.mean(),
            min_rate: stats.min,
            max_rate: stats.max,
            sample_count: stats.count,
            peak_frequency: peak_frequency.get(&hour).copied().unwrap_or(0),
        })
        .collect()
}

/// Two-level weekday profile: summarize each calendar day first, then average
/// the day summaries per weekday so busy days do not outweigh quiet ones.
pub fn compute_day_of_week_patterns(samples: &[Sample], zones: &TimeZones) -> Vec<DayOfWeekPattern> {
    let mut days: BTreeMap<NaiveDate, (u32, RunningStats)> = BTreeMap::new();
    for sample in samples {
        let entry = days
            .entry(zones.reference_day(sample.collected_at))
            .or_insert_with(|| (zones.reference_weekday(sample.collected_at), RunningStats::new()));
        entry.1.push(sample.value, sample.collected_at);
    }

    #[derive(Default)]
    struct WeekdayTotals {
        avg: f64,
        min: f64,
        max: f64,
        range: f64,
        days: u32,
    }

    let mut weekdays: BTreeMap<u32, WeekdayTotals> = BTreeMap::new();
    for (weekday, day) in days.values() {
        let totals = weekdays.entry(*weekday).or_default();
        totals.avg += day.mean();
        totals.min += day.min;
        totals.max += day.max;
        totals.range += day.range();
        totals.days += 1;
    }

    weekdays
        .into_iter()
        .map(|(weekday, totals)| {
            let n = f64::from(totals.days);
            DayOfWeekPattern {
                day_of_week: weekday,
                day_name: day_name(weekday).to_string(),
                avg_rate: totals.avg / n,
                min_rate: totals.min / n,
                max_rate: totals.max / n,
                avg_range: totals.range / n,
                sample_days: totals.days,
            }
        })
        .collect()
}

pub fn hourly_insights(patterns: &[HourlyPattern]) -> HourlyInsights {
    let best_hour = max_by_key(patterns, |p| p.avg_rate);
    let most_peaks_hour = max_by_key(patterns, |p| f64::from(p.peak_frequency))
        .filter(|p| p.peak_frequency > 0);
    let most_volatile_hour =
        max_by_key(patterns, |p| p.max_rate - p.min_rate).filter(|p| p.max_rate - p.min_rate > 0.0);

    HourlyInsights {
        best_hour,
        most_peaks_hour,
        most_volatile_hour,
    }
}

pub fn weekly_insights(patterns: &[DayOfWeekPattern]) -> WeeklyInsights {
    let best_day = max_by_key(patterns, |p| p.avg_rate);
    let lowest_day = max_by_key(patterns, |p| -p.avg_rate);
    let weekly_spread = match (&best_day, &lowest_day) {
        (Some(best), Some(lowest)) => best.avg_rate - lowest.avg_rate,
        _ => 0.0,
    };
    let most_volatile_day = max_by_key(patterns, |p| p.avg_range);

    WeeklyInsights {
        best_day,
        lowest_day,
        weekly_spread,
        most_volatile_day,
    }
}

/// First element with the strictly greatest key
fn max_by_key<T: Clone>(items: &[T], key: impl Fn(&T) -> f64) -> Option<T> {
    let mut best: Option<(&T, f64)> = None;
    for item in items {
        let k = key(item);
        if best.map_or(true, |(_, bk)| k > bk) {
            best = Some((item, k));
        }
    }
    best.map(|(item, _)| item.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn cst_ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .timestamp()
    }

    fn sample(ts: i64, value: f64) -> Sample {
        Sample::new(value, ts, &TimeZones::default())
    }

    #[test]
    fn test_hourly_patterns_only_observed_hours() {
        let samples = vec![
            sample(cst_ts(2025, 3, 10, 9, 0), 7.10),
            sample(cst_ts(2025, 3, 10, 9, 30), 7.12),
            sample(cst_ts(2025, 3, 10, 14, 0), 7.20),
            sample(cst_ts(2025, 3, 11, 9, 0), 7.30),
            sample(cst_ts(2025, 3, 11, 14, 0), 7.25),
        ];

        let patterns = compute_hourly_patterns(&samples, &TimeZones::default());

        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].hour, 9);
        assert_eq!(patterns[0].sample_count, 3);
        assert_eq!(patterns[0].min_rate, 7.10);
        assert_eq!(patterns[0].max_rate, 7.30);
        // day 10 peaked at 14h, day 11 at 9h
        assert_eq!(patterns[0].peak_frequency, 1);
        assert_eq!(patterns[1].hour, 14);
        assert_eq!(patterns[1].peak_frequency, 1);
    }

    #[test]
    fn test_peak_ties_count_every_hour() {
        let samples = vec![
            sample(cst_ts(2025, 3, 10, 9, 0), 7.30),
            sample(cst_ts(2025, 3, 10, 12, 0), 7.10),
            sample(cst_ts(2025, 3, 10, 14, 0), 7.30),
        ];

        let patterns = compute_hourly_patterns(&samples, &TimeZones::default());
        let freq: Vec<(u32, u32)> = patterns.iter().map(|p| (p.hour, p.peak_frequency)).collect();

        assert_eq!(freq, vec![(9, 1), (12, 0), (14, 1)]);
    }

    #[test]
    fn test_peak_counted_once_per_day_per_hour() {
        let samples = vec![
            sample(cst_ts(2025, 3, 10, 9, 0), 7.30),
            sample(cst_ts(2025, 3, 10, 9, 30), 7.30),
        ];

        let patterns = compute_hourly_patterns(&samples, &TimeZones::default());
        assert_eq!(patterns[0].peak_frequency, 1);
    }

    #[test]
    fn test_hours_follow_reference_zone() {
        // 09:00 at UTC+8 is 01:00 UTC
        let samples = vec![sample(cst_ts(2025, 3, 10, 9, 0), 7.1)];
        let zones = TimeZones::from_hours(8, 0).unwrap();

        let patterns = compute_hourly_patterns(&samples, &zones);
        assert_eq!(patterns[0].hour, 1);
    }

    #[test]
    fn test_day_of_week_two_level_average() {
        // Two Mondays: one busy day at 7.0, one quiet day at 8.0
        let mut samples: Vec<Sample> = (0..10)
            .map(|i| sample(cst_ts(2025, 3, 10, 9, i), 7.0))
            .collect();
        samples.push(sample(cst_ts(2025, 3, 3, 9, 0), 8.0));

        let patterns = compute_day_of_week_patterns(&samples, &TimeZones::default());

        assert_eq!(patterns.len(), 1);
        let monday = &patterns[0];
        assert_eq!(monday.day_of_week, 1);
        assert_eq!(monday.day_name, "Monday");
        assert_eq!(monday.sample_days, 2);
        // flat average would be 7.09
        assert!((monday.avg_rate - 7.5).abs() < 1e-9);
        assert!((monday.min_rate - 7.5).abs() < 1e-9);
        assert!((monday.max_rate - 7.5).abs() < 1e-9);
        assert_eq!(monday.avg_range, 0.0);
    }

    #[test]
    fn test_day_of_week_ordered_sunday_first() {
        let samples = vec![
            sample(cst_ts(2025, 3, 15, 9, 0), 7.2), // Saturday
            sample(cst_ts(2025, 3, 9, 9, 0), 7.1),  // Sunday
            sample(cst_ts(2025, 3, 12, 9, 0), 7.3), // Wednesday
        ];

        let patterns = compute_day_of_week_patterns(&samples, &TimeZones::default());
        let days: Vec<u32> = patterns.iter().map(|p| p.day_of_week).collect();
        assert_eq!(days, vec![0, 3, 6]);
    }

    #[test]
    fn test_empty_window_gives_empty_patterns() {
        assert!(compute_hourly_patterns(&[], &TimeZones::default()).is_empty());
        assert!(compute_day_of_week_patterns(&[], &TimeZones::default()).is_empty());
    }

    #[test]
    fn test_hourly_insights() {
        let patterns = vec![
            HourlyPattern {
                hour: 9,
                avg_rate: 7.10,
                min_rate: 7.00,
                max_rate: 7.30,
                sample_count: 10,
                peak_frequency: 0,
            },
            HourlyPattern {
                hour: 14,
                avg_rate: 7.20,
                min_rate: 7.15,
                max_rate: 7.25,
                sample_count: 10,
                peak_frequency: 3,
            },
        ];

        let insights = hourly_insights(&patterns);
        assert_eq!(insights.best_hour.unwrap().hour, 14);
        assert_eq!(insights.most_peaks_hour.unwrap().hour, 14);
        assert_eq!(insights.most_volatile_hour.unwrap().hour, 9);
    }

    #[test]
    fn test_hourly_insights_without_peaks_or_spread() {
        let patterns = vec![HourlyPattern {
            hour: 9,
            avg_rate: 7.1,
            min_rate: 7.1,
            max_rate: 7.1,
            sample_count: 1,
            peak_frequency: 0,
        }];

        let insights = hourly_insights(&patterns);
        assert!(insights.best_hour.is_some());
        assert!(insights.most_peaks_hour.is_none());
        assert!(insights.most_volatile_hour.is_none());
    }

    #[test]
    fn test_weekly_insights() {
        let day = |d: u32, avg: f64, range: f64| DayOfWeekPattern {
            day_of_week: d,
            day_name: day_name(d).to_string(),
            avg_rate: avg,
            min_rate: avg - range / 2.0,
            max_rate: avg + range / 2.0,
            avg_range: range,
            sample_days: 4,
        };
        let patterns = vec![day(1, 7.10, 0.05), day(3, 7.25, 0.02), day(5, 7.05, 0.08)];

        let insights = weekly_insights(&patterns);
        assert_eq!(insights.best_day.unwrap().day_of_week, 3);
        assert_eq!(insights.lowest_day.unwrap().day_of_week, 5);
        assert!((insights.weekly_spread - 0.20).abs() < 1e-9);
        assert_eq!(insights.most_volatile_day.unwrap().day_of_week, 5);
    }
}
