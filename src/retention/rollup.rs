//! Pure rollups from raw samples to hourly and daily aggregates

use crate::clock::TimeZones;
use crate::stats::RunningStats;
use crate::store::{DailyAggregate, HourlyAggregate, Sample};
use std::collections::BTreeMap;

/// Group one partition's samples by partition-zone hour, ordered by hour.
///
/// Hours without samples produce no row.
pub fn hourly_rollup(date: &str, samples: &[Sample], zones: &TimeZones) -> Vec<HourlyAggregate> {
    let mut buckets: BTreeMap<u32, RunningStats> = BTreeMap::new();
    for sample in samples {
        buckets
            .entry(zones.partition_hour(sample.collected_at))
            .or_default()
            .push(sample.value, sample.collected_at);
    }

    buckets
        .into_iter()
        .map(|(hour, stats)| HourlyAggregate {
            date_partition: date.to_string(),
            hour,
            avg_value: stats.mean(),
            min_value: stats.min,
            max_value: stats.max,
            sample_count: stats.count,
            first_collected_at: stats.first_at,
            last_collected_at: stats.last_at,
        })
        .collect()
}

/// Summarize one partition into its daily row, `None` when there are no samples.
///
/// `samples` must be ordered by `collected_at`, then id (the store's order);
/// the peak is the first sample holding the maximum value.
pub fn daily_rollup(date: &str, samples: &[Sample]) -> Option<DailyAggregate> {
    let mut stats = RunningStats::new();
    let mut peak: Option<&Sample> = None;

    for sample in samples {
        stats.push(sample.value, sample.collected_at);
        if peak.map_or(true, |p| sample.value > p.value) {
            peak = Some(sample);
        }
    }

    let peak = peak?;
    Some(DailyAggregate {
        date_partition: date.to_string(),
        avg_value: stats.mean(),
        min_value: stats.min,
        max_value: stats.max,
        peak_value: peak.value,
        peak_time: peak.collected_at,
        volatility: stats.range(),
        sample_count: stats.count,
        first_collected_at: stats.first_at,
        last_collected_at: stats.last_at,
    })
}
