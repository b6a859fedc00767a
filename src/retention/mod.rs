//! Tiered retention: raw → hourly → daily
//!
//! ## Policy pass
//!
//! 1. Cutoffs are computed once from the injected clock:
//!    `raw_cutoff = today - raw_days`, `hourly_cutoff = today - hourly_days`
//!    (today in the partition zone).
//! 2. Every raw partition older than `raw_cutoff` is rolled up: hourly rows
//!    first, then the daily row (both straight from raw samples).
//! 3. Raw rows are purged before `raw_cutoff`, held back to the oldest date
//!    whose rollup failed so no un-aggregated partition is lost.
//! 4. Hourly rows are purged before `hourly_cutoff`, held back to the oldest
//!    date rolled up in this pass so its fresh hourly rows outlive the raw
//!    purge. They expire on a later pass. Daily rows are kept.
//!
//! A dry run does steps 1-2 as read-only counts and mutates nothing.

pub mod rollup;

use crate::clock::{system_clock, Clock, TimeZones};
use crate::error::{RateWatchError, Result};
use crate::store::{RetentionStats, SampleStore, Tier};
use log::{error, info, warn};
use rollup::{daily_rollup, hourly_rollup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Outcome of one `run_policy` call.
///
/// In a dry run the row counts are what a live run would create or delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionSummary {
    pub dry_run: bool,
    pub raw_cutoff: String,
    pub hourly_cutoff: String,
    pub dates_discovered: usize,
    pub dates_processed: usize,
    pub hourly_rows_created: usize,
    pub daily_rows_created: usize,
    pub raw_rows_deleted: usize,
    pub hourly_rows_deleted: usize,
    pub failed_dates: Vec<String>,
}

/// Converts a SQLite `COUNT(*)` into a row count.
fn row_count(count: i64) -> Result<usize> {
    usize::try_from(count)
        .map_err(|_| RateWatchError::InvalidInput(format!("negative row count: {}", count)))
}

/// `min(cutoff, oldest)` for `YYYY-MM-DD` dates
fn held_back(cutoff: &str, oldest: Option<&String>) -> String {
    match oldest {
        Some(date) if date.as_str() < cutoff => date.clone(),
        _ => cutoff.to_string(),
    }
}

pub struct RetentionEngine {
    store: Arc<dyn SampleStore>,
    zones: TimeZones,
    now_fn: Clock,
}

impl RetentionEngine {
    pub fn new(store: Arc<dyn SampleStore>, zones: TimeZones) -> Self {
        Self::new_with_timestamp_fn(store, zones, system_clock())
    }

    /// Create with a custom clock (for deterministic tests)
    pub fn new_with_timestamp_fn(store: Arc<dyn SampleStore>, zones: TimeZones, now_fn: Clock) -> Self {
        Self {
            store,
            zones,
            now_fn,
        }
    }

    fn cutoff(&self, days: u32) -> String {
        self.zones.partition_cutoff((self.now_fn)(), days)
    }

    /// Raw partitions strictly older than `today - raw_retention_days`, ascending
    pub fn find_dates_older_than(&self, raw_retention_days: u32) -> Result<Vec<String>> {
        self.store
            .distinct_dates_before(&self.cutoff(raw_retention_days))
    }

    /// Rebuild the hourly rows of `date` from its raw samples.
    ///
    /// Returns the number of hourly rows written; a date without samples is a
    /// no-op and keeps whatever hourly rows already exist.
    pub fn aggregate_hour(&self, date: &str) -> Result<usize> {
        let samples = self.store.samples_for_date(date)?;
        if samples.is_empty() {
            return Ok(0);
        }

        let rows = hourly_rollup(date, &samples, &self.zones);
        self.store.replace_hourly(date, &rows)
    }

    /// Upsert the daily row of `date`. `Ok(false)` when the date has no samples.
    pub fn aggregate_day(&self, date: &str) -> Result<bool> {
        let samples = self.store.samples_for_date(date)?;
        match daily_rollup(date, &samples) {
            Some(row) => {
                self.store.upsert_daily(&row)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete raw samples with `date_partition < cutoff_date`.
    ///
    /// Callers must have aggregated those partitions first.
    pub fn purge_raw_before(&self, cutoff_date: &str) -> Result<usize> {
        self.store.purge_before(Tier::Raw, cutoff_date)
    }

    pub fn purge_hourly_before(&self, cutoff_date: &str) -> Result<usize> {
        self.store.purge_before(Tier::Hourly, cutoff_date)
    }

    fn aggregate_date(&self, date: &str) -> Result<(usize, bool)> {
        let hourly = self.aggregate_hour(date)?;
        let daily = self.aggregate_day(date)?;
        Ok((hourly, daily))
    }

    /// Run one full retention pass (see module docs).
    ///
    /// `hourly_days` must be at least `raw_days`: otherwise the hourly rows of
    /// freshly purged partitions would be deleted in the same pass.
    pub fn run_policy(&self, raw_days: u32, hourly_days: u32, dry_run: bool) -> Result<RetentionSummary> {
        if hourly_days < raw_days {
            return Err(RateWatchError::InvalidInput(format!(
                "hourly retention ({} days) must not be shorter than raw retention ({} days)",
                hourly_days, raw_days
            )));
        }

        let now = (self.now_fn)();
        let raw_cutoff = self.zones.partition_cutoff(now, raw_days);
        let hourly_cutoff = self.zones.partition_cutoff(now, hourly_days);

        info!(
            "🧹 Retention pass starting{}",
            if dry_run { " (dry run)" } else { "" }
        );
        info!("   ├─ Raw retention: {} days (cutoff {})", raw_days, raw_cutoff);
        info!(
            "   └─ Hourly retention: {} days (cutoff {})",
            hourly_days, hourly_cutoff
        );

        let dates = self.store.distinct_dates_before(&raw_cutoff)?;
        let mut summary = RetentionSummary {
            dry_run,
            raw_cutoff: raw_cutoff.clone(),
            hourly_cutoff: hourly_cutoff.clone(),
            dates_discovered: dates.len(),
            ..Default::default()
        };

        if dates.is_empty() {
            info!("   ├─ No raw partitions older than {}", raw_cutoff);
        } else {
            info!(
                "   ├─ {} partitions to aggregate ({} .. {})",
                dates.len(),
                dates[0],
                dates[dates.len() - 1]
            );
        }

        if dry_run {
            for date in &dates {
                let samples = self.store.samples_for_date(date)?;
                let hours: BTreeSet<u32> = samples
                    .iter()
                    .map(|s| self.zones.partition_hour(s.collected_at))
                    .collect();
                summary.hourly_rows_created += hours.len();
                if !samples.is_empty() {
                    summary.daily_rows_created += 1;
                }
            }
            summary.dates_processed = dates.len();
            let hourly_purge_cutoff = held_back(&hourly_cutoff, dates.first());
            summary.raw_rows_deleted = row_count(self.store.count_before(Tier::Raw, &raw_cutoff)?)?;
            summary.hourly_rows_deleted =
                row_count(self.store.count_before(Tier::Hourly, &hourly_purge_cutoff)?)?;

            info!(
                "✅ Dry run: would create {} hourly / {} daily rows, delete {} raw / {} hourly rows",
                summary.hourly_rows_created,
                summary.daily_rows_created,
                summary.raw_rows_deleted,
                summary.hourly_rows_deleted
            );
            return Ok(summary);
        }

        let mut oldest_aggregated: Option<&String> = None;
        for date in &dates {
            match self.aggregate_date(date) {
                Ok((hourly, daily)) => {
                    oldest_aggregated.get_or_insert(date);
                    summary.hourly_rows_created += hourly;
                    if daily {
                        summary.daily_rows_created += 1;
                    }
                    summary.dates_processed += 1;
                }
                Err(e) => {
                    error!("❌ Aggregation failed for {}: {}", date, e);
                    summary.failed_dates.push(date.clone());
                }
            }
        }

        // dates are ascending, so the first failure is the oldest
        let purge_cutoff = match summary.failed_dates.first() {
            Some(oldest_failed) if oldest_failed.as_str() < raw_cutoff.as_str() => {
                warn!(
                    "⚠️  {} partitions failed to aggregate; raw purge held back to {}",
                    summary.failed_dates.len(),
                    oldest_failed
                );
                oldest_failed.clone()
            }
            _ => raw_cutoff,
        };

        summary.raw_rows_deleted = self.purge_raw_before(&purge_cutoff)?;
        // rows rolled up just now survive until their raw data is gone
        let hourly_purge_cutoff = held_back(&hourly_cutoff, oldest_aggregated);
        if hourly_purge_cutoff != hourly_cutoff {
            info!(
                "   ├─ Hourly purge held back to {} (rolled up this pass)",
                hourly_purge_cutoff
            );
        }
        summary.hourly_rows_deleted = self.purge_hourly_before(&hourly_purge_cutoff)?;

        info!("✅ Retention pass complete");
        info!(
            "   ├─ Aggregated: {}/{} partitions ({} hourly rows, {} daily rows)",
            summary.dates_processed,
            summary.dates_discovered,
            summary.hourly_rows_created,
            summary.daily_rows_created
        );
        info!("   ├─ Raw rows deleted: {}", summary.raw_rows_deleted);
        info!("   └─ Hourly rows deleted: {}", summary.hourly_rows_deleted);

        Ok(summary)
    }

    pub fn stats(&self) -> Result<RetentionStats> {
        Ok(RetentionStats {
            raw_count: self.store.count(Tier::Raw)?,
            hourly_count: self.store.count(Tier::Hourly)?,
            daily_count: self.store.count(Tier::Daily)?,
            oldest_raw_date: self.store.oldest_date(Tier::Raw)?,
            oldest_hourly_date: self.store.oldest_date(Tier::Hourly)?,
            oldest_daily_date: self.store.oldest_date(Tier::Daily)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fixed_clock;
    use crate::store::{Sample, SqliteSampleStore};
    use chrono::{FixedOffset, TimeZone};

    fn cst_ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .timestamp()
    }

    fn create_test_engine() -> (Arc<SqliteSampleStore>, RetentionEngine) {
        let store = Arc::new(SqliteSampleStore::open_in_memory().unwrap());
        let now = cst_ts(2025, 3, 12, 10, 0);
        let engine = RetentionEngine::new_with_timestamp_fn(
            store.clone(),
            TimeZones::default(),
            fixed_clock(now),
        );
        (store, engine)
    }

    fn insert_at(store: &SqliteSampleStore, ts: i64, value: f64) {
        store
            .insert(&Sample::new(value, ts, &TimeZones::default()))
            .unwrap();
    }

    #[test]
    fn test_find_dates_older_than() {
        let (store, engine) = create_test_engine();
        insert_at(&store, cst_ts(2025, 3, 1, 9, 0), 7.1);
        insert_at(&store, cst_ts(2025, 3, 5, 9, 0), 7.1);
        insert_at(&store, cst_ts(2025, 3, 10, 9, 0), 7.1);

        // cutoff = 2025-03-05, strictly older
        let dates = engine.find_dates_older_than(7).unwrap();
        assert_eq!(dates, vec!["2025-03-01"]);

        assert!(engine.find_dates_older_than(30).unwrap().is_empty());
    }

    #[test]
    fn test_aggregate_hour_is_idempotent() {
        let (store, engine) = create_test_engine();
        insert_at(&store, cst_ts(2025, 3, 1, 9, 0), 7.1);
        insert_at(&store, cst_ts(2025, 3, 1, 9, 30), 7.3);
        insert_at(&store, cst_ts(2025, 3, 1, 14, 0), 7.2);

        assert_eq!(engine.aggregate_hour("2025-03-01").unwrap(), 2);
        let first = store.hourly_for_date("2025-03-01").unwrap();

        assert_eq!(engine.aggregate_hour("2025-03-01").unwrap(), 2);
        let second = store.hourly_for_date("2025-03-01").unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count(Tier::Hourly).unwrap(), 2);
    }

    #[test]
    fn test_aggregate_day_is_idempotent() {
        let (store, engine) = create_test_engine();
        insert_at(&store, cst_ts(2025, 3, 1, 9, 0), 7.1);
        insert_at(&store, cst_ts(2025, 3, 1, 11, 0), 7.4);

        assert!(engine.aggregate_day("2025-03-01").unwrap());
        let first = store.daily_for_date("2025-03-01").unwrap();
        assert!(engine.aggregate_day("2025-03-01").unwrap());
        let second = store.daily_for_date("2025-03-01").unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count(Tier::Daily).unwrap(), 1);
    }

    #[test]
    fn test_aggregate_empty_date_is_noop() {
        let (store, engine) = create_test_engine();

        assert_eq!(engine.aggregate_hour("2025-02-01").unwrap(), 0);
        assert!(!engine.aggregate_day("2025-02-01").unwrap());
        assert_eq!(store.count(Tier::Hourly).unwrap(), 0);
        assert_eq!(store.count(Tier::Daily).unwrap(), 0);
    }

    #[test]
    fn test_run_policy_rolls_up_and_purges() {
        let (store, engine) = create_test_engine();
        insert_at(&store, cst_ts(2025, 3, 1, 9, 0), 7.1);
        insert_at(&store, cst_ts(2025, 3, 1, 14, 0), 7.2);
        insert_at(&store, cst_ts(2025, 3, 2, 9, 0), 7.3);
        insert_at(&store, cst_ts(2025, 3, 11, 9, 0), 7.4);

        let summary = engine.run_policy(7, 30, false).unwrap();

        assert_eq!(summary.raw_cutoff, "2025-03-05");
        assert_eq!(summary.dates_discovered, 2);
        assert_eq!(summary.dates_processed, 2);
        assert_eq!(summary.hourly_rows_created, 3);
        assert_eq!(summary.daily_rows_created, 2);
        assert_eq!(summary.raw_rows_deleted, 3);
        assert_eq!(summary.hourly_rows_deleted, 0);
        assert!(summary.failed_dates.is_empty());

        let stats = engine.stats().unwrap();
        assert_eq!(stats.raw_count, 1);
        assert_eq!(stats.hourly_count, 3);
        assert_eq!(stats.daily_count, 2);
        assert_eq!(stats.oldest_raw_date.as_deref(), Some("2025-03-11"));
        assert_eq!(stats.oldest_daily_date.as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn test_run_policy_dry_run_mutates_nothing() {
        let (store, engine) = create_test_engine();
        insert_at(&store, cst_ts(2025, 3, 1, 9, 0), 7.1);
        insert_at(&store, cst_ts(2025, 3, 1, 9, 10), 7.15);
        insert_at(&store, cst_ts(2025, 3, 1, 14, 0), 7.2);
        insert_at(&store, cst_ts(2025, 3, 11, 9, 0), 7.4);

        let before = engine.stats().unwrap();
        let summary = engine.run_policy(7, 30, true).unwrap();
        let after = engine.stats().unwrap();

        assert_eq!(before, after);
        assert!(summary.dry_run);
        assert_eq!(summary.dates_discovered, 1);
        assert_eq!(summary.hourly_rows_created, 2);
        assert_eq!(summary.daily_rows_created, 1);
        assert_eq!(summary.raw_rows_deleted, 3);
    }

    #[test]
    fn test_run_policy_rejects_inverted_horizons() {
        let (_store, engine) = create_test_engine();
        let err = engine.run_policy(90, 30, false).unwrap_err();
        assert!(matches!(err, RateWatchError::InvalidInput(_)));
    }

    #[test]
    fn test_run_policy_keeps_fresh_hourly_rows_of_backlog() {
        let (store, engine) = create_test_engine();
        insert_at(&store, cst_ts(2025, 1, 5, 9, 0), 7.0);
        insert_at(&store, cst_ts(2025, 3, 1, 9, 0), 7.1);

        let summary = engine.run_policy(7, 30, false).unwrap();

        // January is past the hourly horizon but was rolled up in this pass
        assert_eq!(summary.raw_rows_deleted, 2);
        assert_eq!(summary.hourly_rows_deleted, 0);
        for date in ["2025-01-05", "2025-03-01"] {
            let has_raw = !store.samples_for_date(date).unwrap().is_empty();
            let has_hourly = !store.hourly_for_date(date).unwrap().is_empty();
            assert!(has_raw || has_hourly, "{} lost raw data without a rollup", date);
        }
    }

    #[test]
    fn test_run_policy_purges_old_hourly_rows_on_next_pass() {
        let (store, engine) = create_test_engine();
        insert_at(&store, cst_ts(2025, 1, 5, 9, 0), 7.0);
        insert_at(&store, cst_ts(2025, 3, 1, 9, 0), 7.1);
        engine.run_policy(7, 30, false).unwrap();

        let summary = engine.run_policy(7, 30, false).unwrap();

        // January has no raw rows left, so its hourly row may expire; daily stays
        assert_eq!(summary.dates_discovered, 0);
        assert_eq!(summary.hourly_rows_deleted, 1);
        assert!(store.hourly_for_date("2025-01-05").unwrap().is_empty());
        assert!(store.daily_for_date("2025-01-05").unwrap().is_some());
        assert_eq!(store.hourly_for_date("2025-03-01").unwrap().len(), 1);
    }

    #[test]
    fn test_dry_run_reports_held_back_hourly_purge() {
        let (store, engine) = create_test_engine();
        insert_at(&store, cst_ts(2025, 1, 5, 9, 0), 7.0);

        let dry = engine.run_policy(7, 30, true).unwrap();
        let live = engine.run_policy(7, 30, false).unwrap();

        assert_eq!(dry.hourly_rows_deleted, 0);
        assert_eq!(dry.hourly_rows_deleted, live.hourly_rows_deleted);
        assert_eq!(store.hourly_for_date("2025-01-05").unwrap().len(), 1);
    }

    #[test]
    fn test_row_count_rejects_negative_counts() {
        assert_eq!(row_count(3).unwrap(), 3);
        assert!(matches!(row_count(-1), Err(RateWatchError::InvalidInput(_))));
    }
}
