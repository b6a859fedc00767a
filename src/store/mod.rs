//! Sample store: raw samples plus the hourly and daily rollup tiers
//!
//! Tables (see `/sql/` directory):
//! - `exchange_rates` - raw samples, append-only, partitioned by date
//! - `hourly_rates` - one row per (date_partition, hour), replaced per date
//! - `daily_rates` - one row per date_partition, UPSERT, never purged
//!
//! Every engine reaches storage through [`SampleStore`]; `SqliteSampleStore`
//! is the production implementation.

pub mod sqlite;
pub mod types;

pub use sqlite::{run_schema_migrations, SqliteSampleStore};
pub use types::{DailyAggregate, HourlyAggregate, RetentionStats, Sample, Tier};

use crate::error::Result;

pub trait SampleStore: Send + Sync {
    /// Append a raw sample and return its id.
    ///
    /// Rejects non-positive or non-finite values and malformed partitions with
    /// `InvalidInput`.
    fn insert(&self, sample: &Sample) -> Result<i64>;

    /// Most recent sample by `collected_at`
    fn latest(&self) -> Result<Option<Sample>>;

    /// Samples with `start <= collected_at <= end`, oldest first
    fn by_time_range(&self, start: i64, end: i64) -> Result<Vec<Sample>>;

    /// All raw samples of one partition ordered by `collected_at`, then id
    fn samples_for_date(&self, date: &str) -> Result<Vec<Sample>>;

    /// First sample (by time) holding the partition's maximum value
    fn peak_for_date(&self, date: &str) -> Result<Option<Sample>>;

    fn count_all(&self) -> Result<i64>;

    /// Ascending distinct raw partitions strictly before `cutoff_date`
    fn distinct_dates_before(&self, cutoff_date: &str) -> Result<Vec<String>>;

    /// Replace every hourly row of `date` with `rows` in one transaction
    fn replace_hourly(&self, date: &str, rows: &[HourlyAggregate]) -> Result<usize>;

    /// Insert or overwrite the daily row for `row.date_partition`
    fn upsert_daily(&self, row: &DailyAggregate) -> Result<()>;

    fn hourly_for_date(&self, date: &str) -> Result<Vec<HourlyAggregate>>;

    fn daily_for_date(&self, date: &str) -> Result<Option<DailyAggregate>>;

    fn count(&self, tier: Tier) -> Result<i64>;

    /// Rows of `tier` with `date_partition < cutoff_date`
    fn count_before(&self, tier: Tier, cutoff_date: &str) -> Result<i64>;

    /// Delete rows of `tier` with `date_partition < cutoff_date`.
    ///
    /// `Tier::Daily` is refused with `InvalidInput`.
    fn purge_before(&self, tier: Tier, cutoff_date: &str) -> Result<usize>;

    fn oldest_date(&self, tier: Tier) -> Result<Option<String>>;
}
