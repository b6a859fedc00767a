//! SQLite implementation of [`SampleStore`]

use super::types::{DailyAggregate, HourlyAggregate, Sample, Tier};
use super::SampleStore;
use crate::clock::parse_date;
use crate::error::{RateWatchError, Result};
use crate::sqlite_pragma::apply_optimized_pragmas;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Schema files, applied in order. All use `IF NOT EXISTS`.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "01_exchange_rates.sql",
        include_str!("../../sql/01_exchange_rates.sql"),
    ),
    (
        "02_hourly_rates.sql",
        include_str!("../../sql/02_hourly_rates.sql"),
    ),
    (
        "03_daily_rates.sql",
        include_str!("../../sql/03_daily_rates.sql"),
    ),
];

const SAMPLE_COLUMNS: &str = "id, currency_code, rate, collected_at, date_partition";

/// Run the embedded schema migrations (idempotent)
pub fn run_schema_migrations(conn: &Connection) -> Result<()> {
    log::info!("🔧 Running schema migrations ({} files)", MIGRATIONS.len());

    for (filename, sql) in MIGRATIONS {
        log::info!("   ├─ Executing: {}", filename);
        conn.execute_batch(sql)?;
        log::info!("   └─ ✅ Success: {}", filename);
    }

    log::info!("✅ All schema migrations completed successfully");
    Ok(())
}

fn sample_from_row(row: &Row<'_>) -> rusqlite::Result<Sample> {
    Ok(Sample {
        id: row.get(0)?,
        currency_code: row.get(1)?,
        value: row.get(2)?,
        collected_at: row.get(3)?,
        date_partition: row.get(4)?,
    })
}

fn hourly_from_row(row: &Row<'_>) -> rusqlite::Result<HourlyAggregate> {
    Ok(HourlyAggregate {
        date_partition: row.get(0)?,
        hour: row.get(1)?,
        avg_value: row.get(2)?,
        min_value: row.get(3)?,
        max_value: row.get(4)?,
        sample_count: row.get(5)?,
        first_collected_at: row.get(6)?,
        last_collected_at: row.get(7)?,
    })
}

fn daily_from_row(row: &Row<'_>) -> rusqlite::Result<DailyAggregate> {
    Ok(DailyAggregate {
        date_partition: row.get(0)?,
        avg_value: row.get(1)?,
        min_value: row.get(2)?,
        max_value: row.get(3)?,
        peak_value: row.get(4)?,
        peak_time: row.get(5)?,
        volatility: row.get(6)?,
        sample_count: row.get(7)?,
        first_collected_at: row.get(8)?,
        last_collected_at: row.get(9)?,
    })
}

/// Sample store backed by one SQLite connection.
///
/// Each trait call is a single statement or a short transaction; the mutex
/// serializes calls made through this handle, while WAL lets the poller's own
/// connection keep appending.
#[derive(Clone)]
pub struct SqliteSampleStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSampleStore {
    /// Open (creating if needed) a database file and apply the schema
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())?;
        log::info!("📂 Opened rate database: {}", db_path.as_ref().display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        apply_optimized_pragmas(&conn)?;
        run_schema_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn query_samples(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Sample>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;
        let samples = stmt
            .query_map(args, sample_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(samples)
    }
}

impl SampleStore for SqliteSampleStore {
    fn insert(&self, sample: &Sample) -> Result<i64> {
        if !sample.value.is_finite() || sample.value <= 0.0 {
            return Err(RateWatchError::InvalidInput(format!(
                "sample value must be positive, got {}",
                sample.value
            )));
        }
        parse_date(&sample.date_partition)?;

        let conn = self.lock();
        conn.execute(
            "INSERT INTO exchange_rates (currency_code, rate, collected_at, date_partition)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                sample.currency_code,
                sample.value,
                sample.collected_at,
                sample.date_partition
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn latest(&self) -> Result<Option<Sample>> {
        let conn = self.lock();
        let sample = conn
            .query_row(
                &format!(
                    "SELECT {} FROM exchange_rates ORDER BY collected_at DESC, id DESC LIMIT 1",
                    SAMPLE_COLUMNS
                ),
                [],
                sample_from_row,
            )
            .optional()?;
        Ok(sample)
    }

    fn by_time_range(&self, start: i64, end: i64) -> Result<Vec<Sample>> {
        self.query_samples(
            &format!(
                "SELECT {} FROM exchange_rates
                 WHERE collected_at >= ?1 AND collected_at <= ?2
                 ORDER BY collected_at ASC, id ASC",
                SAMPLE_COLUMNS
            ),
            params![start, end],
        )
    }

    fn samples_for_date(&self, date: &str) -> Result<Vec<Sample>> {
        self.query_samples(
            &format!(
                "SELECT {} FROM exchange_rates
                 WHERE date_partition = ?1
                 ORDER BY collected_at ASC, id ASC",
                SAMPLE_COLUMNS
            ),
            params![date],
        )
    }

    fn peak_for_date(&self, date: &str) -> Result<Option<Sample>> {
        let conn = self.lock();
        let sample = conn
            .query_row(
                &format!(
                    "SELECT {} FROM exchange_rates
                     WHERE date_partition = ?1
                     ORDER BY rate DESC, collected_at ASC, id ASC
                     LIMIT 1",
                    SAMPLE_COLUMNS
                ),
                params![date],
                sample_from_row,
            )
            .optional()?;
        Ok(sample)
    }

    fn count_all(&self) -> Result<i64> {
        self.count(Tier::Raw)
    }

    fn distinct_dates_before(&self, cutoff_date: &str) -> Result<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT date_partition FROM exchange_rates
             WHERE date_partition < ?1
             ORDER BY date_partition ASC",
        )?;
        let dates = stmt
            .query_map(params![cutoff_date], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(dates)
    }

    fn replace_hourly(&self, date: &str, rows: &[HourlyAggregate]) -> Result<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM hourly_rates WHERE date_partition = ?1",
            params![date],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO hourly_rates (
                    date_partition, hour, avg_rate, min_rate, max_rate,
                    sample_count, first_collected_at, last_collected_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, unixepoch())",
            )?;
            for row in rows {
                stmt.execute(params![
                    date,
                    row.hour,
                    row.avg_value,
                    row.min_value,
                    row.max_value,
                    row.sample_count,
                    row.first_collected_at,
                    row.last_collected_at,
                ])?;
            }
        }

        tx.commit()?;
        Ok(rows.len())
    }

    fn upsert_daily(&self, row: &DailyAggregate) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO daily_rates (
                date_partition, avg_rate, min_rate, max_rate, peak_rate, peak_time,
                volatility, sample_count, first_collected_at, last_collected_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, unixepoch())
            ON CONFLICT(date_partition) DO UPDATE SET
                avg_rate = excluded.avg_rate,
                min_rate = excluded.min_rate,
                max_rate = excluded.max_rate,
                peak_rate = excluded.peak_rate,
                peak_time = excluded.peak_time,
                volatility = excluded.volatility,
                sample_count = excluded.sample_count,
                first_collected_at = excluded.first_collected_at,
                last_collected_at = excluded.last_collected_at,
                updated_at = excluded.updated_at",
            params![
                row.date_partition,
                row.avg_value,
                row.min_value,
                row.max_value,
                row.peak_value,
                row.peak_time,
                row.volatility,
                row.sample_count,
                row.first_collected_at,
                row.last_collected_at,
            ],
        )?;
        Ok(())
    }

    fn hourly_for_date(&self, date: &str) -> Result<Vec<HourlyAggregate>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT date_partition, hour, avg_rate, min_rate, max_rate,
                    sample_count, first_collected_at, last_collected_at
             FROM hourly_rates
             WHERE date_partition = ?1
             ORDER BY hour ASC",
        )?;
        let rows = stmt
            .query_map(params![date], hourly_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn daily_for_date(&self, date: &str) -> Result<Option<DailyAggregate>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT date_partition, avg_rate, min_rate, max_rate, peak_rate, peak_time,
                        volatility, sample_count, first_collected_at, last_collected_at
                 FROM daily_rates
                 WHERE date_partition = ?1",
                params![date],
                daily_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn count(&self, tier: Tier) -> Result<i64> {
        let conn = self.lock();
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", tier.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn count_before(&self, tier: Tier, cutoff_date: &str) -> Result<i64> {
        let conn = self.lock();
        let count = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE date_partition < ?1",
                tier.table()
            ),
            params![cutoff_date],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn purge_before(&self, tier: Tier, cutoff_date: &str) -> Result<usize> {
        if !tier.is_purgeable() {
            return Err(RateWatchError::InvalidInput(format!(
                "{} tier is never purged",
                tier.as_str()
            )));
        }

        let conn = self.lock();
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE date_partition < ?1", tier.table()),
            params![cutoff_date],
        )?;
        Ok(deleted)
    }

    fn oldest_date(&self, tier: Tier) -> Result<Option<String>> {
        let conn = self.lock();
        let oldest = conn.query_row(
            &format!("SELECT MIN(date_partition) FROM {}", tier.table()),
            [],
            |row| row.get::<_, Option<String>>(0),
        )?;
        Ok(oldest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimeZones;
    use tempfile::NamedTempFile;

    fn create_test_store() -> SqliteSampleStore {
        SqliteSampleStore::open_in_memory().unwrap()
    }

    fn sample(value: f64, collected_at: i64, date: &str) -> Sample {
        Sample {
            id: 0,
            currency_code: "USD".to_string(),
            value,
            collected_at,
            date_partition: date.to_string(),
        }
    }

    fn hourly(date: &str, hour: u32, avg: f64) -> HourlyAggregate {
        HourlyAggregate {
            date_partition: date.to_string(),
            hour,
            avg_value: avg,
            min_value: avg,
            max_value: avg,
            sample_count: 1,
            first_collected_at: 1_000,
            last_collected_at: 1_000,
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();

        run_schema_migrations(&conn).unwrap();
        run_schema_migrations(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('exchange_rates', 'hourly_rates', 'daily_rates')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_insert_and_latest() {
        let store = create_test_store();
        assert!(store.latest().unwrap().is_none());

        store.insert(&sample(7.10, 1_000, "2025-03-01")).unwrap();
        let id = store.insert(&sample(7.12, 2_000, "2025-03-01")).unwrap();

        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.value, 7.12);
        assert_eq!(store.count_all().unwrap(), 2);
    }

    #[test]
    fn test_insert_rejects_non_positive_values() {
        let store = create_test_store();

        let err = store.insert(&sample(0.0, 1_000, "2025-03-01")).unwrap_err();
        assert!(matches!(err, RateWatchError::InvalidInput(_)));

        let err = store.insert(&sample(f64::NAN, 1_000, "2025-03-01")).unwrap_err();
        assert!(matches!(err, RateWatchError::InvalidInput(_)));

        let err = store.insert(&sample(7.1, 1_000, "March 1st")).unwrap_err();
        assert!(matches!(err, RateWatchError::InvalidInput(_)));

        assert_eq!(store.count_all().unwrap(), 0);
    }

    #[test]
    fn test_sample_new_derives_partition() {
        let store = create_test_store();
        // 2025-03-01 16:30 UTC = 2025-03-02 00:30 UTC+8
        let ts = 1_740_846_600;
        let s = Sample::new(7.2, ts, &TimeZones::default());
        assert_eq!(s.date_partition, "2025-03-02");

        store.insert(&s).unwrap();
        assert_eq!(store.samples_for_date("2025-03-02").unwrap().len(), 1);
    }

    #[test]
    fn test_time_range_is_inclusive_and_ordered() {
        let store = create_test_store();
        store.insert(&sample(7.3, 300, "2025-03-01")).unwrap();
        store.insert(&sample(7.1, 100, "2025-03-01")).unwrap();
        store.insert(&sample(7.2, 200, "2025-03-01")).unwrap();
        store.insert(&sample(7.4, 400, "2025-03-01")).unwrap();

        let samples = store.by_time_range(100, 300).unwrap();
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![7.1, 7.2, 7.3]);
    }

    #[test]
    fn test_peak_for_date_prefers_earliest_max() {
        let store = create_test_store();
        store.insert(&sample(7.1, 100, "2025-03-01")).unwrap();
        store.insert(&sample(7.5, 200, "2025-03-01")).unwrap();
        store.insert(&sample(7.5, 300, "2025-03-01")).unwrap();
        store.insert(&sample(9.9, 400, "2025-03-02")).unwrap();

        let peak = store.peak_for_date("2025-03-01").unwrap().unwrap();
        assert_eq!(peak.value, 7.5);
        assert_eq!(peak.collected_at, 200);

        assert!(store.peak_for_date("2025-03-03").unwrap().is_none());
    }

    #[test]
    fn test_distinct_dates_before_is_strict_and_ascending() {
        let store = create_test_store();
        store.insert(&sample(7.1, 300, "2025-03-03")).unwrap();
        store.insert(&sample(7.1, 100, "2025-03-01")).unwrap();
        store.insert(&sample(7.1, 101, "2025-03-01")).unwrap();
        store.insert(&sample(7.1, 200, "2025-03-02")).unwrap();

        let dates = store.distinct_dates_before("2025-03-03").unwrap();
        assert_eq!(dates, vec!["2025-03-01", "2025-03-02"]);
    }

    #[test]
    fn test_replace_hourly_overwrites_previous_rows() {
        let store = create_test_store();
        let date = "2025-03-01";

        store
            .replace_hourly(date, &[hourly(date, 9, 7.1), hourly(date, 10, 7.2)])
            .unwrap();
        store.replace_hourly(date, &[hourly(date, 14, 7.3)]).unwrap();

        let rows = store.hourly_for_date(date).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hour, 14);
        assert_eq!(rows[0].avg_value, 7.3);
    }

    #[test]
    fn test_upsert_daily_replaces_row() {
        let store = create_test_store();
        let mut row = DailyAggregate {
            date_partition: "2025-03-01".to_string(),
            avg_value: 7.1,
            min_value: 7.0,
            max_value: 7.2,
            peak_value: 7.2,
            peak_time: 500,
            volatility: 0.2,
            sample_count: 3,
            first_collected_at: 100,
            last_collected_at: 900,
        };
        store.upsert_daily(&row).unwrap();

        row.sample_count = 4;
        row.avg_value = 7.15;
        store.upsert_daily(&row).unwrap();

        assert_eq!(store.count(Tier::Daily).unwrap(), 1);
        let stored = store.daily_for_date("2025-03-01").unwrap().unwrap();
        assert_eq!(stored, row);
    }

    #[test]
    fn test_purge_and_count_before() {
        let store = create_test_store();
        store.insert(&sample(7.1, 100, "2025-03-01")).unwrap();
        store.insert(&sample(7.1, 200, "2025-03-02")).unwrap();
        store.insert(&sample(7.1, 300, "2025-03-03")).unwrap();

        assert_eq!(store.count_before(Tier::Raw, "2025-03-03").unwrap(), 2);
        assert_eq!(store.purge_before(Tier::Raw, "2025-03-03").unwrap(), 2);
        assert_eq!(store.count_all().unwrap(), 1);
        assert_eq!(
            store.oldest_date(Tier::Raw).unwrap().as_deref(),
            Some("2025-03-03")
        );
    }

    #[test]
    fn test_daily_tier_is_never_purged() {
        let store = create_test_store();
        let err = store.purge_before(Tier::Daily, "2099-01-01").unwrap_err();
        assert!(matches!(err, RateWatchError::InvalidInput(_)));
    }

    #[test]
    fn test_oldest_date_empty_tier() {
        let store = create_test_store();
        for tier in Tier::all() {
            assert_eq!(store.oldest_date(tier).unwrap(), None);
            assert_eq!(store.count(tier).unwrap(), 0);
        }
    }

    #[test]
    fn test_file_store_persists_across_handles() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let store = SqliteSampleStore::open(temp_file.path()).unwrap();
            store.insert(&sample(7.1, 100, "2025-03-01")).unwrap();
        }
        let store = SqliteSampleStore::open(temp_file.path()).unwrap();
        assert_eq!(store.count_all().unwrap(), 1);
    }
}
