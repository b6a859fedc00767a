//! Connection PRAGMAs shared by every SQLite handle
//!
//! The poller appends to the same database file while retention and analytics
//! run, so every connection opened by this crate goes through
//! [`apply_optimized_pragmas`] first.

use rusqlite::Connection;
use std::time::Duration;

/// Milliseconds a statement waits on a locked database before failing
pub const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Apply WAL journaling, NORMAL sync, in-memory temp storage and a busy timeout
pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode echoes the resulting mode back as a row
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;

    log::debug!(
        "📊 SQLite pragmas applied (journal_mode={}, synchronous=NORMAL, busy_timeout={}ms)",
        mode,
        BUSY_TIMEOUT_MS
    );

    Ok(())
}
