use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension as _, TransactionBehavior};
use snafu::{ensure, ResultExt as _};

use super::error::{AbandonedSnafu, OpenSnafu, QuerySnafu, Result, SchemaSnafu};
use super::gate::CommitGate;
use crate::model::{GlobalStats, Rating, Timestamp, UserStats};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ratings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT,
    username TEXT,
    percentage INTEGER,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS user_stats (
    user_id TEXT PRIMARY KEY,
    username TEXT,
    total_checks INTEGER DEFAULT 0,
    avg_percentage REAL DEFAULT 0,
    max_percentage INTEGER DEFAULT 0,
    last_check TIMESTAMP
);
";

// Every right-hand side of the SET clause sees the row as it was before the update,
// so the mean is folded with the old count.
const UPSERT_USER_STATS: &str = "
INSERT INTO user_stats (user_id, username, total_checks, avg_percentage, max_percentage, last_check)
VALUES (?1, ?2, 1, CAST(?3 AS REAL), ?3, ?4)
ON CONFLICT(user_id) DO UPDATE SET
    username = excluded.username,
    total_checks = user_stats.total_checks + 1,
    avg_percentage = (user_stats.avg_percentage * user_stats.total_checks + excluded.avg_percentage)
        / (user_stats.total_checks + 1),
    max_percentage = MAX(user_stats.max_percentage, excluded.max_percentage),
    last_check = MAX(COALESCE(user_stats.last_check, excluded.last_check), excluded.last_check)
";

/// A connection to the single-file statistics database.
///
/// The store owns both tables: the append-only `ratings` log and the `user_stats`
/// aggregate derived from it.
#[derive(Debug)]
pub struct StatsStore {
    conn: Connection,
}

impl StatsStore {
    /// Opens (or creates) the database file. Lock contention waits up to `busy_timeout`.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path).context(OpenSnafu { path })?;
        conn.busy_timeout(busy_timeout).context(OpenSnafu { path })?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context(OpenSnafu { path })?;

        Ok(Self { conn })
    }

    pub fn migrate(&mut self, gate: &CommitGate) -> Result<()> {
        let tx = self.conn.transaction().context(SchemaSnafu)?;
        tx.execute_batch(SCHEMA).context(SchemaSnafu)?;

        ensure!(gate.begin_commit(), AbandonedSnafu);
        tx.commit().context(SchemaSnafu)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Appends a rating and folds it into the user's aggregate as one transaction.
    ///
    /// The transaction is `IMMEDIATE`, so the writer lock is held from the first read of
    /// the aggregate until commit and concurrent checks for the same user cannot interleave.
    /// Any error, or a `gate` abandoned before the commit, drops the transaction and rolls
    /// both writes back.
    pub fn record_check(
        &mut self, user_id: &str, username: &str, percentage: u8, now: Timestamp, gate: &CommitGate,
    ) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context(QuerySnafu)?;

        tx.execute(
            "INSERT INTO ratings (user_id, username, percentage, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, username, percentage, now],
        )
        .context(QuerySnafu)?;

        tx.execute(UPSERT_USER_STATS, params![user_id, username, percentage, now])
            .context(QuerySnafu)?;

        ensure!(gate.begin_commit(), AbandonedSnafu);
        tx.commit().context(QuerySnafu)
    }

    pub fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        self.conn
            .query_row(
                "SELECT user_id, username, total_checks, avg_percentage, max_percentage, last_check
                 FROM user_stats WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(UserStats::new(
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()
            .context(QuerySnafu)
    }

    pub fn global_stats(&self) -> Result<GlobalStats> {
        self.conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT user_id), AVG(percentage) FROM ratings",
                [],
                |row| Ok(GlobalStats::from_log(row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .context(QuerySnafu)
    }

    /// The rating log of one user, oldest first.
    pub fn ratings(&self, user_id: &str) -> Result<Vec<Rating>> {
        let mut statement = self
            .conn
            .prepare(
                "SELECT id, user_id, username, percentage, created_at
                 FROM ratings WHERE user_id = ?1 ORDER BY id ASC",
            )
            .context(QuerySnafu)?;

        let rows = statement
            .query_map(params![user_id], |row| {
                Ok(Rating::new(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })
            .context(QuerySnafu)?;

        rows.collect::<Result<Vec<_>, _>>().context(QuerySnafu)
    }

    pub fn tables(&self) -> Result<Vec<String>> {
        let mut statement = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .context(QuerySnafu)?;

        let rows = statement
            .query_map([], |row| row.get(0))
            .context(QuerySnafu)?;

        rows.collect::<Result<Vec<_>, _>>().context(QuerySnafu)
    }
}
