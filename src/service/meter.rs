use derive_new::new;
use serde::Serialize;
use snafu::{Location, ResultExt as _, Snafu};
use tracing::instrument;

use super::score;
use crate::database::{Storage, StorageError};
use crate::model::{now, GlobalStats, GlobalStatsReport, Timestamp, UserKey, UserStats};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StatsError {
    #[snafu(display("storage is not available"))]
    StorageUnavailable {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("no stats recorded for `{user_id}`"))]
    NotFound {
        user_id: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to read stats at {location}: {source}"))]
    ReadStats {
        source: StorageError,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, new)]
pub struct Score {
    pub percentage: u8,
    pub phrase: &'static str,
}

/// Scoring and statistics, as used by the request handlers.
///
/// Scoring never depends on storage. Recording is best-effort; reads tell "no data"
/// apart from "storage is down".
#[derive(Debug, Clone, new)]
pub struct CatMeter {
    storage: Storage,
}

impl CatMeter {
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn compute_score(&self, name: &str) -> Score {
        self.compute_score_at(name, now())
    }

    pub fn compute_score_at(&self, name: &str, at: Timestamp) -> Score {
        let percentage = score::score(name, at);
        let phrase = score::phrase(&mut rand::thread_rng());

        Score::new(percentage, phrase)
    }

    pub async fn record_check(&self, user_id: &UserKey, username: &str, percentage: u8) -> bool {
        self.storage.record_check(user_id, username, percentage).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_user_stats(&self, user_id: &str) -> Result<UserStats, StatsError> {
        if !self.storage.is_available() {
            return StorageUnavailableSnafu.fail();
        }

        self.storage
            .user_stats(user_id)
            .await
            .context(ReadStatsSnafu)?
            .ok_or_else(|| NotFoundSnafu { user_id }.build())
    }

    /// Zeros while degraded; `storage_available` says which case applies.
    #[instrument(skip(self))]
    pub async fn fetch_global_stats(&self) -> GlobalStatsReport {
        if !self.storage.is_available() {
            return GlobalStatsReport::new(GlobalStats::default(), false);
        }

        let stats = match self.storage.global_stats().await {
            Ok(stats) => stats,
            // Storage is up but this read failed: report zeros and keep `storage_available`
            // true, leaving the 503 to the degraded case only.
            Err(err) => {
                tracing::error!("error getting global stats: {}", err);
                GlobalStats::default()
            }
        };

        GlobalStatsReport::new(stats, true)
    }

    pub fn is_storage_available(&self) -> bool {
        self.storage.is_available()
    }

    pub async fn check_storage_writable(&self) -> bool {
        self.storage.is_writable().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::database::{RetryPolicy, StorageConfig};

    struct Fixture {
        _dir: tempfile::TempDir,
        meter: CatMeter,
    }

    async fn available() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(StorageConfig::in_dir(dir.path()));
        assert!(storage.initialize().await);

        Fixture { _dir: dir, meter: CatMeter::new(storage) }
    }

    async fn degraded() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut config = StorageConfig::in_dir(blocker.join("data"));
        config.retry = RetryPolicy::new(2, Duration::from_millis(5));
        config.reinit_cooldown = Duration::from_secs(3600);

        let storage = Storage::new(config);
        assert!(!storage.initialize().await);

        Fixture { _dir: dir, meter: CatMeter::new(storage) }
    }

    #[tokio::test]
    async fn user_stats_follow_recorded_checks() {
        let fixture = available().await;
        let key = UserKey::from("u1");

        assert!(fixture.meter.record_check(&key, "Alice", 50).await);
        assert!(fixture.meter.record_check(&key, "Alice", 80).await);

        let stats = fixture.meter.fetch_user_stats("u1").await.unwrap();
        assert_eq!(stats.total_checks, 2);
        assert_eq!(stats.avg_percentage, 65.0);
        assert_eq!(stats.max_percentage, 80);
    }

    #[tokio::test]
    async fn global_stats_cover_every_user() {
        let fixture = available().await;

        assert!(fixture.meter.record_check(&UserKey::from("u1"), "Alice", 10).await);
        assert!(fixture.meter.record_check(&UserKey::from("u2"), "Bob", 50).await);
        assert!(fixture.meter.record_check(&UserKey::from("u1"), "Alice", 90).await);

        let report = fixture.meter.fetch_global_stats().await;
        assert!(report.storage_available);
        assert_eq!(report.stats, GlobalStats::new(3, 2, 50.0));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let fixture = available().await;

        let result = fixture.meter.fetch_user_stats("never-seen").await;
        assert!(matches!(result, Err(StatsError::NotFound { .. })), "got {result:?}");
    }

    #[tokio::test]
    async fn scoring_survives_unwritable_storage() {
        let fixture = degraded().await;

        assert!(!fixture.meter.is_storage_available());
        assert!(!fixture.meter.check_storage_writable().await);

        let score = fixture.meter.compute_score("Alice");
        assert!((1..=100).contains(&score.percentage));
        assert!(score::PHRASES.contains(&score.phrase));

        assert!(!fixture.meter.record_check(&UserKey::from("u1"), "Alice", score.percentage).await);
    }

    #[tokio::test]
    async fn reads_report_unavailable_storage() {
        let fixture = degraded().await;

        let result = fixture.meter.fetch_user_stats("u1").await;
        assert!(matches!(result, Err(StatsError::StorageUnavailable { .. })), "got {result:?}");

        let report = fixture.meter.fetch_global_stats().await;
        assert!(!report.storage_available);
        assert_eq!(report.stats, GlobalStats::default());
    }

    #[tokio::test]
    async fn failed_read_on_available_storage_reports_zeros() {
        let fixture = available().await;
        assert!(fixture.meter.record_check(&UserKey::from("u1"), "Alice", 50).await);

        let path = fixture.meter.storage().config().database_path();
        rusqlite::Connection::open(path)
            .unwrap()
            .execute_batch("DROP TABLE ratings;")
            .unwrap();

        let report = fixture.meter.fetch_global_stats().await;
        assert!(report.storage_available);
        assert_eq!(report.stats, GlobalStats::default());
    }
}
