use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use derive_new::new;
use snafu::ResultExt as _;
use tokio_retry::Retry;
use tracing::instrument;

/// Directory and write-access probing.
pub mod health;

/// Retry policy for initialization.
pub mod retry;

mod error;
mod gate;
mod state;
mod store;

pub use error::*;
pub use gate::CommitGate;
pub use retry::RetryPolicy;
pub use state::{StorageMode, StorageState};
pub use store::StatsStore;

use crate::model::{now, GlobalStats, Rating, UserKey, UserStats};

/// Where the database lives and how hard to try reaching it.
#[derive(Debug, Clone, new)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
    pub retry: RetryPolicy,
    /// Upper bound for a single probe, connection or query.
    pub timeout: Duration,
    /// Minimum time between re-initialization attempts while degraded.
    pub reinit_cooldown: Duration,
}

impl StorageConfig {
    pub const DEFAULT_DATABASE_FILE: &'static str = "cat_meter.db";

    /// Default settings for a database stored in `data_dir`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            data_dir.into(),
            Self::DEFAULT_DATABASE_FILE.to_string(),
            RetryPolicy::default(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

/// Handle to the statistics database.
///
/// Cloning is cheap and every clone shares the same [StorageState]. A connection is
/// opened for each operation and closed before the operation returns.
#[derive(Debug, Clone)]
pub struct Storage {
    config: Arc<StorageConfig>,
    state: Arc<StorageState>,
}

impl Storage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(StorageState::new()),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn mode(&self) -> StorageMode {
        self.state.mode()
    }

    pub fn is_available(&self) -> bool {
        self.state.is_available()
    }

    /// Sets up the database following the configured retry policy.
    ///
    /// Ends in [StorageMode::Available] or [StorageMode::Degraded]; never fails.
    #[instrument(skip(self), fields(path = %self.config.database_path().display()))]
    pub async fn initialize(&self) -> bool {
        let mut last_attempt = self.state.lock_attempts().await;
        let available = self.run_initialization(self.config.retry).await;
        *last_attempt = Some(tokio::time::Instant::now());

        available
    }

    /// One re-initialization attempt for a degraded storage.
    ///
    /// Skipped when another attempt is in flight or the previous one finished less than
    /// `reinit_cooldown` ago.
    async fn recover(&self) -> bool {
        let Some(mut last_attempt) = self.state.try_lock_attempts() else {
            tracing::debug!("storage initialization already in progress");
            return self.is_available();
        };

        if self.is_available() {
            return true;
        }

        if let Some(at) = *last_attempt {
            if at.elapsed() < self.config.reinit_cooldown {
                tracing::debug!(cooldown = ?self.config.reinit_cooldown, "skipping storage re-initialization");
                return false;
            }
        }

        tracing::info!("storage is degraded, attempting to re-initialize");
        let available = self.run_initialization(RetryPolicy::once()).await;
        *last_attempt = Some(tokio::time::Instant::now());

        available
    }

    /// Must be called while holding the attempts lock.
    async fn run_initialization(&self, policy: RetryPolicy) -> bool {
        self.state.set(StorageMode::Initializing);

        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        let result = Retry::spawn(policy.delays(), || {
            attempt += 1;
            let attempt = attempt;
            let storage = self.clone();

            async move {
                storage.try_initialize().await.map_err(|err| {
                    tracing::warn!(attempt, max_attempts, "storage initialization failed: {}", err);
                    err
                })
            }
        })
        .await;

        match result {
            Ok(()) => {
                tracing::info!("storage initialized successfully");
                self.state.set(StorageMode::Available);
                true
            }
            Err(_) => {
                tracing::error!(max_attempts, "all storage initialization attempts failed");
                self.state.set(StorageMode::Degraded);
                false
            }
        }
    }

    /// Probe the data directory, connect, and create the schema.
    async fn try_initialize(&self) -> Result<()> {
        let data_dir = &self.config.data_dir;
        if !health::probe_within(data_dir, self.config.timeout).await {
            return NotWritableSnafu { path: data_dir }.fail();
        }

        self.blocking("migrate", |store, gate| store.migrate(gate)).await
    }

    /// Whether the data directory can currently be written to.
    pub async fn is_writable(&self) -> bool {
        health::probe_within(&self.config.data_dir, self.config.timeout).await
    }

    /// Records one check. Best-effort: failures are logged and reported as `false`.
    #[instrument(skip(self))]
    pub async fn record_check(&self, user_id: &UserKey, username: &str, percentage: u8) -> bool {
        if !Rating::PERCENTAGE_RANGE.contains(&percentage) {
            tracing::warn!(%user_id, percentage, "refusing to save a percentage outside 1..=100");
            return false;
        }

        if !self.is_available() && !self.recover().await {
            tracing::warn!(%user_id, "storage not available, skipping save");
            return false;
        }

        let user_id = user_id.to_string();
        let username = username.to_owned();

        let result = self
            .blocking("record_check", move |store, gate| {
                store.record_check(&user_id, &username, percentage, now(), gate)
            })
            .await;

        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(percentage, "failed to save rating: {}", err);
                false
            }
        }
    }

    pub async fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        let user_id = user_id.to_owned();
        self.blocking("user_stats", move |store, _| store.user_stats(&user_id))
            .await
    }

    pub async fn global_stats(&self) -> Result<GlobalStats> {
        self.blocking("global_stats", |store, _| store.global_stats())
            .await
    }

    pub async fn tables(&self) -> Result<Vec<String>> {
        self.blocking("tables", |store, _| store.tables()).await
    }

    /// Runs `operation` against a fresh connection on the blocking pool, bounded by the
    /// configured timeout.
    ///
    /// When the timeout elapses the [CommitGate] is abandoned, so a transaction that has not
    /// started committing rolls back. One that already has is waited for: a `Timeout` error
    /// always means nothing was written.
    async fn blocking<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StatsStore, &CommitGate) -> Result<T> + Send + 'static,
    {
        let path = self.config.database_path();
        let timeout = self.config.timeout;
        let gate = Arc::new(CommitGate::new());

        let mut task = tokio::task::spawn_blocking({
            let gate = Arc::clone(&gate);
            move || {
                let mut store = StatsStore::open(&path, timeout)?;
                f(&mut store, &gate)
            }
        });

        let joined = match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) if gate.abandon() => return TimeoutSnafu { operation, timeout }.fail(),
            Err(_) => {
                tracing::debug!(operation, "commit already under way, waiting for it");
                task.await
            }
        };

        joined.context(BlockingSnafu { operation })?
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn blocked_config(root: &Path) -> StorageConfig {
        let blocker = root.join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut config = StorageConfig::in_dir(blocker.join("data"));
        config.retry = RetryPolicy::new(3, Duration::from_millis(10));
        config.reinit_cooldown = Duration::ZERO;
        config
    }

    #[tokio::test]
    async fn initialize_creates_the_data_directory_and_schema() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::new(StorageConfig::in_dir(root.path().join("data")));
        assert_eq!(storage.mode(), StorageMode::Uninitialized);

        assert!(storage.initialize().await);
        assert_eq!(storage.mode(), StorageMode::Available);
        assert!(storage.config().database_path().exists());

        let tables = storage.tables().await.unwrap();
        assert!(tables.contains(&"ratings".to_string()));
        assert!(tables.contains(&"user_stats".to_string()));
    }

    #[tokio::test]
    async fn unwritable_storage_degrades_after_retries() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::new(blocked_config(root.path()));

        assert!(!storage.initialize().await);
        assert_eq!(storage.mode(), StorageMode::Degraded);
        assert!(!storage.is_writable().await);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_wait_between_attempts() {
        let root = tempfile::tempdir().unwrap();
        let mut config = blocked_config(root.path());
        config.retry = RetryPolicy::new(3, Duration::from_secs(1));
        let storage = Storage::new(config);

        let started = tokio::time::Instant::now();
        assert!(!storage.initialize().await);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn degraded_storage_skips_writes() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::new(blocked_config(root.path()));
        storage.initialize().await;

        assert!(!storage.record_check(&UserKey::from("u1"), "Alice", 50).await);
        assert_eq!(storage.mode(), StorageMode::Degraded);
    }

    #[tokio::test]
    async fn write_while_degraded_recovers_once_storage_returns() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::new(blocked_config(root.path()));
        assert!(!storage.initialize().await);

        std::fs::remove_file(root.path().join("blocker")).unwrap();

        assert!(storage.record_check(&UserKey::from("u1"), "Alice", 50).await);
        assert_eq!(storage.mode(), StorageMode::Available);

        let stats = storage.user_stats("u1").await.unwrap().unwrap();
        assert_eq!(stats.total_checks, 1);
    }

    #[tokio::test]
    async fn recovery_respects_the_cooldown() {
        let root = tempfile::tempdir().unwrap();
        let mut config = blocked_config(root.path());
        config.reinit_cooldown = Duration::from_secs(3600);
        let storage = Storage::new(config);
        assert!(!storage.initialize().await);

        std::fs::remove_file(root.path().join("blocker")).unwrap();

        assert!(!storage.record_check(&UserKey::from("u1"), "Alice", 50).await);
        assert_eq!(storage.mode(), StorageMode::Degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn degraded_write_makes_a_single_attempt() {
        let root = tempfile::tempdir().unwrap();
        let mut config = blocked_config(root.path());
        config.retry = RetryPolicy::new(3, Duration::from_secs(3600));
        let storage = Storage::new(config);
        assert!(!storage.initialize().await);

        let started = tokio::time::Instant::now();
        assert!(!storage.record_check(&UserKey::from("u1"), "Alice", 50).await);
        assert!(started.elapsed() < Duration::from_secs(3600), "waited {:?}", started.elapsed());
        assert_eq!(storage.mode(), StorageMode::Degraded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn write_behind_a_held_lock_times_out_without_committing() {
        let root = tempfile::tempdir().unwrap();
        let mut config = StorageConfig::in_dir(root.path());
        config.timeout = Duration::from_millis(200);
        let storage = Storage::new(config);
        assert!(storage.initialize().await);

        let holder = rusqlite::Connection::open(storage.config().database_path()).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let saved = tokio::time::timeout(
            Duration::from_secs(5),
            storage.record_check(&UserKey::from("u1"), "Alice", 50),
        )
        .await
        .expect("record_check hung behind the writer lock");
        assert!(!saved);

        holder.execute_batch("COMMIT;").unwrap();
        drop(holder);

        // Let the detached blocking task run to completion before looking at the file.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(storage.user_stats("u1").await.unwrap(), None);
        assert_eq!(storage.global_stats().await.unwrap().total_checks, 0);
    }

    #[tokio::test]
    async fn out_of_range_percentage_is_not_saved() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::new(StorageConfig::in_dir(root.path()));
        assert!(storage.initialize().await);

        assert!(!storage.record_check(&UserKey::from("u1"), "Alice", 0).await);
        assert!(!storage.record_check(&UserKey::from("u1"), "Alice", 101).await);
        assert_eq!(storage.user_stats("u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn uninitialized_storage_initializes_on_first_write() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::new(StorageConfig::in_dir(root.path()));

        assert!(storage.record_check(&UserKey::from("u1"), "Alice", 70).await);
        assert!(storage.is_available());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_for_one_user_are_serialized() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::new(StorageConfig::in_dir(root.path()));
        assert!(storage.initialize().await);

        let key = UserKey::from("u1");
        let tasks = (1..=20_u8).map(|percentage| {
            let storage = storage.clone();
            let key = key.clone();
            tokio::spawn(async move { storage.record_check(&key, "Alice", percentage).await })
        });

        for saved in futures::future::join_all(tasks).await {
            assert!(saved.unwrap());
        }

        let stats = storage.user_stats("u1").await.unwrap().unwrap();
        assert_eq!(stats.total_checks, 20);
        assert!((stats.avg_percentage - 10.5).abs() < 1e-9);
        assert_eq!(stats.max_percentage, 20);
    }
}
