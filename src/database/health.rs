use std::path::Path;
use std::time::Duration;

use tracing::instrument;

/// Name of the scratch file written while probing a directory.
pub const PROBE_FILE: &str = "test_write.tmp";

/// Ensures `location` exists and that a file can be created and removed inside it.
///
/// Failures are logged and reported as `false`, never raised.
#[instrument]
pub fn probe(location: &Path) -> bool {
    match try_probe(location) {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(location = %location.display(), "cannot create or write to data directory: {}", err);
            false
        }
    }
}

fn try_probe(location: &Path) -> std::io::Result<()> {
    if !location.exists() {
        std::fs::create_dir_all(location)?;
        tracing::info!(location = %location.display(), "created data directory");
    }

    let probe_file = location.join(PROBE_FILE);
    std::fs::write(&probe_file, b"test")?;
    std::fs::remove_file(&probe_file)
}

/// [probe] on the blocking pool, treating a probe that outlives `timeout` as a failure.
pub async fn probe_within(location: &Path, timeout: Duration) -> bool {
    let location = location.to_path_buf();
    within(timeout, move || probe(&location)).await.unwrap_or(false)
}

/// Runs `f` on the blocking pool. `None` if it panics or is still running after `timeout`.
async fn within<T, F>(timeout: Duration, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            tracing::error!("storage probe task failed: {}", err);
            None
        }
        Err(_) => {
            tracing::error!(?timeout, "storage probe timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let location = root.path().join("nested").join("data");

        assert!(probe(&location));
        assert!(location.is_dir());
        assert!(!location.join(PROBE_FILE).exists(), "probe file should be cleaned up");
    }

    #[test]
    fn directory_below_a_file_is_not_writable() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        assert!(!probe(&blocker.join("data")));
    }

    #[tokio::test]
    async fn async_probe_reports_writable_directory() {
        let root = tempfile::tempdir().unwrap();
        assert!(probe_within(root.path(), Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn slow_probe_counts_as_failure() {
        let outcome = within(Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(300));
            true
        })
        .await;

        assert_eq!(outcome, None);
    }
}
