//! Cache Cleanup Task
//!
//! Background task that periodically runs the engine's maintenance pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::storage::{CleanupOptions, StorageEngine};

/// Spawns a background task that runs `StorageEngine::cleanup` every
/// `cleanup_interval_secs` seconds.
///
/// Returns the task handle so it can be aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let engine = Arc::new(StorageEngine::memory(StorageConfig::default()));
/// let cleanup_handle = spawn_cleanup_task(engine.clone(), 60, CleanupOptions::default());
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(
    engine: Arc<StorageEngine>,
    cleanup_interval_secs: u64,
    options: CleanupOptions,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            interval_secs = cleanup_interval_secs,
            max_age = ?options.max_age_seconds,
            max_size = ?options.max_size_bytes,
            "Starting cache cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let result = engine.cleanup(&options).await;
            match result.data {
                Some(report) if report.removed() > 0 => info!(
                    expired = report.expired,
                    aged_out = report.aged_out,
                    evicted_for_size = report.evicted_for_size,
                    bytes_freed = report.bytes_freed,
                    "Cache cleanup removed entries"
                ),
                Some(_) => debug!("Cache cleanup: nothing to remove"),
                None => warn!(error = ?result.error, "Cache cleanup failed"),
            }
        }
    })
}
