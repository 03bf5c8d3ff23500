//! Scheduled cleanup of expired sessions.

use crate::session::SessionStore;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(sessions: &SessionStore) {
    match sessions.purge_expired().await {
        Ok(count) if count > 0 => info!("Cleared {} expired refresh tokens", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clear expired refresh tokens: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(sessions: SessionStore) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&sessions).await;
        }
    })
}
