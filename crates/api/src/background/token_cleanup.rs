//! Periodic deletion of expired and revoked refresh-token sessions.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use formcraft_db::repositories::SessionRepo;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the cleanup loop until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    tracing::info!(interval_secs = CLEANUP_INTERVAL.as_secs(), "Token cleanup job started");

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Token cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                match SessionRepo::delete_stale(&pool).await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Token cleanup: purged stale sessions");
                    }
                    Ok(_) => tracing::debug!("Token cleanup: nothing to purge"),
                    Err(e) => tracing::error!(error = %e, "Token cleanup failed"),
                }
            }
        }
    }
}
