//! Periodic closing of idle editor sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::editor::EditorSessionManager;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(editor: Arc<EditorSessionManager>, cancel: CancellationToken) {
    tracing::info!(interval_secs = SWEEP_INTERVAL.as_secs(), "Editor session sweep started");

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Editor session sweep stopping");
                break;
            }
            _ = interval.tick() => {
                let closed = editor.sweep_idle().await;
                if closed > 0 {
                    let remaining = editor.len().await;
                    tracing::info!(closed, remaining, "Closed idle editor sessions");
                } else {
                    tracing::debug!("Editor session sweep: nothing idle");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stops_on_cancel() {
        let editor = Arc::new(EditorSessionManager::new(Duration::from_secs(60)));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(editor, cancel.clone()));

        tokio::time::advance(SWEEP_INTERVAL * 3).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweep should stop promptly")
            .expect("sweep task should not panic");
    }
}
