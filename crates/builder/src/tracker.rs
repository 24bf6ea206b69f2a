//! Per-survey build tracking.
//!
//! [`BuildTracker::start`] asks the build service for an image, then spawns a
//! poll task that lists images every [`POLL_INTERVAL`] until a `latest` tag
//! shows up or [`BUILD_TIMEOUT`] elapses since the request. Each build owns a
//! child of the tracker's root [`CancellationToken`], so a newer build,
//! survey deletion, or shutdown stops its poller.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use formcraft_core::deployment::{
    find_latest, BuildState, ImageInfo, BUILD_TIMEOUT, LATEST_TAG, POLL_INTERVAL,
};
use formcraft_core::types::DbId;

use crate::api::{BuildRequest, BuildService, BuilderApiError};

/// Shown when the build service refuses a build without saying why.
pub const GENERIC_BUILD_FAILURE: &str = "The build could not be started. Please try again later.";

struct TrackedBuild {
    state: BuildState,
    /// Distinguishes this build from earlier ones for the same survey so a
    /// superseded poller can never overwrite a newer state.
    generation: u64,
    cancel: CancellationToken,
}

type BuildMap = Arc<RwLock<HashMap<DbId, TrackedBuild>>>;

pub struct BuildTracker {
    service: Arc<dyn BuildService>,
    builds: BuildMap,
    root: CancellationToken,
    next_generation: std::sync::atomic::AtomicU64,
}

impl BuildTracker {
    pub fn new(service: Arc<dyn BuildService>) -> Self {
        Self {
            service,
            builds: Arc::new(RwLock::new(HashMap::new())),
            root: CancellationToken::new(),
            next_generation: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub fn service(&self) -> &Arc<dyn BuildService> {
        &self.service
    }

    /// Current state for a survey; `Idle` if nothing was ever tracked.
    pub async fn state(&self, survey_id: DbId) -> BuildState {
        self.builds
            .read()
            .await
            .get(&survey_id)
            .map(|build| build.state.clone())
            .unwrap_or(BuildState::Idle)
    }

    /// Trigger a build and start polling. Returns the resulting state:
    /// `Building` when the request was accepted, `Failed` otherwise.
    pub async fn start(&self, request: BuildRequest) -> BuildState {
        let survey_id = request.survey_id;
        let owner_id = request.user_id;
        self.cancel(survey_id).await;

        let deadline = Instant::now() + BUILD_TIMEOUT;
        let generation = self
            .next_generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        if let Err(e) = self.service.trigger_build(&request).await {
            let detail = e
                .user_detail()
                .map(str::to_string)
                .unwrap_or_else(|| GENERIC_BUILD_FAILURE.to_string());
            tracing::error!(survey_id, error = %e, "Build request rejected");
            let state = BuildState::Failed { detail };
            self.track(
                survey_id,
                TrackedBuild {
                    state: state.clone(),
                    generation,
                    cancel: CancellationToken::new(),
                },
            )
            .await;
            return state;
        }

        let state = BuildState::Building {
            started_at: chrono::Utc::now(),
        };
        let cancel = self.root.child_token();
        self.track(
            survey_id,
            TrackedBuild {
                state: state.clone(),
                generation,
                cancel: cancel.clone(),
            },
        )
        .await;

        tracing::info!(survey_id, owner_id, "Build accepted, polling for image");
        tokio::spawn(poll_until_done(
            Arc::clone(&self.service),
            Arc::clone(&self.builds),
            owner_id,
            survey_id,
            generation,
            deadline,
            cancel,
        ));

        state
    }

    /// Record `build` as the survey's current one. Whatever it replaces is
    /// cancelled, including a build started concurrently with this one.
    async fn track(&self, survey_id: DbId, build: TrackedBuild) {
        if let Some(old) = self.builds.write().await.insert(survey_id, build) {
            old.cancel.cancel();
        }
    }

    /// Stop tracking a survey (e.g. it was deleted), cancelling any poller.
    pub async fn cancel(&self, survey_id: DbId) {
        if let Some(build) = self.builds.write().await.remove(&survey_id) {
            build.cancel.cancel();
        }
    }

    /// Delete the survey's `latest` image and reset its state to `Idle`.
    pub async fn delete_image(&self, owner_id: DbId, survey_id: DbId) -> Result<(), BuilderApiError> {
        self.service
            .delete_image(owner_id, survey_id, LATEST_TAG)
            .await?;
        self.cancel(survey_id).await;
        tracing::info!(survey_id, "Deployment image deleted");
        Ok(())
    }

    /// Cancel every poller. Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let active = self
            .builds
            .read()
            .await
            .values()
            .filter(|build| build.state.is_building())
            .count();
        self.root.cancel();
        tracing::info!(active, "Build pollers cancelled");
    }
}

async fn poll_until_done(
    service: Arc<dyn BuildService>,
    builds: BuildMap,
    owner_id: DbId,
    survey_id: DbId,
    generation: u64,
    deadline: Instant,
    cancel: CancellationToken,
) {
    // The deadline and the token also interrupt an in-flight listing.
    let finished = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        _ = tokio::time::sleep_until(deadline) => Some(BuildState::timed_out()),
        image = wait_for_latest(service.as_ref(), owner_id, survey_id) => {
            Some(BuildState::Succeeded { image })
        }
    };

    match finished {
        None => tracing::debug!(survey_id, "Build poller cancelled"),
        Some(state) => {
            match &state {
                BuildState::Succeeded { image } => {
                    tracing::info!(survey_id, image = %image.name, "Build succeeded");
                }
                _ => tracing::warn!(survey_id, "Build timed out waiting for image"),
            }
            set_state(&builds, survey_id, generation, state).await;
        }
    }
}

/// List images every [`POLL_INTERVAL`] until one is tagged `latest`.
async fn wait_for_latest(service: &dyn BuildService, owner_id: DbId, survey_id: DbId) -> ImageInfo {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match service.list_images(owner_id, survey_id).await {
            Ok(images) => {
                if let Some(image) = find_latest(&images) {
                    return image.clone();
                }
                tracing::debug!(survey_id, images = images.len(), "Image not ready yet");
            }
            Err(e) => {
                tracing::warn!(survey_id, error = %e, "Image listing failed, will retry");
            }
        }
    }
}

async fn set_state(builds: &BuildMap, survey_id: DbId, generation: u64, state: BuildState) {
    if let Some(build) = builds.write().await.get_mut(&survey_id) {
        if build.generation == generation {
            build.state = state;
        }
    }
}
