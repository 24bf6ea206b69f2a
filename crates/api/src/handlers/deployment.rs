//! Handlers for `/surveys/{id}/deployment`: build, status, image deletion,
//! local deploy scripts and remote deploys.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use formcraft_builder::{BuildRequest, DeployScriptRequest, RemoteDeployRequest};
use formcraft_core::deployment::{
    deploy_script_filename, find_latest, BuildState, DeployOs, ImageInfo, DEFAULT_APP_PORT,
    DEFAULT_SSH_PORT, DEFAULT_SSH_USER,
};
use formcraft_core::error::CoreError;
use formcraft_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::handlers::surveys::find_owned;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DeploymentStatus {
    pub build: BuildState,
    /// The `latest` image, when the build service has one.
    pub image: Option<ImageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ScriptRequest {
    pub os: DeployOs,
    /// Host port the form app is published on.
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteRequest {
    pub ip: String,
    pub user: Option<String>,
    /// Private SSH key, PEM text.
    pub key: String,
    pub port: Option<u16>,
}

/// GET /api/v1/surveys/{id}/deployment
pub async fn status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<DeploymentStatus>>> {
    find_owned(&state, id, auth.user_id).await?;
    let build = state.builds.state(id).await;
    let image = latest_image(&state, auth.user_id, id).await?;
    Ok(Json(DataResponse {
        data: DeploymentStatus { build, image },
    }))
}

/// POST /api/v1/surveys/{id}/deployment/build
///
/// Builds from the saved survey, not from an open editor session. Answers
/// 202 once the service accepted the build; polling continues in the
/// background and is visible through `status`.
pub async fn build(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<(StatusCode, Json<DataResponse<BuildState>>)> {
    let survey = find_owned(&state, id, auth.user_id).await?;

    let build_state = state
        .builds
        .start(BuildRequest {
            survey_id: survey.id,
            user_id: auth.user_id,
            title: survey.title,
            schema: survey.schema_json,
            ui_schema: survey.ui_schema_json,
        })
        .await;

    if let BuildState::Failed { detail } = &build_state {
        return Err(AppError::Upstream(detail.clone()));
    }
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: build_state })))
}

/// DELETE /api/v1/surveys/{id}/deployment
pub async fn delete_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    find_owned(&state, id, auth.user_id).await?;
    state.builds.delete_image(auth.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/surveys/{id}/deployment/script
///
/// Returns the script as a download (`.sh` for linux and mac, `.ps1` for
/// windows).
pub async fn script(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<ScriptRequest>,
) -> AppResult<Response> {
    find_owned(&state, id, auth.user_id).await?;
    let image = require_latest_image(&state, auth.user_id, id).await?;

    let text = state
        .deployer
        .generate_deploy_script(&DeployScriptRequest {
            image: image.name.clone(),
            os: input.os,
            port: input.port.unwrap_or(DEFAULT_APP_PORT),
            qid: id,
        })
        .await?;

    let filename = deploy_script_filename(&image.name, input.os);
    let content_type = match input.os {
        DeployOs::Windows => "text/plain; charset=utf-8",
        DeployOs::Linux | DeployOs::Mac => "application/x-sh",
    };
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        text,
    )
        .into_response())
}

/// POST /api/v1/surveys/{id}/deployment/remote
pub async fn remote(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<RemoteRequest>,
) -> AppResult<Json<DataResponse<Value>>> {
    let ip = input.ip.trim();
    if ip.is_empty() || input.key.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Host and SSH key are required".into(),
        )));
    }
    let user = input
        .user
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_SSH_USER);

    find_owned(&state, id, auth.user_id).await?;
    let image = require_latest_image(&state, auth.user_id, id).await?;

    let report = state
        .deployer
        .deploy_remote(&RemoteDeployRequest {
            image: image.name,
            ip: ip.to_string(),
            user: user.to_string(),
            key: input.key,
            port: input.port.unwrap_or(DEFAULT_SSH_PORT),
        })
        .await?;

    tracing::info!(survey_id = id, host = ip, "Remote deploy requested");
    Ok(Json(DataResponse { data: report }))
}

async fn latest_image(state: &AppState, owner_id: DbId, survey_id: DbId) -> AppResult<Option<ImageInfo>> {
    let images = state.builds.service().list_images(owner_id, survey_id).await?;
    Ok(find_latest(&images).cloned())
}

async fn require_latest_image(state: &AppState, owner_id: DbId, survey_id: DbId) -> AppResult<ImageInfo> {
    latest_image(state, owner_id, survey_id).await?.ok_or_else(|| {
        AppError::Core(CoreError::Conflict(
            "No image has been built for this survey yet".into(),
        ))
    })
}
