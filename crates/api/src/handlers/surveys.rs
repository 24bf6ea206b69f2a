//! Handlers for the `/surveys` resource.
//!
//! Every query is scoped by the caller's id; surveys of other users are
//! indistinguishable from missing ones.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use formcraft_core::error::CoreError;
use formcraft_core::survey::{validate_title, MAX_SURVEYS_PER_OWNER};
use formcraft_core::types::DbId;
use formcraft_db::models::survey::{CreateSurvey, Survey, SurveySummary, UpdateSurvey};
use formcraft_db::repositories::SurveyRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/surveys
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<SurveySummary>>>> {
    let surveys = SurveyRepo::list_for_owner(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: surveys }))
}

/// POST /api/v1/surveys
///
/// Rejected with 409 once the caller owns [`MAX_SURVEYS_PER_OWNER`] surveys;
/// a rejected creation writes nothing.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateSurvey>,
) -> AppResult<(StatusCode, Json<DataResponse<Survey>>)> {
    let title = validate_title(&input.title)?;

    let survey =
        SurveyRepo::create_within_limit(&state.pool, auth.user_id, &title, MAX_SURVEYS_PER_OWNER)
            .await?
            .ok_or_else(|| {
                AppError::Core(CoreError::Conflict(format!(
                    "You can have at most {MAX_SURVEYS_PER_OWNER} surveys"
                )))
            })?;

    tracing::info!(survey_id = survey.id, user_id = auth.user_id, "Survey created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: survey })))
}

/// GET /api/v1/surveys/{id}
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Survey>>> {
    let survey = find_owned(&state, id, auth.user_id).await?;
    Ok(Json(DataResponse { data: survey }))
}

/// PUT /api/v1/surveys/{id}
///
/// Saves whichever of title, schema and UI schema are given. Last write wins.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(mut input): Json<UpdateSurvey>,
) -> AppResult<Json<DataResponse<Survey>>> {
    if let Some(title) = input.title.as_deref() {
        input.title = Some(validate_title(title)?);
    }
    if input.schema_json.as_ref().is_some_and(|schema| !schema.is_object()) {
        return Err(AppError::Core(CoreError::Validation(
            "schema_json must be a JSON object".into(),
        )));
    }
    if input.ui_schema_json.as_ref().is_some_and(|ui| ui.is_null()) {
        input.ui_schema_json = Some(serde_json::json!({}));
    }

    let survey = SurveyRepo::update_for_owner(&state.pool, id, auth.user_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Survey", id }))?;
    Ok(Json(DataResponse { data: survey }))
}

/// DELETE /api/v1/surveys/{id}
///
/// Also stops any build poll, closes idle editor sessions on the survey and
/// asks the build service to drop the `latest` image. The image deletion is
/// best effort.
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !SurveyRepo::delete_for_owner(&state.pool, id, auth.user_id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "Survey", id }));
    }

    state.builds.cancel(id).await;
    state.editor.close_for_survey(id).await;
    if let Err(e) = state.builds.delete_image(auth.user_id, id).await {
        tracing::warn!(survey_id = id, error = %e, "Image deletion after survey delete failed");
    }

    tracing::info!(survey_id = id, user_id = auth.user_id, "Survey deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Load a survey owned by `owner_id` or fail with 404.
pub(crate) async fn find_owned(state: &AppState, id: DbId, owner_id: DbId) -> AppResult<Survey> {
    SurveyRepo::find_for_owner(&state.pool, id, owner_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Survey", id }))
}
