//! Handlers for editing sessions (`/surveys/{id}/editor`, `/editor/{sid}`).
//!
//! Every handler locks its session for the whole request, so an assistant
//! turn and a manual edit on one session never interleave.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use formcraft_assistant::{run_turn, TurnOutcome};
use formcraft_core::error::CoreError;
use formcraft_core::form::{self, FormDescriptor, ValidationReport};
use formcraft_core::schema::SchemaTarget;
use formcraft_core::survey::validate_title;
use formcraft_core::types::DbId;
use formcraft_db::models::survey::{Survey, UpdateSurvey};
use formcraft_db::repositories::SurveyRepo;

use crate::editor::{SessionGuard, SessionView};
use crate::error::{AppError, AppResult};
use crate::handlers::surveys::find_owned;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Manual edit. Absent fields are left alone; the edit applies entirely or
/// not at all.
#[derive(Debug, Default, Deserialize)]
pub struct EditRequest {
    pub title: Option<String>,
    pub schema_text: Option<String>,
    pub ui_schema_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatchRequest {
    pub target: SchemaTarget,
    /// Raw JSON-Patch array; checked by the patch engine.
    pub patch: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub outcome: TurnOutcome,
    pub session: SessionView,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub data: Value,
    /// rjsf-style error schema merged into the report.
    #[serde(default)]
    pub extra_errors: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct PreviewValidation {
    pub report: ValidationReport,
    pub form: FormDescriptor,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/surveys/{id}/editor
pub async fn open(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(survey_id): Path<DbId>,
) -> AppResult<(StatusCode, Json<DataResponse<SessionView>>)> {
    let survey = find_owned(&state, survey_id, auth.user_id).await?;
    let view = state.editor.open(&survey).await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: view })))
}

/// GET /api/v1/editor/{sid}
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(sid): Path<Uuid>,
) -> AppResult<Json<DataResponse<SessionView>>> {
    let guard = acquire(&state, sid, auth).await?;
    Ok(Json(DataResponse { data: guard.view() }))
}

/// PUT /api/v1/editor/{sid}
pub async fn edit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(sid): Path<Uuid>,
    Json(input): Json<EditRequest>,
) -> AppResult<Json<DataResponse<SessionView>>> {
    let mut guard = acquire(&state, sid, auth).await?;

    let mut draft = guard.session.store.clone();
    if let Some(title) = input.title.as_deref() {
        draft.set_title(validate_title(title)?);
    }
    if let Some(text) = input.schema_text.as_deref() {
        draft.replace_schema_text(text)?;
    }
    if let Some(text) = input.ui_schema_text.as_deref() {
        draft.replace_ui_schema_text(text)?;
    }
    guard.session.store = draft;

    Ok(Json(DataResponse { data: guard.view() }))
}

/// POST /api/v1/editor/{sid}/patch
///
/// A rejected batch answers 400 and leaves the document untouched.
pub async fn patch(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(sid): Path<Uuid>,
    Json(input): Json<PatchRequest>,
) -> AppResult<Json<DataResponse<SessionView>>> {
    let mut guard = acquire(&state, sid, auth).await?;
    let version = guard.session.store.apply_patch(input.target, &input.patch)?;
    tracing::debug!(session_id = %sid, document = input.target.as_str(), version, "Patch applied");
    Ok(Json(DataResponse { data: guard.view() }))
}

/// POST /api/v1/editor/{sid}/chat
///
/// Upstream and parse failures still answer 200: the outcome says what
/// happened and the conversation carries the explanation.
pub async fn chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(sid): Path<Uuid>,
    Json(input): Json<ChatRequest>,
) -> AppResult<Json<DataResponse<ChatResponse>>> {
    let message = input.message.trim();
    if message.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Message must not be empty".into(),
        )));
    }

    let mut guard = acquire(&state, sid, auth).await?;
    let session = &mut *guard.session;
    let outcome = run_turn(
        state.assistant.as_ref(),
        &mut session.conversation,
        &mut session.store,
        message,
        state.config.chat_turn_limit(),
    )
    .await;

    Ok(Json(DataResponse {
        data: ChatResponse {
            outcome,
            session: guard.view(),
        },
    }))
}

/// GET /api/v1/editor/{sid}/preview
pub async fn preview(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(sid): Path<Uuid>,
) -> AppResult<Json<DataResponse<FormDescriptor>>> {
    let guard = acquire(&state, sid, auth).await?;
    let store = &guard.session.store;
    let descriptor = form::render(store.schema(), store.ui_schema(), None, None)?;
    Ok(Json(DataResponse { data: descriptor }))
}

/// POST /api/v1/editor/{sid}/preview/validate
///
/// Validation failures are data, not errors: the answer is 200 with
/// `report.valid = false`.
pub async fn validate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(sid): Path<Uuid>,
    Json(input): Json<ValidateRequest>,
) -> AppResult<Json<DataResponse<PreviewValidation>>> {
    let guard = acquire(&state, sid, auth).await?;
    let store = &guard.session.store;

    let report = form::validate_submission(store.schema(), &input.data, input.extra_errors.as_ref())?;
    let descriptor = form::render(
        store.schema(),
        store.ui_schema(),
        Some(&input.data),
        input.extra_errors.as_ref(),
    )?;

    Ok(Json(DataResponse {
        data: PreviewValidation {
            report,
            form: descriptor,
        },
    }))
}

/// POST /api/v1/editor/{sid}/save
pub async fn save(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(sid): Path<Uuid>,
) -> AppResult<Json<DataResponse<Survey>>> {
    let guard = acquire(&state, sid, auth).await?;
    let snapshot = guard.session.store.snapshot();
    let survey_id = guard.session.survey_id;

    let update = UpdateSurvey {
        title: Some(snapshot.title),
        schema_json: Some(snapshot.schema),
        ui_schema_json: Some(snapshot.ui_schema),
    };
    let survey = SurveyRepo::update_for_owner(&state.pool, survey_id, auth.user_id, &update)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Survey",
            id: survey_id,
        }))?;

    tracing::info!(session_id = %sid, survey_id, version = snapshot.version, "Survey saved from editor");
    Ok(Json(DataResponse { data: survey }))
}

/// DELETE /api/v1/editor/{sid}
pub async fn close(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(sid): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.editor.close(sid, auth.user_id).await {
        return Err(session_not_found(sid));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn acquire(state: &AppState, sid: Uuid, auth: AuthUser) -> AppResult<SessionGuard> {
    state
        .editor
        .acquire(sid, auth.user_id)
        .await
        .ok_or_else(|| session_not_found(sid))
}

fn session_not_found(sid: Uuid) -> AppError {
    AppError::NotFound(format!("Editor session {sid} not found"))
}
