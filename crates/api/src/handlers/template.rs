//! Template upload: `POST /api/v1/surveys/{id}/template`.
//!
//! Accepts one multipart field `file` (png, jpeg or pdf, at most 10 MB),
//! writes it under `{STORAGE_ROOT}/user_{uid}_q_{qid}/` and records the
//! relative path on the survey.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use formcraft_core::error::CoreError;
use formcraft_core::types::DbId;
use formcraft_core::upload::{template_relative_path, validate_template, TemplateKind};
use formcraft_db::repositories::SurveyRepo;

use crate::error::{AppError, AppResult};
use crate::handlers::surveys::find_owned;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

const FILE_FIELD: &str = "file";
const TEMPLATE_STEM: &str = "template";

#[derive(Debug, Serialize)]
pub struct UploadedTemplate {
    pub image_path: String,
    pub content_type: &'static str,
    pub size: usize,
}

pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadedTemplate>>)> {
    find_owned(&state, id, auth.user_id).await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("The file field has no file name".into()))?;
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, content_type, data));
        break;
    }
    let (filename, content_type, data) = upload
        .ok_or_else(|| AppError::BadRequest(format!("Missing multipart field '{FILE_FIELD}'")))?;

    let kind = validate_template(&filename, content_type.as_deref(), &data)?;
    let relative = template_relative_path(auth.user_id, id, TEMPLATE_STEM, kind);
    store_file(&state, &relative, kind, &data).await?;

    if !SurveyRepo::set_image_path(&state.pool, id, auth.user_id, &relative).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "Survey", id }));
    }

    tracing::info!(survey_id = id, path = %relative, size = data.len(), "Template uploaded");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UploadedTemplate {
                image_path: relative,
                content_type: kind.mime_type(),
                size: data.len(),
            },
        }),
    ))
}

/// Write the file and remove templates of the other kinds, so a survey
/// keeps one template.
async fn store_file(state: &AppState, relative: &str, kind: TemplateKind, data: &[u8]) -> AppResult<()> {
    let path = state.config.storage_root.join(relative);
    let dir = path
        .parent()
        .ok_or_else(|| AppError::InternalError(format!("Template path has no parent: {relative}")))?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Cannot create {}: {e}", dir.display())))?;
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| AppError::InternalError(format!("Cannot write {}: {e}", path.display())))?;

    for other in [TemplateKind::Png, TemplateKind::Jpeg, TemplateKind::Pdf] {
        if other != kind {
            let stale = path.with_extension(other.extension());
            if tokio::fs::remove_file(&stale).await.is_ok() {
                tracing::debug!(path = %stale.display(), "Replaced previous template");
            }
        }
    }
    Ok(())
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Core(CoreError::PayloadTooLarge(
            "Template exceeds the upload size limit".into(),
        ))
    } else {
        AppError::BadRequest(err.body_text())
    }
}
