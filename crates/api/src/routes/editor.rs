//! Route definitions for the `/editor` resource (open sessions).

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::editor;
use crate::state::AppState;

/// Routes mounted at `/editor`. All require auth and session ownership.
///
/// ```text
/// GET    /{sid}                    -> snapshot + conversation
/// PUT    /{sid}                    -> manual edit
/// DELETE /{sid}                    -> close
/// POST   /{sid}/patch              -> apply a patch batch
/// POST   /{sid}/chat               -> one assistant turn
/// GET    /{sid}/preview            -> form descriptor
/// POST   /{sid}/preview/validate   -> validate submitted data
/// POST   /{sid}/save               -> persist to the survey
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{sid}",
            get(editor::get).put(editor::edit).delete(editor::close),
        )
        .route("/{sid}/patch", post(editor::patch))
        .route("/{sid}/chat", post(editor::chat))
        .route("/{sid}/preview", get(editor::preview))
        .route("/{sid}/preview/validate", post(editor::validate))
        .route("/{sid}/save", post(editor::save))
}
