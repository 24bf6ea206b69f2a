//! Route definitions for the `/surveys` resource and its sub-resources.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use formcraft_core::upload::MAX_TEMPLATE_BYTES;

use crate::handlers::{deployment, editor, surveys, template};
use crate::state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Routes mounted at `/surveys`. All require auth.
///
/// ```text
/// GET    /                         -> list
/// POST   /                         -> create
/// GET    /{id}                     -> get
/// PUT    /{id}                     -> update
/// DELETE /{id}                     -> delete
/// POST   /{id}/template            -> upload (multipart `file`)
/// POST   /{id}/editor              -> open editor session
/// GET    /{id}/deployment          -> build state + latest image
/// DELETE /{id}/deployment          -> delete latest image
/// POST   /{id}/deployment/build    -> trigger build
/// POST   /{id}/deployment/script   -> local deploy script (attachment)
/// POST   /{id}/deployment/remote   -> deploy to a remote VM
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(surveys::list).post(surveys::create))
        .route(
            "/{id}",
            get(surveys::get).put(surveys::update).delete(surveys::delete),
        )
        .route(
            "/{id}/template",
            post(template::upload)
                .layer(DefaultBodyLimit::max(MAX_TEMPLATE_BYTES + MULTIPART_OVERHEAD)),
        )
        .route("/{id}/editor", post(editor::open))
        .route(
            "/{id}/deployment",
            get(deployment::status).delete(deployment::delete_image),
        )
        .route("/{id}/deployment/build", post(deployment::build))
        .route("/{id}/deployment/script", post(deployment::script))
        .route("/{id}/deployment/remote", post(deployment::remote))
}
