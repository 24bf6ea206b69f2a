pub mod auth;
pub mod editor;
pub mod health;
pub mod surveys;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /auth/register                                   register (public)
/// /auth/login                                      login (public)
/// /auth/refresh                                    refresh (public)
/// /auth/logout                                     logout
///
/// /surveys                                         list, create
/// /surveys/{id}                                    get, update, delete
/// /surveys/{id}/template                           upload template
/// /surveys/{id}/editor                             open editor session
/// /surveys/{id}/deployment                         status, delete image
/// /surveys/{id}/deployment/{build,script,remote}   deployment actions
///
/// /editor/{sid}                                    get, edit, close
/// /editor/{sid}/{patch,chat,save}                  session actions
/// /editor/{sid}/preview[/validate]                 form preview
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/surveys", surveys::router())
        .nest("/editor", editor::router())
}
