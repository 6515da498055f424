pub mod health;
pub mod hearing;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /hearings                                        list, create
/// /hearings/{id_or_slug}                           get, update, patch, delete
/// /hearings/{id}/copy                              copy (POST)
/// /hearings/{id_or_slug}/sections                  list sections
/// /hearings/{id_or_slug}/sections/{section_id}     get section
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/hearings", hearing::router())
}
