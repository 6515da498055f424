//! Route definitions for the `/hearings` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::hearing;
use crate::state::AppState;

/// Routes mounted at `/hearings`.
///
/// Write routes take the hearing id; read routes also accept a slug.
///
/// ```text
/// GET    /                                  -> list
/// POST   /                                  -> create
/// GET    /{id}                              -> get_by_id (id or slug, ?preview=)
/// PUT    /{id}                              -> update
/// PATCH  /{id}                              -> patch
/// DELETE /{id}                              -> delete
/// POST   /{id}/copy                         -> copy
/// GET    /{id}/sections                     -> list_sections
/// GET    /{id}/sections/{section_id}        -> get_section
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(hearing::list).post(hearing::create))
        .route(
            "/{id}",
            get(hearing::get_by_id)
                .put(hearing::update)
                .patch(hearing::patch)
                .delete(hearing::delete),
        )
        .route("/{id}/copy", post(hearing::copy))
        .route("/{id}/sections", get(hearing::list_sections))
        .route("/{id}/sections/{section_id}", get(hearing::get_section))
}
