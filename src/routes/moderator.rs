use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, post},
};

/// Moderator Router Module
///
/// The catalog resource sub-API: the only path through which catalog courses
/// are ever mutated. Nested under '/moderator'.
///
/// Access Control:
/// Requests first pass the authentication layer; the Moderator-or-Admin role
/// check is then performed *inside* the handlers via `AuthUser::authorize`,
/// so an authenticated student receives a 403, not a 401.
pub fn moderator_routes() -> Router<AppState> {
    Router::new()
        // POST /moderator/add-resource
        // Appends a resource link (slides, notes, playlist, ...) to one term
        // of a catalog course.
        .route("/add-resource", post(handlers::add_resource))
        // DELETE /moderator/delete-resource
        // Removes a resource by ID from one term of a catalog course.
        .route("/delete-resource", delete(handlers::delete_resource))
}
