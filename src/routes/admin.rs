use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to users with the 'Admin' role:
/// the role-management surface. Nested under '/admin'.
///
/// Access Control:
/// This entire router sits behind the authentication layer; the 'Admin' role
/// check is performed explicitly inside each handler via
/// `AuthUser::authorize(&[Role::Admin])` before any repository call. The
/// super-admin account is protected from demotion unconditionally.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/promote
        // Elevates a student to moderator by university ID.
        .route("/promote", post(handlers::promote_user))
        // POST /admin/demote
        // Returns a moderator to the student role. Rejects the super-admin ID
        // before even looking the account up.
        .route("/demote", post(handlers::demote_user))
        // GET /admin/moderators
        // Lists every identity currently holding the moderator role.
        .route("/moderators", get(handlers::list_moderators))
}
