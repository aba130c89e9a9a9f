use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has successfully passed the
/// authentication layer. This module implements all core features for a
/// standard user ('Student' role): the enrollment view, the extra-course
/// overlay, and the progress ledger — every operation scoped to the caller's
/// own identity.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `AuthUser` extractor middleware
/// being present on the router layer above this module. This guarantees that
/// all handlers receive a validated `AuthUser` struct containing the caller's
/// ID, role, and semester.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /all-courses
        // The full catalog annotated with the caller's enrolled codes.
        .route("/all-courses", get(handlers::get_all_courses))
        // GET /user-courses
        // The derived enrollment view (home + extra) together with the raw
        // progress ledger and per-course completion percentages.
        .route("/user-courses", get(handlers::get_user_courses))
        // GET /my-courses
        // Just the home set, re-derived by cohort match on every call.
        .route("/my-courses", get(handlers::get_my_courses))
        // --- Extra-Course Overlay ---
        // POST /add-course
        // Opts into a course outside the home semester. Order of checks is
        // contractual: existence (404), then home/extra membership (409).
        .route("/add-course", post(handlers::add_course))
        // POST /remove-course
        // Drops a course from the overlay; unknown codes fail loudly so stale
        // clients can resynchronize.
        .route("/remove-course", post(handlers::remove_course))
        // --- Progress Ledger ---
        // POST /academic-progress/toggle
        // The single mutation entry point for segment completion. The server
        // decides add vs. remove from stored state.
        .route(
            "/academic-progress/toggle",
            post(handlers::toggle_progress),
        )
        // DELETE /user
        // Hard cascading removal of the caller's own account.
        .route("/user", delete(handlers::delete_account))
}
