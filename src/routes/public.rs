use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client
/// (anonymous or logged-in). These routes carry the identity lifecycle —
/// signup, login, logout, and the pollable auth probe — plus the public
/// landing-page counters.
///
/// Security Mandate:
/// The signup and login handlers validate input at the boundary before any
/// store call, and the repository re-validates independently. `/check-auth`
/// and `/logout` handle the anonymous case themselves and never 401.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /signup
        // Creates a new identity, opens a session (cookie side effect), and
        // returns the bearer token.
        .route("/signup", post(handlers::signup))
        // POST /login
        // Verifies credentials, applies the super-admin grant when applicable,
        // opens a session, and returns the bearer token.
        .route("/login", post(handlers::login))
        // POST /logout
        // Destroys the server-side session and expires the cookie.
        .route("/logout", post(handlers::logout))
        // GET /check-auth
        // Idempotent session probe, safe to poll from the frontend shell.
        .route("/check-auth", get(handlers::check_auth))
        // GET /stats
        // Public platform counters for the landing page.
        .route("/stats", get(handlers::get_stats))
}
