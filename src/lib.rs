use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod crypto;
pub mod enrollment;
pub mod error;
pub mod handlers;
pub mod models;
pub mod progress;
pub mod repository;
pub mod session;

// Module for routing segregation (Public, Authenticated, Moderator, Admin).
pub mod routes;
use auth::AuthUser; // The resolved authenticated caller identity.
use routes::{admin, authenticated, moderator, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use session::{InMemorySessionStore, SessionState};

/// ApiDoc
///
/// This struct auto-generates the OpenAPI documentation (Swagger JSON) for the
/// application. It aggregates all API paths and data schemas decorated with the
/// `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` macros.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    // List all public handler functions here for documentation generation.
    paths(
        handlers::signup, handlers::login, handlers::logout, handlers::check_auth,
        handlers::get_stats, handlers::delete_account,
        handlers::get_all_courses, handlers::get_user_courses, handlers::get_my_courses,
        handlers::add_course, handlers::remove_course, handlers::toggle_progress,
        handlers::add_resource, handlers::delete_resource,
        handlers::promote_user, handlers::demote_user, handlers::list_moderators
    ),
    // List all models (schemas) used in the request/response bodies.
    components(
        schemas(
            models::User, models::Role, models::Term, models::ResourceKind,
            models::Course, models::TermRecord, models::Resource, models::ProgressEntry,
            models::SignupRequest, models::LoginRequest, models::CourseCodeRequest,
            models::ToggleProgressRequest, models::AddResourceRequest,
            models::DeleteResourceRequest, models::UniversityIdRequest,
            models::AuthResponse, models::CheckAuthResponse, models::MessageResponse,
            models::StatsResponse, models::AllCoursesResponse, models::UserCoursesResponse,
            models::MyCoursesResponse, models::ExtraCoursesResponse, models::CourseProgress,
            models::ToggleOutcome, models::ToggleProgressResponse,
            models::ModeratorSummary, models::ModeratorsResponse, models::CourseResponse,
        )
    ),
    tags(
        (name = "comeback-portal", description = "Academic Comeback Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**. This is the single, thread-safe,
/// and immutable container holding all essential application services and
/// configuration. The application state is shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: identities, catalog, and progress ledger behind one trait.
    pub repo: RepositoryState,
    /// Session Layer: server-side session table keyed by opaque cookie handles.
    pub sessions: SessionState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow extractors and handlers to selectively pull
// components from the shared AppState. This is critical for dependency
// injection: the `AuthUser` extractor needs only the repository, session
// store, and config, never the whole state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// A middleware function that enforces authentication for the protected route
/// groups.
///
/// *Mechanism*: It attempts to extract `AuthUser` from the request. Since
/// `AuthUser` implements `FromRequestParts`, if authentication (session lookup
/// or token validation, then DB lookup) fails, the extractor immediately
/// rejects the request with a 401 Unauthenticated body, preventing execution
/// of the handler. If successful, it allows the request to proceed.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and
/// scoped middleware, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied. The identity lifecycle
        // endpoints resolve the session themselves where relevant.
        .merge(public::public_routes())
        // Authenticated Routes: Protected by the `auth_middleware`.
        // This implements the first layer of Defense-in-Depth for these routes.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Moderator Routes: Nested under '/moderator'. Authentication is
        // enforced by the layer; the Moderator/Admin role check happens
        // *inside* the handlers.
        .nest(
            "/moderator",
            moderator::moderator_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin Routes: Nested under '/admin'. Same pattern: the layer
        // authenticates, the handlers authorize.
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: wraps the request/response lifecycle in a
                // tracing span, correlated by the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: returns x-request-id to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id))
                // 3d. Cookie jar: must sit outside the routers so the session
                // extractor can read and set cookies anywhere below.
                .layer(CookieManagerLayer::new()),
        )
        // 4. CORS Layer (Applied last, allowing all traffic in/out after processing)
        .layer(cors)
}

/// trace_span_logger
///
/// Helper function used by `TraceLayer` to customize the tracing span creation.
/// It extracts the `x-request-id` header (if present) and includes it in the
/// structured logging metadata alongside the HTTP method and URI.
///
/// *Goal*: Ensure every log line for a single request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    // The structured log format used by the tracing macros.
    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
