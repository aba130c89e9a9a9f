use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// ApiError
///
/// The single failure taxonomy for the whole API surface. Every handler and
/// repository method funnels into one of these variants, and the `IntoResponse`
/// implementation turns each into a structured JSON body with a stable,
/// machine-readable `reason` code the frontend can branch on.
///
/// Nothing here is fatal to the process: a failed request produces a response
/// and the server keeps serving.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input, detected before any store call.
    #[error("{0}")]
    InvalidInput(String),

    /// No session, an expired session, or a bad/expired bearer token.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Authenticated, but the caller's role does not pass the gate.
    #[error("Access denied: unauthorized role")]
    Forbidden,

    /// A referenced user, course, or resource does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Signup collided with an existing university ID or email address.
    #[error("User with this Email or University ID already exists")]
    DuplicateIdentity,

    /// The course is already part of the caller's enrollment (home or extra).
    #[error("Already enrolled in this course")]
    AlreadyEnrolled,

    /// The course is not in the caller's extra-course overlay.
    #[error("Course not found in extra courses")]
    NotInExtra,

    /// Attempted demotion of the super admin account.
    #[error("Cannot demote Super Admin")]
    ProtectedIdentity,

    /// Store or infrastructure failure. Logged with context, surfaced opaquely.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable reason code carried in every error body. These strings are part
    /// of the API contract; the client matches on them, never on messages.
    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::DuplicateIdentity => "duplicate_identity",
            ApiError::AlreadyEnrolled => "already_enrolled",
            ApiError::NotInExtra => "not_in_extra",
            ApiError::ProtectedIdentity => "protected_identity",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateIdentity | ApiError::AlreadyEnrolled | ApiError::NotInExtra => {
                StatusCode::CONFLICT
            }
            // Matches the reference behavior: the protected-identity rejection
            // is a 400, not a 403, because the request itself is invalid no
            // matter who sends it.
            ApiError::ProtectedIdentity => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details are logged but never leak to the caller.
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                "Server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "reason": self.reason(),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_variants_share_status_but_not_reason() {
        assert_eq!(ApiError::DuplicateIdentity.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::AlreadyEnrolled.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::NotInExtra.status(), StatusCode::CONFLICT);
        assert_ne!(
            ApiError::AlreadyEnrolled.reason(),
            ApiError::NotInExtra.reason()
        );
    }

    #[test]
    fn internal_detail_never_reaches_the_body() {
        let err = ApiError::Internal("password hash column corrupt".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
