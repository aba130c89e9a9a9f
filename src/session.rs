use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::User;

/// Name of the HttpOnly cookie carrying the opaque session handle.
pub const SESSION_COOKIE: &str = "portal_session";

/// Session
///
/// Server-side authentication state, keyed by an opaque handle. Carries the
/// identity reference plus a snapshot of the cohort at issuance time. Sessions
/// are minted only at the Unauthenticated -> Authenticated transition and die
/// on logout or TTL expiry; they are never refreshed in place.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub university_id: String,
    pub semester: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// SessionStore
///
/// Abstract contract for the server-side session table. Deliberately narrow:
/// create at login, look up on every request, delete on logout. There is no
/// update — a session's contents are frozen at issuance.
pub trait SessionStore: Send + Sync {
    /// Mint a new session for an authenticated user.
    fn create(&self, user: &User) -> Result<Session, ApiError>;

    /// Resolve a handle. Expired sessions are treated as absent (lazy expiry):
    /// the lookup removes them and reports `None`.
    fn get(&self, session_id: &str) -> Result<Option<Session>, ApiError>;

    /// Destroy a session. Removing an unknown handle is a no-op.
    fn delete(&self, session_id: &str) -> Result<(), ApiError>;

    /// Destroy every session belonging to a user. Called on account deletion
    /// so a cascading remove also severs live authentication state.
    fn delete_for_user(&self, user_id: Uuid) -> Result<(), ApiError>;
}

/// The concrete type used to share the session store across the application state.
pub type SessionState = Arc<dyn SessionStore>;

/// InMemorySessionStore
///
/// The default session backing: a guarded map. Sessions are small and
/// short-lived, so process-local storage is acceptable; a restart simply
/// forces everyone to re-authenticate.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::hours(ttl_hours),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, user: &User) -> Result<Session, ApiError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            university_id: user.university_id.clone(),
            semester: user.semester,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions
            .write()
            .map_err(|_| ApiError::Internal("session store lock poisoned".to_string()))?
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn get(&self, session_id: &str) -> Result<Option<Session>, ApiError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ApiError::Internal("session store lock poisoned".to_string()))?;

        match sessions.get(session_id) {
            Some(session) if session.is_expired() => {
                sessions.remove(session_id);
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    fn delete(&self, session_id: &str) -> Result<(), ApiError> {
        self.sessions
            .write()
            .map_err(|_| ApiError::Internal("session store lock poisoned".to_string()))?
            .remove(session_id);
        Ok(())
    }

    fn delete_for_user(&self, user_id: Uuid) -> Result<(), ApiError> {
        self.sessions
            .write()
            .map_err(|_| ApiError::Internal("session store lock poisoned".to_string()))?
            .retain(|_, s| s.user_id != user_id);
        Ok(())
    }
}

// --- Cookie Helpers ---

/// Attach the session handle to the response as an HttpOnly cookie.
pub fn set_session_cookie(cookies: &Cookies, session_id: &str) {
    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .build();
    cookies.add(cookie);
}

/// Expire the session cookie on the client.
pub fn clear_session_cookie(cookies: &Cookies) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(tower_cookies::cookie::time::Duration::ZERO)
        .build();
    cookies.add(cookie);
}

/// Resolve the caller's session from the request cookies, if any.
pub fn session_from_cookies(
    cookies: &Cookies,
    store: &dyn SessionStore,
) -> Result<Option<Session>, ApiError> {
    match cookies.get(SESSION_COOKIE) {
        Some(cookie) => store.get(cookie.value()),
        None => Ok(None),
    }
}
