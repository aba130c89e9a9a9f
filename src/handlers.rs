use crate::{
    AppState,
    auth::{self, AuthUser, SUPER_ADMIN_ID},
    crypto,
    enrollment, progress,
    error::ApiError,
    models::{
        AddResourceRequest, AllCoursesResponse, AuthResponse, CheckAuthResponse, CourseCodeRequest,
        CourseResponse, DeleteResourceRequest, ExtraCoursesResponse, LoginRequest, MessageResponse,
        ModeratorSummary, ModeratorsResponse, MyCoursesResponse, NewUser, ProgressEntry, Resource,
        Role, SignupRequest, StatsResponse, ToggleProgressRequest, ToggleProgressResponse,
        ToggleOutcome, UniversityIdRequest, User, UserCoursesResponse,
        normalize_university_id,
    },
    session,
};
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use tower_cookies::Cookies;
use uuid::Uuid;

// --- Helpers ---

/// Mints the session + token pair at the Authenticated transition. The two
/// artifacts are always issued together; afterwards they age independently and
/// the session stays authoritative.
fn establish_session(
    state: &AppState,
    cookies: &Cookies,
    user: &User,
) -> Result<String, ApiError> {
    let session = state.sessions.create(user)?;
    session::set_session_cookie(cookies, &session.id);
    auth::issue_token(&state.config, user)
}

/// Offloads the bcrypt hash to the blocking pool; cost-12 hashing is far too
/// slow to run on a runtime worker thread.
async fn hash_password_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || crypto::hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn verify_password_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || crypto::verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

// --- Identity Handlers ---

/// signup
///
/// [Public Route] Creates a new identity and authenticates it in one step.
///
/// Boundary validation happens here, before any store call; the repository
/// re-validates the university ID pattern and probes both uniqueness
/// constraints with a single combined lookup. Sets the session cookie as a
/// side effect and returns the bearer token alongside.
#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Malformed input"),
        (status = 409, description = "Duplicate university ID or email")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    // Boundary validation: obviously malformed input never reaches the store.
    if payload.name.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.is_empty()
        || payload.university_id.trim().is_empty()
    {
        return Err(ApiError::InvalidInput(
            "Please provide all required fields".to_string(),
        ));
    }
    if !payload
        .university_id
        .trim()
        .to_uppercase()
        .starts_with('C')
    {
        return Err(ApiError::InvalidInput(
            "University ID must start with 'C'".to_string(),
        ));
    }
    if payload.password.len() < 6 {
        return Err(ApiError::InvalidInput(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    if !(1..=8).contains(&payload.semester) {
        return Err(ApiError::InvalidInput(
            "Semester must be between 1 and 8".to_string(),
        ));
    }

    let password_hash = hash_password_blocking(payload.password).await?;

    let user = state
        .repo
        .register_user(
            NewUser {
                name: payload.name.trim().to_string(),
                university_id: payload.university_id,
                email: payload.email,
                semester: payload.semester,
            },
            password_hash,
        )
        .await?;

    let token = establish_session(&state, &cookies, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "Account created successfully".to_string(),
            token,
            user,
        }),
    ))
}

/// login
///
/// [Public Route] Verifies credentials and opens a session.
///
/// Failure is uniformly `Unauthenticated` whether the ID is unknown or the
/// password is wrong — the response never reveals which half failed, and there
/// is no lockout after repeated failures.
///
/// The super-admin grant runs here, after successful verification. This is one
/// of exactly two call sites of the rule (the other is the startup bootstrap),
/// so `check-auth` and the role gates stay pure reads.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if payload.university_id.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::InvalidInput(
            "Please provide University ID and password".to_string(),
        ));
    }

    let (user, password_hash) = state
        .repo
        .get_credentials(&payload.university_id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    if !verify_password_blocking(payload.password, password_hash).await? {
        return Err(ApiError::Unauthenticated);
    }

    let user = auth::grant_super_admin(&state.repo, user).await?;

    let token = establish_session(&state, &cookies, &user)?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        token,
        user,
    }))
}

/// logout
///
/// [Public Route] Destroys the caller's session, if any, and expires the
/// cookie. Succeeds for anonymous callers too — logging out twice is not an
/// error.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Some(session) = session::session_from_cookies(&cookies, state.sessions.as_ref())? {
        state.sessions.delete(&session.id)?;
    }
    session::clear_session_cookie(&cookies);

    Ok(Json(MessageResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    }))
}

/// check_auth
///
/// [Public Route] Reports whether the caller holds a live session. Idempotent
/// and safe to poll: an anonymous caller gets `authenticated: false` with a
/// 200, never a 401. Reads only — no role mutation happens on this path.
#[utoipa::path(
    get,
    path = "/check-auth",
    responses((status = 200, description = "Authentication status", body = CheckAuthResponse))
)]
pub async fn check_auth(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<CheckAuthResponse>, ApiError> {
    let session = session::session_from_cookies(&cookies, state.sessions.as_ref())?;

    let user = match session {
        Some(session) => state.repo.get_user(session.user_id).await?,
        None => None,
    };

    Ok(Json(CheckAuthResponse {
        success: true,
        authenticated: user.is_some(),
        user,
    }))
}

/// delete_account
///
/// [Authenticated Route] Hard, cascading removal of the caller's identity:
/// the user record, its progress entries, and every live session go together.
#[utoipa::path(
    delete,
    path = "/user",
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_account(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.repo.delete_user(id).await? {
        return Err(ApiError::NotFound("User"));
    }
    state.sessions.delete_for_user(id)?;
    session::clear_session_cookie(&cookies);

    Ok(Json(MessageResponse {
        success: true,
        message: "Account deleted successfully".to_string(),
    }))
}

// --- Platform Stats ---

/// get_stats
///
/// [Public Route] Landing-page counters: registered students and catalog size.
#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Platform stats", body = StatsResponse))
)]
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let students = state.repo.count_users().await?;
    let courses = state.repo.count_courses().await?;

    Ok(Json(StatsResponse {
        success: true,
        students,
        courses,
        free_access: "100%".to_string(),
    }))
}

// --- Course & Enrollment Handlers ---

/// get_all_courses
///
/// [Authenticated Route] The full catalog plus the caller's enrolled codes
/// (home + extra), so the client can mark what is already taken.
#[utoipa::path(
    get,
    path = "/all-courses",
    responses((status = 200, description = "Catalog with enrollment markers", body = AllCoursesResponse))
)]
pub async fn get_all_courses(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AllCoursesResponse>, ApiError> {
    let user = state.repo.get_user(id).await?.ok_or(ApiError::NotFound("User"))?;
    let catalog = state.repo.list_courses().await?;

    let view = enrollment::resolve(&user, &catalog);
    let enrolled_codes = view.enrolled().into_iter().map(|c| c.code).collect();

    Ok(Json(AllCoursesResponse {
        success: true,
        courses: catalog,
        enrolled_codes,
        user_semester: user.semester,
    }))
}

/// get_user_courses
///
/// [Authenticated Route] The derived enrollment view (home + extra, extras
/// flagged), the raw progress ledger, and per-course completion percentages.
/// Everything is recomputed from live data on each call — no cached
/// enrollment or progress fields exist anywhere.
#[utoipa::path(
    get,
    path = "/user-courses",
    responses((status = 200, description = "Enrolled courses with progress", body = UserCoursesResponse))
)]
pub async fn get_user_courses(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserCoursesResponse>, ApiError> {
    let user = state.repo.get_user(id).await?.ok_or(ApiError::NotFound("User"))?;
    let catalog = state.repo.list_courses().await?;
    let entries = state.repo.get_progress(id).await?;

    let semester = user.semester;
    let courses = enrollment::resolve(&user, &catalog).enrolled();
    let summary = progress::summarize(&courses, &entries, state.config.segments_per_term);

    Ok(Json(UserCoursesResponse {
        success: true,
        courses,
        semester,
        academic_progress: entries,
        progress: summary,
    }))
}

/// get_my_courses
///
/// [Authenticated Route] Just the home (semester) course set, re-derived by
/// cohort match against the live catalog.
#[utoipa::path(
    get,
    path = "/my-courses",
    responses((status = 200, description = "Home courses", body = MyCoursesResponse))
)]
pub async fn get_my_courses(
    AuthUser { semester, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MyCoursesResponse>, ApiError> {
    let courses = state.repo.list_courses_by_semester(semester).await?;

    Ok(Json(MyCoursesResponse {
        success: true,
        semester,
        courses,
    }))
}

/// add_course
///
/// [Authenticated Route] Opts the caller into a course outside their home
/// semester. Validation order is part of the contract: course existence first
/// (404), then membership in home *or* extra (409 already_enrolled, with the
/// home check first so a home course never reads as a generic failure).
#[utoipa::path(
    post,
    path = "/add-course",
    request_body = CourseCodeRequest,
    responses(
        (status = 200, description = "Course added", body = ExtraCoursesResponse),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Already enrolled")
    )
)]
pub async fn add_course(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CourseCodeRequest>,
) -> Result<Json<ExtraCoursesResponse>, ApiError> {
    if payload.course_code.trim().is_empty() {
        return Err(ApiError::InvalidInput("Course code is required".to_string()));
    }

    let user = state.repo.get_user(id).await?.ok_or(ApiError::NotFound("User"))?;
    let catalog = state.repo.list_courses().await?;

    enrollment::validate_add_extra(&user, &catalog, &payload.course_code)?;

    let extra_courses = state.repo.add_extra_course(id, &payload.course_code).await?;

    Ok(Json(ExtraCoursesResponse {
        success: true,
        message: "Course added successfully".to_string(),
        extra_courses,
    }))
}

/// remove_course
///
/// [Authenticated Route] Drops a course from the extra overlay. Home courses
/// are never individually revocable; a code that is not in the overlay fails
/// with `not_in_extra` so stale clients notice.
#[utoipa::path(
    post,
    path = "/remove-course",
    request_body = CourseCodeRequest,
    responses(
        (status = 200, description = "Course removed", body = ExtraCoursesResponse),
        (status = 409, description = "Not in extra courses")
    )
)]
pub async fn remove_course(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CourseCodeRequest>,
) -> Result<Json<ExtraCoursesResponse>, ApiError> {
    if payload.course_code.trim().is_empty() {
        return Err(ApiError::InvalidInput("Course code is required".to_string()));
    }

    let user = state.repo.get_user(id).await?.ok_or(ApiError::NotFound("User"))?;

    enrollment::validate_remove_extra(&user, &payload.course_code)?;

    let extra_courses = state
        .repo
        .remove_extra_course(id, &payload.course_code)
        .await?;

    Ok(Json(ExtraCoursesResponse {
        success: true,
        message: "Course removed successfully".to_string(),
        extra_courses,
    }))
}

// --- Progress Handlers ---

/// toggle_progress
///
/// [Authenticated Route] The single mutation entry point of the progress
/// ledger. The server re-derives which half of the toggle to perform from
/// current stored state — it never trusts a client-supplied "completed" flag,
/// which eliminates the double-submit divergence between client and server.
///
/// Two concurrent toggles on the same key may race to the same outcome twice;
/// that matches the reference behavior and is accepted.
#[utoipa::path(
    post,
    path = "/academic-progress/toggle",
    request_body = ToggleProgressRequest,
    responses(
        (status = 200, description = "Toggled", body = ToggleProgressResponse),
        (status = 400, description = "Malformed input")
    )
)]
pub async fn toggle_progress(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ToggleProgressRequest>,
) -> Result<Json<ToggleProgressResponse>, ApiError> {
    if payload.course_code.trim().is_empty() {
        return Err(ApiError::InvalidInput("Missing required fields".to_string()));
    }
    if payload.segment_id < 1 {
        return Err(ApiError::InvalidInput(
            "Segment must be a positive ordinal".to_string(),
        ));
    }

    let entries = state.repo.get_progress(id).await?;
    let outcome = progress::toggle_decision(
        &entries,
        &payload.course_code,
        payload.term,
        payload.segment_id,
    );

    match outcome {
        ToggleOutcome::Added => {
            state
                .repo
                .insert_progress(
                    id,
                    ProgressEntry {
                        course_code: payload.course_code.clone(),
                        term: payload.term,
                        segment_id: payload.segment_id,
                        completed_at: Utc::now(),
                    },
                )
                .await?;
        }
        ToggleOutcome::Removed => {
            state
                .repo
                .delete_progress(id, &payload.course_code, payload.term, payload.segment_id)
                .await?;
        }
    }

    let academic_progress = state.repo.get_progress(id).await?;

    Ok(Json(ToggleProgressResponse {
        success: true,
        message: match outcome {
            ToggleOutcome::Added => "Progress saved".to_string(),
            ToggleOutcome::Removed => "Progress removed".to_string(),
        },
        outcome,
        academic_progress,
    }))
}

// --- Moderator Handlers ---

/// add_resource
///
/// [Moderator Route] Appends a resource link to one term of a catalog course.
///
/// *RBAC*: Moderator or Admin. The gate runs inside the handler, after the
/// authentication layer has already resolved the caller.
#[utoipa::path(
    post,
    path = "/moderator/add-resource",
    request_body = AddResourceRequest,
    responses(
        (status = 200, description = "Resource added", body = CourseResponse),
        (status = 403, description = "Not a moderator"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn add_resource(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AddResourceRequest>,
) -> Result<Json<CourseResponse>, ApiError> {
    auth.authorize(&[Role::Moderator])?;

    if payload.course_code.trim().is_empty()
        || payload.name.trim().is_empty()
        || payload.link.trim().is_empty()
    {
        return Err(ApiError::InvalidInput("Missing required fields".to_string()));
    }

    let resource = Resource {
        id: Uuid::new_v4(),
        name: payload.name,
        link: payload.link,
        kind: payload.kind,
        // 0 means term-level, e.g. previous questions covering the whole term.
        segment: payload.segment.unwrap_or(0),
    };

    let course = state
        .repo
        .add_resource(&payload.course_code, payload.term, resource)
        .await?
        .ok_or(ApiError::NotFound("Course"))?;

    Ok(Json(CourseResponse {
        success: true,
        message: "Resource added successfully".to_string(),
        course,
    }))
}

/// delete_resource
///
/// [Moderator Route] Removes a resource from one term of a catalog course.
#[utoipa::path(
    delete,
    path = "/moderator/delete-resource",
    request_body = DeleteResourceRequest,
    responses(
        (status = 200, description = "Resource deleted", body = MessageResponse),
        (status = 403, description = "Not a moderator"),
        (status = 404, description = "Course or resource not found")
    )
)]
pub async fn delete_resource(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<DeleteResourceRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    auth.authorize(&[Role::Moderator])?;

    if payload.course_code.trim().is_empty() {
        return Err(ApiError::InvalidInput("Missing required fields".to_string()));
    }

    if !state
        .repo
        .remove_resource(&payload.course_code, payload.term, payload.resource_id)
        .await?
    {
        return Err(ApiError::NotFound("Resource"));
    }

    Ok(Json(MessageResponse {
        success: true,
        message: "Resource deleted successfully".to_string(),
    }))
}

// --- Admin Handlers ---

/// promote_user
///
/// [Admin Route] Elevates a student to moderator by university ID.
#[utoipa::path(
    post,
    path = "/admin/promote",
    request_body = UniversityIdRequest,
    responses(
        (status = 200, description = "Promoted", body = MessageResponse),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn promote_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UniversityIdRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    auth.authorize(&[Role::Admin])?;

    if payload.university_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("University ID required".to_string()));
    }

    let target = state
        .repo
        .get_user_by_university_id(&payload.university_id)
        .await?
        .ok_or(ApiError::NotFound("Student"))?;

    state
        .repo
        .set_role(&target.university_id, Role::Moderator)
        .await?;

    Ok(Json(MessageResponse {
        success: true,
        message: format!("{} promoted to Moderator", target.name),
    }))
}

/// demote_user
///
/// [Admin Route] Returns a moderator to the student role.
///
/// The super-admin account can never be demoted; that rejection happens before
/// the lookup, unconditionally.
#[utoipa::path(
    post,
    path = "/admin/demote",
    request_body = UniversityIdRequest,
    responses(
        (status = 200, description = "Demoted", body = MessageResponse),
        (status = 400, description = "Protected identity"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn demote_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UniversityIdRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    auth.authorize(&[Role::Admin])?;

    if payload.university_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("University ID required".to_string()));
    }

    if normalize_university_id(&payload.university_id) == SUPER_ADMIN_ID {
        return Err(ApiError::ProtectedIdentity);
    }

    let target = state
        .repo
        .get_user_by_university_id(&payload.university_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    state
        .repo
        .set_role(&target.university_id, Role::Student)
        .await?;

    Ok(Json(MessageResponse {
        success: true,
        message: format!("{} demoted to Student", target.name),
    }))
}

/// list_moderators
///
/// [Admin Route] Lists every identity currently holding the moderator role.
#[utoipa::path(
    get,
    path = "/admin/moderators",
    responses(
        (status = 200, description = "Moderator list", body = ModeratorsResponse),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_moderators(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ModeratorsResponse>, ApiError> {
    auth.authorize(&[Role::Admin])?;

    let moderators = state
        .repo
        .list_users_by_role(Role::Moderator)
        .await?
        .into_iter()
        .map(|u| ModeratorSummary {
            name: u.name,
            university_id: u.university_id,
            role: u.role,
        })
        .collect();

    Ok(Json(ModeratorsResponse {
        success: true,
        moderators,
    }))
}
