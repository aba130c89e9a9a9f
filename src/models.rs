use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC field. A flat enumeration, not a bitset of permissions: every gate
/// names the roles it accepts, and `Admin` passes all gates regardless (see
/// `AuthUser::authorize`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub enum Role {
    #[default]
    Student,
    Moderator,
    Admin,
}

impl Role {
    /// Canonical storage form. The database keeps roles as plain text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Moderator => "Moderator",
            Role::Admin => "Admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "Student" => Some(Role::Student),
            "Moderator" => Some(Role::Moderator),
            "Admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Term
///
/// The two halves of a semester's syllabus. Progress entries and resources are
/// always attached to exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Term {
    Mid,
    Final,
}

impl Term {
    pub fn as_str(&self) -> &'static str {
        match self {
            Term::Mid => "mid",
            Term::Final => "final",
        }
    }

    pub fn parse(value: &str) -> Option<Term> {
        match value {
            "mid" => Some(Term::Mid),
            "final" => Some(Term::Final),
            _ => None,
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ResourceKind
///
/// Category tag for an uploaded course resource link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ResourceKind {
    Slides,
    Pdfs,
    Notes,
    Playlists,
    PrevQuestion,
    Notice,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Slides => "slides",
            ResourceKind::Pdfs => "pdfs",
            ResourceKind::Notes => "notes",
            ResourceKind::Playlists => "playlists",
            ResourceKind::PrevQuestion => "prev_question",
            ResourceKind::Notice => "notice",
        }
    }

    pub fn parse(value: &str) -> Option<ResourceKind> {
        match value {
            "slides" => Some(ResourceKind::Slides),
            "pdfs" => Some(ResourceKind::Pdfs),
            "notes" => Some(ResourceKind::Notes),
            "playlists" => Some(ResourceKind::Playlists),
            "prev_question" => Some(ResourceKind::PrevQuestion),
            "notice" => Some(ResourceKind::Notice),
            _ => None,
        }
    }
}

/// User
///
/// The canonical identity record. This is the safe, outward-facing shape:
/// the password hash lives only inside the repository layer and is never
/// serialized or logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Upper-cased, validated university ID ('C' followed by at least 6 digits).
    pub university_id: String,
    /// Lower-cased contact address.
    pub email: String,
    /// Declared semester (cohort), 1 through 8. Determines the "home" course set.
    pub semester: i32,
    pub role: Role,
    /// Course codes the user opted into beyond their semester's home set.
    pub extra_courses: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewUser
///
/// The validated, normalized field set handed to the repository at signup.
/// The password travels separately, already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub university_id: String,
    pub email: String,
    pub semester: i32,
}

/// Resource
///
/// A single link attached to a course term: lecture slides, a note bundle,
/// a playlist, a previous-exam question set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    pub link: String,
    /// Maps JSON field "type" to Rust field "kind".
    /// `type` is a reserved keyword in Rust, so we rename it for internal use.
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Segment ordinal this resource belongs to; 0 means term-level
    /// (e.g. previous questions that cover the whole term).
    pub segment: i32,
}

/// TermRecord
///
/// The per-term half of a course: its syllabus text plus the ordered resource list.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TermRecord {
    pub syllabus: String,
    pub resources: Vec<Resource>,
}

/// Course
///
/// A catalog entry. Owned by the catalog, not by any user; mutated only through
/// the moderator resource sub-API, never deleted wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Course {
    pub code: String,
    pub title: String,
    pub semester: i32,
    pub credits: f64,
    /// Set per-user by the enrollment resolver when presenting a user's view;
    /// always false in the raw catalog.
    #[serde(default)]
    pub is_extra: bool,
    pub mid: TermRecord,
    /// Maps JSON field "final" to Rust field "final_term" (`final` is reserved).
    #[serde(rename = "final")]
    pub final_term: TermRecord,
}

/// ProgressEntry
///
/// One completed segment: (course, term, segment) stamped with completion time.
/// The toggle protocol guarantees at most one entry per 4-tuple per user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProgressEntry {
    pub course_code: String,
    pub term: Term,
    pub segment_id: i32,
    #[ts(type = "string")]
    pub completed_at: DateTime<Utc>,
}

// --- Identity Validation Helpers ---

/// Pattern check for a university ID: one 'C' prefix (either case) followed by
/// at least six digits and nothing else. Enforced both at the HTTP boundary and
/// inside the repository register path.
pub fn is_valid_university_id(id: &str) -> bool {
    let mut chars = id.chars();
    let prefix_ok = matches!(chars.next(), Some('C') | Some('c'));
    let digits: Vec<char> = chars.collect();
    prefix_ok && digits.len() >= 6 && digits.iter().all(|c| c.is_ascii_digit())
}

/// Canonical storage form of a university ID.
pub fn normalize_university_id(id: &str) -> String {
    id.trim().to_uppercase()
}

/// Canonical storage form of an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Input payload for POST /signup. Field names follow the frontend's camelCase
/// convention.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub university_id: String,
    pub semester: i32,
}

/// LoginRequest
///
/// Input payload for POST /login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginRequest {
    pub university_id: String,
    pub password: String,
}

/// CourseCodeRequest
///
/// Input payload for POST /add-course and POST /remove-course.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CourseCodeRequest {
    pub course_code: String,
}

/// ToggleProgressRequest
///
/// Input payload for POST /academic-progress/toggle. The client never sends a
/// "currently completed" flag — the server re-derives which half of the toggle
/// to perform from stored state.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ToggleProgressRequest {
    pub course_code: String,
    pub term: Term,
    pub segment_id: i32,
}

/// AddResourceRequest
///
/// Input payload for POST /moderator/add-resource.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AddResourceRequest {
    pub course_code: String,
    pub term: Term,
    pub name: String,
    pub link: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Omitted or 0 means term-level.
    pub segment: Option<i32>,
}

/// DeleteResourceRequest
///
/// Input payload for DELETE /moderator/delete-resource.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeleteResourceRequest {
    pub course_code: String,
    pub term: Term,
    pub resource_id: Uuid,
}

/// UniversityIdRequest
///
/// Input payload for the admin role-change endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UniversityIdRequest {
    pub university_id: String,
}

/// --- Response Schemas (Output) ---

/// AuthResponse
///
/// Output of both POST /signup and POST /login: the bearer token plus the
/// authenticated user. The session cookie is set as a side effect.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: User,
}

/// CheckAuthResponse
///
/// Output of GET /check-auth. Idempotent and safe to poll: an anonymous caller
/// gets `authenticated: false` with a 200, never a 401.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CheckAuthResponse {
    pub success: bool,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// MessageResponse
///
/// Generic acknowledgement body used by logout, role changes, and deletions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// StatsResponse
///
/// Output of the public GET /stats landing-page counters.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatsResponse {
    pub success: bool,
    pub students: i64,
    pub courses: i64,
    pub free_access: String,
}

/// AllCoursesResponse
///
/// Output of GET /all-courses: the full catalog plus the caller's enrolled
/// codes so the client can mark what is already taken.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AllCoursesResponse {
    pub success: bool,
    pub courses: Vec<Course>,
    pub enrolled_codes: Vec<String>,
    pub user_semester: i32,
}

/// CourseProgress
///
/// Derived completion percentages for one enrolled course, one value per term.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CourseProgress {
    pub course_code: String,
    pub mid_percent: u32,
    pub final_percent: u32,
}

/// UserCoursesResponse
///
/// Output of GET /user-courses: the derived enrollment view (home + extra,
/// extras flagged) together with the raw progress ledger and the aggregated
/// per-course percentages.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserCoursesResponse {
    pub success: bool,
    pub courses: Vec<Course>,
    pub semester: i32,
    pub academic_progress: Vec<ProgressEntry>,
    pub progress: Vec<CourseProgress>,
}

/// MyCoursesResponse
///
/// Output of GET /my-courses: just the home (semester) course set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MyCoursesResponse {
    pub success: bool,
    pub semester: i32,
    pub courses: Vec<Course>,
}

/// ExtraCoursesResponse
///
/// Output of POST /add-course and POST /remove-course: the updated overlay.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ExtraCoursesResponse {
    pub success: bool,
    pub message: String,
    pub extra_courses: Vec<String>,
}

/// ToggleOutcome
///
/// Which half of the toggle the server performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ToggleOutcome {
    Added,
    Removed,
}

/// ToggleProgressResponse
///
/// Output of POST /academic-progress/toggle: the outcome plus the full updated
/// ledger, so the client can re-render without a second round trip.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ToggleProgressResponse {
    pub success: bool,
    pub message: String,
    pub outcome: ToggleOutcome,
    pub academic_progress: Vec<ProgressEntry>,
}

/// ModeratorSummary
///
/// Trimmed listing row for GET /admin/moderators.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ModeratorSummary {
    pub name: String,
    pub university_id: String,
    pub role: Role,
}

/// ModeratorsResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ModeratorsResponse {
    pub success: bool,
    pub moderators: Vec<ModeratorSummary>,
}

/// CourseResponse
///
/// Output of POST /moderator/add-resource: the updated course.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CourseResponse {
    pub success: bool,
    pub message: String,
    pub course: Course,
}
