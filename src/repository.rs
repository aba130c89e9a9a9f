use crate::error::ApiError;
use crate::models::{
    Course, NewUser, ProgressEntry, Resource, ResourceKind, Role, Term, TermRecord, User,
    is_valid_university_id, normalize_email, normalize_university_id,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Result type for all persistence operations.
pub type RepoResult<T> = Result<T, ApiError>;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. This is the core
/// of the Repository Abstraction pattern, allowing the handlers to interact with
/// the data layer without knowing the specific implementation (Postgres,
/// in-memory, etc.). The catalog is injected through the same trait so tests can
/// substitute a seeded in-memory fake.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's async task boundaries.
///
/// Concurrency contract: every mutation touches exactly one user or one course
/// record. There is no cross-record locking, so two concurrent mutations against
/// the same user are last-write-wins at the field level.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identities ---

    /// Inserts a new identity. Normalizes and re-validates the university ID
    /// (the HTTP boundary already validated once; the store checks again so a
    /// different entry point cannot bypass the format rule), and probes both
    /// uniqueness constraints with one combined lookup.
    async fn register_user(&self, new: NewUser, password_hash: String) -> RepoResult<User>;

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;

    async fn get_user_by_university_id(&self, university_id: &str) -> RepoResult<Option<User>>;

    /// Fetches the identity together with its stored password hash, for the
    /// authenticate path only. The hash never travels further than the caller's
    /// stack frame.
    async fn get_credentials(&self, university_id: &str) -> RepoResult<Option<(User, String)>>;

    /// Sets the role of the identity with the given university ID.
    /// Returns false when no such identity exists.
    async fn set_role(&self, university_id: &str, role: Role) -> RepoResult<bool>;

    async fn list_users_by_role(&self, role: Role) -> RepoResult<Vec<User>>;

    /// Hard, cascading remove of the identity and its owned sub-records.
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;

    async fn count_users(&self) -> RepoResult<i64>;

    // --- Enrollment overlay ---

    /// Appends a course code to the user's extra-course overlay.
    /// Membership validation happens in the enrollment resolver before this
    /// call; the store itself only deduplicates.
    async fn add_extra_course(&self, user_id: Uuid, code: &str) -> RepoResult<Vec<String>>;

    /// Removes a course code from the overlay, returning the updated list.
    async fn remove_extra_course(&self, user_id: Uuid, code: &str) -> RepoResult<Vec<String>>;

    // --- Progress ledger ---

    async fn get_progress(&self, user_id: Uuid) -> RepoResult<Vec<ProgressEntry>>;

    async fn insert_progress(&self, user_id: Uuid, entry: ProgressEntry) -> RepoResult<()>;

    /// Deletes the entry with the exact 4-tuple key. Returns false when no
    /// entry matched.
    async fn delete_progress(
        &self,
        user_id: Uuid,
        course_code: &str,
        term: Term,
        segment_id: i32,
    ) -> RepoResult<bool>;

    // --- Catalog (read-mostly) ---

    async fn list_courses(&self) -> RepoResult<Vec<Course>>;

    async fn get_course(&self, code: &str) -> RepoResult<Option<Course>>;

    async fn list_courses_by_semester(&self, semester: i32) -> RepoResult<Vec<Course>>;

    async fn list_courses_by_codes(&self, codes: &[String]) -> RepoResult<Vec<Course>>;

    /// Appends a resource to one term of a course, returning the updated course.
    async fn add_resource(&self, code: &str, term: Term, resource: Resource)
    -> RepoResult<Option<Course>>;

    /// Removes a resource by ID from one term of a course.
    /// Returns false when the course or the resource did not exist.
    async fn remove_resource(&self, code: &str, term: Term, resource_id: Uuid) -> RepoResult<bool>;

    async fn count_courses(&self) -> RepoResult<i64>;
}


/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres Implementation ---

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Uses the runtime query API throughout; rows land in private structs and are
/// converted into the public models (role and term live as plain text columns).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    university_id: String,
    email: String,
    semester: i32,
    role: String,
    extra_courses: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = ApiError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| ApiError::Internal(format!("unknown role in store: {}", row.role)))?;
        Ok(User {
            id: row.id,
            name: row.name,
            university_id: row.university_id,
            email: row.email,
            semester: row.semester,
            role,
            extra_courses: row.extra_courses,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ProgressRow {
    course_code: String,
    term: String,
    segment_id: i32,
    completed_at: DateTime<Utc>,
}

impl TryFrom<ProgressRow> for ProgressEntry {
    type Error = ApiError;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        let term = Term::parse(&row.term)
            .ok_or_else(|| ApiError::Internal(format!("unknown term in store: {}", row.term)))?;
        Ok(ProgressEntry {
            course_code: row.course_code,
            term,
            segment_id: row.segment_id,
            completed_at: row.completed_at,
        })
    }
}

#[derive(FromRow)]
struct CourseRow {
    code: String,
    title: String,
    semester: i32,
    credits: f64,
    mid_syllabus: String,
    final_syllabus: String,
}

#[derive(FromRow)]
struct ResourceRow {
    id: Uuid,
    course_code: String,
    term: String,
    name: String,
    link: String,
    kind: String,
    segment: i32,
}

const USER_COLUMNS: &str = "id, name, university_id, email, semester, role, extra_courses, created_at";

/// Groups flat resource rows back under their course/term and assembles the
/// nested `Course` models the API serves.
fn assemble_courses(
    course_rows: Vec<CourseRow>,
    resource_rows: Vec<ResourceRow>,
) -> RepoResult<Vec<Course>> {
    let mut by_course: HashMap<String, (Vec<Resource>, Vec<Resource>)> = HashMap::new();
    for row in resource_rows {
        let kind = ResourceKind::parse(&row.kind).ok_or_else(|| {
            ApiError::Internal(format!("unknown resource kind in store: {}", row.kind))
        })?;
        let term = Term::parse(&row.term)
            .ok_or_else(|| ApiError::Internal(format!("unknown term in store: {}", row.term)))?;
        let resource = Resource {
            id: row.id,
            name: row.name,
            link: row.link,
            kind,
            segment: row.segment,
        };
        let entry = by_course.entry(row.course_code).or_default();
        match term {
            Term::Mid => entry.0.push(resource),
            Term::Final => entry.1.push(resource),
        }
    }

    Ok(course_rows
        .into_iter()
        .map(|row| {
            let (mid_resources, final_resources) =
                by_course.remove(&row.code).unwrap_or_default();
            Course {
                code: row.code,
                title: row.title,
                semester: row.semester,
                credits: row.credits,
                is_extra: false,
                mid: TermRecord {
                    syllabus: row.mid_syllabus,
                    resources: mid_resources,
                },
                final_term: TermRecord {
                    syllabus: row.final_syllabus,
                    resources: final_resources,
                },
            }
        })
        .collect())
}

impl PostgresRepository {
    async fn attach_resources(
        &self,
        course_rows: Vec<CourseRow>,
    ) -> RepoResult<Vec<Course>> {
        if course_rows.is_empty() {
            return Ok(vec![]);
        }
        let codes: Vec<String> = course_rows.iter().map(|c| c.code.clone()).collect();
        let resource_rows = sqlx::query_as::<_, ResourceRow>(
            "SELECT id, course_code, term, name, link, kind, segment \
             FROM course_resources WHERE course_code = ANY($1) ORDER BY position, id",
        )
        .bind(&codes)
        .fetch_all(&self.pool)
        .await?;
        assemble_courses(course_rows, resource_rows)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn register_user(&self, new: NewUser, password_hash: String) -> RepoResult<User> {
        let university_id = normalize_university_id(&new.university_id);
        let email = normalize_email(&new.email);

        // Store-side re-validation: the boundary already checked the pattern,
        // but a different entry point must not be able to bypass it.
        if !is_valid_university_id(&university_id) {
            return Err(ApiError::InvalidInput(
                "University ID must start with 'C' followed by at least 6 digits".to_string(),
            ));
        }

        // Single combined uniqueness lookup — one query, not two, so there is
        // no window between an email check and a university-id check.
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 OR university_id = $2")
                .bind(&email)
                .bind(&university_id)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Err(ApiError::DuplicateIdentity);
        }

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, name, university_id, email, password_hash, semester, role, extra_courses, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'Student', '{{}}', NOW()) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&university_id)
        .bind(&email)
        .bind(&password_hash)
        .bind(new.semester)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            // The unique constraints double as a backstop for the race the
            // combined lookup cannot fully close.
            sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::DuplicateIdentity,
            _ => ApiError::Internal(e.to_string()),
        })?;

        row.try_into()
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn get_user_by_university_id(&self, university_id: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE university_id = $1"
        ))
        .bind(normalize_university_id(university_id))
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn get_credentials(&self, university_id: &str) -> RepoResult<Option<(User, String)>> {
        #[derive(FromRow)]
        struct CredentialRow {
            #[sqlx(flatten)]
            user: UserRow,
            password_hash: String,
        }

        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE university_id = $1"
        ))
        .bind(normalize_university_id(university_id))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    async fn set_role(&self, university_id: &str, role: Role) -> RepoResult<bool> {
        let result = sqlx::query("UPDATE users SET role = $1 WHERE university_id = $2")
            .bind(role.as_str())
            .bind(normalize_university_id(university_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users_by_role(&self, role: Role) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY name"
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        // academic_progress rows go with the user via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    async fn add_extra_course(&self, user_id: Uuid, code: &str) -> RepoResult<Vec<String>> {
        let row: Option<(Vec<String>,)> = sqlx::query_as(
            "UPDATE users \
             SET extra_courses = array_append(extra_courses, $2) \
             WHERE id = $1 AND NOT ($2 = ANY(extra_courses)) \
             RETURNING extra_courses",
        )
        .bind(user_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((courses,)) => Ok(courses),
            // Already present (dedup) or the user vanished; re-read the truth.
            None => {
                let user = self.get_user(user_id).await?.ok_or(ApiError::NotFound("User"))?;
                Ok(user.extra_courses)
            }
        }
    }

    async fn remove_extra_course(&self, user_id: Uuid, code: &str) -> RepoResult<Vec<String>> {
        let row: Option<(Vec<String>,)> = sqlx::query_as(
            "UPDATE users SET extra_courses = array_remove(extra_courses, $2) \
             WHERE id = $1 RETURNING extra_courses",
        )
        .bind(user_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(courses,)| courses).ok_or(ApiError::NotFound("User"))
    }

    async fn get_progress(&self, user_id: Uuid) -> RepoResult<Vec<ProgressEntry>> {
        let rows = sqlx::query_as::<_, ProgressRow>(
            "SELECT course_code, term, segment_id, completed_at \
             FROM academic_progress WHERE user_id = $1 ORDER BY completed_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ProgressEntry::try_from).collect()
    }

    async fn insert_progress(&self, user_id: Uuid, entry: ProgressEntry) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO academic_progress (user_id, course_code, term, segment_id, completed_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(&entry.course_code)
        .bind(entry.term.as_str())
        .bind(entry.segment_id)
        .bind(entry.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_progress(
        &self,
        user_id: Uuid,
        course_code: &str,
        term: Term,
        segment_id: i32,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            "DELETE FROM academic_progress \
             WHERE user_id = $1 AND course_code = $2 AND term = $3 AND segment_id = $4",
        )
        .bind(user_id)
        .bind(course_code)
        .bind(term.as_str())
        .bind(segment_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        let rows = sqlx::query_as::<_, CourseRow>(
            "SELECT code, title, semester, credits, mid_syllabus, final_syllabus \
             FROM courses ORDER BY semester, code",
        )
        .fetch_all(&self.pool)
        .await?;
        self.attach_resources(rows).await
    }

    async fn get_course(&self, code: &str) -> RepoResult<Option<Course>> {
        let rows = sqlx::query_as::<_, CourseRow>(
            "SELECT code, title, semester, credits, mid_syllabus, final_syllabus \
             FROM courses WHERE code = $1",
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        Ok(self.attach_resources(rows).await?.into_iter().next())
    }

    async fn list_courses_by_semester(&self, semester: i32) -> RepoResult<Vec<Course>> {
        let rows = sqlx::query_as::<_, CourseRow>(
            "SELECT code, title, semester, credits, mid_syllabus, final_syllabus \
             FROM courses WHERE semester = $1 ORDER BY code",
        )
        .bind(semester)
        .fetch_all(&self.pool)
        .await?;
        self.attach_resources(rows).await
    }

    async fn list_courses_by_codes(&self, codes: &[String]) -> RepoResult<Vec<Course>> {
        if codes.is_empty() {
            return Ok(vec![]);
        }
        let rows = sqlx::query_as::<_, CourseRow>(
            "SELECT code, title, semester, credits, mid_syllabus, final_syllabus \
             FROM courses WHERE code = ANY($1) ORDER BY semester, code",
        )
        .bind(codes)
        .fetch_all(&self.pool)
        .await?;
        self.attach_resources(rows).await
    }

    async fn add_resource(
        &self,
        code: &str,
        term: Term,
        resource: Resource,
    ) -> RepoResult<Option<Course>> {
        if self.get_course(code).await?.is_none() {
            return Ok(None);
        }
        sqlx::query(
            "INSERT INTO course_resources (id, course_code, term, name, link, kind, segment) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(resource.id)
        .bind(code)
        .bind(term.as_str())
        .bind(&resource.name)
        .bind(&resource.link)
        .bind(resource.kind.as_str())
        .bind(resource.segment)
        .execute(&self.pool)
        .await?;
        sqlx::query("UPDATE courses SET updated_at = NOW() WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;
        self.get_course(code).await
    }

    async fn remove_resource(&self, code: &str, term: Term, resource_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query(
            "DELETE FROM course_resources WHERE id = $1 AND course_code = $2 AND term = $3",
        )
        .bind(resource_id)
        .bind(code)
        .bind(term.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_courses(&self) -> RepoResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

// --- In-Memory Implementation ---

struct UserRecord {
    user: User,
    password_hash: String,
    progress: Vec<ProgressEntry>,
}

/// InMemoryRepository
///
/// A full in-process implementation of the `Repository` trait, used by the test
/// suites and for local hacking without a database. Mirrors the same
/// single-record mutation semantics as the Postgres implementation: each method
/// takes the lock once and mutates exactly one user or one course.
#[derive(Default)]
pub struct InMemoryRepository {
    users: RwLock<HashMap<Uuid, UserRecord>>,
    courses: RwLock<HashMap<String, Course>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a repository pre-seeded with a catalog, the common test setup.
    pub fn with_catalog(catalog: Vec<Course>) -> Self {
        let repo = Self::new();
        {
            let mut courses = repo.courses.write().unwrap();
            for course in catalog {
                courses.insert(course.code.clone(), course);
            }
        }
        repo
    }

    fn users_read(&self) -> RepoResult<std::sync::RwLockReadGuard<'_, HashMap<Uuid, UserRecord>>> {
        self.users
            .read()
            .map_err(|_| ApiError::Internal("user store lock poisoned".to_string()))
    }

    fn users_write(
        &self,
    ) -> RepoResult<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, UserRecord>>> {
        self.users
            .write()
            .map_err(|_| ApiError::Internal("user store lock poisoned".to_string()))
    }

    fn courses_read(&self) -> RepoResult<std::sync::RwLockReadGuard<'_, HashMap<String, Course>>> {
        self.courses
            .read()
            .map_err(|_| ApiError::Internal("course store lock poisoned".to_string()))
    }

    fn courses_write(
        &self,
    ) -> RepoResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Course>>> {
        self.courses
            .write()
            .map_err(|_| ApiError::Internal("course store lock poisoned".to_string()))
    }

    fn sorted(mut courses: Vec<Course>) -> Vec<Course> {
        courses.sort_by(|a, b| a.semester.cmp(&b.semester).then_with(|| a.code.cmp(&b.code)));
        courses
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn register_user(&self, new: NewUser, password_hash: String) -> RepoResult<User> {
        let university_id = normalize_university_id(&new.university_id);
        let email = normalize_email(&new.email);

        if !is_valid_university_id(&university_id) {
            return Err(ApiError::InvalidInput(
                "University ID must start with 'C' followed by at least 6 digits".to_string(),
            ));
        }

        let mut users = self.users_write()?;

        // Combined uniqueness probe under a single write lock.
        if users
            .values()
            .any(|r| r.user.email == email || r.user.university_id == university_id)
        {
            return Err(ApiError::DuplicateIdentity);
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            university_id,
            email,
            semester: new.semester,
            role: Role::Student,
            extra_courses: vec![],
            created_at: Utc::now(),
        };
        users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash,
                progress: vec![],
            },
        );
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.users_read()?.get(&id).map(|r| r.user.clone()))
    }

    async fn get_user_by_university_id(&self, university_id: &str) -> RepoResult<Option<User>> {
        let normalized = normalize_university_id(university_id);
        Ok(self
            .users_read()?
            .values()
            .find(|r| r.user.university_id == normalized)
            .map(|r| r.user.clone()))
    }

    async fn get_credentials(&self, university_id: &str) -> RepoResult<Option<(User, String)>> {
        let normalized = normalize_university_id(university_id);
        Ok(self
            .users_read()?
            .values()
            .find(|r| r.user.university_id == normalized)
            .map(|r| (r.user.clone(), r.password_hash.clone())))
    }

    async fn set_role(&self, university_id: &str, role: Role) -> RepoResult<bool> {
        let normalized = normalize_university_id(university_id);
        let mut users = self.users_write()?;
        match users
            .values_mut()
            .find(|r| r.user.university_id == normalized)
        {
            Some(record) => {
                record.user.role = role;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_users_by_role(&self, role: Role) -> RepoResult<Vec<User>> {
        let mut users: Vec<User> = self
            .users_read()?
            .values()
            .filter(|r| r.user.role == role)
            .map(|r| r.user.clone())
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        // Progress entries are embedded in the record, so removal cascades.
        Ok(self.users_write()?.remove(&id).is_some())
    }

    async fn count_users(&self) -> RepoResult<i64> {
        Ok(self.users_read()?.len() as i64)
    }

    async fn add_extra_course(&self, user_id: Uuid, code: &str) -> RepoResult<Vec<String>> {
        let mut users = self.users_write()?;
        let record = users.get_mut(&user_id).ok_or(ApiError::NotFound("User"))?;
        if !record.user.extra_courses.iter().any(|c| c == code) {
            record.user.extra_courses.push(code.to_string());
        }
        Ok(record.user.extra_courses.clone())
    }

    async fn remove_extra_course(&self, user_id: Uuid, code: &str) -> RepoResult<Vec<String>> {
        let mut users = self.users_write()?;
        let record = users.get_mut(&user_id).ok_or(ApiError::NotFound("User"))?;
        record.user.extra_courses.retain(|c| c != code);
        Ok(record.user.extra_courses.clone())
    }

    async fn get_progress(&self, user_id: Uuid) -> RepoResult<Vec<ProgressEntry>> {
        Ok(self
            .users_read()?
            .get(&user_id)
            .map(|r| r.progress.clone())
            .unwrap_or_default())
    }

    async fn insert_progress(&self, user_id: Uuid, entry: ProgressEntry) -> RepoResult<()> {
        let mut users = self.users_write()?;
        let record = users.get_mut(&user_id).ok_or(ApiError::NotFound("User"))?;
        record.progress.push(entry);
        Ok(())
    }

    async fn delete_progress(
        &self,
        user_id: Uuid,
        course_code: &str,
        term: Term,
        segment_id: i32,
    ) -> RepoResult<bool> {
        let mut users = self.users_write()?;
        let record = users.get_mut(&user_id).ok_or(ApiError::NotFound("User"))?;
        let before = record.progress.len();
        record.progress.retain(|p| {
            !(p.course_code == course_code && p.term == term && p.segment_id == segment_id)
        });
        Ok(record.progress.len() < before)
    }

    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        Ok(Self::sorted(self.courses_read()?.values().cloned().collect()))
    }

    async fn get_course(&self, code: &str) -> RepoResult<Option<Course>> {
        Ok(self.courses_read()?.get(code).cloned())
    }

    async fn list_courses_by_semester(&self, semester: i32) -> RepoResult<Vec<Course>> {
        Ok(Self::sorted(
            self.courses_read()?
                .values()
                .filter(|c| c.semester == semester)
                .cloned()
                .collect(),
        ))
    }

    async fn list_courses_by_codes(&self, codes: &[String]) -> RepoResult<Vec<Course>> {
        let courses = self.courses_read()?;
        Ok(Self::sorted(
            codes.iter().filter_map(|code| courses.get(code).cloned()).collect(),
        ))
    }

    async fn add_resource(
        &self,
        code: &str,
        term: Term,
        resource: Resource,
    ) -> RepoResult<Option<Course>> {
        let mut courses = self.courses_write()?;
        match courses.get_mut(code) {
            Some(course) => {
                match term {
                    Term::Mid => course.mid.resources.push(resource),
                    Term::Final => course.final_term.resources.push(resource),
                }
                Ok(Some(course.clone()))
            }
            None => Ok(None),
        }
    }

    async fn remove_resource(&self, code: &str, term: Term, resource_id: Uuid) -> RepoResult<bool> {
        let mut courses = self.courses_write()?;
        match courses.get_mut(code) {
            Some(course) => {
                let resources = match term {
                    Term::Mid => &mut course.mid.resources,
                    Term::Final => &mut course.final_term.resources,
                };
                let before = resources.len();
                resources.retain(|r| r.id != resource_id);
                Ok(resources.len() < before)
            }
            None => Ok(false),
        }
    }

    async fn count_courses(&self) -> RepoResult<i64> {
        Ok(self.courses_read()?.len() as i64)
    }
}
