//! Enrollment resolver.
//!
//! Everything here is a pure function over `(user, catalog)` — the enrollment
//! view is derived on every call, never cached, so catalog edits and cohort
//! changes are immediately visible. Handlers fetch live data from the
//! repository, run these functions, and only then mutate the single owning
//! user record.

use crate::error::ApiError;
use crate::models::{Course, User};

/// EnrollmentView
///
/// The derived, per-user course picture: `home` is the cohort match against
/// the live catalog, `extra` is the opt-in overlay resolved to full courses
/// and flagged. The two sets never overlap — `add_extra` rejects any code
/// already in the home set.
#[derive(Debug, Clone)]
pub struct EnrollmentView {
    pub home: Vec<Course>,
    pub extra: Vec<Course>,
}

impl EnrollmentView {
    /// The union, home first, extras flagged with `is_extra`.
    pub fn enrolled(self) -> Vec<Course> {
        let mut all = self.home;
        all.extend(self.extra);
        all
    }
}

/// Derives the full enrollment view from live catalog data.
///
/// `extra` is resolved through the catalog: a code that no longer exists in
/// the catalog silently drops out of the view (the overlay keeps the code, but
/// there is nothing to show for it). A code whose course has since become part
/// of the user's home semester is also dropped from `extra`, keeping
/// `home ∩ extra` empty even after a cohort change.
pub fn resolve(user: &User, catalog: &[Course]) -> EnrollmentView {
    let home: Vec<Course> = catalog
        .iter()
        .filter(|c| c.semester == user.semester)
        .cloned()
        .collect();

    let extra: Vec<Course> = catalog
        .iter()
        .filter(|c| c.semester != user.semester)
        .filter(|c| user.extra_courses.iter().any(|code| *code == c.code))
        .map(|c| {
            let mut course = c.clone();
            course.is_extra = true;
            course
        })
        .collect();

    EnrollmentView { home, extra }
}

/// Validates an add-extra request against the live catalog.
///
/// Check order matters: existence first (`NotFound`), then home membership,
/// then overlay membership. A home-based rejection must surface as
/// `AlreadyEnrolled` — not a generic failure — so the client renders the right
/// message.
pub fn validate_add_extra(user: &User, catalog: &[Course], code: &str) -> Result<(), ApiError> {
    let course = catalog
        .iter()
        .find(|c| c.code == code)
        .ok_or(ApiError::NotFound("Course"))?;

    let in_home = course.semester == user.semester;
    let in_extra = user.extra_courses.iter().any(|c| c == code);
    if in_home || in_extra {
        return Err(ApiError::AlreadyEnrolled);
    }
    Ok(())
}

/// Validates a remove-extra request.
///
/// Removal only ever targets the overlay — home membership is not individually
/// revocable. Removing a code that is not present fails `NotInExtra` rather
/// than silently succeeding, so callers can detect stale UI state.
pub fn validate_remove_extra(user: &User, code: &str) -> Result<(), ApiError> {
    if user.extra_courses.iter().any(|c| c == code) {
        Ok(())
    } else {
        Err(ApiError::NotInExtra)
    }
}
