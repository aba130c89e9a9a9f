//! Progress ledger.
//!
//! Pure functions over the stored entry list. The toggle protocol has a single
//! entry point: the server looks up the exact (course, term, segment) key in
//! current state and performs whichever half applies — it never trusts a
//! client-supplied "currently completed" flag, which removes the double-submit
//! divergence between client and server state.
//!
//! Two concurrent toggles on the same key can race to `added, added` or
//! `removed, removed` instead of a clean alternation. That weak-consistency
//! trade-off matches the reference behavior and is accepted; do not serialize
//! the ledger to "fix" it unless a requirement actually demands it.

use crate::models::{Course, CourseProgress, ProgressEntry, Term, ToggleOutcome};

/// Whether the exact 4-tuple key is currently marked complete.
pub fn is_completed(entries: &[ProgressEntry], course_code: &str, term: Term, segment_id: i32) -> bool {
    entries
        .iter()
        .any(|p| p.course_code == course_code && p.term == term && p.segment_id == segment_id)
}

/// Decides which half of the toggle applies for the current stored state.
pub fn toggle_decision(
    entries: &[ProgressEntry],
    course_code: &str,
    term: Term,
    segment_id: i32,
) -> ToggleOutcome {
    if is_completed(entries, course_code, term, segment_id) {
        ToggleOutcome::Removed
    } else {
        ToggleOutcome::Added
    }
}

/// Completion percentage for one course term.
///
/// `expected_segments` is the configured term structure, deliberately
/// independent of the resource list: a course with zero uploaded resources
/// still tracks progress. Clamped at 100 so over-complete data (e.g. after a
/// segment-count reconfiguration) never reads as more than done.
pub fn completion_percent(completed: usize, expected_segments: u32) -> u32 {
    if expected_segments == 0 {
        return 0;
    }
    let pct = (100.0 * completed as f64 / expected_segments as f64).round() as u32;
    pct.min(100)
}

/// Count of completed segments for one course term.
pub fn completed_segments(entries: &[ProgressEntry], course_code: &str, term: Term) -> usize {
    entries
        .iter()
        .filter(|p| p.course_code == course_code && p.term == term)
        .count()
}

/// Aggregates per-course, per-term completion percentages for a set of
/// enrolled courses. Derived on every read; nothing here is cached.
pub fn summarize(
    courses: &[Course],
    entries: &[ProgressEntry],
    expected_segments: u32,
) -> Vec<CourseProgress> {
    courses
        .iter()
        .map(|course| CourseProgress {
            course_code: course.code.clone(),
            mid_percent: completion_percent(
                completed_segments(entries, &course.code, Term::Mid),
                expected_segments,
            ),
            final_percent: completion_percent(
                completed_segments(entries, &course.code, Term::Final),
                expected_segments,
            ),
        })
        .collect()
}
