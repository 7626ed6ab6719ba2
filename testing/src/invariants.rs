//! Assertions for the ordering, rollup and progress invariants.
//!
//! Each `check_*` function reads the store in a throwaway transaction and returns a list
//! of human-readable violations; the `assert_*` wrappers fail the test when it is not
//! empty. They work against any [`CourseStore`], so the Postgres tests reuse them.

use kiwiscript_core::content::Aggregates;
use kiwiscript_core::store::{CourseStore, CourseTransaction};
use kiwiscript_core::{Result, SeriesId, UserId};

/// Positions of `positions` are exactly `1..=N`.
fn is_dense(mut positions: Vec<i32>) -> bool {
    positions.sort_unstable();
    positions
        .iter()
        .zip(1..)
        .all(|(position, expected)| *position == expected)
}

/// Dense positions and correct aggregates for a Series and everything under it.
///
/// # Errors
///
/// Propagates store failures.
pub async fn check_course<S: CourseStore>(store: &S, series_id: SeriesId) -> Result<Vec<String>> {
    let mut tx = store.begin().await?;
    let mut violations = Vec::new();

    let Some(series) = tx.lock_series(series_id).await? else {
        violations.push(format!("series {series_id} does not exist"));
        return Ok(violations);
    };

    let sections = tx.list_sections(series_id).await?;
    if !is_dense(sections.iter().map(|s| s.position).collect()) {
        violations.push(format!(
            "series {series_id} section positions not dense: {:?}",
            sections.iter().map(|s| s.position).collect::<Vec<_>>()
        ));
    }

    let mut series_expected = Aggregates::ZERO;
    for section in &sections {
        let lessons = tx.list_lessons(section.id).await?;
        if !is_dense(lessons.iter().map(|l| l.position).collect()) {
            violations.push(format!(
                "section {} lesson positions not dense: {:?}",
                section.id,
                lessons.iter().map(|l| l.position).collect::<Vec<_>>()
            ));
        }
        let expected: Aggregates = lessons
            .iter()
            .filter(|l| l.is_published)
            .map(Aggregates::of_lesson)
            .sum();
        let stored = Aggregates::stored_on_section(section);
        if stored != expected {
            violations.push(format!(
                "section {} aggregates {stored:?} != published lessons {expected:?}",
                section.id
            ));
        }
        if section.is_published {
            series_expected = series_expected
                + Aggregates {
                    sections: 1,
                    ..expected
                };
        }
    }

    let stored = Aggregates::stored_on_series(&series);
    if stored != series_expected {
        violations.push(format!(
            "series {series_id} aggregates {stored:?} != published sections {series_expected:?}"
        ));
    }

    tx.rollback().await?;
    Ok(violations)
}

/// Progress counters of `user_id` in a Series agree with the completed rows beneath them.
///
/// # Errors
///
/// Propagates store failures.
pub async fn check_progress<S: CourseStore>(
    store: &S,
    user_id: UserId,
    series_id: SeriesId,
) -> Result<Vec<String>> {
    let mut tx = store.begin().await?;
    let mut violations = Vec::new();

    let Some(series_progress) = tx.find_series_progress(user_id, series_id).await? else {
        tx.rollback().await?;
        return Ok(violations);
    };
    let sections_count = tx
        .lock_series(series_id)
        .await?
        .map_or(0, |s| s.sections_count);

    let mut completed_sections = 0;
    let mut completed_lessons = 0;
    for section in tx.list_sections(series_id).await? {
        let Some(section_progress) = tx.find_section_progress(user_id, section.id).await? else {
            continue;
        };
        let mut section_lessons = 0;
        for lesson in tx.list_lessons(section.id).await? {
            if let Some(lesson_progress) = tx.find_lesson_progress(user_id, lesson.id).await? {
                if lesson_progress.is_completed() {
                    section_lessons += 1;
                }
            }
        }
        if section_progress.completed_lessons != section_lessons {
            violations.push(format!(
                "section progress {} counts {} lessons, {section_lessons} completed",
                section_progress.id, section_progress.completed_lessons
            ));
        }
        let should_be_complete = section.lessons_count > 0 && section_lessons >= section.lessons_count;
        if section_progress.completed_at.is_some() != should_be_complete {
            violations.push(format!(
                "section progress {} completed_at {:?} with {section_lessons}/{} lessons",
                section_progress.id, section_progress.completed_at, section.lessons_count
            ));
        }
        completed_lessons += section_lessons;
        if section_progress.completed_at.is_some() {
            completed_sections += 1;
        }
    }

    if series_progress.completed_lessons != completed_lessons {
        violations.push(format!(
            "series progress counts {} lessons, {completed_lessons} completed",
            series_progress.completed_lessons
        ));
    }
    if series_progress.completed_sections != completed_sections {
        violations.push(format!(
            "series progress counts {} sections, {completed_sections} completed",
            series_progress.completed_sections
        ));
    }
    let should_be_complete = sections_count > 0 && completed_sections >= sections_count;
    if series_progress.completed_at.is_some() != should_be_complete {
        violations.push(format!(
            "series progress completed_at {:?} with {completed_sections}/{sections_count} sections",
            series_progress.completed_at
        ));
    }

    tx.rollback().await?;
    Ok(violations)
}

/// Fail the test if [`check_course`] reports a violation.
///
/// # Panics
///
/// On any violation or store failure.
pub async fn assert_course_consistent<S: CourseStore>(store: &S, series_id: SeriesId) {
    let violations = check_course(store, series_id).await;
    assert_eq!(violations, Ok(Vec::new()), "course invariants violated");
}

/// Fail the test if [`check_progress`] reports a violation.
///
/// # Panics
///
/// On any violation or store failure.
pub async fn assert_progress_consistent<S: CourseStore>(
    store: &S,
    user_id: UserId,
    series_id: SeriesId,
) {
    let violations = check_progress(store, user_id, series_id).await;
    assert_eq!(violations, Ok(Vec::new()), "progress invariants violated");
}

#[cfg(test)]
mod tests {
    use super::is_dense;

    #[test]
    fn detects_gaps_and_duplicates() {
        assert!(is_dense(vec![2, 1, 3]));
        assert!(is_dense(Vec::new()));
        assert!(!is_dense(vec![1, 3]));
        assert!(!is_dense(vec![1, 1, 2]));
    }
}
