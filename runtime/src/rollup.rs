//! Aggregate Rollup Engine.
//!
//! Section and Series counters are derived state: they always equal the sum over the
//! *published* children. Every change is applied as a delta in the same transaction as the
//! write that caused it, and [`reconcile_series`] can recompute them from scratch to detect
//! and repair drift.

use crate::metrics::{ROLLUP_ADJUSTMENTS, counter};
use kiwiscript_core::content::{Aggregates, Lesson, Section, Series};
use kiwiscript_core::store::CourseTransaction;
use kiwiscript_core::{CourseError, Result, SectionId, SeriesId};
use serde::Serialize;

/// Apply a Lesson-level `delta` to its Section, and to the Series too when the Section is
/// published.
///
/// Callers only invoke this for deltas of a published Lesson (or one that is becoming
/// (un)published).
///
/// # Errors
///
/// Propagates store failures.
pub async fn propagate_from_lesson<T: CourseTransaction>(
    tx: &mut T,
    section: &Section,
    delta: Aggregates,
) -> Result<Section> {
    if delta.is_zero() {
        return Ok(section.clone());
    }
    let updated = tx.apply_section_aggregates(section.id, delta).await?;
    counter!(ROLLUP_ADJUSTMENTS).increment(1);

    if section.is_published {
        tx.apply_series_aggregates(section.series_id, Aggregates { sections: 0, ..delta })
            .await?;
        counter!(ROLLUP_ADJUSTMENTS).increment(1);
    }
    tracing::debug!(section_id = %section.id, ?delta, "Rolled up lesson delta");
    Ok(updated)
}

/// Apply a Section-level `delta` to its Series.
///
/// # Errors
///
/// Propagates store failures.
pub async fn propagate_from_section<T: CourseTransaction>(
    tx: &mut T,
    series_id: SeriesId,
    delta: Aggregates,
) -> Result<Series> {
    let series = tx.apply_series_aggregates(series_id, delta).await?;
    counter!(ROLLUP_ADJUSTMENTS).increment(1);
    tracing::debug!(%series_id, ?delta, "Rolled up section delta");
    Ok(series)
}

/// Apply a content duration change to a Lesson, then roll it up if the Lesson is
/// published.
///
/// # Errors
///
/// Propagates store failures.
pub async fn apply_duration_change<T: CourseTransaction>(
    tx: &mut T,
    section: &Section,
    lesson: &Lesson,
    read_delta: i32,
    watch_delta: i32,
) -> Result<Lesson> {
    if read_delta == 0 && watch_delta == 0 {
        return Ok(lesson.clone());
    }
    let updated = tx.add_lesson_times(lesson.id, read_delta, watch_delta).await?;
    if lesson.is_published {
        propagate_from_lesson(tx, section, Aggregates::times(read_delta, watch_delta)).await?;
    }
    Ok(updated)
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Stored versus recomputed counters of one row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Drift {
    /// What the row held
    pub stored: Aggregates,
    /// What the published children add up to
    pub expected: Aggregates,
}

/// Outcome of [`reconcile_series`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// Reconciled Series
    pub series_id: SeriesId,
    /// Drift on the Series row, if any
    pub series: Option<Drift>,
    /// Sections whose counters drifted
    pub sections: Vec<(SectionId, Drift)>,
}

impl DriftReport {
    /// Whether every counter was already correct.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.series.is_none() && self.sections.is_empty()
    }
}

/// Recompute a Series' and its Sections' counters from published children and rewrite
/// any that drifted.
///
/// # Errors
///
/// Returns [`CourseError::NotFound`] if the Series does not exist.
pub async fn reconcile_series<T: CourseTransaction>(
    tx: &mut T,
    series_id: SeriesId,
) -> Result<DriftReport> {
    let series = tx
        .lock_series(series_id)
        .await?
        .ok_or(CourseError::NotFound)?;

    let mut report = DriftReport {
        series_id,
        series: None,
        sections: Vec::new(),
    };
    let mut series_expected = Aggregates::ZERO;

    for section in tx.list_sections(series_id).await? {
        let expected: Aggregates = tx
            .list_lessons(section.id)
            .await?
            .iter()
            .filter(|lesson| lesson.is_published)
            .map(Aggregates::of_lesson)
            .sum();
        let stored = Aggregates::stored_on_section(&section);
        let section = if stored == expected {
            section
        } else {
            report.sections.push((section.id, Drift { stored, expected }));
            tx.set_section_aggregates(section.id, expected).await?
        };
        if section.is_published {
            series_expected = series_expected + Aggregates::of_section(&section);
        }
    }

    let stored = Aggregates::stored_on_series(&series);
    if stored != series_expected {
        report.series = Some(Drift {
            stored,
            expected: series_expected,
        });
        tx.set_series_aggregates(series_id, series_expected).await?;
    }

    if report.is_clean() {
        tracing::debug!(%series_id, "Series aggregates consistent");
    } else {
        tracing::warn!(
            %series_id,
            drifted_sections = report.sections.len(),
            series_drifted = report.series.is_some(),
            "Repaired drifted aggregates"
        );
    }
    Ok(report)
}
