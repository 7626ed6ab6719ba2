//! Progress Cascade Controller.
//!
//! Per-user progress moves `NotStarted → Viewed → Completed` at every level. Only Lesson
//! completion is a direct action; Section and Series completion are derived by the store
//! when their counters reach the published child count, and a completed Series issues a
//! certificate.
//!
//! # Cascade
//!
//! ```text
//! complete lesson ──► section.completed_lessons += 1
//!                          │
//!            section completed? ──yes──► series.completed_sections += 1, completed_lessons += 1
//!                          │                        │
//!                          no                series completed? ──► language.completed_series += 1
//!                          ▼                                       + certificate
//!              series.completed_lessons += 1
//! ```
//!
//! Deleting progress runs the same steps backwards, decrementing only what the deleted
//! row's completion had added. Certificates are never retracted.
//!
//! Progress rows are locked bottom-up (lesson, section, series) so a user's concurrent
//! completions serialize on the shared parent rows.

use crate::certificates::find_or_issue;
use crate::finish;
use crate::metrics::{
    CASCADE_REVERSALS, LESSONS_COMPLETED, SECTIONS_COMPLETED, SERIES_COMPLETED, counter,
};
use crate::paths::{LessonPath, SectionPath, SeriesPath};
use chrono::{DateTime, Utc};
use kiwiscript_core::certificate::Certificate;
use kiwiscript_core::content::{Language, Lesson, Section, Series};
use kiwiscript_core::environment::{Clock, SystemClock};
use kiwiscript_core::progress::{
    CompletionDelta, LanguageProgress, LessonProgress, NewLessonProgress, NewSectionProgress,
    NewSeriesProgress, SectionProgress, SeriesProgress,
};
use kiwiscript_core::store::{CourseStore, CourseTransaction};
use kiwiscript_core::{CourseError, ProgressId, Result, UserId};
use tracing::{debug, info};

/// Outcome of [`ProgressService::complete_lesson`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedLesson {
    /// The completed Lesson
    pub lesson: Lesson,
    /// Its progress row, `completed_at` set
    pub progress: LessonProgress,
    /// Present only on the call that completed the Series
    pub certificate: Option<Certificate>,
}

/// Per-user progress operations.
#[derive(Clone, Debug)]
pub struct ProgressService<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: CourseStore, C: Clock> ProgressService<S, C> {
    /// Create a service over `store` stamping times from `clock`.
    #[must_use]
    pub const fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    // ═══════════════════════════════════════════════════════════
    // Views
    // ═══════════════════════════════════════════════════════════

    /// Record a view of a language.
    ///
    /// # Errors
    ///
    /// `NotFound` if the language does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn view_language(
        &self,
        user_id: UserId,
        language_slug: &str,
    ) -> Result<(Language, LanguageProgress)> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result = view_language_in(&mut tx, user_id, language_slug, now).await;
        finish(tx, result).await
    }

    /// Record a view of a published Series, creating its language progress if needed.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Series does not exist or is unpublished.
    #[tracing::instrument(skip(self), fields(series = %path))]
    pub async fn view_series(
        &self,
        user_id: UserId,
        path: &SeriesPath,
    ) -> Result<(Series, SeriesProgress)> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result = view_series_in(&mut tx, user_id, path, now).await;
        finish(tx, result).await
    }

    /// Record a view of a published Section, creating ancestor progress if needed.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Section or its Series is missing or unpublished.
    #[tracing::instrument(skip(self), fields(section = %path))]
    pub async fn view_section(
        &self,
        user_id: UserId,
        path: &SectionPath,
    ) -> Result<(Section, SectionProgress)> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result = view_section_in(&mut tx, user_id, path, now).await;
        finish(tx, result).await
    }

    /// Record a view of a published Lesson, creating ancestor progress if needed.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Lesson or an ancestor is missing or unpublished.
    #[tracing::instrument(skip(self), fields(lesson = %path))]
    pub async fn view_lesson(
        &self,
        user_id: UserId,
        path: &LessonPath,
    ) -> Result<(Lesson, LessonProgress)> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result = view_lesson_in(&mut tx, user_id, path, now).await;
        finish(tx, result).await
    }

    // ═══════════════════════════════════════════════════════════
    // Completion
    // ═══════════════════════════════════════════════════════════

    /// Complete a viewed Lesson and cascade completion upward.
    ///
    /// Completing an already-completed Lesson changes nothing and returns the current
    /// state without a certificate.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Lesson or an ancestor is unpublished, or the Lesson was never
    /// viewed.
    #[tracing::instrument(skip(self), fields(lesson = %path))]
    pub async fn complete_lesson(
        &self,
        user_id: UserId,
        path: &LessonPath,
    ) -> Result<CompletedLesson> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result = complete_lesson_in(&mut tx, user_id, path, now).await;
        finish(tx, result).await
    }

    // ═══════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════

    /// A user's progress in a language.
    ///
    /// # Errors
    ///
    /// `NotFound` if none exists.
    #[tracing::instrument(skip(self))]
    pub async fn find_language_progress(
        &self,
        user_id: UserId,
        language_slug: &str,
    ) -> Result<LanguageProgress> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .find_language_progress(user_id, language_slug)
            .await
            .and_then(|found| found.ok_or(CourseError::NotFound));
        finish(tx, result).await
    }

    /// A user's progress in a Series.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Series or the progress does not exist.
    #[tracing::instrument(skip(self), fields(series = %path))]
    pub async fn find_series_progress(
        &self,
        user_id: UserId,
        path: &SeriesPath,
    ) -> Result<SeriesProgress> {
        let mut tx = self.store.begin().await?;
        let result = find_series_progress_in(&mut tx, user_id, path).await;
        finish(tx, result).await
    }

    /// A user's progress in a Section.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Section or the progress does not exist.
    #[tracing::instrument(skip(self), fields(section = %path))]
    pub async fn find_section_progress(
        &self,
        user_id: UserId,
        path: &SectionPath,
    ) -> Result<SectionProgress> {
        let mut tx = self.store.begin().await?;
        let result = find_section_progress_in(&mut tx, user_id, path).await;
        finish(tx, result).await
    }

    /// A user's progress in a Lesson.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Lesson or the progress does not exist.
    #[tracing::instrument(skip(self), fields(lesson = %path))]
    pub async fn find_lesson_progress(
        &self,
        user_id: UserId,
        path: &LessonPath,
    ) -> Result<LessonProgress> {
        let mut tx = self.store.begin().await?;
        let result = find_lesson_progress_in(&mut tx, user_id, path).await;
        finish(tx, result).await
    }

    // ═══════════════════════════════════════════════════════════
    // Reset
    // ═══════════════════════════════════════════════════════════

    /// Delete a user's Lesson progress, reversing its completion if any.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Lesson or the progress does not exist.
    #[tracing::instrument(skip(self), fields(lesson = %path))]
    pub async fn delete_lesson_progress(&self, user_id: UserId, path: &LessonPath) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let result = delete_lesson_progress_in(&mut tx, user_id, path).await;
        finish(tx, result).await
    }

    /// Delete a user's Section progress and its Lesson progress, reversing what they
    /// contributed to the Series progress.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Section or the progress does not exist.
    #[tracing::instrument(skip(self), fields(section = %path))]
    pub async fn delete_section_progress(
        &self,
        user_id: UserId,
        path: &SectionPath,
    ) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let result = delete_section_progress_in(&mut tx, user_id, path).await;
        finish(tx, result).await
    }

    /// Delete a user's Series progress and everything below it.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Series or the progress does not exist.
    #[tracing::instrument(skip(self), fields(series = %path))]
    pub async fn delete_series_progress(&self, user_id: UserId, path: &SeriesPath) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let result = delete_series_progress_in(&mut tx, user_id, path).await;
        finish(tx, result).await
    }

    /// Delete a user's language progress and everything below it.
    ///
    /// # Errors
    ///
    /// `NotFound` if the progress does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn delete_language_progress(
        &self,
        user_id: UserId,
        language_slug: &str,
    ) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let result = delete_language_progress_in(&mut tx, user_id, language_slug).await;
        finish(tx, result).await
    }
}

// ============================================================================
// Content lookups
// ============================================================================

async fn find_series<T: CourseTransaction>(tx: &mut T, path: &SeriesPath) -> Result<Series> {
    tx.find_series(&path.language_slug, &path.series_slug)
        .await?
        .ok_or(CourseError::NotFound)
}

async fn find_section<T: CourseTransaction>(
    tx: &mut T,
    path: &SectionPath,
) -> Result<(Series, Section)> {
    let series = find_series(tx, &path.series).await?;
    let section = tx
        .find_section(series.id, path.section_id)
        .await?
        .ok_or(CourseError::NotFound)?;
    Ok((series, section))
}

async fn find_lesson<T: CourseTransaction>(
    tx: &mut T,
    path: &LessonPath,
) -> Result<(Series, Section, Lesson)> {
    let (series, section) = find_section(tx, &path.section).await?;
    let lesson = tx
        .find_lesson(section.id, path.lesson_id)
        .await?
        .ok_or(CourseError::NotFound)?;
    Ok((series, section, lesson))
}

/// Share-lock a visible Series so an author cannot unpublish it under this transaction.
async fn published_series<T: CourseTransaction>(tx: &mut T, path: &SeriesPath) -> Result<Series> {
    let series = find_series(tx, path).await?;
    tx.share_series(series.id)
        .await?
        .filter(|series| series.is_published)
        .ok_or(CourseError::NotFound)
}

async fn published_section<T: CourseTransaction>(
    tx: &mut T,
    path: &SectionPath,
) -> Result<(Series, Section)> {
    let (series, section) = find_section(tx, path).await?;
    let series = tx
        .share_series(series.id)
        .await?
        .filter(|series| series.is_published)
        .ok_or(CourseError::NotFound)?;
    let section = tx
        .share_section(section.id)
        .await?
        .filter(|section| section.is_published)
        .ok_or(CourseError::NotFound)?;
    Ok((series, section))
}

async fn published_lesson<T: CourseTransaction>(
    tx: &mut T,
    path: &LessonPath,
) -> Result<(Series, Section, Lesson)> {
    let (series, section) = published_section(tx, &path.section).await?;
    let lesson = tx
        .find_lesson(section.id, path.lesson_id)
        .await?
        .ok_or(CourseError::NotFound)?;
    let lesson = tx
        .share_lesson(lesson.id)
        .await?
        .filter(|lesson| lesson.is_published)
        .ok_or(CourseError::NotFound)?;
    Ok((series, section, lesson))
}

// ============================================================================
// Find-or-create
// ============================================================================
//
// Each helper returns the row and whether this call created it. A concurrent first view
// by the same user surfaces as a `Conflict` on insert, resolved by reading the row the
// other request created.

async fn ensure_language_progress<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    language_slug: &str,
    now: DateTime<Utc>,
) -> Result<(LanguageProgress, bool)> {
    if let Some(progress) = tx.find_language_progress(user_id, language_slug).await? {
        return Ok((progress, false));
    }
    match tx.create_language_progress(user_id, language_slug, now).await {
        Ok(progress) => Ok((progress, true)),
        Err(CourseError::Conflict { .. }) => tx
            .find_language_progress(user_id, language_slug)
            .await?
            .map(|progress| (progress, false))
            .ok_or(CourseError::NotFound),
        Err(error) => Err(error),
    }
}

async fn ensure_series_progress<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    series: &Series,
    now: DateTime<Utc>,
) -> Result<(SeriesProgress, bool)> {
    if let Some(progress) = tx.find_series_progress(user_id, series.id).await? {
        return Ok((progress, false));
    }
    let (language, _) = ensure_language_progress(tx, user_id, &series.language_slug, now).await?;
    let new = NewSeriesProgress {
        user_id,
        series_id: series.id,
        language_slug: series.language_slug.clone(),
        series_slug: series.slug.clone(),
        language_progress_id: language.id,
    };
    match tx.create_series_progress(new, now).await {
        Ok(progress) => Ok((progress, true)),
        Err(CourseError::Conflict { .. }) => tx
            .find_series_progress(user_id, series.id)
            .await?
            .map(|progress| (progress, false))
            .ok_or(CourseError::NotFound),
        Err(error) => Err(error),
    }
}

async fn ensure_section_progress<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    series: &Series,
    section: &Section,
    now: DateTime<Utc>,
) -> Result<(SectionProgress, bool)> {
    if let Some(progress) = tx.find_section_progress(user_id, section.id).await? {
        return Ok((progress, false));
    }
    let (series_progress, _) = ensure_series_progress(tx, user_id, series, now).await?;
    let new = NewSectionProgress {
        user_id,
        section_id: section.id,
        series_id: series.id,
        series_progress_id: series_progress.id,
    };
    match tx.create_section_progress(new, now).await {
        Ok(progress) => Ok((progress, true)),
        Err(CourseError::Conflict { .. }) => tx
            .find_section_progress(user_id, section.id)
            .await?
            .map(|progress| (progress, false))
            .ok_or(CourseError::NotFound),
        Err(error) => Err(error),
    }
}

// ============================================================================
// Views
// ============================================================================

async fn view_language_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    language_slug: &str,
    now: DateTime<Utc>,
) -> Result<(Language, LanguageProgress)> {
    let language = tx
        .find_language(language_slug)
        .await?
        .ok_or(CourseError::NotFound)?;
    let (progress, created) = ensure_language_progress(tx, user_id, &language.slug, now).await?;
    let progress = if created {
        debug!(progress_id = %progress.id, "Language progress created");
        progress
    } else {
        tx.touch_language_progress(progress.id, now).await?
    };
    Ok((language, progress))
}

async fn view_series_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    path: &SeriesPath,
    now: DateTime<Utc>,
) -> Result<(Series, SeriesProgress)> {
    let series = published_series(tx, path).await?;
    let (progress, created) = ensure_series_progress(tx, user_id, &series, now).await?;
    let progress = if created {
        debug!(progress_id = %progress.id, "Series progress created");
        progress
    } else {
        tx.touch_series_progress(progress.id, now).await?
    };
    Ok((series, progress))
}

async fn view_section_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    path: &SectionPath,
    now: DateTime<Utc>,
) -> Result<(Section, SectionProgress)> {
    let (series, section) = published_section(tx, path).await?;
    let (progress, created) = ensure_section_progress(tx, user_id, &series, &section, now).await?;
    let progress = if created {
        debug!(progress_id = %progress.id, "Section progress created");
        progress
    } else {
        tx.touch_section_progress(progress.id, now).await?
    };
    Ok((section, progress))
}

async fn view_lesson_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    path: &LessonPath,
    now: DateTime<Utc>,
) -> Result<(Lesson, LessonProgress)> {
    let (series, section, lesson) = published_lesson(tx, path).await?;
    if let Some(progress) = tx.find_lesson_progress(user_id, lesson.id).await? {
        let progress = tx.touch_lesson_progress(progress.id, now).await?;
        return Ok((lesson, progress));
    }

    let (section_progress, _) =
        ensure_section_progress(tx, user_id, &series, &section, now).await?;
    let new = NewLessonProgress {
        user_id,
        lesson_id: lesson.id,
        section_id: section.id,
        section_progress_id: section_progress.id,
        series_progress_id: section_progress.series_progress_id,
    };
    let progress = match tx.create_lesson_progress(new, now).await {
        Ok(progress) => {
            debug!(progress_id = %progress.id, "Lesson progress created");
            progress
        }
        Err(CourseError::Conflict { .. }) => {
            let existing = tx
                .find_lesson_progress(user_id, lesson.id)
                .await?
                .ok_or(CourseError::NotFound)?;
            tx.touch_lesson_progress(existing.id, now).await?
        }
        Err(error) => return Err(error),
    };
    Ok((lesson, progress))
}

// ============================================================================
// Completion
// ============================================================================

async fn complete_lesson_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    path: &LessonPath,
    now: DateTime<Utc>,
) -> Result<CompletedLesson> {
    let (series, _, lesson) = published_lesson(tx, path).await?;
    let viewed = tx
        .find_lesson_progress(user_id, lesson.id)
        .await?
        .ok_or(CourseError::NotFound)?;
    let progress = lock_lesson_progress(tx, viewed.id).await?;
    if progress.is_completed() {
        debug!(progress_id = %progress.id, "Lesson already completed");
        return Ok(CompletedLesson {
            lesson,
            progress,
            certificate: None,
        });
    }

    let progress = tx.complete_lesson_progress(progress.id, now).await?;
    counter!(LESSONS_COMPLETED).increment(1);

    // Section level
    let section_before = lock_section_progress(tx, progress.section_progress_id).await?;
    let section_after = tx.increment_section_progress(section_before.id, now).await?;
    let section_completed =
        section_before.completed_at.is_none() && section_after.completed_at.is_some();

    // Series level
    let delta = if section_completed {
        counter!(SECTIONS_COMPLETED).increment(1);
        CompletionDelta::SECTION
    } else {
        CompletionDelta::LESSON
    };
    let series_before = lock_series_progress(tx, progress.series_progress_id).await?;
    let series_after = tx
        .increment_series_progress(series_before.id, delta, now)
        .await?;
    let series_completed =
        series_before.completed_at.is_none() && series_after.completed_at.is_some();

    // Language level and certificate
    let certificate = if series_completed {
        counter!(SERIES_COMPLETED).increment(1);
        tx.add_language_completed_series(series_after.language_progress_id, 1)
            .await?;
        let issued = find_or_issue(tx, user_id, &series, now).await?;
        Some(issued.certificate)
    } else {
        None
    };

    info!(
        lesson_id = %lesson.id,
        section_completed,
        series_completed,
        section_lessons = section_after.completed_lessons,
        series_sections = series_after.completed_sections,
        "Lesson completed"
    );
    Ok(CompletedLesson {
        lesson,
        progress,
        certificate,
    })
}

// ============================================================================
// Reads
// ============================================================================

async fn find_series_progress_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    path: &SeriesPath,
) -> Result<SeriesProgress> {
    let series = find_series(tx, path).await?;
    tx.find_series_progress(user_id, series.id)
        .await?
        .ok_or(CourseError::NotFound)
}

async fn find_section_progress_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    path: &SectionPath,
) -> Result<SectionProgress> {
    let (_, section) = find_section(tx, path).await?;
    tx.find_section_progress(user_id, section.id)
        .await?
        .ok_or(CourseError::NotFound)
}

async fn find_lesson_progress_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    path: &LessonPath,
) -> Result<LessonProgress> {
    let (_, _, lesson) = find_lesson(tx, path).await?;
    tx.find_lesson_progress(user_id, lesson.id)
        .await?
        .ok_or(CourseError::NotFound)
}

// ============================================================================
// Reset
// ============================================================================

async fn lock_lesson_progress<T: CourseTransaction>(
    tx: &mut T,
    id: ProgressId,
) -> Result<LessonProgress> {
    tx.lock_lesson_progress(id)
        .await?
        .ok_or(CourseError::NotFound)
}

async fn lock_section_progress<T: CourseTransaction>(
    tx: &mut T,
    id: ProgressId,
) -> Result<SectionProgress> {
    tx.lock_section_progress(id)
        .await?
        .ok_or(CourseError::NotFound)
}

async fn lock_series_progress<T: CourseTransaction>(
    tx: &mut T,
    id: ProgressId,
) -> Result<SeriesProgress> {
    tx.lock_series_progress(id)
        .await?
        .ok_or(CourseError::NotFound)
}

/// Take `delta` back from a SeriesProgress, and one completed Series from its language
/// progress if that costs the Series its completion.
async fn reverse_series<T: CourseTransaction>(
    tx: &mut T,
    id: ProgressId,
    delta: CompletionDelta,
) -> Result<()> {
    let before = lock_series_progress(tx, id).await?;
    let after = tx.decrement_series_progress(id, delta).await?;
    if before.completed_at.is_some() && after.completed_at.is_none() {
        tx.add_language_completed_series(after.language_progress_id, -1)
            .await?;
    }
    Ok(())
}

async fn delete_lesson_progress_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    path: &LessonPath,
) -> Result<()> {
    let (_, _, lesson) = find_lesson(tx, path).await?;
    let found = tx
        .find_lesson_progress(user_id, lesson.id)
        .await?
        .ok_or(CourseError::NotFound)?;
    let progress = lock_lesson_progress(tx, found.id).await?;

    if !progress.is_completed() {
        tx.delete_lesson_progress(progress.id).await?;
        info!(progress_id = %progress.id, "Viewed lesson progress deleted");
        return Ok(());
    }

    let section = lock_section_progress(tx, progress.section_progress_id).await?;
    tx.delete_lesson_progress(progress.id).await?;
    tx.decrement_section_progress(section.id).await?;
    let delta = if section.completed_at.is_some() {
        CompletionDelta::SECTION
    } else {
        CompletionDelta::LESSON
    };
    reverse_series(tx, progress.series_progress_id, delta).await?;
    counter!(CASCADE_REVERSALS).increment(1);
    info!(progress_id = %progress.id, ?delta, "Completed lesson progress reversed");
    Ok(())
}

async fn delete_section_progress_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    path: &SectionPath,
) -> Result<()> {
    let (_, section) = find_section(tx, path).await?;
    let found = tx
        .find_section_progress(user_id, section.id)
        .await?
        .ok_or(CourseError::NotFound)?;
    let progress = lock_section_progress(tx, found.id).await?;
    tx.delete_section_progress(progress.id).await?;

    let delta = CompletionDelta {
        sections: i32::from(progress.completed_at.is_some()),
        lessons: progress.completed_lessons,
    };
    if delta != CompletionDelta::default() {
        reverse_series(tx, progress.series_progress_id, delta).await?;
        counter!(CASCADE_REVERSALS).increment(1);
    }
    info!(progress_id = %progress.id, ?delta, "Section progress deleted");
    Ok(())
}

async fn delete_series_progress_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    path: &SeriesPath,
) -> Result<()> {
    let series = find_series(tx, path).await?;
    let found = tx
        .find_series_progress(user_id, series.id)
        .await?
        .ok_or(CourseError::NotFound)?;
    let progress = lock_series_progress(tx, found.id).await?;
    tx.delete_series_progress(progress.id).await?;

    if progress.completed_at.is_some() {
        tx.add_language_completed_series(progress.language_progress_id, -1)
            .await?;
        counter!(CASCADE_REVERSALS).increment(1);
    }
    info!(progress_id = %progress.id, "Series progress deleted");
    Ok(())
}

async fn delete_language_progress_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    language_slug: &str,
) -> Result<()> {
    let found = tx
        .find_language_progress(user_id, language_slug)
        .await?
        .ok_or(CourseError::NotFound)?;
    let progress = tx
        .lock_language_progress(found.id)
        .await?
        .ok_or(CourseError::NotFound)?;
    tx.delete_language_progress(progress.id).await?;
    info!(progress_id = %progress.id, "Language progress deleted");
    Ok(())
}
