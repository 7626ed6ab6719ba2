//! Transactional store traits.
//!
//! Every service operation runs inside exactly one [`CourseTransaction`]: it is begun before
//! the first read, and committed only if every step succeeded. Dropping a transaction
//! without committing discards its writes.
//!
//! # Locking
//!
//! The `lock_*` methods read a row and hold a write lock on it until the transaction ends
//! (`SELECT ... FOR UPDATE` in Postgres). Services lock content top-down
//! (series, section, lesson) and progress bottom-up (lesson, section, series, language) so
//! concurrent requests touching the same parent serialize instead of losing updates.
//!
//! # Errors
//!
//! Implementations translate native failures into [`CourseError`](crate::CourseError):
//! duplicate keys become `Conflict`, missing rows on update become `NotFound`, everything
//! unexpected becomes `Unknown`.
//!
//! # Example
//!
//! ```ignore
//! let mut tx = store.begin().await?;
//! let series = tx.lock_series(series_id).await?.ok_or(CourseError::NotFound)?;
//! tx.apply_series_aggregates(series.id, delta).await?;
//! tx.commit().await?;
//! ```

use crate::certificate::{Certificate, NewCertificate};
use crate::content::{
    Aggregates, Language, Lesson, LessonArticle, LessonVideo, NewLanguage, NewLesson,
    NewSection, NewSeries, Section, Series, Sibling, SiblingScope,
};
use crate::error::Result;
use crate::progress::{
    CompletionDelta, LanguageProgress, LessonProgress, NewLessonProgress, NewSectionProgress,
    NewSeriesProgress, SectionProgress, SeriesProgress,
};
use crate::types::{CertificateId, LessonId, ProgressId, SectionId, SeriesId, UserId};
use chrono::{DateTime, Utc};

/// Entry point to a transactional course store.
pub trait CourseStore: Send + Sync {
    /// Transaction handle produced by [`CourseStore::begin`].
    type Transaction: CourseTransaction;

    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CourseError::Unknown`](crate::CourseError::Unknown) if no connection is
    /// available.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;
}

/// Operations available inside one transaction.
///
/// Reads return `Ok(None)` for absent rows. Writes addressed by id return
/// [`CourseError::NotFound`](crate::CourseError::NotFound) when the row does not exist.
pub trait CourseTransaction: Send {
    /// Make every write of the transaction durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing is applied in that case.
    fn commit(self) -> impl Future<Output = Result<()>> + Send;

    /// Discard every write of the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store could not be told to roll back.
    fn rollback(self) -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Languages and Series
    // ═══════════════════════════════════════════════════════════

    /// Find a language by slug.
    fn find_language(&mut self, slug: &str)
    -> impl Future<Output = Result<Option<Language>>> + Send;

    /// Insert a language. `Conflict` if the slug is taken.
    fn create_language(
        &mut self,
        language: NewLanguage,
    ) -> impl Future<Output = Result<Language>> + Send;

    /// Find a Series by its slugs.
    fn find_series(
        &mut self,
        language_slug: &str,
        series_slug: &str,
    ) -> impl Future<Output = Result<Option<Series>>> + Send;

    /// Lock a Series row.
    fn lock_series(&mut self, id: SeriesId)
    -> impl Future<Output = Result<Option<Series>>> + Send;

    /// Share-lock a Series row: other readers proceed, edits wait for this transaction.
    fn share_series(&mut self, id: SeriesId)
    -> impl Future<Output = Result<Option<Series>>> + Send;

    /// Ids of every Series, in id order.
    fn list_series_ids(&mut self) -> impl Future<Output = Result<Vec<SeriesId>>> + Send;

    /// Insert a Series with zero aggregates, unpublished. `Conflict` if the slug is taken.
    fn create_series(&mut self, series: NewSeries)
    -> impl Future<Output = Result<Series>> + Send;

    /// Set `is_published` on a Series.
    fn set_series_published(
        &mut self,
        id: SeriesId,
        published: bool,
    ) -> impl Future<Output = Result<Series>> + Send;

    /// Add `delta` (all four counters) to a Series.
    fn apply_series_aggregates(
        &mut self,
        id: SeriesId,
        delta: Aggregates,
    ) -> impl Future<Output = Result<Series>> + Send;

    /// Overwrite a Series' counters. Used by reconciliation only.
    fn set_series_aggregates(
        &mut self,
        id: SeriesId,
        aggregates: Aggregates,
    ) -> impl Future<Output = Result<Series>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Sections
    // ═══════════════════════════════════════════════════════════

    /// Find a Section of a Series.
    fn find_section(
        &mut self,
        series_id: SeriesId,
        id: SectionId,
    ) -> impl Future<Output = Result<Option<Section>>> + Send;

    /// Lock a Section row.
    fn lock_section(
        &mut self,
        id: SectionId,
    ) -> impl Future<Output = Result<Option<Section>>> + Send;

    /// Share-lock a Section row.
    fn share_section(
        &mut self,
        id: SectionId,
    ) -> impl Future<Output = Result<Option<Section>>> + Send;

    /// Sections of a Series ordered by position.
    fn list_sections(
        &mut self,
        series_id: SeriesId,
    ) -> impl Future<Output = Result<Vec<Section>>> + Send;

    /// Number of Sections (published or not) in a Series.
    fn count_sections(&mut self, series_id: SeriesId) -> impl Future<Output = Result<i32>> + Send;

    /// Insert a Section with zero aggregates, unpublished.
    fn create_section(
        &mut self,
        section: NewSection,
    ) -> impl Future<Output = Result<Section>> + Send;

    /// Update title and description.
    fn update_section_details(
        &mut self,
        id: SectionId,
        title: &str,
        description: &str,
    ) -> impl Future<Output = Result<Section>> + Send;

    /// Set `is_published` on a Section.
    fn set_section_published(
        &mut self,
        id: SectionId,
        published: bool,
    ) -> impl Future<Output = Result<Section>> + Send;

    /// Add `delta` (ignoring `sections`) to a Section.
    fn apply_section_aggregates(
        &mut self,
        id: SectionId,
        delta: Aggregates,
    ) -> impl Future<Output = Result<Section>> + Send;

    /// Overwrite a Section's counters. Used by reconciliation only.
    fn set_section_aggregates(
        &mut self,
        id: SectionId,
        aggregates: Aggregates,
    ) -> impl Future<Output = Result<Section>> + Send;

    /// Delete a Section together with its Lessons and their content.
    fn delete_section(&mut self, id: SectionId) -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Lessons
    // ═══════════════════════════════════════════════════════════

    /// Find a Lesson of a Section.
    fn find_lesson(
        &mut self,
        section_id: SectionId,
        id: LessonId,
    ) -> impl Future<Output = Result<Option<Lesson>>> + Send;

    /// Lock a Lesson row.
    fn lock_lesson(&mut self, id: LessonId)
    -> impl Future<Output = Result<Option<Lesson>>> + Send;

    /// Share-lock a Lesson row.
    fn share_lesson(&mut self, id: LessonId)
    -> impl Future<Output = Result<Option<Lesson>>> + Send;

    /// Lessons of a Section ordered by position.
    fn list_lessons(
        &mut self,
        section_id: SectionId,
    ) -> impl Future<Output = Result<Vec<Lesson>>> + Send;

    /// Number of Lessons (published or not) in a Section.
    fn count_lessons(&mut self, section_id: SectionId)
    -> impl Future<Output = Result<i32>> + Send;

    /// Insert a Lesson with zero times, unpublished.
    fn create_lesson(&mut self, lesson: NewLesson) -> impl Future<Output = Result<Lesson>> + Send;

    /// Update the title.
    fn update_lesson_title(
        &mut self,
        id: LessonId,
        title: &str,
    ) -> impl Future<Output = Result<Lesson>> + Send;

    /// Set `is_published` on a Lesson.
    fn set_lesson_published(
        &mut self,
        id: LessonId,
        published: bool,
    ) -> impl Future<Output = Result<Lesson>> + Send;

    /// Add duration deltas to a Lesson's own times.
    fn add_lesson_times(
        &mut self,
        id: LessonId,
        read_delta: i32,
        watch_delta: i32,
    ) -> impl Future<Output = Result<Lesson>> + Send;

    /// Delete a Lesson and its content.
    fn delete_lesson(&mut self, id: LessonId) -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Positions
    // ═══════════════════════════════════════════════════════════

    /// Add `delta` to the position of every child of `scope` whose position lies in
    /// `from..=to`. Returns the number of rows shifted.
    fn shift_positions(
        &mut self,
        scope: SiblingScope,
        from: i32,
        to: i32,
        delta: i32,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Write the position of one child.
    fn set_position(
        &mut self,
        sibling: Sibling,
        position: i32,
    ) -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Lesson content
    // ═══════════════════════════════════════════════════════════

    /// Find the Article of a Lesson.
    fn find_article(
        &mut self,
        lesson_id: LessonId,
    ) -> impl Future<Output = Result<Option<LessonArticle>>> + Send;

    /// Insert or replace the Article of a Lesson.
    ///
    /// With `replace == false`, an existing Article is a `Conflict`.
    fn save_article(
        &mut self,
        article: LessonArticle,
        replace: bool,
    ) -> impl Future<Output = Result<LessonArticle>> + Send;

    /// Delete the Article of a Lesson.
    fn delete_article(&mut self, lesson_id: LessonId) -> impl Future<Output = Result<()>> + Send;

    /// Find the Video of a Lesson.
    fn find_video(
        &mut self,
        lesson_id: LessonId,
    ) -> impl Future<Output = Result<Option<LessonVideo>>> + Send;

    /// Insert or replace the Video of a Lesson.
    ///
    /// With `replace == false`, an existing Video is a `Conflict`.
    fn save_video(
        &mut self,
        video: LessonVideo,
        replace: bool,
    ) -> impl Future<Output = Result<LessonVideo>> + Send;

    /// Delete the Video of a Lesson.
    fn delete_video(&mut self, lesson_id: LessonId) -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Language progress
    // ═══════════════════════════════════════════════════════════

    /// Find a user's progress in a language.
    fn find_language_progress(
        &mut self,
        user_id: UserId,
        language_slug: &str,
    ) -> impl Future<Output = Result<Option<LanguageProgress>>> + Send;

    /// Lock a language progress row.
    fn lock_language_progress(
        &mut self,
        id: ProgressId,
    ) -> impl Future<Output = Result<Option<LanguageProgress>>> + Send;

    /// Insert a language progress row. `Conflict` if one exists for (user, language); the
    /// transaction stays usable in that case.
    fn create_language_progress(
        &mut self,
        user_id: UserId,
        language_slug: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<LanguageProgress>> + Send;

    /// Set `viewed_at`.
    fn touch_language_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<LanguageProgress>> + Send;

    /// Add `delta` to `completed_series`.
    fn add_language_completed_series(
        &mut self,
        id: ProgressId,
        delta: i32,
    ) -> impl Future<Output = Result<LanguageProgress>> + Send;

    /// Delete a language progress row and every progress row below it.
    fn delete_language_progress(
        &mut self,
        id: ProgressId,
    ) -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Series progress
    // ═══════════════════════════════════════════════════════════

    /// Find a user's progress in a Series.
    fn find_series_progress(
        &mut self,
        user_id: UserId,
        series_id: SeriesId,
    ) -> impl Future<Output = Result<Option<SeriesProgress>>> + Send;

    /// Lock a series progress row.
    fn lock_series_progress(
        &mut self,
        id: ProgressId,
    ) -> impl Future<Output = Result<Option<SeriesProgress>>> + Send;

    /// Number of progress rows (any user) on a Series.
    fn count_series_progress(
        &mut self,
        series_id: SeriesId,
    ) -> impl Future<Output = Result<i64>> + Send;

    /// Insert a series progress row. `Conflict` if one exists for (user, series); the
    /// transaction stays usable in that case.
    fn create_series_progress(
        &mut self,
        progress: NewSeriesProgress,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<SeriesProgress>> + Send;

    /// Set `viewed_at`.
    fn touch_series_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<SeriesProgress>> + Send;

    /// Add `delta` to the counters. When `delta.sections > 0` and `completed_sections`
    /// reaches the Series' `sections_count`, `completed_at` is set to `now`.
    fn increment_series_progress(
        &mut self,
        id: ProgressId,
        delta: CompletionDelta,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<SeriesProgress>> + Send;

    /// Subtract `delta` from the counters. When `delta.sections > 0`, `completed_at` is
    /// cleared.
    fn decrement_series_progress(
        &mut self,
        id: ProgressId,
        delta: CompletionDelta,
    ) -> impl Future<Output = Result<SeriesProgress>> + Send;

    /// Delete a series progress row and every progress row below it.
    fn delete_series_progress(&mut self, id: ProgressId)
    -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Section progress
    // ═══════════════════════════════════════════════════════════

    /// Find a user's progress in a Section.
    fn find_section_progress(
        &mut self,
        user_id: UserId,
        section_id: SectionId,
    ) -> impl Future<Output = Result<Option<SectionProgress>>> + Send;

    /// Lock a section progress row.
    fn lock_section_progress(
        &mut self,
        id: ProgressId,
    ) -> impl Future<Output = Result<Option<SectionProgress>>> + Send;

    /// Number of progress rows (any user) on a Section.
    fn count_section_progress(
        &mut self,
        section_id: SectionId,
    ) -> impl Future<Output = Result<i64>> + Send;

    /// Insert a section progress row. `Conflict` if one exists for (user, section); the
    /// transaction stays usable in that case.
    fn create_section_progress(
        &mut self,
        progress: NewSectionProgress,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<SectionProgress>> + Send;

    /// Set `viewed_at`.
    fn touch_section_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<SectionProgress>> + Send;

    /// Add one completed Lesson. When `completed_lessons` reaches the Section's
    /// `lessons_count`, `completed_at` is set to `now`.
    fn increment_section_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<SectionProgress>> + Send;

    /// Remove one completed Lesson and clear `completed_at`.
    fn decrement_section_progress(
        &mut self,
        id: ProgressId,
    ) -> impl Future<Output = Result<SectionProgress>> + Send;

    /// Delete a section progress row and its lesson progress rows.
    fn delete_section_progress(
        &mut self,
        id: ProgressId,
    ) -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Lesson progress
    // ═══════════════════════════════════════════════════════════

    /// Find a user's progress in a Lesson.
    fn find_lesson_progress(
        &mut self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> impl Future<Output = Result<Option<LessonProgress>>> + Send;

    /// Lock a lesson progress row.
    fn lock_lesson_progress(
        &mut self,
        id: ProgressId,
    ) -> impl Future<Output = Result<Option<LessonProgress>>> + Send;

    /// Number of progress rows (any user) on a Lesson.
    fn count_lesson_progress(
        &mut self,
        lesson_id: LessonId,
    ) -> impl Future<Output = Result<i64>> + Send;

    /// Insert a lesson progress row. `Conflict` if one exists for (user, lesson); the
    /// transaction stays usable in that case.
    fn create_lesson_progress(
        &mut self,
        progress: NewLessonProgress,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<LessonProgress>> + Send;

    /// Set `viewed_at`.
    fn touch_lesson_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<LessonProgress>> + Send;

    /// Set `completed_at`.
    fn complete_lesson_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<LessonProgress>> + Send;

    /// Delete a lesson progress row.
    fn delete_lesson_progress(&mut self, id: ProgressId)
    -> impl Future<Output = Result<()>> + Send;

    // ═══════════════════════════════════════════════════════════
    // Certificates
    // ═══════════════════════════════════════════════════════════

    /// Find the certificate of (user, series).
    fn find_certificate_for(
        &mut self,
        user_id: UserId,
        series_id: SeriesId,
    ) -> impl Future<Output = Result<Option<Certificate>>> + Send;

    /// Find a certificate by id.
    fn find_certificate(
        &mut self,
        id: CertificateId,
    ) -> impl Future<Output = Result<Option<Certificate>>> + Send;

    /// Insert a certificate. `Conflict` if (user, series) already has one; the transaction
    /// stays usable in that case.
    fn create_certificate(
        &mut self,
        certificate: NewCertificate,
    ) -> impl Future<Output = Result<Certificate>> + Send;

    /// A user's certificates, most recently completed first.
    fn list_certificates(
        &mut self,
        user_id: UserId,
        offset: i64,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<Certificate>>> + Send;

    /// Number of certificates a user holds.
    fn count_certificates(&mut self, user_id: UserId) -> impl Future<Output = Result<i64>> + Send;
}
