//! Content service: ordered, rolled-up edits of the course tree.
//!
//! Each public method runs in its own transaction. Mutations lock the Series first, then
//! the Section, then the Lesson, so two edits under the same parent serialize. Position
//! changes go through [`crate::positions`] and aggregate changes through
//! [`crate::rollup`].

use crate::paths::{LessonPath, SectionPath, SeriesPath};
use crate::positions::{append_position, apply_move, close_gap, plan_move};
use crate::rollup::{
    DriftReport, apply_duration_change, propagate_from_lesson, propagate_from_section,
    reconcile_series,
};
use crate::finish;
use kiwiscript_core::content::{
    Aggregates, Language, Lesson, LessonArticle, LessonVideo, NewLanguage, NewLesson,
    NewSection, NewSeries, Section, Series, Sibling, SiblingScope,
};
use kiwiscript_core::policy::Actor;
use kiwiscript_core::reading_time::read_time_seconds;
use kiwiscript_core::store::{CourseStore, CourseTransaction};
use kiwiscript_core::{CourseError, Result, SeriesId};
use tracing::info;

/// Fields of a new Series.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateSeries {
    /// URL slug, unique within the language
    pub slug: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
}

/// Fields of a new Section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateSection {
    /// Title
    pub title: String,
    /// Description
    pub description: String,
}

/// Section update. `position == 0` (or the current position) leaves the order unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateSection {
    /// New title
    pub title: String,
    /// New description
    pub description: String,
    /// Target position, `1..=N`, or 0
    pub position: i32,
}

/// Lesson update. `position == 0` (or the current position) leaves the order unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateLesson {
    /// New title
    pub title: String,
    /// Target position, `1..=N`, or 0
    pub position: i32,
}

/// Content operations on the course tree.
#[derive(Clone, Debug)]
pub struct ContentService<S> {
    store: S,
}

impl<S: CourseStore> ContentService<S> {
    /// Create a service over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    // ═══════════════════════════════════════════════════════════
    // Languages and Series
    // ═══════════════════════════════════════════════════════════

    /// Create a language. Staff only.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-staff, `Conflict` if the slug exists.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn create_language(&self, actor: Actor, slug: &str, name: &str) -> Result<Language> {
        if !actor.is_staff {
            return Err(CourseError::Forbidden);
        }
        let mut tx = self.store.begin().await?;
        let result = tx
            .create_language(NewLanguage {
                slug: slug.to_string(),
                name: name.to_string(),
                author_id: actor.user_id,
            })
            .await;
        finish(tx, result).await
    }

    /// Create an unpublished Series authored by `actor`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the language does not exist, `Conflict` if the slug is taken.
    #[tracing::instrument(skip(self, input), fields(user_id = %actor.user_id, slug = %input.slug))]
    pub async fn create_series(
        &self,
        actor: Actor,
        language_slug: &str,
        input: CreateSeries,
    ) -> Result<Series> {
        let mut tx = self.store.begin().await?;
        let result = create_series_in(&mut tx, actor, language_slug, input).await;
        finish(tx, result).await
    }

    /// Publish or unpublish a Series. Toggling to the current state returns it unchanged.
    ///
    /// # Errors
    ///
    /// `Validation` when publishing a Series without published Sections.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id, series = %path))]
    pub async fn toggle_series_published(
        &self,
        actor: Actor,
        path: &SeriesPath,
        publish: bool,
    ) -> Result<Series> {
        let mut tx = self.store.begin().await?;
        let result = toggle_series_in(&mut tx, actor, path, publish).await;
        finish(tx, result).await
    }

    // ═══════════════════════════════════════════════════════════
    // Sections
    // ═══════════════════════════════════════════════════════════

    /// Append a new unpublished Section to a Series.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown Series, `Forbidden` for non-owners.
    #[tracing::instrument(skip(self, input), fields(user_id = %actor.user_id, series = %path))]
    pub async fn create_section(
        &self,
        actor: Actor,
        path: &SeriesPath,
        input: CreateSection,
    ) -> Result<Section> {
        let mut tx = self.store.begin().await?;
        let result = create_section_in(&mut tx, actor, path, input).await;
        finish(tx, result).await
    }

    /// Update a Section's details and optionally move it.
    ///
    /// # Errors
    ///
    /// `Validation` if the target position is out of range.
    #[tracing::instrument(skip(self, input), fields(user_id = %actor.user_id, section = %path, position = input.position))]
    pub async fn update_section(
        &self,
        actor: Actor,
        path: &SectionPath,
        input: UpdateSection,
    ) -> Result<Section> {
        let mut tx = self.store.begin().await?;
        let result = update_section_in(&mut tx, actor, path, input).await;
        finish(tx, result).await
    }

    /// Publish or unpublish a Section, rolling its counters into or out of the Series.
    ///
    /// # Errors
    ///
    /// `Validation` when publishing a Section without published Lessons, `Conflict` when
    /// unpublishing a Section while it or its Series has students.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id, section = %path))]
    pub async fn toggle_section_published(
        &self,
        actor: Actor,
        path: &SectionPath,
        publish: bool,
    ) -> Result<Section> {
        let mut tx = self.store.begin().await?;
        let result = toggle_section_in(&mut tx, actor, path, publish).await;
        finish(tx, result).await
    }

    /// Delete a Section and its Lessons, closing the position gap.
    ///
    /// # Errors
    ///
    /// `Conflict` if the Section is published and it or its Series has students.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id, section = %path))]
    pub async fn delete_section(&self, actor: Actor, path: &SectionPath) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let result = delete_section_in(&mut tx, actor, path).await;
        finish(tx, result).await
    }

    // ═══════════════════════════════════════════════════════════
    // Lessons
    // ═══════════════════════════════════════════════════════════

    /// Append a new unpublished Lesson to a Section.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown Section, `Forbidden` for non-owners.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id, section = %path))]
    pub async fn create_lesson(
        &self,
        actor: Actor,
        path: &SectionPath,
        title: &str,
    ) -> Result<Lesson> {
        let mut tx = self.store.begin().await?;
        let result = create_lesson_in(&mut tx, actor, path, title).await;
        finish(tx, result).await
    }

    /// Update a Lesson's title and optionally move it.
    ///
    /// # Errors
    ///
    /// `Validation` if the target position is out of range.
    #[tracing::instrument(skip(self, input), fields(user_id = %actor.user_id, lesson = %path, position = input.position))]
    pub async fn update_lesson(
        &self,
        actor: Actor,
        path: &LessonPath,
        input: UpdateLesson,
    ) -> Result<Lesson> {
        let mut tx = self.store.begin().await?;
        let result = update_lesson_in(&mut tx, actor, path, input).await;
        finish(tx, result).await
    }

    /// Publish or unpublish a Lesson, rolling its times into or out of the Section (and the
    /// Series when the Section is published).
    ///
    /// # Errors
    ///
    /// `Validation` when publishing a Lesson without content, `Conflict` when unpublishing
    /// a Lesson while it or its Section has students. Taking the last Lesson out of a
    /// published Section also conflicts while the Series has students.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id, lesson = %path))]
    pub async fn toggle_lesson_published(
        &self,
        actor: Actor,
        path: &LessonPath,
        publish: bool,
    ) -> Result<Lesson> {
        let mut tx = self.store.begin().await?;
        let result = toggle_lesson_in(&mut tx, actor, path, publish).await;
        finish(tx, result).await
    }

    /// Delete a Lesson, closing the position gap.
    ///
    /// # Errors
    ///
    /// `Conflict` if the Lesson has students, or if it is published and the same checks as
    /// unpublishing it fail.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id, lesson = %path))]
    pub async fn delete_lesson(&self, actor: Actor, path: &LessonPath) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let result = delete_lesson_in(&mut tx, actor, path).await;
        finish(tx, result).await
    }

    // ═══════════════════════════════════════════════════════════
    // Lesson content
    // ═══════════════════════════════════════════════════════════

    /// Attach an Article to a Lesson.
    ///
    /// # Errors
    ///
    /// `Conflict` if the Lesson already has one.
    #[tracing::instrument(skip(self, content), fields(user_id = %actor.user_id, lesson = %path))]
    pub async fn create_article(
        &self,
        actor: Actor,
        path: &LessonPath,
        content: &str,
    ) -> Result<(Lesson, LessonArticle)> {
        let mut tx = self.store.begin().await?;
        let result = save_article_in(&mut tx, actor, path, content, false).await;
        finish(tx, result).await
    }

    /// Replace the text of a Lesson's Article.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Lesson has no Article.
    #[tracing::instrument(skip(self, content), fields(user_id = %actor.user_id, lesson = %path))]
    pub async fn update_article(
        &self,
        actor: Actor,
        path: &LessonPath,
        content: &str,
    ) -> Result<(Lesson, LessonArticle)> {
        let mut tx = self.store.begin().await?;
        let result = save_article_in(&mut tx, actor, path, content, true).await;
        finish(tx, result).await
    }

    /// Remove a Lesson's Article, zeroing its read time.
    ///
    /// # Errors
    ///
    /// `Validation` if the Lesson is published.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id, lesson = %path))]
    pub async fn delete_article(&self, actor: Actor, path: &LessonPath) -> Result<Lesson> {
        let mut tx = self.store.begin().await?;
        let result = delete_content_in(&mut tx, actor, path, ContentKind::Article).await;
        finish(tx, result).await
    }

    /// Attach a Video to a Lesson.
    ///
    /// # Errors
    ///
    /// `Conflict` if the Lesson already has one, `Validation` for a non-positive duration.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id, lesson = %path))]
    pub async fn create_video(
        &self,
        actor: Actor,
        path: &LessonPath,
        url: &str,
        watch_time_seconds: i32,
    ) -> Result<(Lesson, LessonVideo)> {
        let mut tx = self.store.begin().await?;
        let video = VideoInput {
            url,
            watch_time_seconds,
        };
        let result = save_video_in(&mut tx, actor, path, video, false).await;
        finish(tx, result).await
    }

    /// Replace a Lesson's Video.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Lesson has no Video, `Validation` for a non-positive duration.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id, lesson = %path))]
    pub async fn update_video(
        &self,
        actor: Actor,
        path: &LessonPath,
        url: &str,
        watch_time_seconds: i32,
    ) -> Result<(Lesson, LessonVideo)> {
        let mut tx = self.store.begin().await?;
        let video = VideoInput {
            url,
            watch_time_seconds,
        };
        let result = save_video_in(&mut tx, actor, path, video, true).await;
        finish(tx, result).await
    }

    /// Remove a Lesson's Video, zeroing its watch time.
    ///
    /// # Errors
    ///
    /// `Validation` if the Lesson is published.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id, lesson = %path))]
    pub async fn delete_video(&self, actor: Actor, path: &LessonPath) -> Result<Lesson> {
        let mut tx = self.store.begin().await?;
        let result = delete_content_in(&mut tx, actor, path, ContentKind::Video).await;
        finish(tx, result).await
    }

    // ═══════════════════════════════════════════════════════════
    // Reconciliation
    // ═══════════════════════════════════════════════════════════

    /// Recompute one Series' aggregates, repairing drift.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Series does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_series(&self, series_id: SeriesId) -> Result<DriftReport> {
        let mut tx = self.store.begin().await?;
        let result = reconcile_series(&mut tx, series_id).await;
        finish(tx, result).await
    }

    /// Reconcile every Series, each in its own transaction.
    ///
    /// # Errors
    ///
    /// Stops at the first failing Series.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<Vec<DriftReport>> {
        let mut tx = self.store.begin().await?;
        let ids = tx.list_series_ids().await;
        let ids = finish(tx, ids).await?;

        let mut reports = Vec::with_capacity(ids.len());
        for series_id in ids {
            reports.push(self.reconcile_series(series_id).await?);
        }
        info!(
            series = reports.len(),
            drifted = reports.iter().filter(|r| !r.is_clean()).count(),
            "Reconciliation finished"
        );
        Ok(reports)
    }
}

// ============================================================================
// Locking helpers
// ============================================================================

/// Find a Series by slugs, check ownership and lock it.
async fn lock_owned_series<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &SeriesPath,
) -> Result<Series> {
    let series = tx
        .find_series(&path.language_slug, &path.series_slug)
        .await?
        .ok_or(CourseError::NotFound)?;
    actor.ensure_can_edit(series.author_id)?;
    tx.lock_series(series.id).await?.ok_or(CourseError::NotFound)
}

/// Lock the Series then the Section.
async fn lock_owned_section<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &SectionPath,
) -> Result<(Series, Section)> {
    let series = lock_owned_series(tx, actor, &path.series).await?;
    let section = tx
        .lock_section(path.section_id)
        .await?
        .filter(|section| section.series_id == series.id)
        .ok_or(CourseError::NotFound)?;
    Ok((series, section))
}

/// Lock the Series, the Section, then the Lesson.
async fn lock_owned_lesson<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &LessonPath,
) -> Result<(Section, Lesson)> {
    let (_, section) = lock_owned_section(tx, actor, &path.section).await?;
    let lesson = tx
        .lock_lesson(path.lesson_id)
        .await?
        .filter(|lesson| lesson.section_id == section.id)
        .ok_or(CourseError::NotFound)?;
    Ok((section, lesson))
}

// ============================================================================
// Student guards
// ============================================================================
//
// Completion is decided when a counter moves, so a parent's published count may only
// shrink while nobody holds progress on the parent.

/// A published Lesson is leaving `section`.
async fn ensure_lessons_can_shrink<T: CourseTransaction>(
    tx: &mut T,
    section: &Section,
) -> Result<()> {
    if tx.count_section_progress(section.id).await? > 0 {
        return Err(CourseError::conflict("Section has students"));
    }
    // The last published Lesson of a published Section takes the Section out of reach.
    if section.is_published && section.lessons_count <= 1 {
        ensure_sections_can_shrink(tx, section.series_id).await?;
    }
    Ok(())
}

/// A published Section is leaving the Series.
async fn ensure_sections_can_shrink<T: CourseTransaction>(
    tx: &mut T,
    series_id: SeriesId,
) -> Result<()> {
    if tx.count_series_progress(series_id).await? > 0 {
        return Err(CourseError::conflict("Series has students"));
    }
    Ok(())
}

// ============================================================================
// Languages and Series
// ============================================================================

async fn create_series_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    language_slug: &str,
    input: CreateSeries,
) -> Result<Series> {
    let language = tx
        .find_language(language_slug)
        .await?
        .ok_or(CourseError::NotFound)?;
    let series = tx
        .create_series(NewSeries {
            language_slug: language.slug,
            slug: input.slug,
            title: input.title,
            description: input.description,
            author_id: actor.user_id,
        })
        .await?;
    info!(series_id = %series.id, "Series created");
    Ok(series)
}

async fn toggle_series_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &SeriesPath,
    publish: bool,
) -> Result<Series> {
    let series = lock_owned_series(tx, actor, path).await?;
    if series.is_published == publish {
        return Ok(series);
    }
    if publish && series.sections_count == 0 {
        return Err(CourseError::validation(
            "Cannot publish series without sections",
        ));
    }
    let series = tx.set_series_published(series.id, publish).await?;
    info!(series_id = %series.id, publish, "Series publication changed");
    Ok(series)
}

// ============================================================================
// Sections
// ============================================================================

async fn create_section_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &SeriesPath,
    input: CreateSection,
) -> Result<Section> {
    let series = lock_owned_series(tx, actor, path).await?;
    let count = tx.count_sections(series.id).await?;
    let section = tx
        .create_section(NewSection {
            series_id: series.id,
            title: input.title,
            description: input.description,
            position: append_position(count),
        })
        .await?;
    info!(section_id = %section.id, position = section.position, "Section created");
    Ok(section)
}

async fn update_section_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &SectionPath,
    input: UpdateSection,
) -> Result<Section> {
    let (series, section) = lock_owned_section(tx, actor, path).await?;
    let count = tx.count_sections(series.id).await?;
    let plan = plan_move(section.position, input.position, count)?;
    apply_move(
        tx,
        SiblingScope::Series(series.id),
        Sibling::Section(section.id),
        plan,
    )
    .await?;
    tx.update_section_details(section.id, &input.title, &input.description)
        .await
}

async fn toggle_section_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &SectionPath,
    publish: bool,
) -> Result<Section> {
    let (series, section) = lock_owned_section(tx, actor, path).await?;
    if section.is_published == publish {
        return Ok(section);
    }
    if publish && section.lessons_count == 0 {
        return Err(CourseError::validation(
            "Cannot publish section without lessons",
        ));
    }
    if !publish {
        if tx.count_section_progress(section.id).await? > 0 {
            return Err(CourseError::conflict("Section has students"));
        }
        ensure_sections_can_shrink(tx, series.id).await?;
    }

    let updated = tx.set_section_published(section.id, publish).await?;
    propagate_from_section(tx, series.id, Aggregates::of_section(&section).signed(publish))
        .await?;
    info!(section_id = %section.id, publish, "Section publication changed");
    Ok(updated)
}

async fn delete_section_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &SectionPath,
) -> Result<()> {
    let (series, section) = lock_owned_section(tx, actor, path).await?;
    if section.is_published {
        if tx.count_section_progress(section.id).await? > 0 {
            return Err(CourseError::conflict("Section has students"));
        }
        ensure_sections_can_shrink(tx, series.id).await?;
        propagate_from_section(tx, series.id, -Aggregates::of_section(&section)).await?;
    }

    let count = tx.count_sections(series.id).await?;
    tx.delete_section(section.id).await?;
    close_gap(tx, SiblingScope::Series(series.id), section.position, count).await?;
    info!(section_id = %section.id, "Section deleted");
    Ok(())
}

// ============================================================================
// Lessons
// ============================================================================

async fn create_lesson_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &SectionPath,
    title: &str,
) -> Result<Lesson> {
    let (series, section) = lock_owned_section(tx, actor, path).await?;
    let count = tx.count_lessons(section.id).await?;
    let lesson = tx
        .create_lesson(NewLesson {
            section_id: section.id,
            series_id: series.id,
            title: title.to_string(),
            position: append_position(count),
        })
        .await?;
    info!(lesson_id = %lesson.id, position = lesson.position, "Lesson created");
    Ok(lesson)
}

async fn update_lesson_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &LessonPath,
    input: UpdateLesson,
) -> Result<Lesson> {
    let (section, lesson) = lock_owned_lesson(tx, actor, path).await?;
    let count = tx.count_lessons(section.id).await?;
    let plan = plan_move(lesson.position, input.position, count)?;
    apply_move(
        tx,
        SiblingScope::Section(section.id),
        Sibling::Lesson(lesson.id),
        plan,
    )
    .await?;
    tx.update_lesson_title(lesson.id, &input.title).await
}

async fn toggle_lesson_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &LessonPath,
    publish: bool,
) -> Result<Lesson> {
    let (section, lesson) = lock_owned_lesson(tx, actor, path).await?;
    if lesson.is_published == publish {
        return Ok(lesson);
    }
    if publish && lesson.read_time_seconds == 0 && lesson.watch_time_seconds == 0 {
        return Err(CourseError::validation(
            "Cannot publish lesson without content",
        ));
    }
    if !publish {
        if tx.count_lesson_progress(lesson.id).await? > 0 {
            return Err(CourseError::conflict("Lesson has students"));
        }
        ensure_lessons_can_shrink(tx, &section).await?;
    }

    let updated = tx.set_lesson_published(lesson.id, publish).await?;
    propagate_from_lesson(tx, &section, Aggregates::of_lesson(&lesson).signed(publish)).await?;
    info!(lesson_id = %lesson.id, publish, "Lesson publication changed");
    Ok(updated)
}

async fn delete_lesson_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &LessonPath,
) -> Result<()> {
    let (section, lesson) = lock_owned_lesson(tx, actor, path).await?;
    if tx.count_lesson_progress(lesson.id).await? > 0 {
        return Err(CourseError::conflict("Lesson has students"));
    }
    if lesson.is_published {
        ensure_lessons_can_shrink(tx, &section).await?;
        propagate_from_lesson(tx, &section, -Aggregates::of_lesson(&lesson)).await?;
    }

    let count = tx.count_lessons(section.id).await?;
    tx.delete_lesson(lesson.id).await?;
    close_gap(tx, SiblingScope::Section(section.id), lesson.position, count).await?;
    info!(lesson_id = %lesson.id, "Lesson deleted");
    Ok(())
}

// ============================================================================
// Lesson content
// ============================================================================

#[derive(Clone, Copy, Debug)]
enum ContentKind {
    Article,
    Video,
}

struct VideoInput<'a> {
    url: &'a str,
    watch_time_seconds: i32,
}

async fn save_article_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &LessonPath,
    content: &str,
    replace: bool,
) -> Result<(Lesson, LessonArticle)> {
    let (section, lesson) = lock_owned_lesson(tx, actor, path).await?;
    let existing = tx.find_article(lesson.id).await?;
    match (&existing, replace) {
        (Some(_), false) => return Err(CourseError::conflict("Lesson already has an article")),
        (None, true) => return Err(CourseError::NotFound),
        _ => {}
    }

    let read_time = read_time_seconds(content);
    let article = tx
        .save_article(
            LessonArticle {
                lesson_id: lesson.id,
                content: content.to_string(),
                read_time_seconds: read_time,
            },
            replace,
        )
        .await?;
    let lesson =
        apply_duration_change(tx, &section, &lesson, read_time - lesson.read_time_seconds, 0)
            .await?;
    info!(lesson_id = %lesson.id, read_time, "Article saved");
    Ok((lesson, article))
}

async fn save_video_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &LessonPath,
    input: VideoInput<'_>,
    replace: bool,
) -> Result<(Lesson, LessonVideo)> {
    if input.watch_time_seconds <= 0 {
        return Err(CourseError::validation("Watch time must be positive"));
    }
    let (section, lesson) = lock_owned_lesson(tx, actor, path).await?;
    let existing = tx.find_video(lesson.id).await?;
    match (&existing, replace) {
        (Some(_), false) => return Err(CourseError::conflict("Lesson already has a video")),
        (None, true) => return Err(CourseError::NotFound),
        _ => {}
    }

    let video = tx
        .save_video(
            LessonVideo {
                lesson_id: lesson.id,
                url: input.url.to_string(),
                watch_time_seconds: input.watch_time_seconds,
            },
            replace,
        )
        .await?;
    let lesson = apply_duration_change(
        tx,
        &section,
        &lesson,
        0,
        input.watch_time_seconds - lesson.watch_time_seconds,
    )
    .await?;
    info!(lesson_id = %lesson.id, watch_time = input.watch_time_seconds, "Video saved");
    Ok((lesson, video))
}

async fn delete_content_in<T: CourseTransaction>(
    tx: &mut T,
    actor: Actor,
    path: &LessonPath,
    kind: ContentKind,
) -> Result<Lesson> {
    let (section, lesson) = lock_owned_lesson(tx, actor, path).await?;
    if lesson.is_published {
        return Err(CourseError::validation(match kind {
            ContentKind::Article => "Cannot delete the article of a published lesson",
            ContentKind::Video => "Cannot delete the video of a published lesson",
        }));
    }

    let (read_delta, watch_delta) = match kind {
        ContentKind::Article => {
            tx.delete_article(lesson.id).await?;
            (-lesson.read_time_seconds, 0)
        }
        ContentKind::Video => {
            tx.delete_video(lesson.id).await?;
            (0, -lesson.watch_time_seconds)
        }
    };
    let lesson = apply_duration_change(tx, &section, &lesson, read_delta, watch_delta).await?;
    info!(lesson_id = %lesson.id, ?kind, "Lesson content deleted");
    Ok(lesson)
}
