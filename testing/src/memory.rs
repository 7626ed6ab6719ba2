//! In-memory course store for fast, deterministic testing.
//!
//! [`InMemoryCourseStore`] implements [`CourseStore`] with copy-on-begin transactions:
//! `begin` takes an exclusive lock on the tables and works on a private copy that `commit`
//! writes back. Transactions therefore serialize completely, which is the strongest form of
//! the row locking the Postgres store relies on, and a dropped or rolled back transaction
//! leaves no trace.

use chrono::{DateTime, Utc};
use kiwiscript_core::certificate::{Certificate, NewCertificate};
use kiwiscript_core::content::{
    Aggregates, Language, Lesson, LessonArticle, LessonVideo, NewLanguage, NewLesson,
    NewSection, NewSeries, Section, Series, Sibling, SiblingScope,
};
use kiwiscript_core::progress::{
    CompletionDelta, LanguageProgress, LessonProgress, NewLessonProgress, NewSectionProgress,
    NewSeriesProgress, SectionProgress, SeriesProgress,
};
use kiwiscript_core::store::{CourseStore, CourseTransaction};
use kiwiscript_core::{
    CertificateId, CourseError, LessonId, ProgressId, Result, SectionId, SeriesId, UserId,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
struct Tables {
    next_id: i32,
    fail_on: Option<&'static str>,
    languages: BTreeMap<String, Language>,
    series: BTreeMap<SeriesId, Series>,
    sections: BTreeMap<SectionId, Section>,
    lessons: BTreeMap<LessonId, Lesson>,
    articles: BTreeMap<LessonId, LessonArticle>,
    videos: BTreeMap<LessonId, LessonVideo>,
    language_progress: BTreeMap<ProgressId, LanguageProgress>,
    series_progress: BTreeMap<ProgressId, SeriesProgress>,
    section_progress: BTreeMap<ProgressId, SectionProgress>,
    lesson_progress: BTreeMap<ProgressId, LessonProgress>,
    certificates: Vec<Certificate>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        match self.fail_on {
            Some(failing) if failing == operation => Err(CourseError::Unknown(format!(
                "injected failure in {operation}"
            ))),
            _ => Ok(()),
        }
    }

    fn series_mut(&mut self, id: SeriesId) -> Result<&mut Series> {
        self.series.get_mut(&id).ok_or(CourseError::NotFound)
    }

    fn section_mut(&mut self, id: SectionId) -> Result<&mut Section> {
        self.sections.get_mut(&id).ok_or(CourseError::NotFound)
    }

    fn lesson_mut(&mut self, id: LessonId) -> Result<&mut Lesson> {
        self.lessons.get_mut(&id).ok_or(CourseError::NotFound)
    }

    fn remove_lesson_rows(&mut self, lesson_ids: &[LessonId]) {
        for id in lesson_ids {
            self.lessons.remove(id);
            self.articles.remove(id);
            self.videos.remove(id);
        }
        self.lesson_progress
            .retain(|_, p| !lesson_ids.contains(&p.lesson_id));
    }

    fn remove_series_progress_rows(&mut self, ids: &[ProgressId]) {
        self.series_progress.retain(|id, _| !ids.contains(id));
        self.section_progress
            .retain(|_, p| !ids.contains(&p.series_progress_id));
        self.lesson_progress
            .retain(|_, p| !ids.contains(&p.series_progress_id));
    }
}

/// In-memory [`CourseStore`].
///
/// Cloning is cheap and every clone shares the same tables.
///
/// # Example
///
/// ```
/// use kiwiscript_testing::InMemoryCourseStore;
/// use kiwiscript_core::content::NewLanguage;
/// use kiwiscript_core::store::{CourseStore, CourseTransaction};
/// use kiwiscript_core::UserId;
///
/// # async fn example() -> kiwiscript_core::Result<()> {
/// let store = InMemoryCourseStore::new();
/// let mut tx = store.begin().await?;
/// tx.create_language(NewLanguage {
///     slug: "rust".to_string(),
///     name: "Rust".to_string(),
///     author_id: UserId::new(1),
/// })
/// .await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryCourseStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryCourseStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of the named store operation fail with
    /// [`CourseError::Unknown`] until [`InMemoryCourseStore::clear_failure`] is called.
    ///
    /// Used to verify that a failing step rolls back the whole transaction.
    pub async fn fail_on(&self, operation: &'static str) {
        self.tables.lock().await.fail_on = Some(operation);
    }

    /// Remove an injected failure.
    pub async fn clear_failure(&self) {
        self.tables.lock().await.fail_on = None;
    }
}

impl CourseStore for InMemoryCourseStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }
}

/// Transaction over an [`InMemoryCourseStore`].
///
/// Holds the store's lock for its whole lifetime.
#[derive(Debug)]
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl CourseTransaction for InMemoryTransaction {
    async fn commit(self) -> Result<()> {
        let Self { mut guard, working } = self;
        working.check("commit")?;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Languages and Series
    // ═══════════════════════════════════════════════════════════

    async fn find_language(&mut self, slug: &str) -> Result<Option<Language>> {
        self.working.check("find_language")?;
        Ok(self.working.languages.get(slug).cloned())
    }

    async fn create_language(&mut self, language: NewLanguage) -> Result<Language> {
        let t = &mut self.working;
        t.check("create_language")?;
        if t.languages.contains_key(&language.slug) {
            return Err(CourseError::conflict("Language already exists"));
        }
        let row = Language {
            slug: language.slug,
            name: language.name,
            author_id: language.author_id,
            created_at: Utc::now(),
        };
        t.languages.insert(row.slug.clone(), row.clone());
        Ok(row)
    }

    async fn find_series(
        &mut self,
        language_slug: &str,
        series_slug: &str,
    ) -> Result<Option<Series>> {
        self.working.check("find_series")?;
        Ok(self
            .working
            .series
            .values()
            .find(|s| s.language_slug == language_slug && s.slug == series_slug)
            .cloned())
    }

    async fn lock_series(&mut self, id: SeriesId) -> Result<Option<Series>> {
        self.working.check("lock_series")?;
        Ok(self.working.series.get(&id).cloned())
    }

    async fn share_series(&mut self, id: SeriesId) -> Result<Option<Series>> {
        self.working.check("share_series")?;
        Ok(self.working.series.get(&id).cloned())
    }

    async fn list_series_ids(&mut self) -> Result<Vec<SeriesId>> {
        self.working.check("list_series_ids")?;
        Ok(self.working.series.keys().copied().collect())
    }

    async fn create_series(&mut self, series: NewSeries) -> Result<Series> {
        let t = &mut self.working;
        t.check("create_series")?;
        if !t.languages.contains_key(&series.language_slug) {
            return Err(CourseError::NotFound);
        }
        if t
            .series
            .values()
            .any(|s| s.language_slug == series.language_slug && s.slug == series.slug)
        {
            return Err(CourseError::conflict("Series already exists"));
        }
        let row = Series {
            id: SeriesId::new(t.next_id()),
            language_slug: series.language_slug,
            slug: series.slug,
            title: series.title,
            description: series.description,
            author_id: series.author_id,
            sections_count: 0,
            lessons_count: 0,
            read_time_seconds: 0,
            watch_time_seconds: 0,
            is_published: false,
            created_at: Utc::now(),
        };
        t.series.insert(row.id, row.clone());
        Ok(row)
    }

    async fn set_series_published(&mut self, id: SeriesId, published: bool) -> Result<Series> {
        self.working.check("set_series_published")?;
        let series = self.working.series_mut(id)?;
        series.is_published = published;
        Ok(series.clone())
    }

    async fn apply_series_aggregates(&mut self, id: SeriesId, delta: Aggregates) -> Result<Series> {
        self.working.check("apply_series_aggregates")?;
        let series = self.working.series_mut(id)?;
        series.sections_count += delta.sections;
        series.lessons_count += delta.lessons;
        series.read_time_seconds += delta.read_time_seconds;
        series.watch_time_seconds += delta.watch_time_seconds;
        Ok(series.clone())
    }

    async fn set_series_aggregates(
        &mut self,
        id: SeriesId,
        aggregates: Aggregates,
    ) -> Result<Series> {
        self.working.check("set_series_aggregates")?;
        let series = self.working.series_mut(id)?;
        series.sections_count = aggregates.sections;
        series.lessons_count = aggregates.lessons;
        series.read_time_seconds = aggregates.read_time_seconds;
        series.watch_time_seconds = aggregates.watch_time_seconds;
        Ok(series.clone())
    }

    // ═══════════════════════════════════════════════════════════
    // Sections
    // ═══════════════════════════════════════════════════════════

    async fn find_section(
        &mut self,
        series_id: SeriesId,
        id: SectionId,
    ) -> Result<Option<Section>> {
        self.working.check("find_section")?;
        Ok(self
            .working
            .sections
            .get(&id)
            .filter(|s| s.series_id == series_id)
            .cloned())
    }

    async fn lock_section(&mut self, id: SectionId) -> Result<Option<Section>> {
        self.working.check("lock_section")?;
        Ok(self.working.sections.get(&id).cloned())
    }

    async fn share_section(&mut self, id: SectionId) -> Result<Option<Section>> {
        self.working.check("share_section")?;
        Ok(self.working.sections.get(&id).cloned())
    }

    async fn list_sections(&mut self, series_id: SeriesId) -> Result<Vec<Section>> {
        self.working.check("list_sections")?;
        let mut sections: Vec<Section> = self
            .working
            .sections
            .values()
            .filter(|s| s.series_id == series_id)
            .cloned()
            .collect();
        sections.sort_by_key(|s| (s.position, s.id));
        Ok(sections)
    }

    async fn count_sections(&mut self, series_id: SeriesId) -> Result<i32> {
        self.working.check("count_sections")?;
        let count = self
            .working
            .sections
            .values()
            .filter(|s| s.series_id == series_id)
            .count();
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    async fn create_section(&mut self, section: NewSection) -> Result<Section> {
        let t = &mut self.working;
        t.check("create_section")?;
        if !t.series.contains_key(&section.series_id) {
            return Err(CourseError::NotFound);
        }
        let row = Section {
            id: SectionId::new(t.next_id()),
            series_id: section.series_id,
            title: section.title,
            description: section.description,
            position: section.position,
            lessons_count: 0,
            read_time_seconds: 0,
            watch_time_seconds: 0,
            is_published: false,
            created_at: Utc::now(),
        };
        t.sections.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_section_details(
        &mut self,
        id: SectionId,
        title: &str,
        description: &str,
    ) -> Result<Section> {
        self.working.check("update_section_details")?;
        let section = self.working.section_mut(id)?;
        title.clone_into(&mut section.title);
        description.clone_into(&mut section.description);
        Ok(section.clone())
    }

    async fn set_section_published(&mut self, id: SectionId, published: bool) -> Result<Section> {
        self.working.check("set_section_published")?;
        let section = self.working.section_mut(id)?;
        section.is_published = published;
        Ok(section.clone())
    }

    async fn apply_section_aggregates(
        &mut self,
        id: SectionId,
        delta: Aggregates,
    ) -> Result<Section> {
        self.working.check("apply_section_aggregates")?;
        let section = self.working.section_mut(id)?;
        section.lessons_count += delta.lessons;
        section.read_time_seconds += delta.read_time_seconds;
        section.watch_time_seconds += delta.watch_time_seconds;
        Ok(section.clone())
    }

    async fn set_section_aggregates(
        &mut self,
        id: SectionId,
        aggregates: Aggregates,
    ) -> Result<Section> {
        self.working.check("set_section_aggregates")?;
        let section = self.working.section_mut(id)?;
        section.lessons_count = aggregates.lessons;
        section.read_time_seconds = aggregates.read_time_seconds;
        section.watch_time_seconds = aggregates.watch_time_seconds;
        Ok(section.clone())
    }

    async fn delete_section(&mut self, id: SectionId) -> Result<()> {
        let t = &mut self.working;
        t.check("delete_section")?;
        if t.sections.remove(&id).is_none() {
            return Err(CourseError::NotFound);
        }
        let lesson_ids: Vec<LessonId> = t
            .lessons
            .values()
            .filter(|l| l.section_id == id)
            .map(|l| l.id)
            .collect();
        t.remove_lesson_rows(&lesson_ids);
        let progress_ids: Vec<ProgressId> = t
            .section_progress
            .values()
            .filter(|p| p.section_id == id)
            .map(|p| p.id)
            .collect();
        t.section_progress.retain(|_, p| p.section_id != id);
        t.lesson_progress
            .retain(|_, p| !progress_ids.contains(&p.section_progress_id));
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Lessons
    // ═══════════════════════════════════════════════════════════

    async fn find_lesson(&mut self, section_id: SectionId, id: LessonId) -> Result<Option<Lesson>> {
        self.working.check("find_lesson")?;
        Ok(self
            .working
            .lessons
            .get(&id)
            .filter(|l| l.section_id == section_id)
            .cloned())
    }

    async fn lock_lesson(&mut self, id: LessonId) -> Result<Option<Lesson>> {
        self.working.check("lock_lesson")?;
        Ok(self.working.lessons.get(&id).cloned())
    }

    async fn share_lesson(&mut self, id: LessonId) -> Result<Option<Lesson>> {
        self.working.check("share_lesson")?;
        Ok(self.working.lessons.get(&id).cloned())
    }

    async fn list_lessons(&mut self, section_id: SectionId) -> Result<Vec<Lesson>> {
        self.working.check("list_lessons")?;
        let mut lessons: Vec<Lesson> = self
            .working
            .lessons
            .values()
            .filter(|l| l.section_id == section_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.position, l.id));
        Ok(lessons)
    }

    async fn count_lessons(&mut self, section_id: SectionId) -> Result<i32> {
        self.working.check("count_lessons")?;
        let count = self
            .working
            .lessons
            .values()
            .filter(|l| l.section_id == section_id)
            .count();
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    async fn create_lesson(&mut self, lesson: NewLesson) -> Result<Lesson> {
        let t = &mut self.working;
        t.check("create_lesson")?;
        if !t.sections.contains_key(&lesson.section_id) {
            return Err(CourseError::NotFound);
        }
        let row = Lesson {
            id: LessonId::new(t.next_id()),
            section_id: lesson.section_id,
            series_id: lesson.series_id,
            title: lesson.title,
            position: lesson.position,
            read_time_seconds: 0,
            watch_time_seconds: 0,
            is_published: false,
            created_at: Utc::now(),
        };
        t.lessons.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_lesson_title(&mut self, id: LessonId, title: &str) -> Result<Lesson> {
        self.working.check("update_lesson_title")?;
        let lesson = self.working.lesson_mut(id)?;
        title.clone_into(&mut lesson.title);
        Ok(lesson.clone())
    }

    async fn set_lesson_published(&mut self, id: LessonId, published: bool) -> Result<Lesson> {
        self.working.check("set_lesson_published")?;
        let lesson = self.working.lesson_mut(id)?;
        lesson.is_published = published;
        Ok(lesson.clone())
    }

    async fn add_lesson_times(
        &mut self,
        id: LessonId,
        read_delta: i32,
        watch_delta: i32,
    ) -> Result<Lesson> {
        self.working.check("add_lesson_times")?;
        let lesson = self.working.lesson_mut(id)?;
        lesson.read_time_seconds += read_delta;
        lesson.watch_time_seconds += watch_delta;
        Ok(lesson.clone())
    }

    async fn delete_lesson(&mut self, id: LessonId) -> Result<()> {
        let t = &mut self.working;
        t.check("delete_lesson")?;
        if !t.lessons.contains_key(&id) {
            return Err(CourseError::NotFound);
        }
        t.remove_lesson_rows(&[id]);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Positions
    // ═══════════════════════════════════════════════════════════

    async fn shift_positions(
        &mut self,
        scope: SiblingScope,
        from: i32,
        to: i32,
        delta: i32,
    ) -> Result<u64> {
        let t = &mut self.working;
        t.check("shift_positions")?;
        let mut shifted = 0;
        let in_range = |position: i32| (from..=to).contains(&position);
        match scope {
            SiblingScope::Series(series_id) => {
                for section in t.sections.values_mut() {
                    if section.series_id == series_id && in_range(section.position) {
                        section.position += delta;
                        shifted += 1;
                    }
                }
            }
            SiblingScope::Section(section_id) => {
                for lesson in t.lessons.values_mut() {
                    if lesson.section_id == section_id && in_range(lesson.position) {
                        lesson.position += delta;
                        shifted += 1;
                    }
                }
            }
        }
        Ok(shifted)
    }

    async fn set_position(&mut self, sibling: Sibling, position: i32) -> Result<()> {
        let t = &mut self.working;
        t.check("set_position")?;
        match sibling {
            Sibling::Section(id) => t.section_mut(id)?.position = position,
            Sibling::Lesson(id) => t.lesson_mut(id)?.position = position,
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Lesson content
    // ═══════════════════════════════════════════════════════════

    async fn find_article(&mut self, lesson_id: LessonId) -> Result<Option<LessonArticle>> {
        self.working.check("find_article")?;
        Ok(self.working.articles.get(&lesson_id).cloned())
    }

    async fn save_article(&mut self, article: LessonArticle, replace: bool) -> Result<LessonArticle> {
        let t = &mut self.working;
        t.check("save_article")?;
        if !t.lessons.contains_key(&article.lesson_id) {
            return Err(CourseError::NotFound);
        }
        if !replace && t.articles.contains_key(&article.lesson_id) {
            return Err(CourseError::conflict("Lesson already has an article"));
        }
        t.articles.insert(article.lesson_id, article.clone());
        Ok(article)
    }

    async fn delete_article(&mut self, lesson_id: LessonId) -> Result<()> {
        self.working.check("delete_article")?;
        self.working
            .articles
            .remove(&lesson_id)
            .map(|_| ())
            .ok_or(CourseError::NotFound)
    }

    async fn find_video(&mut self, lesson_id: LessonId) -> Result<Option<LessonVideo>> {
        self.working.check("find_video")?;
        Ok(self.working.videos.get(&lesson_id).cloned())
    }

    async fn save_video(&mut self, video: LessonVideo, replace: bool) -> Result<LessonVideo> {
        let t = &mut self.working;
        t.check("save_video")?;
        if !t.lessons.contains_key(&video.lesson_id) {
            return Err(CourseError::NotFound);
        }
        if !replace && t.videos.contains_key(&video.lesson_id) {
            return Err(CourseError::conflict("Lesson already has a video"));
        }
        t.videos.insert(video.lesson_id, video.clone());
        Ok(video)
    }

    async fn delete_video(&mut self, lesson_id: LessonId) -> Result<()> {
        self.working.check("delete_video")?;
        self.working
            .videos
            .remove(&lesson_id)
            .map(|_| ())
            .ok_or(CourseError::NotFound)
    }

    // ═══════════════════════════════════════════════════════════
    // Language progress
    // ═══════════════════════════════════════════════════════════

    async fn find_language_progress(
        &mut self,
        user_id: UserId,
        language_slug: &str,
    ) -> Result<Option<LanguageProgress>> {
        self.working.check("find_language_progress")?;
        Ok(self
            .working
            .language_progress
            .values()
            .find(|p| p.user_id == user_id && p.language_slug == language_slug)
            .cloned())
    }

    async fn lock_language_progress(&mut self, id: ProgressId) -> Result<Option<LanguageProgress>> {
        self.working.check("lock_language_progress")?;
        Ok(self.working.language_progress.get(&id).cloned())
    }

    async fn create_language_progress(
        &mut self,
        user_id: UserId,
        language_slug: &str,
        now: DateTime<Utc>,
    ) -> Result<LanguageProgress> {
        let t = &mut self.working;
        t.check("create_language_progress")?;
        if !t.languages.contains_key(language_slug) {
            return Err(CourseError::NotFound);
        }
        if t
            .language_progress
            .values()
            .any(|p| p.user_id == user_id && p.language_slug == language_slug)
        {
            return Err(CourseError::conflict("Language progress already exists"));
        }
        let row = LanguageProgress {
            id: ProgressId::new(t.next_id()),
            user_id,
            language_slug: language_slug.to_string(),
            completed_series: 0,
            viewed_at: now,
        };
        t.language_progress.insert(row.id, row.clone());
        Ok(row)
    }

    async fn touch_language_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<LanguageProgress> {
        self.working.check("touch_language_progress")?;
        let progress = self
            .working
            .language_progress
            .get_mut(&id)
            .ok_or(CourseError::NotFound)?;
        progress.viewed_at = now;
        Ok(progress.clone())
    }

    async fn add_language_completed_series(
        &mut self,
        id: ProgressId,
        delta: i32,
    ) -> Result<LanguageProgress> {
        self.working.check("add_language_completed_series")?;
        let progress = self
            .working
            .language_progress
            .get_mut(&id)
            .ok_or(CourseError::NotFound)?;
        progress.completed_series += delta;
        Ok(progress.clone())
    }

    async fn delete_language_progress(&mut self, id: ProgressId) -> Result<()> {
        let t = &mut self.working;
        t.check("delete_language_progress")?;
        if t.language_progress.remove(&id).is_none() {
            return Err(CourseError::NotFound);
        }
        let series_ids: Vec<ProgressId> = t
            .series_progress
            .values()
            .filter(|p| p.language_progress_id == id)
            .map(|p| p.id)
            .collect();
        t.remove_series_progress_rows(&series_ids);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Series progress
    // ═══════════════════════════════════════════════════════════

    async fn find_series_progress(
        &mut self,
        user_id: UserId,
        series_id: SeriesId,
    ) -> Result<Option<SeriesProgress>> {
        self.working.check("find_series_progress")?;
        Ok(self
            .working
            .series_progress
            .values()
            .find(|p| p.user_id == user_id && p.series_id == series_id)
            .cloned())
    }

    async fn lock_series_progress(&mut self, id: ProgressId) -> Result<Option<SeriesProgress>> {
        self.working.check("lock_series_progress")?;
        Ok(self.working.series_progress.get(&id).cloned())
    }

    async fn count_series_progress(&mut self, series_id: SeriesId) -> Result<i64> {
        self.working.check("count_series_progress")?;
        let count = self
            .working
            .series_progress
            .values()
            .filter(|p| p.series_id == series_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn create_series_progress(
        &mut self,
        progress: NewSeriesProgress,
        now: DateTime<Utc>,
    ) -> Result<SeriesProgress> {
        let t = &mut self.working;
        t.check("create_series_progress")?;
        if !t.series.contains_key(&progress.series_id)
            || !t.language_progress.contains_key(&progress.language_progress_id)
        {
            return Err(CourseError::NotFound);
        }
        if t
            .series_progress
            .values()
            .any(|p| p.user_id == progress.user_id && p.series_id == progress.series_id)
        {
            return Err(CourseError::conflict("Series progress already exists"));
        }
        let row = SeriesProgress {
            id: ProgressId::new(t.next_id()),
            user_id: progress.user_id,
            series_id: progress.series_id,
            language_slug: progress.language_slug,
            series_slug: progress.series_slug,
            language_progress_id: progress.language_progress_id,
            completed_lessons: 0,
            completed_sections: 0,
            completed_at: None,
            viewed_at: now,
        };
        t.series_progress.insert(row.id, row.clone());
        Ok(row)
    }

    async fn touch_series_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<SeriesProgress> {
        self.working.check("touch_series_progress")?;
        let progress = self
            .working
            .series_progress
            .get_mut(&id)
            .ok_or(CourseError::NotFound)?;
        progress.viewed_at = now;
        Ok(progress.clone())
    }

    async fn increment_series_progress(
        &mut self,
        id: ProgressId,
        delta: CompletionDelta,
        now: DateTime<Utc>,
    ) -> Result<SeriesProgress> {
        let t = &mut self.working;
        t.check("increment_series_progress")?;
        let progress = t.series_progress.get_mut(&id).ok_or(CourseError::NotFound)?;
        let sections_count = t
            .series
            .get(&progress.series_id)
            .map_or(0, |s| s.sections_count);
        progress.completed_sections += delta.sections;
        progress.completed_lessons += delta.lessons;
        if delta.sections > 0
            && progress.completed_at.is_none()
            && sections_count > 0
            && progress.completed_sections >= sections_count
        {
            progress.completed_at = Some(now);
        }
        Ok(progress.clone())
    }

    async fn decrement_series_progress(
        &mut self,
        id: ProgressId,
        delta: CompletionDelta,
    ) -> Result<SeriesProgress> {
        self.working.check("decrement_series_progress")?;
        let progress = self
            .working
            .series_progress
            .get_mut(&id)
            .ok_or(CourseError::NotFound)?;
        progress.completed_sections -= delta.sections;
        progress.completed_lessons -= delta.lessons;
        if delta.sections > 0 {
            progress.completed_at = None;
        }
        Ok(progress.clone())
    }

    async fn delete_series_progress(&mut self, id: ProgressId) -> Result<()> {
        let t = &mut self.working;
        t.check("delete_series_progress")?;
        if !t.series_progress.contains_key(&id) {
            return Err(CourseError::NotFound);
        }
        t.remove_series_progress_rows(&[id]);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Section progress
    // ═══════════════════════════════════════════════════════════

    async fn find_section_progress(
        &mut self,
        user_id: UserId,
        section_id: SectionId,
    ) -> Result<Option<SectionProgress>> {
        self.working.check("find_section_progress")?;
        Ok(self
            .working
            .section_progress
            .values()
            .find(|p| p.user_id == user_id && p.section_id == section_id)
            .cloned())
    }

    async fn lock_section_progress(&mut self, id: ProgressId) -> Result<Option<SectionProgress>> {
        self.working.check("lock_section_progress")?;
        Ok(self.working.section_progress.get(&id).cloned())
    }

    async fn count_section_progress(&mut self, section_id: SectionId) -> Result<i64> {
        self.working.check("count_section_progress")?;
        let count = self
            .working
            .section_progress
            .values()
            .filter(|p| p.section_id == section_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn create_section_progress(
        &mut self,
        progress: NewSectionProgress,
        now: DateTime<Utc>,
    ) -> Result<SectionProgress> {
        let t = &mut self.working;
        t.check("create_section_progress")?;
        if !t.sections.contains_key(&progress.section_id)
            || !t.series_progress.contains_key(&progress.series_progress_id)
        {
            return Err(CourseError::NotFound);
        }
        if t
            .section_progress
            .values()
            .any(|p| p.user_id == progress.user_id && p.section_id == progress.section_id)
        {
            return Err(CourseError::conflict("Section progress already exists"));
        }
        let row = SectionProgress {
            id: ProgressId::new(t.next_id()),
            user_id: progress.user_id,
            section_id: progress.section_id,
            series_id: progress.series_id,
            series_progress_id: progress.series_progress_id,
            completed_lessons: 0,
            completed_at: None,
            viewed_at: now,
        };
        t.section_progress.insert(row.id, row.clone());
        Ok(row)
    }

    async fn touch_section_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<SectionProgress> {
        self.working.check("touch_section_progress")?;
        let progress = self
            .working
            .section_progress
            .get_mut(&id)
            .ok_or(CourseError::NotFound)?;
        progress.viewed_at = now;
        Ok(progress.clone())
    }

    async fn increment_section_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<SectionProgress> {
        let t = &mut self.working;
        t.check("increment_section_progress")?;
        let progress = t.section_progress.get_mut(&id).ok_or(CourseError::NotFound)?;
        let lessons_count = t
            .sections
            .get(&progress.section_id)
            .map_or(0, |s| s.lessons_count);
        progress.completed_lessons += 1;
        if progress.completed_at.is_none()
            && lessons_count > 0
            && progress.completed_lessons >= lessons_count
        {
            progress.completed_at = Some(now);
        }
        Ok(progress.clone())
    }

    async fn decrement_section_progress(&mut self, id: ProgressId) -> Result<SectionProgress> {
        self.working.check("decrement_section_progress")?;
        let progress = self
            .working
            .section_progress
            .get_mut(&id)
            .ok_or(CourseError::NotFound)?;
        progress.completed_lessons -= 1;
        progress.completed_at = None;
        Ok(progress.clone())
    }

    async fn delete_section_progress(&mut self, id: ProgressId) -> Result<()> {
        let t = &mut self.working;
        t.check("delete_section_progress")?;
        if t.section_progress.remove(&id).is_none() {
            return Err(CourseError::NotFound);
        }
        t.lesson_progress.retain(|_, p| p.section_progress_id != id);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Lesson progress
    // ═══════════════════════════════════════════════════════════

    async fn find_lesson_progress(
        &mut self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>> {
        self.working.check("find_lesson_progress")?;
        Ok(self
            .working
            .lesson_progress
            .values()
            .find(|p| p.user_id == user_id && p.lesson_id == lesson_id)
            .cloned())
    }

    async fn lock_lesson_progress(&mut self, id: ProgressId) -> Result<Option<LessonProgress>> {
        self.working.check("lock_lesson_progress")?;
        Ok(self.working.lesson_progress.get(&id).cloned())
    }

    async fn count_lesson_progress(&mut self, lesson_id: LessonId) -> Result<i64> {
        self.working.check("count_lesson_progress")?;
        let count = self
            .working
            .lesson_progress
            .values()
            .filter(|p| p.lesson_id == lesson_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn create_lesson_progress(
        &mut self,
        progress: NewLessonProgress,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress> {
        let t = &mut self.working;
        t.check("create_lesson_progress")?;
        if !t.lessons.contains_key(&progress.lesson_id)
            || !t.section_progress.contains_key(&progress.section_progress_id)
        {
            return Err(CourseError::NotFound);
        }
        if t
            .lesson_progress
            .values()
            .any(|p| p.user_id == progress.user_id && p.lesson_id == progress.lesson_id)
        {
            return Err(CourseError::conflict("Lesson progress already exists"));
        }
        let row = LessonProgress {
            id: ProgressId::new(t.next_id()),
            user_id: progress.user_id,
            lesson_id: progress.lesson_id,
            section_id: progress.section_id,
            section_progress_id: progress.section_progress_id,
            series_progress_id: progress.series_progress_id,
            completed_at: None,
            viewed_at: now,
        };
        t.lesson_progress.insert(row.id, row.clone());
        Ok(row)
    }

    async fn touch_lesson_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress> {
        self.working.check("touch_lesson_progress")?;
        let progress = self
            .working
            .lesson_progress
            .get_mut(&id)
            .ok_or(CourseError::NotFound)?;
        progress.viewed_at = now;
        Ok(progress.clone())
    }

    async fn complete_lesson_progress(
        &mut self,
        id: ProgressId,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress> {
        self.working.check("complete_lesson_progress")?;
        let progress = self
            .working
            .lesson_progress
            .get_mut(&id)
            .ok_or(CourseError::NotFound)?;
        progress.completed_at = Some(now);
        Ok(progress.clone())
    }

    async fn delete_lesson_progress(&mut self, id: ProgressId) -> Result<()> {
        self.working.check("delete_lesson_progress")?;
        self.working
            .lesson_progress
            .remove(&id)
            .map(|_| ())
            .ok_or(CourseError::NotFound)
    }

    // ═══════════════════════════════════════════════════════════
    // Certificates
    // ═══════════════════════════════════════════════════════════

    async fn find_certificate_for(
        &mut self,
        user_id: UserId,
        series_id: SeriesId,
    ) -> Result<Option<Certificate>> {
        self.working.check("find_certificate_for")?;
        Ok(self
            .working
            .certificates
            .iter()
            .find(|c| c.user_id == user_id && c.series_id == series_id)
            .cloned())
    }

    async fn find_certificate(&mut self, id: CertificateId) -> Result<Option<Certificate>> {
        self.working.check("find_certificate")?;
        Ok(self
            .working
            .certificates
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn create_certificate(&mut self, certificate: NewCertificate) -> Result<Certificate> {
        let t = &mut self.working;
        t.check("create_certificate")?;
        if t
            .certificates
            .iter()
            .any(|c| c.user_id == certificate.user_id && c.series_id == certificate.series_id)
        {
            return Err(CourseError::conflict("Series already has a certificate"));
        }
        let row = Certificate {
            id: certificate.id,
            user_id: certificate.user_id,
            series_id: certificate.series_id,
            language_slug: certificate.language_slug,
            series_slug: certificate.series_slug,
            series_title: certificate.series_title,
            lessons: certificate.lessons,
            read_time_seconds: certificate.read_time_seconds,
            watch_time_seconds: certificate.watch_time_seconds,
            completed_at: certificate.completed_at,
        };
        t.certificates.push(row.clone());
        Ok(row)
    }

    async fn list_certificates(
        &mut self,
        user_id: UserId,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Certificate>> {
        self.working.check("list_certificates")?;
        let mut owned: Vec<Certificate> = self
            .working
            .certificates
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(owned
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn count_certificates(&mut self, user_id: UserId) -> Result<i64> {
        self.working.check("count_certificates")?;
        let count = self
            .working
            .certificates
            .iter()
            .filter(|c| c.user_id == user_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}
