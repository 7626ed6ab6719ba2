//! Course fixtures.
//!
//! [`CourseBuilder`] creates a whole Series through [`ContentService`], so fixtures obey
//! the same ordering and rollup rules as production edits.

use kiwiscript_core::content::{Lesson, Section, Series};
use kiwiscript_core::policy::Actor;
use kiwiscript_core::store::{CourseStore, CourseTransaction};
use kiwiscript_core::{CourseError, Result, UserId};
use kiwiscript_runtime::{
    ContentService, CreateSection, CreateSeries, LessonPath, SectionPath, SeriesPath,
};

/// Author of every fixture course.
pub const AUTHOR: UserId = UserId::new(1);

/// A student with no special rights.
pub const STUDENT: UserId = UserId::new(100);

/// Staff member used to create languages.
pub const STAFF: UserId = UserId::new(999);

/// Text whose estimated read time is `seconds` (a multiple of 3).
#[must_use]
pub fn words_for(seconds: i32) -> String {
    let words = usize::try_from(seconds).unwrap_or(0) * 10 / 3;
    "kiwi ".repeat(words)
}

/// One Lesson to create.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LessonSpec {
    /// Title
    pub title: String,
    /// Article text, if any
    pub article: Option<String>,
    /// Video duration, if any
    pub video_seconds: Option<i32>,
    /// Publish after attaching content
    pub publish: bool,
}

impl LessonSpec {
    /// Published Lesson with an Article of `read_seconds` read time.
    #[must_use]
    pub fn article(read_seconds: i32) -> Self {
        Self {
            title: "Article lesson".to_string(),
            article: Some(words_for(read_seconds)),
            video_seconds: None,
            publish: true,
        }
    }

    /// Published Lesson with a Video of `watch_seconds`.
    #[must_use]
    pub fn video(watch_seconds: i32) -> Self {
        Self {
            title: "Video lesson".to_string(),
            article: None,
            video_seconds: Some(watch_seconds),
            publish: true,
        }
    }

    /// Leave the Lesson unpublished.
    #[must_use]
    pub fn draft(mut self) -> Self {
        self.publish = false;
        self
    }
}

/// One Section to create.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionSpec {
    /// Title
    pub title: String,
    /// Lessons in order
    pub lessons: Vec<LessonSpec>,
    /// Publish after creating the Lessons
    pub publish: bool,
}

impl SectionSpec {
    /// A Section published once its Lessons exist.
    #[must_use]
    pub fn published(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lessons: Vec::new(),
            publish: true,
        }
    }

    /// A Section left unpublished.
    #[must_use]
    pub fn draft(title: &str) -> Self {
        Self {
            publish: false,
            ..Self::published(title)
        }
    }

    /// Append a Lesson.
    #[must_use]
    pub fn lesson(mut self, lesson: LessonSpec) -> Self {
        self.lessons.push(lesson);
        self
    }
}

/// Builder for a Series with Sections and Lessons.
#[derive(Clone, Debug)]
pub struct CourseBuilder {
    language_slug: String,
    series_slug: String,
    sections: Vec<SectionSpec>,
    publish_series: bool,
}

impl CourseBuilder {
    /// Start a Series `series_slug` in language `language_slug`.
    #[must_use]
    pub fn new(language_slug: &str, series_slug: &str) -> Self {
        Self {
            language_slug: language_slug.to_string(),
            series_slug: series_slug.to_string(),
            sections: Vec::new(),
            publish_series: true,
        }
    }

    /// Append a Section.
    #[must_use]
    pub fn section(mut self, section: SectionSpec) -> Self {
        self.sections.push(section);
        self
    }

    /// Leave the Series unpublished.
    #[must_use]
    pub const fn draft(mut self) -> Self {
        self.publish_series = false;
        self
    }

    /// Create everything in `store`.
    ///
    /// The language is created on first use. The Series is published when requested and at
    /// least one Section was published.
    ///
    /// # Errors
    ///
    /// Propagates any service error.
    pub async fn build<S: CourseStore + Clone>(self, store: &S) -> Result<Course> {
        let content = ContentService::new(store.clone());
        let author = Actor::user(AUTHOR);

        match content
            .create_language(Actor::staff(STAFF), &self.language_slug, &self.language_slug)
            .await
        {
            Ok(_) | Err(CourseError::Conflict { .. }) => {}
            Err(error) => return Err(error),
        }
        content
            .create_series(
                author,
                &self.language_slug,
                CreateSeries {
                    slug: self.series_slug.clone(),
                    title: format!("{} series", self.series_slug),
                    description: String::new(),
                },
            )
            .await?;

        let path = SeriesPath::new(&self.language_slug, &self.series_slug);
        let mut any_published = false;
        for spec in self.sections {
            let section = content
                .create_section(
                    author,
                    &path,
                    CreateSection {
                        title: spec.title,
                        description: String::new(),
                    },
                )
                .await?;
            let section_path = path.section(section.id);

            for lesson_spec in spec.lessons {
                let lesson = content
                    .create_lesson(author, &section_path, &lesson_spec.title)
                    .await?;
                let lesson_path = section_path.lesson(lesson.id);
                if let Some(text) = &lesson_spec.article {
                    content.create_article(author, &lesson_path, text).await?;
                }
                if let Some(seconds) = lesson_spec.video_seconds {
                    content
                        .create_video(author, &lesson_path, "https://videos.example/kiwi", seconds)
                        .await?;
                }
                if lesson_spec.publish {
                    content
                        .toggle_lesson_published(author, &lesson_path, true)
                        .await?;
                }
            }
            if spec.publish {
                content
                    .toggle_section_published(author, &section_path, true)
                    .await?;
                any_published = true;
            }
        }
        if self.publish_series && any_published {
            content.toggle_series_published(author, &path, true).await?;
        }

        Course::load(store, path).await
    }
}

/// A built Series with its current rows.
#[derive(Clone, Debug)]
pub struct Course {
    /// Address of the Series
    pub path: SeriesPath,
    /// Series row
    pub series: Series,
    /// Sections in position order with their Lessons in position order
    pub sections: Vec<(Section, Vec<Lesson>)>,
}

impl Course {
    /// Read the current rows of the Series at `path`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Series does not exist.
    pub async fn load<S: CourseStore>(store: &S, path: SeriesPath) -> Result<Self> {
        let mut tx = store.begin().await?;
        let series = tx
            .find_series(&path.language_slug, &path.series_slug)
            .await?
            .ok_or(CourseError::NotFound)?;
        let mut sections = Vec::new();
        for section in tx.list_sections(series.id).await? {
            let lessons = tx.list_lessons(section.id).await?;
            sections.push((section, lessons));
        }
        tx.rollback().await?;
        Ok(Self {
            path,
            series,
            sections,
        })
    }

    /// Re-read the rows.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Series was deleted.
    pub async fn reload<S: CourseStore>(&self, store: &S) -> Result<Self> {
        Self::load(store, self.path.clone()).await
    }

    /// Path of the Section at `index` (0-based position order).
    #[must_use]
    pub fn section_path(&self, index: usize) -> SectionPath {
        self.path.section(self.sections[index].0.id)
    }

    /// Path of Lesson `lesson` of Section `section` (both 0-based position order).
    #[must_use]
    pub fn lesson_path(&self, section: usize, lesson: usize) -> LessonPath {
        self.section_path(section)
            .lesson(self.sections[section].1[lesson].id)
    }

    /// Paths of every Lesson, Section by Section.
    #[must_use]
    pub fn lesson_paths(&self) -> Vec<LessonPath> {
        self.sections
            .iter()
            .flat_map(|(section, lessons)| {
                let section_path = self.path.section(section.id);
                lessons
                    .iter()
                    .map(move |lesson| section_path.lesson(lesson.id))
            })
            .collect()
    }
}
