//! Content tree rows: Language, Series, Section, Lesson and lesson content.

use crate::types::{LessonId, SectionId, SeriesId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg};

// ============================================================================
// Rows
// ============================================================================

/// A programming language; the root of the content tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// URL slug, unique
    pub slug: String,
    /// Display name
    pub name: String,
    /// Staff member who created the language
    pub author_id: UserId,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A course for one language, composed of ordered Sections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    /// Store id
    pub id: SeriesId,
    /// Owning language
    pub language_slug: String,
    /// URL slug, unique within the language
    pub slug: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Author (owner for mutations)
    pub author_id: UserId,
    /// Number of published Sections
    pub sections_count: i32,
    /// Number of published Lessons within published Sections
    pub lessons_count: i32,
    /// Read time of published Lessons within published Sections
    pub read_time_seconds: i32,
    /// Watch time of published Lessons within published Sections
    pub watch_time_seconds: i32,
    /// Whether students can see the Series
    pub is_published: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// An ordered group of Lessons within a Series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Store id
    pub id: SectionId,
    /// Parent Series
    pub series_id: SeriesId,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// 1-based position among the Series' Sections
    pub position: i32,
    /// Number of published Lessons
    pub lessons_count: i32,
    /// Read time of published Lessons
    pub read_time_seconds: i32,
    /// Watch time of published Lessons
    pub watch_time_seconds: i32,
    /// Whether the Section contributes to the Series
    pub is_published: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// An atomic unit of content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Store id
    pub id: LessonId,
    /// Parent Section
    pub section_id: SectionId,
    /// Grandparent Series
    pub series_id: SeriesId,
    /// Title
    pub title: String,
    /// 1-based position among the Section's Lessons
    pub position: i32,
    /// Read time contributed by the Article (0 without one)
    pub read_time_seconds: i32,
    /// Watch time contributed by the Video (0 without one)
    pub watch_time_seconds: i32,
    /// Whether the Lesson contributes to the Section
    pub is_published: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Written content of a Lesson (at most one per Lesson).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonArticle {
    /// Owning Lesson
    pub lesson_id: LessonId,
    /// Markdown body
    pub content: String,
    /// Estimated read time of `content`
    pub read_time_seconds: i32,
}

/// Video content of a Lesson (at most one per Lesson).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonVideo {
    /// Owning Lesson
    pub lesson_id: LessonId,
    /// Hosted video URL
    pub url: String,
    /// Duration supplied by the author
    pub watch_time_seconds: i32,
}

// ============================================================================
// Inserts
// ============================================================================

/// Fields of a new Language.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLanguage {
    /// URL slug
    pub slug: String,
    /// Display name
    pub name: String,
    /// Creator
    pub author_id: UserId,
}

/// Fields of a new Series. Aggregates start at zero and the Series starts unpublished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSeries {
    /// Owning language
    pub language_slug: String,
    /// URL slug
    pub slug: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Author
    pub author_id: UserId,
}

/// Fields of a new Section; the position is assigned on insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSection {
    /// Parent Series
    pub series_id: SeriesId,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Position to insert at (always `count + 1`)
    pub position: i32,
}

/// Fields of a new Lesson; the position is assigned on insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLesson {
    /// Parent Section
    pub section_id: SectionId,
    /// Grandparent Series
    pub series_id: SeriesId,
    /// Title
    pub title: String,
    /// Position to insert at (always `count + 1`)
    pub position: i32,
}

// ============================================================================
// Positions
// ============================================================================

/// The parent whose children share one dense position sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SiblingScope {
    /// Sections of a Series
    Series(SeriesId),
    /// Lessons of a Section
    Section(SectionId),
}

/// A positioned child row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sibling {
    /// A Section within its Series
    Section(SectionId),
    /// A Lesson within its Section
    Lesson(LessonId),
}

// ============================================================================
// Aggregates
// ============================================================================

/// Rolled-up counters of a parent row, or a signed delta to apply to them.
///
/// A Section ignores `sections`; a Lesson never carries aggregates of its own but
/// contributes [`Aggregates::of_lesson`] to its Section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregates {
    /// Published Sections
    pub sections: i32,
    /// Published Lessons
    pub lessons: i32,
    /// Read time in seconds
    pub read_time_seconds: i32,
    /// Watch time in seconds
    pub watch_time_seconds: i32,
}

impl Aggregates {
    /// All counters zero.
    pub const ZERO: Self = Self {
        sections: 0,
        lessons: 0,
        read_time_seconds: 0,
        watch_time_seconds: 0,
    };

    /// What a published Lesson adds to its Section (and transitively its Series).
    #[must_use]
    pub const fn of_lesson(lesson: &Lesson) -> Self {
        Self {
            sections: 0,
            lessons: 1,
            read_time_seconds: lesson.read_time_seconds,
            watch_time_seconds: lesson.watch_time_seconds,
        }
    }

    /// What a published Section adds to its Series.
    #[must_use]
    pub const fn of_section(section: &Section) -> Self {
        Self {
            sections: 1,
            lessons: section.lessons_count,
            read_time_seconds: section.read_time_seconds,
            watch_time_seconds: section.watch_time_seconds,
        }
    }

    /// Counters currently stored on a Section.
    #[must_use]
    pub const fn stored_on_section(section: &Section) -> Self {
        Self {
            sections: 0,
            lessons: section.lessons_count,
            read_time_seconds: section.read_time_seconds,
            watch_time_seconds: section.watch_time_seconds,
        }
    }

    /// Counters currently stored on a Series.
    #[must_use]
    pub const fn stored_on_series(series: &Series) -> Self {
        Self {
            sections: series.sections_count,
            lessons: series.lessons_count,
            read_time_seconds: series.read_time_seconds,
            watch_time_seconds: series.watch_time_seconds,
        }
    }

    /// A pure duration change (no count change).
    #[must_use]
    pub const fn times(read_time_seconds: i32, watch_time_seconds: i32) -> Self {
        Self {
            sections: 0,
            lessons: 0,
            read_time_seconds,
            watch_time_seconds,
        }
    }

    /// Whether applying this delta would change nothing.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.sections == 0
            && self.lessons == 0
            && self.read_time_seconds == 0
            && self.watch_time_seconds == 0
    }

    /// `self` when `include`, otherwise its negation. Used by publish toggles.
    #[must_use]
    pub fn signed(self, include: bool) -> Self {
        if include { self } else { -self }
    }
}

impl Add for Aggregates {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            sections: self.sections + rhs.sections,
            lessons: self.lessons + rhs.lessons,
            read_time_seconds: self.read_time_seconds + rhs.read_time_seconds,
            watch_time_seconds: self.watch_time_seconds + rhs.watch_time_seconds,
        }
    }
}

impl Neg for Aggregates {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            sections: -self.sections,
            lessons: -self.lessons,
            read_time_seconds: -self.read_time_seconds,
            watch_time_seconds: -self.watch_time_seconds,
        }
    }
}

impl std::iter::Sum for Aggregates {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}
