//! Per-user progress rows mirroring the content tree.
//!
//! Rows are created lazily when a student first views published content. Only
//! [`LessonProgress`] completion is a direct user action; Section and Series completion is
//! derived by the store when a counter reaches the published child count.

use crate::types::{LessonId, ProgressId, SectionId, SeriesId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a progress level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressState {
    /// No row exists
    NotStarted,
    /// Row exists, `completed_at` unset
    Viewed,
    /// `completed_at` set
    Completed,
}

impl ProgressState {
    /// State of an optional row given its completion stamp.
    #[must_use]
    pub const fn of(completed_at: Option<&DateTime<Utc>>) -> Self {
        match completed_at {
            Some(_) => Self::Completed,
            None => Self::Viewed,
        }
    }
}

/// One per (user, language).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProgress {
    /// Store id
    pub id: ProgressId,
    /// Owner
    pub user_id: UserId,
    /// Language being followed
    pub language_slug: String,
    /// Number of completed Series in the language
    pub completed_series: i32,
    /// Last view
    pub viewed_at: DateTime<Utc>,
}

/// One per (user, series).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesProgress {
    /// Store id
    pub id: ProgressId,
    /// Owner
    pub user_id: UserId,
    /// Series being followed
    pub series_id: SeriesId,
    /// Language of the Series
    pub language_slug: String,
    /// Slug of the Series
    pub series_slug: String,
    /// Parent progress row
    pub language_progress_id: ProgressId,
    /// Total completed Lessons across the Series
    pub completed_lessons: i32,
    /// Completed Sections
    pub completed_sections: i32,
    /// Set when `completed_sections` reaches the Series' published Section count
    pub completed_at: Option<DateTime<Utc>>,
    /// Last view
    pub viewed_at: DateTime<Utc>,
}

impl SeriesProgress {
    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ProgressState {
        ProgressState::of(self.completed_at.as_ref())
    }
}

/// One per (user, section).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionProgress {
    /// Store id
    pub id: ProgressId,
    /// Owner
    pub user_id: UserId,
    /// Section being followed
    pub section_id: SectionId,
    /// Series of the Section
    pub series_id: SeriesId,
    /// Parent progress row
    pub series_progress_id: ProgressId,
    /// Completed Lessons within the Section
    pub completed_lessons: i32,
    /// Set when `completed_lessons` reaches the Section's published Lesson count
    pub completed_at: Option<DateTime<Utc>>,
    /// Last view
    pub viewed_at: DateTime<Utc>,
}

impl SectionProgress {
    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ProgressState {
        ProgressState::of(self.completed_at.as_ref())
    }
}

/// One per (user, lesson).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonProgress {
    /// Store id
    pub id: ProgressId,
    /// Owner
    pub user_id: UserId,
    /// Lesson being followed
    pub lesson_id: LessonId,
    /// Section of the Lesson
    pub section_id: SectionId,
    /// Parent progress row
    pub section_progress_id: ProgressId,
    /// Grandparent progress row
    pub series_progress_id: ProgressId,
    /// Set once; only cleared by deleting the row
    pub completed_at: Option<DateTime<Utc>>,
    /// Last view
    pub viewed_at: DateTime<Utc>,
}

impl LessonProgress {
    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ProgressState {
        ProgressState::of(self.completed_at.as_ref())
    }

    /// Whether the completion event already happened.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

// ============================================================================
// Inserts
// ============================================================================

/// Fields of a new [`SeriesProgress`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSeriesProgress {
    /// Owner
    pub user_id: UserId,
    /// Series
    pub series_id: SeriesId,
    /// Language of the Series
    pub language_slug: String,
    /// Slug of the Series
    pub series_slug: String,
    /// Parent progress row
    pub language_progress_id: ProgressId,
}

/// Fields of a new [`SectionProgress`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSectionProgress {
    /// Owner
    pub user_id: UserId,
    /// Section
    pub section_id: SectionId,
    /// Series of the Section
    pub series_id: SeriesId,
    /// Parent progress row
    pub series_progress_id: ProgressId,
}

/// Fields of a new [`LessonProgress`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLessonProgress {
    /// Owner
    pub user_id: UserId,
    /// Lesson
    pub lesson_id: LessonId,
    /// Section of the Lesson
    pub section_id: SectionId,
    /// Parent progress row
    pub section_progress_id: ProgressId,
    /// Grandparent progress row
    pub series_progress_id: ProgressId,
}

/// Change applied to a [`SeriesProgress`]' counters by the cascade.
///
/// Both fields are magnitudes; the direction is given by the store method
/// (`increment_series_progress` / `decrement_series_progress`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompletionDelta {
    /// Completed Sections gained or lost
    pub sections: i32,
    /// Completed Lessons gained or lost
    pub lessons: i32,
}

impl CompletionDelta {
    /// One Lesson, no Section.
    pub const LESSON: Self = Self {
        sections: 0,
        lessons: 1,
    };

    /// One Section together with the Lesson that completed it.
    pub const SECTION: Self = Self {
        sections: 1,
        lessons: 1,
    };
}
