//! Column lists and row decoding.
//!
//! The column macros expand to string literals so queries can be assembled with
//! `concat!` at compile time; each list matches the order [`FromPgRow`] reads by name.

use kiwiscript_core::certificate::Certificate;
use kiwiscript_core::content::{Language, Lesson, LessonArticle, LessonVideo, Section, Series};
use kiwiscript_core::progress::{LanguageProgress, LessonProgress, SectionProgress, SeriesProgress};
use kiwiscript_core::{CertificateId, LessonId, ProgressId, SectionId, SeriesId, UserId};
use sqlx::Row;
use sqlx::postgres::PgRow;

macro_rules! language_columns {
    () => {
        "slug, name, author_id, created_at"
    };
}

macro_rules! series_columns {
    () => {
        "id, language_slug, slug, title, description, author_id, sections_count, \
         lessons_count, read_time_seconds, watch_time_seconds, is_published, created_at"
    };
}

macro_rules! section_columns {
    () => {
        "id, series_id, title, description, position, lessons_count, read_time_seconds, \
         watch_time_seconds, is_published, created_at"
    };
}

macro_rules! lesson_columns {
    () => {
        "id, section_id, series_id, title, position, read_time_seconds, watch_time_seconds, \
         is_published, created_at"
    };
}

macro_rules! language_progress_columns {
    () => {
        "id, user_id, language_slug, completed_series, viewed_at"
    };
}

macro_rules! series_progress_columns {
    () => {
        "id, user_id, series_id, language_slug, series_slug, language_progress_id, \
         completed_lessons, completed_sections, completed_at, viewed_at"
    };
}

macro_rules! section_progress_columns {
    () => {
        "id, user_id, section_id, series_id, series_progress_id, completed_lessons, \
         completed_at, viewed_at"
    };
}

macro_rules! lesson_progress_columns {
    () => {
        "id, user_id, lesson_id, section_id, section_progress_id, series_progress_id, \
         completed_at, viewed_at"
    };
}

macro_rules! certificate_columns {
    () => {
        "id, user_id, series_id, language_slug, series_slug, series_title, lessons, \
         read_time_seconds, watch_time_seconds, completed_at"
    };
}

pub(crate) use {
    certificate_columns, language_columns, language_progress_columns, lesson_columns,
    lesson_progress_columns, section_columns, section_progress_columns, series_columns,
    series_progress_columns,
};

/// Decode a domain row from a Postgres row.
pub(crate) trait FromPgRow: Sized {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error>;
}

impl FromPgRow for Language {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            slug: row.try_get("slug")?,
            name: row.try_get("name")?,
            author_id: UserId::new(row.try_get("author_id")?),
            created_at: row.try_get("created_at")?,
        })
    }
}

impl FromPgRow for Series {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: SeriesId::new(row.try_get("id")?),
            language_slug: row.try_get("language_slug")?,
            slug: row.try_get("slug")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            author_id: UserId::new(row.try_get("author_id")?),
            sections_count: row.try_get("sections_count")?,
            lessons_count: row.try_get("lessons_count")?,
            read_time_seconds: row.try_get("read_time_seconds")?,
            watch_time_seconds: row.try_get("watch_time_seconds")?,
            is_published: row.try_get("is_published")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl FromPgRow for Section {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: SectionId::new(row.try_get("id")?),
            series_id: SeriesId::new(row.try_get("series_id")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            position: row.try_get("position")?,
            lessons_count: row.try_get("lessons_count")?,
            read_time_seconds: row.try_get("read_time_seconds")?,
            watch_time_seconds: row.try_get("watch_time_seconds")?,
            is_published: row.try_get("is_published")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl FromPgRow for Lesson {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: LessonId::new(row.try_get("id")?),
            section_id: SectionId::new(row.try_get("section_id")?),
            series_id: SeriesId::new(row.try_get("series_id")?),
            title: row.try_get("title")?,
            position: row.try_get("position")?,
            read_time_seconds: row.try_get("read_time_seconds")?,
            watch_time_seconds: row.try_get("watch_time_seconds")?,
            is_published: row.try_get("is_published")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl FromPgRow for LessonArticle {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            lesson_id: LessonId::new(row.try_get("lesson_id")?),
            content: row.try_get("content")?,
            read_time_seconds: row.try_get("read_time_seconds")?,
        })
    }
}

impl FromPgRow for LessonVideo {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            lesson_id: LessonId::new(row.try_get("lesson_id")?),
            url: row.try_get("url")?,
            watch_time_seconds: row.try_get("watch_time_seconds")?,
        })
    }
}

impl FromPgRow for LanguageProgress {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: ProgressId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            language_slug: row.try_get("language_slug")?,
            completed_series: row.try_get("completed_series")?,
            viewed_at: row.try_get("viewed_at")?,
        })
    }
}

impl FromPgRow for SeriesProgress {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: ProgressId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            series_id: SeriesId::new(row.try_get("series_id")?),
            language_slug: row.try_get("language_slug")?,
            series_slug: row.try_get("series_slug")?,
            language_progress_id: ProgressId::new(row.try_get("language_progress_id")?),
            completed_lessons: row.try_get("completed_lessons")?,
            completed_sections: row.try_get("completed_sections")?,
            completed_at: row.try_get("completed_at")?,
            viewed_at: row.try_get("viewed_at")?,
        })
    }
}

impl FromPgRow for SectionProgress {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: ProgressId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            section_id: SectionId::new(row.try_get("section_id")?),
            series_id: SeriesId::new(row.try_get("series_id")?),
            series_progress_id: ProgressId::new(row.try_get("series_progress_id")?),
            completed_lessons: row.try_get("completed_lessons")?,
            completed_at: row.try_get("completed_at")?,
            viewed_at: row.try_get("viewed_at")?,
        })
    }
}

impl FromPgRow for LessonProgress {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: ProgressId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            lesson_id: LessonId::new(row.try_get("lesson_id")?),
            section_id: SectionId::new(row.try_get("section_id")?),
            section_progress_id: ProgressId::new(row.try_get("section_progress_id")?),
            series_progress_id: ProgressId::new(row.try_get("series_progress_id")?),
            completed_at: row.try_get("completed_at")?,
            viewed_at: row.try_get("viewed_at")?,
        })
    }
}

impl FromPgRow for Certificate {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: CertificateId::from_uuid(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            series_id: SeriesId::new(row.try_get("series_id")?),
            language_slug: row.try_get("language_slug")?,
            series_slug: row.try_get("series_slug")?,
            series_title: row.try_get("series_title")?,
            lessons: row.try_get("lessons")?,
            read_time_seconds: row.try_get("read_time_seconds")?,
            watch_time_seconds: row.try_get("watch_time_seconds")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}
