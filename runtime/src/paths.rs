//! Content coordinates as callers address them.
//!
//! Languages and Series are addressed by slug, Sections and Lessons by id under their
//! parents. A Section or Lesson that exists but under a different parent is reported as
//! not found.

use kiwiscript_core::{LessonId, SectionId};
use std::fmt;

/// `language_slug / series_slug`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SeriesPath {
    /// Language slug
    pub language_slug: String,
    /// Series slug
    pub series_slug: String,
}

impl SeriesPath {
    /// Address a Series.
    #[must_use]
    pub fn new(language_slug: impl Into<String>, series_slug: impl Into<String>) -> Self {
        Self {
            language_slug: language_slug.into(),
            series_slug: series_slug.into(),
        }
    }

    /// Address a Section of this Series.
    #[must_use]
    pub fn section(&self, section_id: SectionId) -> SectionPath {
        SectionPath {
            series: self.clone(),
            section_id,
        }
    }
}

impl fmt::Display for SeriesPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.language_slug, self.series_slug)
    }
}

/// `language_slug / series_slug / section_id`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SectionPath {
    /// Parent Series
    pub series: SeriesPath,
    /// Section id
    pub section_id: SectionId,
}

impl SectionPath {
    /// Address a Lesson of this Section.
    #[must_use]
    pub fn lesson(&self, lesson_id: LessonId) -> LessonPath {
        LessonPath {
            section: self.clone(),
            lesson_id,
        }
    }
}

impl fmt::Display for SectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.series, self.section_id)
    }
}

/// `language_slug / series_slug / section_id / lesson_id`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LessonPath {
    /// Parent Section
    pub section: SectionPath,
    /// Lesson id
    pub lesson_id: LessonId,
}

impl LessonPath {
    /// The Series this Lesson belongs to.
    #[must_use]
    pub const fn series(&self) -> &SeriesPath {
        &self.section.series
    }
}

impl fmt::Display for LessonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.section, self.lesson_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_full_path() {
        let path = SeriesPath::new("rust", "ownership")
            .section(SectionId::new(3))
            .lesson(LessonId::new(7));
        assert_eq!(path.to_string(), "rust/ownership/3/7");
        assert_eq!(path.series().series_slug, "ownership");
    }
}
