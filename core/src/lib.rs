//! # KiwiScript Core
//!
//! Core types and traits for the KiwiScript course platform.
//!
//! Courses form a four-level tree:
//!
//! ```text
//! Language ─┬─ Series ─┬─ Section ─┬─ Lesson (Article?, Video?)
//!           │          │           └─ Lesson
//!           │          └─ Section
//!           └─ Series
//! ```
//!
//! Each user's progress mirrors that tree
//! (`LanguageProgress → SeriesProgress → SectionProgress → LessonProgress`) and a fully
//! completed Series yields a [`Certificate`](certificate::Certificate).
//!
//! This crate performs no I/O. It defines:
//!
//! - **Rows**: [`content`], [`progress`] and [`certificate`] records as stored
//! - **Errors**: the [`CourseError`] taxonomy shared by every layer
//! - **Store traits**: [`store::CourseStore`] / [`store::CourseTransaction`], the transactional
//!   boundary implemented by `kiwiscript-postgres` (production) and `kiwiscript-testing`
//!   (in-memory)
//! - **Environment**: the [`environment::Clock`] dependency
//!
//! ## Invariants
//!
//! - Sibling positions under a parent are always a dense permutation of `1..=N`.
//! - Parent aggregates equal the sum over *published* children only.
//! - A progress level is completed exactly when its completed-children counter reaches the
//!   published child count of the content it mirrors.

pub mod certificate;
pub mod content;
pub mod error;
pub mod policy;
pub mod progress;
pub mod reading_time;
pub mod store;
pub mod types;

pub use chrono::{DateTime, Utc};
pub use error::{CourseError, Result};
pub use types::{CertificateId, LessonId, ProgressId, SectionId, SeriesId, UserId};

/// Environment module - Dependency injection traits
///
/// External dependencies the services need besides the store are abstracted here so tests
/// can substitute deterministic implementations.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Every `viewed_at` / `completed_at` stamp written by the services comes from the
    /// injected clock, never from `Utc::now()` directly.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
