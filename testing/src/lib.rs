//! # KiwiScript Testing
//!
//! Testing utilities for the KiwiScript services.
//!
//! This crate provides:
//! - [`InMemoryCourseStore`]: a transactional in-memory [`CourseStore`](kiwiscript_core::store::CourseStore)
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - [`fixtures`]: a builder for whole courses
//! - [`invariants`]: assertions for the ordering, rollup and progress invariants
//! - [`properties`]: proptest strategies for edit sequences
//!
//! ## Example
//!
//! ```ignore
//! use kiwiscript_testing::{InMemoryCourseStore, fixtures::{CourseBuilder, SectionSpec, LessonSpec}};
//!
//! #[tokio::test]
//! async fn test_course() {
//!     let store = InMemoryCourseStore::new();
//!     let course = CourseBuilder::new("rust", "basics")
//!         .section(SectionSpec::published("Intro").lesson(LessonSpec::video(120)))
//!         .build(&store)
//!         .await
//!         .unwrap();
//!     kiwiscript_testing::invariants::assert_course_consistent(&store, course.series.id).await;
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use kiwiscript_core::environment::Clock;

pub mod fixtures;
pub mod invariants;
mod memory;
pub mod properties;

pub use memory::{InMemoryCourseStore, InMemoryTransaction};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use kiwiscript_testing::mocks::FixedClock;
    /// use kiwiscript_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// The instant every test clock starts at (2025-01-01 00:00:00 UTC).
    #[must_use]
    pub fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give another to a
    /// service.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        millis: Arc<AtomicI64>,
    }

    impl ManualClock {
        /// Start at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                millis: Arc::new(AtomicI64::new(time.timestamp_millis())),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(epoch())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};

#[cfg(test)]
#[allow(clippy::expect_used)] // Test code uses expect for clear failure messages
mod tests {
    use super::*;
    use kiwiscript_core::content::NewLanguage;
    use kiwiscript_core::store::{CourseStore, CourseTransaction};
    use kiwiscript_core::{CourseError, UserId};

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), mocks::epoch());
    }

    #[test]
    fn manual_clock_advances_all_clones() {
        let clock = ManualClock::default();
        let handle = clock.clone();
        handle.advance(Duration::seconds(90));
        assert_eq!(clock.now() - mocks::epoch(), Duration::seconds(90));
    }

    fn rust() -> NewLanguage {
        NewLanguage {
            slug: "rust".to_string(),
            name: "Rust".to_string(),
            author_id: UserId::new(1),
        }
    }

    #[test]
    fn dropped_transaction_discards_writes() {
        tokio_test::block_on(async {
            let store = InMemoryCourseStore::new();

            let mut tx = store.begin().await.expect("begin");
            tx.create_language(rust()).await.expect("create language");
            drop(tx);

            let mut tx = store.begin().await.expect("begin");
            assert_eq!(tx.find_language("rust").await, Ok(None));
        });
    }

    #[test]
    fn injected_failure_surfaces_as_unknown() {
        tokio_test::block_on(async {
            let store = InMemoryCourseStore::new();
            store.fail_on("create_language").await;

            let mut tx = store.begin().await.expect("begin");
            let result = tx.create_language(rust()).await;
            assert!(matches!(result, Err(CourseError::Unknown(_))));
        });
    }
}
