//! # KiwiScript Runtime
//!
//! The services that keep the course tree and per-user progress consistent.
//!
//! ## Core Components
//!
//! - **Position Manager** ([`positions`]): dense `1..=N` sibling ordering on insert, move
//!   and delete
//! - **Aggregate Rollup Engine** ([`rollup`]): Section/Series counters over published
//!   children, plus drift reconciliation
//! - **Content service** ([`content::ContentService`]): Section, Lesson, Article, Video and
//!   Series edits built on the two above
//! - **Progress Cascade Controller** ([`progress::ProgressService`]): view, complete and
//!   reset progress at every level
//! - **Certificate Issuer** ([`certificates`]): idempotent certificate creation
//!
//! Every public operation runs in exactly one store transaction: it commits when every
//! step succeeded and rolls back otherwise, so a half-applied shift, rollup or cascade is
//! never visible.
//!
//! ## Example
//!
//! ```ignore
//! use kiwiscript_runtime::{ContentService, ProgressService};
//! use kiwiscript_core::environment::SystemClock;
//!
//! let content = ContentService::new(store.clone());
//! let progress = ProgressService::new(store, SystemClock);
//!
//! let lesson = content.create_lesson(author, &section_path, "Borrowing").await?;
//! progress.view_lesson(student, &section_path.lesson(lesson.id)).await?;
//! let done = progress.complete_lesson(student, &section_path.lesson(lesson.id)).await?;
//! ```

use crate::metrics::{TRANSACTIONS_ROLLED_BACK, counter};
use kiwiscript_core::Result;
use kiwiscript_core::store::CourseTransaction;

/// Idempotent certificate issuance and queries
pub mod certificates;

/// Section, Lesson, lesson content and Series edits
pub mod content;

/// Metric names and descriptions
pub mod metrics;

/// Content coordinates
pub mod paths;

/// Dense sibling ordering
pub mod positions;

/// Per-user progress cascade
pub mod progress;

/// Aggregate rollup and reconciliation
pub mod rollup;

pub use certificates::{CertificateService, Issued};
pub use content::{ContentService, CreateSection, CreateSeries, UpdateLesson, UpdateSection};
pub use paths::{LessonPath, SectionPath, SeriesPath};
pub use progress::{CompletedLesson, ProgressService};
pub use rollup::DriftReport;

/// Commit `tx` if `result` is `Ok`, roll it back otherwise.
///
/// A failed rollback is logged and the original error returned; the store discards the
/// transaction's writes when the connection is released either way.
pub(crate) async fn finish<T: CourseTransaction, R>(tx: T, result: Result<R>) -> Result<R> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            tracing::debug!("Transaction committed");
            Ok(value)
        }
        Err(error) => {
            counter!(TRANSACTIONS_ROLLED_BACK).increment(1);
            if let Err(rollback_error) = tx.rollback().await {
                tracing::error!(error = %rollback_error, "Transaction rollback failed");
            }
            if error.is_user_error() {
                tracing::warn!(code = error.code(), error = %error, "Operation rejected");
            } else {
                tracing::error!(error = %error, "Operation failed");
            }
            Err(error)
        }
    }
}
