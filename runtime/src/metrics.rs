//! Metric names and descriptions.
//!
//! Services emit through the `metrics` facade; whichever recorder the host process installs
//! receives them. Call [`register_metrics`] once at startup so the recorder knows the
//! descriptions.

use metrics::describe_counter;

// Re-export metrics macros for use in other modules
pub use metrics::counter;

/// Sibling rows whose position was shifted by an insert, move or delete.
pub const POSITIONS_SHIFTED: &str = "course_positions_shifted_total";
/// Aggregate deltas applied to a Section or Series.
pub const ROLLUP_ADJUSTMENTS: &str = "course_rollup_adjustments_total";
/// Lessons newly completed.
pub const LESSONS_COMPLETED: &str = "progress_lessons_completed_total";
/// Section progress rows that became completed.
pub const SECTIONS_COMPLETED: &str = "progress_sections_completed_total";
/// Series progress rows that became completed.
pub const SERIES_COMPLETED: &str = "progress_series_completed_total";
/// Progress deletions that reversed a completed cascade.
pub const CASCADE_REVERSALS: &str = "progress_cascade_reversals_total";
/// Certificates created.
pub const CERTIFICATES_ISSUED: &str = "certificates_issued_total";
/// Transactions rolled back because a step failed.
pub const TRANSACTIONS_ROLLED_BACK: &str = "course_transactions_rolled_back_total";

/// Register all metric descriptions.
pub fn register_metrics() {
    // Ordering & rollup
    describe_counter!(
        POSITIONS_SHIFTED,
        "Total number of sibling positions shifted by insert, move or delete"
    );
    describe_counter!(
        ROLLUP_ADJUSTMENTS,
        "Total number of aggregate deltas applied to sections and series"
    );

    // Progress cascade
    describe_counter!(LESSONS_COMPLETED, "Total number of lessons completed");
    describe_counter!(
        SECTIONS_COMPLETED,
        "Total number of section progress rows that became completed"
    );
    describe_counter!(
        SERIES_COMPLETED,
        "Total number of series progress rows that became completed"
    );
    describe_counter!(
        CASCADE_REVERSALS,
        "Total number of progress deletions that reversed a completion cascade"
    );

    // Certificates
    describe_counter!(CERTIFICATES_ISSUED, "Total number of certificates issued");

    // Transactions
    describe_counter!(
        TRANSACTIONS_ROLLED_BACK,
        "Total number of course transactions rolled back after a failed step"
    );
}
