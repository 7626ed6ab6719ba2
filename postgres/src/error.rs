//! Translation of sqlx failures into course errors.

use kiwiscript_core::CourseError;
use thiserror::Error;

/// Errors raised while setting up the store, before any course operation runs.
#[derive(Error, Debug)]
pub enum PostgresError {
    /// The pool could not connect.
    #[error("Failed to connect to PostgreSQL: {0}")]
    Connect(#[source] sqlx::Error),

    /// Applying the bundled migrations failed.
    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

// SQLSTATE codes
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// Map a sqlx error to a [`CourseError`].
///
/// Unique violations become `Conflict` (with a message chosen from the constraint),
/// foreign key violations and missing rows `NotFound`, check violations `Validation`.
/// Everything else, deadlocks and serialization failures included, is `Unknown`.
pub(crate) fn map_db_error(error: sqlx::Error) -> CourseError {
    match &error {
        sqlx::Error::RowNotFound => CourseError::NotFound,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => CourseError::conflict(conflict_message(db.constraint())),
            Some(FOREIGN_KEY_VIOLATION) => CourseError::NotFound,
            Some(CHECK_VIOLATION) => CourseError::validation(format!(
                "Constraint {} violated",
                db.constraint().unwrap_or("check")
            )),
            _ => unknown(&error),
        },
        _ => unknown(&error),
    }
}

fn unknown(error: &sqlx::Error) -> CourseError {
    tracing::error!(%error, "Database error");
    metrics::counter!("postgres_errors_total").increment(1);
    CourseError::Unknown(error.to_string())
}

/// User-facing message for a violated unique constraint.
fn conflict_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("languages_pkey") => "Language already exists",
        Some("series_slug_key") => "Series already exists",
        Some("series_sections_position_key" | "lessons_position_key") => {
            "Position is already taken"
        }
        Some("lesson_articles_pkey") => "Lesson already has an article",
        Some("lesson_videos_pkey") => "Lesson already has a video",
        Some("language_progress_user_key") => "Language progress already exists",
        Some("series_progress_user_key") => "Series progress already exists",
        Some("section_progress_user_key") => "Section progress already exists",
        Some("lesson_progress_user_key") => "Lesson progress already exists",
        Some("certificates_user_series_key" | "certificates_pkey") => {
            "Series already has a certificate"
        }
        _ => "Already exists",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rows_are_not_found() {
        assert_eq!(map_db_error(sqlx::Error::RowNotFound), CourseError::NotFound);
    }

    #[test]
    fn infrastructure_failures_are_unknown() {
        assert!(matches!(
            map_db_error(sqlx::Error::PoolTimedOut),
            CourseError::Unknown(_)
        ));
        assert!(!map_db_error(sqlx::Error::PoolClosed).is_user_error());
    }

    #[test]
    fn constraints_name_the_duplicate() {
        assert_eq!(
            conflict_message(Some("series_slug_key")),
            "Series already exists"
        );
        assert_eq!(
            conflict_message(Some("certificates_user_series_key")),
            "Series already has a certificate"
        );
        assert_eq!(conflict_message(None), "Already exists");
    }
}
