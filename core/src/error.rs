//! Error types for course, progress and certificate operations.

use thiserror::Error;

/// Result type alias for course operations.
pub type Result<T> = std::result::Result<T, CourseError>;

/// Error taxonomy shared by the store and service layers.
///
/// Store implementations translate their native failures into this enum exactly once, at the
/// store boundary. Services never retry; they abort the surrounding transaction and return
/// the error unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CourseError {
    // ═══════════════════════════════════════════════════════════
    // Caller Errors
    // ═══════════════════════════════════════════════════════════

    /// Row absent, or content unpublished where publication was required.
    ///
    /// Carries no detail so existence is not leaked to unauthorised callers.
    #[error("Resource not found")]
    NotFound,

    /// The request is well-formed but violates a domain rule.
    #[error("Validation error: {message}")]
    Validation {
        /// Which rule was violated (e.g. "position out of range")
        message: String,
    },

    /// The request collides with existing state (duplicate row, students on content).
    #[error("Conflict: {message}")]
    Conflict {
        /// What the request collided with
        message: String,
    },

    /// The actor does not own the content.
    #[error("Forbidden")]
    Forbidden,

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Unexpected store failure (should not be exposed to users verbatim).
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl CourseError {
    /// Build a [`CourseError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build a [`CourseError::Conflict`].
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for the error kind.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiwiscript_core::CourseError;
    /// assert_eq!(CourseError::NotFound.code(), "NOT_FOUND");
    /// assert_eq!(CourseError::validation("x").code(), "VALIDATION");
    /// ```
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Validation { .. } => "VALIDATION",
            Self::Conflict { .. } => "CONFLICT",
            Self::Forbidden => "FORBIDDEN",
            Self::Unknown(_) => "UNKNOWN",
        }
    }

    /// Returns `true` if the error was caused by the caller's request.
    ///
    /// # Examples
    ///
    /// ```
    /// # use kiwiscript_core::CourseError;
    /// assert!(CourseError::conflict("Lesson has students").is_user_error());
    /// assert!(!CourseError::Unknown("boom".to_string()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Message safe to surface to an end user.
    ///
    /// Validation and conflict messages identify the offending field; the other kinds
    /// carry nothing beyond their kind.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound => "Resource not found".to_string(),
            Self::Validation { message } | Self::Conflict { message } => message.clone(),
            Self::Forbidden => "Forbidden".to_string(),
            Self::Unknown(_) => "Something went wrong".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_hides_internal_detail() {
        let err = CourseError::Unknown("relation \"series\" does not exist".to_string());
        assert_eq!(err.user_message(), "Something went wrong");
        assert_eq!(CourseError::Forbidden.user_message(), "Forbidden");
    }

    #[test]
    fn validation_and_conflict_keep_detail() {
        assert_eq!(
            CourseError::validation("Position is out of range").user_message(),
            "Position is out of range"
        );
        assert_eq!(
            CourseError::conflict("Series already has a certificate").to_string(),
            "Conflict: Series already has a certificate"
        );
    }
}
