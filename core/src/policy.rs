//! Ownership policy for content mutations.

use crate::error::{CourseError, Result};
use crate::types::UserId;
use serde::{Deserialize, Serialize};

/// The authenticated caller of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// Caller's user id
    pub user_id: UserId,
    /// Staff members may edit any content
    pub is_staff: bool,
}

impl Actor {
    /// A regular user.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_staff: false,
        }
    }

    /// A staff member.
    #[must_use]
    pub const fn staff(user_id: UserId) -> Self {
        Self {
            user_id,
            is_staff: true,
        }
    }

    /// Require the actor to be `author_id` or staff.
    ///
    /// # Errors
    ///
    /// Returns [`CourseError::Forbidden`] otherwise.
    pub fn ensure_can_edit(&self, author_id: UserId) -> Result<()> {
        if self.is_staff || self.user_id == author_id {
            Ok(())
        } else {
            Err(CourseError::Forbidden)
        }
    }
}
