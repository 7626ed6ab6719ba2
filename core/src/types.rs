//! Identifier newtypes.
//!
//! Content and progress rows are keyed by store-assigned serial integers; certificates are
//! keyed by a random UUID so their ids can be shared publicly without being enumerable.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! serial_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(i32);

        impl $name {
            #[doc = concat!("Create a `", stringify!($name), "` from a raw store id")]
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the raw store id
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

serial_id!(
    /// Identifier of a user (issued by the excluded account service)
    UserId
);

serial_id!(
    /// Identifier of a [`Series`](crate::content::Series)
    SeriesId
);

serial_id!(
    /// Identifier of a [`Section`](crate::content::Section)
    SectionId
);

serial_id!(
    /// Identifier of a [`Lesson`](crate::content::Lesson)
    LessonId
);

serial_id!(
    /// Identifier of a progress row (any level)
    ProgressId
);

/// Unique identifier for a certificate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateId(Uuid);

impl CertificateId {
    /// Creates a new random `CertificateId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `CertificateId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CertificateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
