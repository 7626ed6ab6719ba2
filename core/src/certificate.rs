//! Completion certificates.

use crate::content::Series;
use crate::types::{CertificateId, SeriesId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable proof that a user completed a Series.
///
/// The counters are a snapshot taken when the Series was completed and are never updated
/// afterwards. At most one exists per (user, series).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Public id
    pub id: CertificateId,
    /// Holder
    pub user_id: UserId,
    /// Completed Series
    pub series_id: SeriesId,
    /// Language of the Series at issuance
    pub language_slug: String,
    /// Slug of the Series at issuance
    pub series_slug: String,
    /// Title of the Series at issuance
    pub series_title: String,
    /// Published Lessons at issuance
    pub lessons: i32,
    /// Read time at issuance
    pub read_time_seconds: i32,
    /// Watch time at issuance
    pub watch_time_seconds: i32,
    /// When the Series was completed
    pub completed_at: DateTime<Utc>,
}

/// Fields of a new [`Certificate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCertificate {
    /// Pre-generated public id
    pub id: CertificateId,
    /// Holder
    pub user_id: UserId,
    /// Completed Series
    pub series_id: SeriesId,
    /// Language slug snapshot
    pub language_slug: String,
    /// Series slug snapshot
    pub series_slug: String,
    /// Title snapshot
    pub series_title: String,
    /// Lesson count snapshot
    pub lessons: i32,
    /// Read time snapshot
    pub read_time_seconds: i32,
    /// Watch time snapshot
    pub watch_time_seconds: i32,
    /// Completion time
    pub completed_at: DateTime<Utc>,
}

impl NewCertificate {
    /// Snapshot `series` for `user_id`.
    #[must_use]
    pub fn snapshot(user_id: UserId, series: &Series, completed_at: DateTime<Utc>) -> Self {
        Self {
            id: CertificateId::new(),
            user_id,
            series_id: series.id,
            language_slug: series.language_slug.clone(),
            series_slug: series.slug.clone(),
            series_title: series.title.clone(),
            lessons: series.lessons_count,
            read_time_seconds: series.read_time_seconds,
            watch_time_seconds: series.watch_time_seconds,
            completed_at,
        }
    }
}

/// One page of a user's certificates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificatePage {
    /// Certificates, most recently completed first
    pub items: Vec<Certificate>,
    /// Total number of certificates the user holds
    pub total: i64,
}
