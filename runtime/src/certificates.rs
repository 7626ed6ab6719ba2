//! Certificate Issuer.
//!
//! A certificate is created once per (user, series) from a snapshot of the Series taken
//! when the user's SeriesProgress becomes completed. Concurrent issuers converge on one
//! row: the loser of the insert race reads the winner's certificate back instead of
//! failing.

use crate::finish;
use crate::metrics::{CERTIFICATES_ISSUED, counter};
use crate::paths::SeriesPath;
use chrono::{DateTime, Utc};
use kiwiscript_core::certificate::{Certificate, CertificatePage, NewCertificate};
use kiwiscript_core::content::Series;
use kiwiscript_core::store::{CourseStore, CourseTransaction};
use kiwiscript_core::{CertificateId, CourseError, Result, UserId};

/// Largest page [`CertificateService::list_certificates`] returns.
pub const MAX_PAGE_SIZE: i64 = 100;

/// A certificate and whether this call created it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issued {
    /// The (user, series) certificate
    pub certificate: Certificate,
    /// `false` when it already existed
    pub newly_issued: bool,
}

/// Find the certificate of (`user_id`, `series`) or create it from a snapshot of `series`.
///
/// # Errors
///
/// Propagates store failures. A uniqueness conflict on insert is resolved by reading the
/// existing row.
pub async fn find_or_issue<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    series: &Series,
    completed_at: DateTime<Utc>,
) -> Result<Issued> {
    if let Some(certificate) = tx.find_certificate_for(user_id, series.id).await? {
        tracing::debug!(certificate_id = %certificate.id, "Certificate already issued");
        return Ok(Issued {
            certificate,
            newly_issued: false,
        });
    }

    match tx
        .create_certificate(NewCertificate::snapshot(user_id, series, completed_at))
        .await
    {
        Ok(certificate) => {
            counter!(CERTIFICATES_ISSUED).increment(1);
            tracing::info!(
                certificate_id = %certificate.id,
                %user_id,
                series_id = %series.id,
                lessons = certificate.lessons,
                "Certificate issued"
            );
            Ok(Issued {
                certificate,
                newly_issued: true,
            })
        }
        Err(CourseError::Conflict { .. }) => {
            let certificate = tx
                .find_certificate_for(user_id, series.id)
                .await?
                .ok_or_else(|| {
                    CourseError::Unknown("certificate conflict without existing row".to_string())
                })?;
            tracing::debug!(certificate_id = %certificate.id, "Lost certificate race");
            Ok(Issued {
                certificate,
                newly_issued: false,
            })
        }
        Err(error) => Err(error),
    }
}

/// Certificate operations.
#[derive(Clone, Debug)]
pub struct CertificateService<S> {
    store: S,
}

impl<S: CourseStore> CertificateService<S> {
    /// Create a service over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Find or create the certificate of a user who completed a published Series.
    ///
    /// # Errors
    ///
    /// `NotFound` if the Series is unpublished or the user never started it,
    /// `Validation` if the user has not completed it.
    #[tracing::instrument(skip(self))]
    pub async fn find_or_create(&self, user_id: UserId, path: &SeriesPath) -> Result<Issued> {
        let mut tx = self.store.begin().await?;
        let result = find_or_create_in(&mut tx, user_id, path).await;
        finish(tx, result).await
    }

    /// Find a certificate by id.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn find_certificate(&self, id: CertificateId) -> Result<Certificate> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .find_certificate(id)
            .await
            .and_then(|found| found.ok_or(CourseError::NotFound));
        finish(tx, result).await
    }

    /// One page of a user's certificates, most recent first.
    ///
    /// # Errors
    ///
    /// `Validation` for a negative offset or a limit outside `1..=100`.
    #[tracing::instrument(skip(self))]
    pub async fn list_certificates(
        &self,
        user_id: UserId,
        offset: i64,
        limit: i64,
    ) -> Result<CertificatePage> {
        if offset < 0 {
            return Err(CourseError::validation("Offset must not be negative"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(CourseError::validation("Limit must be between 1 and 100"));
        }
        let mut tx = self.store.begin().await?;
        let result = list_in(&mut tx, user_id, offset, limit).await;
        finish(tx, result).await
    }
}

async fn find_or_create_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    path: &SeriesPath,
) -> Result<Issued> {
    let series = tx
        .find_series(&path.language_slug, &path.series_slug)
        .await?
        .filter(|series| series.is_published)
        .ok_or(CourseError::NotFound)?;
    let progress = tx
        .find_series_progress(user_id, series.id)
        .await?
        .ok_or(CourseError::NotFound)?;
    let Some(completed_at) = progress.completed_at else {
        return Err(CourseError::validation("Series is not completed"));
    };
    find_or_issue(tx, user_id, &series, completed_at).await
}

async fn list_in<T: CourseTransaction>(
    tx: &mut T,
    user_id: UserId,
    offset: i64,
    limit: i64,
) -> Result<CertificatePage> {
    let total = tx.count_certificates(user_id).await?;
    let items = tx.list_certificates(user_id, offset, limit).await?;
    Ok(CertificatePage { items, total })
}
