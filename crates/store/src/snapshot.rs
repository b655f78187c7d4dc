//! Immutable trust snapshots.
//!
//! A [`TrustSnapshot`] is one complete version of the trusted certificate
//! set together with the certificate designated for issuance. Snapshots are
//! never modified after construction; rotation publishes a new snapshot
//! through [`TrustStore`](crate::trust_store::TrustStore).

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    certificate::{CertificateRecord, SignatureAlgorithm, Thumbprint},
    error::{StoreError, StoreResult},
};

/// One immutable version of the trusted certificate set.
///
/// # Invariants
///
/// - Thumbprints are unique; duplicates collapse to one record, preferring the copy that carries a
///   private key.
/// - If an issuance thumbprint is set, it references a member with a private key.
#[derive(Debug, Clone, Default)]
pub struct TrustSnapshot {
    trusted: HashMap<Thumbprint, Arc<CertificateRecord>>,
    issuance: Option<Thumbprint>,
    generation: u64,
}

impl TrustSnapshot {
    /// Creates an empty snapshot that trusts nothing and cannot issue.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a snapshot with an explicitly designated issuance certificate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidIssuance`] if `issuance` is set but does
    /// not name a member with a private key.
    pub fn new(
        records: impl IntoIterator<Item = CertificateRecord>,
        issuance: Option<Thumbprint>,
    ) -> StoreResult<Self> {
        let trusted = collect_unique(records);

        if let Some(thumbprint) = &issuance {
            let usable = trusted.get(thumbprint).is_some_and(|record| record.has_private_key());
            if !usable {
                return Err(StoreError::invalid_issuance(thumbprint.as_str()));
            }
        }

        Ok(Self { trusted, issuance, generation: 0 })
    }

    /// Builds a snapshot, selecting the issuance certificate automatically.
    ///
    /// Among members with a private key whose validity window contains
    /// `now`, the one with the latest `not_before` is chosen (ties broken by
    /// thumbprint). If no signer is currently valid, the latest signer is
    /// used and a warning is logged. Without any private key the snapshot is
    /// verification-only.
    #[must_use]
    pub fn from_records(
        records: impl IntoIterator<Item = CertificateRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let trusted = collect_unique(records);
        let issuance = select_issuer(&trusted, now);
        Self { trusted, issuance, generation: 0 }
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Resolves a thumbprint (any hex case) to a trusted record.
    #[must_use]
    pub fn lookup(&self, thumbprint: &str) -> Option<Arc<CertificateRecord>> {
        let thumbprint = Thumbprint::parse(thumbprint).ok()?;
        self.trusted.get(&thumbprint).cloned()
    }

    /// Returns `true` if the thumbprint is trusted.
    #[must_use]
    pub fn contains(&self, thumbprint: &Thumbprint) -> bool {
        self.trusted.contains_key(thumbprint)
    }

    /// Returns the issuance certificate, which always carries a private key.
    #[must_use]
    pub fn current_issuer(&self) -> Option<Arc<CertificateRecord>> {
        self.issuance.as_ref().and_then(|thumbprint| self.trusted.get(thumbprint)).cloned()
    }

    /// Returns the issuance thumbprint, if any.
    #[must_use]
    pub fn issuance_thumbprint(&self) -> Option<&Thumbprint> {
        self.issuance.as_ref()
    }

    /// Publish generation assigned by the owning store (0 if never published).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of trusted certificates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trusted.len()
    }

    /// Returns `true` if nothing is trusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trusted.is_empty()
    }

    /// Returns all trusted records ordered by thumbprint.
    #[must_use]
    pub fn records(&self) -> Vec<Arc<CertificateRecord>> {
        let mut records: Vec<_> = self.trusted.values().cloned().collect();
        records.sort_by(|a, b| a.thumbprint().cmp(b.thumbprint()));
        records
    }

    /// Returns a serializable listing of the trusted certificates.
    #[must_use]
    pub fn summaries(&self) -> Vec<CertificateSummary> {
        self.records()
            .iter()
            .map(|record| CertificateSummary {
                thumbprint: record.thumbprint().clone(),
                subject: record.subject().to_owned(),
                algorithm: record.algorithm(),
                not_before: record.not_before(),
                not_after: record.not_after(),
                has_private_key: record.has_private_key(),
                is_issuer: self.issuance.as_ref() == Some(record.thumbprint()),
            })
            .collect()
    }
}

/// Diagnostic view of one trusted certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    /// Certificate thumbprint.
    pub thumbprint: Thumbprint,
    /// Display subject.
    pub subject: String,
    /// Signature algorithm of the certificate key.
    pub algorithm: SignatureAlgorithm,
    /// Start of the certificate validity window.
    pub not_before: DateTime<Utc>,
    /// End of the certificate validity window.
    pub not_after: DateTime<Utc>,
    /// Whether the certificate can sign.
    pub has_private_key: bool,
    /// Whether the certificate is the current issuer.
    pub is_issuer: bool,
}

fn collect_unique(
    records: impl IntoIterator<Item = CertificateRecord>,
) -> HashMap<Thumbprint, Arc<CertificateRecord>> {
    let mut trusted: HashMap<Thumbprint, Arc<CertificateRecord>> = HashMap::new();
    for record in records {
        let keep_existing = trusted
            .get(record.thumbprint())
            .is_some_and(|existing| existing.has_private_key() || !record.has_private_key());
        if keep_existing {
            tracing::debug!(thumbprint = %record.thumbprint(), "duplicate certificate ignored");
            continue;
        }
        trusted.insert(record.thumbprint().clone(), Arc::new(record));
    }
    trusted
}

fn select_issuer(
    trusted: &HashMap<Thumbprint, Arc<CertificateRecord>>,
    now: DateTime<Utc>,
) -> Option<Thumbprint> {
    let signers = || trusted.values().filter(|record| record.has_private_key());

    if let Some(thumbprint) = latest(signers().filter(|record| record.is_within_validity(now))) {
        return Some(thumbprint);
    }

    let fallback = latest(signers());
    if let Some(thumbprint) = &fallback {
        tracing::warn!(
            thumbprint = %thumbprint,
            "no signing certificate is inside its validity window; using the most recent one"
        );
    }
    fallback
}

fn latest<'a>(records: impl Iterator<Item = &'a Arc<CertificateRecord>>) -> Option<Thumbprint> {
    records
        .max_by(|a, b| {
            a.not_before().cmp(&b.not_before()).then_with(|| a.thumbprint().cmp(b.thumbprint()))
        })
        .map(|record| record.thumbprint().clone())
}
