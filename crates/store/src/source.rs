//! Certificate sources.
//!
//! A [`CertificateSource`] yields loaded, usable certificate records. How
//! certificates are stored (bundle format, password handling, HSM slots) is
//! the source's business; the trust store only sees [`CertificateRecord`]s.
//!
//! Use [`MemoryCertificateSource`] for tests and for embedding applications
//! that obtain certificates by other means.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    certificate::{CertificateRecord, Thumbprint},
    error::{CertificateLoadError, StoreError, StoreResult},
};

/// Outcome of loading a single certificate.
pub type LoadedCertificate = Result<CertificateRecord, CertificateLoadError>;

/// Provider of the certificates a trust snapshot is built from.
///
/// # Error Handling
///
/// - A certificate that fails to load is reported in place as `Err(CertificateLoadError)`; the
///   loader skips it and continues.
/// - A source that cannot be read at all returns [`StoreError::SourceUnavailable`]; the loader
///   aborts the rotation and keeps the previous snapshot.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Loads every certificate the source currently offers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SourceUnavailable`] if the source cannot be read.
    async fn load_all(&self) -> StoreResult<Vec<LoadedCertificate>>;
}

#[derive(Debug, Default)]
struct MemorySourceState {
    entries: Vec<LoadedCertificate>,
    unavailable: Option<String>,
}

/// In-memory certificate source.
///
/// Cloning shares the underlying state, so a test can keep a handle and
/// add or retire certificates while a loader reads from it.
///
/// # Example
///
/// ```
/// use rollcert_store::{CertificateLoadError, CertificateSource, MemoryCertificateSource};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let source = MemoryCertificateSource::new();
/// source.add_broken(CertificateLoadError::new("cert-2024.pfx", "wrong password"));
///
/// let loaded = source.load_all().await.unwrap();
/// assert_eq!(loaded.len(), 1);
/// assert!(loaded[0].is_err());
/// # });
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryCertificateSource {
    state: Arc<RwLock<MemorySourceState>>,
}

impl MemoryCertificateSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source pre-populated with `records`.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = CertificateRecord>) -> Self {
        let source = Self::new();
        source.state.write().entries.extend(records.into_iter().map(Ok));
        source
    }

    /// Adds a loadable certificate.
    pub fn add(&self, record: CertificateRecord) {
        self.state.write().entries.push(Ok(record));
    }

    /// Adds an entry that fails to load.
    pub fn add_broken(&self, error: CertificateLoadError) {
        self.state.write().entries.push(Err(error));
    }

    /// Removes a certificate, simulating retirement. Returns `true` if it was present.
    pub fn retire(&self, thumbprint: &Thumbprint) -> bool {
        let mut state = self.state.write();
        let before = state.entries.len();
        state
            .entries
            .retain(|entry| !matches!(entry, Ok(record) if record.thumbprint() == thumbprint));
        state.entries.len() != before
    }

    /// Makes subsequent loads fail with `SourceUnavailable` (`Some`) or succeed again (`None`).
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.state.write().unavailable = reason.map(str::to_owned);
    }

    /// Number of entries, including broken ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns `true` if the source has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}

#[async_trait]
impl CertificateSource for MemoryCertificateSource {
    #[tracing::instrument(skip(self))]
    async fn load_all(&self) -> StoreResult<Vec<LoadedCertificate>> {
        let state = self.state.read();
        if let Some(reason) = &state.unavailable {
            return Err(StoreError::source_unavailable(reason.clone()));
        }
        Ok(state.entries.clone())
    }
}
