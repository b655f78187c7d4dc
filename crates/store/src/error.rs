//! Trust store error types and result alias.
//!
//! This module defines the errors that can occur while loading certificates
//! and building trust snapshots. Certificate sources must map their internal
//! failures to these standardized variants.
//!
//! # Error Types
//!
//! - [`StoreError::CertificateLoad`] - A single certificate could not be loaded
//! - [`StoreError::SourceUnavailable`] - The certificate source as a whole failed
//! - [`StoreError::NoIssuanceCertificate`] - No loaded certificate can sign
//! - [`StoreError::InvalidIssuance`] - The designated issuer is absent or has no private key
//! - [`StoreError::InvalidCertificate`] - Certificate material is structurally unusable
//!
//! # Example
//!
//! ```
//! use rollcert_store::{StoreError, StoreResult};
//!
//! fn load() -> StoreResult<()> {
//!     Err(StoreError::source_unavailable("certificate directory not mounted"))
//! }
//!
//! assert!(load().unwrap_err().is_transient());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for trust store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure to load one certificate from a [`CertificateSource`].
///
/// Per-certificate failures never abort a rotation: the loader logs the
/// failure and continues with the remaining certificates.
///
/// [`CertificateSource`]: crate::source::CertificateSource
#[derive(Debug, Clone, Error)]
#[error("Failed to load certificate {origin}: {message}")]
pub struct CertificateLoadError {
    /// Where the certificate came from (file name, slot, label).
    pub origin: String,
    /// Description of the failure.
    pub message: String,
}

impl CertificateLoadError {
    /// Creates a new load error for the certificate at `origin`.
    #[must_use]
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self { origin: origin.into(), message: message.into() }
    }
}

/// Errors that can occur while loading certificates or building snapshots.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A single certificate failed to load.
    #[error(transparent)]
    CertificateLoad(#[from] CertificateLoadError),

    /// The certificate source could not be read at all.
    ///
    /// Rotation is aborted and the previously published snapshot stays in
    /// effect.
    #[error("Certificate source unavailable: {message}")]
    SourceUnavailable {
        /// Description of the failure.
        message: String,
        /// The underlying error that made the source unavailable.
        #[source]
        source: Option<BoxError>,
    },

    /// No loaded certificate carries a private key usable for issuance.
    #[error("No issuance certificate available")]
    NoIssuanceCertificate,

    /// The designated issuance certificate is not a trusted member with a
    /// private key.
    #[error("Invalid issuance certificate: {thumbprint}")]
    InvalidIssuance {
        /// Thumbprint that was designated for issuance.
        thumbprint: String,
    },

    /// Certificate key material is malformed.
    #[error("Invalid certificate: {message}")]
    InvalidCertificate {
        /// Description of what is wrong with the certificate.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `SourceUnavailable` error with the given message.
    #[must_use]
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable { message: message.into(), source: None }
    }

    /// Creates a new `SourceUnavailable` error with a message and source error.
    #[must_use]
    pub fn source_unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::SourceUnavailable { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `InvalidIssuance` error for the given thumbprint.
    #[must_use]
    pub fn invalid_issuance(thumbprint: impl Into<String>) -> Self {
        Self::InvalidIssuance { thumbprint: thumbprint.into() }
    }

    /// Creates a new `InvalidCertificate` error with the given message.
    #[must_use]
    pub fn invalid_certificate(message: impl Into<String>) -> Self {
        Self::InvalidCertificate { message: message.into() }
    }

    /// Returns `true` if retrying the load may succeed without operator action.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}
