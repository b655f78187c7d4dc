//! Rolling certificate trust store.
//!
//! This crate holds the set of certificates a token issuer signs with and a
//! token validator trusts. The set changes over time: certificates are
//! added, retired, and replaced while requests keep flowing. Every change
//! is published as a complete, immutable [`TrustSnapshot`], so concurrent
//! readers never observe a half-rotated set.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │             TokenIssuer / TokenValidator                    │
//! │                  (rollcert-authn)                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │   TrustStore: ArcSwap<TrustSnapshot>, lock-free reads       │
//! ├─────────────────────────────────────────────────────────────┤
//! │   TrustStoreLoader: load, skip bad certificates, rotate     │
//! ├──────────────────────────┬──────────────────────────────────┤
//! │ MemoryCertificateSource  │   your CertificateSource impl    │
//! └──────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use rollcert_store::{
//!     LoaderConfig, MemoryCertificateSource, TrustStore, TrustStoreLoader,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(MemoryCertificateSource::new());
//!     let store = Arc::new(TrustStore::empty());
//!
//!     let loader = TrustStoreLoader::new(source, Arc::clone(&store), LoaderConfig::default());
//!     let report = loader.load().await?;
//!
//!     assert_eq!(report.generation, store.generation());
//!     assert!(store.current_issuer().is_none());
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Fallible operations return [`StoreResult<T>`]. A certificate that fails
//! to load is reported as a [`CertificateLoadError`] and skipped; a source
//! that cannot be read at all aborts the rotation with
//! [`StoreError::SourceUnavailable`] and the previous snapshot stays live.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with key generators, record factories and
//!   assertion macros. Enable this in `[dev-dependencies]` for integration tests.
//! - **`failpoints`**: Compiles the `fail` fail points (`loader-before-load`) into the loader.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod certificate;
pub mod error;
pub mod loader;
pub mod snapshot;
pub mod source;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod trust_store;

// Re-export primary types at crate root for convenience
pub use certificate::{
    CertificateRecord, MIN_RSA_MODULUS_BYTES, PrivateKeyMaterial, PublicKeyMaterial,
    SignatureAlgorithm, Thumbprint,
};
pub use error::{BoxError, CertificateLoadError, StoreError, StoreResult};
pub use loader::{LoadReport, LoaderConfig, TrustStoreLoader};
pub use snapshot::{CertificateSummary, TrustSnapshot};
pub use source::{CertificateSource, LoadedCertificate, MemoryCertificateSource};
pub use trust_store::TrustStore;
