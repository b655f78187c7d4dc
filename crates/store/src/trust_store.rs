//! Rotating trust store.
//!
//! [`TrustStore`] is the shared handle that issuers and validators read the
//! current [`TrustSnapshot`] from. Rotation never edits a snapshot in place:
//! a complete replacement is built first and then published with a single
//! atomic pointer swap.
//!
//! # Architecture
//!
//! ```text
//! TrustStoreLoader ──build──► TrustSnapshot (gen N+1)
//!                                  │
//!                             rotate(): ArcSwap::store
//!                                  ▼
//! TrustStore ──load_full()──► Arc<TrustSnapshot> ──► TokenIssuer / TokenValidator
//! ```
//!
//! Readers take an `Arc` to whichever snapshot is current and keep using it
//! for the whole operation, so a validation running across a rotation sees
//! either the old set or the new set in full, never a mix. Old snapshots are
//! released when their last reader drops them.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::{
    certificate::CertificateRecord,
    snapshot::{CertificateSummary, TrustSnapshot},
};

/// Shared, atomically rotated trust store.
///
/// The read path (`snapshot`, `lookup`, `current_issuer`) is lock-free.
/// Rotations are serialized by a writer mutex so generations increase
/// strictly.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use rollcert_store::{TrustSnapshot, TrustStore};
///
/// let store = TrustStore::new(TrustSnapshot::empty());
/// assert_eq!(store.generation(), 1);
///
/// let previous = store.snapshot();
/// let generation = store.rotate(TrustSnapshot::from_records([], Utc::now()));
///
/// assert_eq!(generation, 2);
/// assert_eq!(previous.generation(), 1);
/// ```
#[derive(Debug)]
pub struct TrustStore {
    current: ArcSwap<TrustSnapshot>,
    writer: Mutex<()>,
}

impl TrustStore {
    /// Creates a store publishing `initial` as generation 1.
    #[must_use]
    pub fn new(initial: TrustSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial.with_generation(1)),
            writer: Mutex::new(()),
        }
    }

    /// Creates a store with nothing trusted.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(TrustSnapshot::empty())
    }

    /// Returns the current snapshot.
    ///
    /// The returned `Arc` stays valid and unchanged for as long as the caller
    /// holds it, regardless of later rotations.
    #[must_use]
    pub fn snapshot(&self) -> Arc<TrustSnapshot> {
        self.current.load_full()
    }

    /// Resolves a thumbprint against the current snapshot.
    #[must_use]
    pub fn lookup(&self, thumbprint: &str) -> Option<Arc<CertificateRecord>> {
        self.current.load().lookup(thumbprint)
    }

    /// Returns the current issuance certificate.
    #[must_use]
    pub fn current_issuer(&self) -> Option<Arc<CertificateRecord>> {
        self.current.load().current_issuer()
    }

    /// Generation of the current snapshot.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    /// Lists the certificates in the current snapshot.
    #[must_use]
    pub fn summaries(&self) -> Vec<CertificateSummary> {
        self.current.load().summaries()
    }

    /// Publishes a fully built snapshot, replacing the current one.
    ///
    /// Returns the generation assigned to the published snapshot.
    #[tracing::instrument(skip(self, next), fields(trusted = next.len()))]
    pub fn rotate(&self, next: TrustSnapshot) -> u64 {
        let _guard = self.writer.lock();
        let previous = self.current.load_full();
        let generation = previous.generation() + 1;
        let next = next.with_generation(generation);

        let issuer = next.issuance_thumbprint().map(ToString::to_string);
        let previous_issuer = previous.issuance_thumbprint().map(ToString::to_string);
        let trusted = next.len();

        self.current.store(Arc::new(next));

        if issuer != previous_issuer {
            tracing::info!(
                previous_issuer = previous_issuer.as_deref().unwrap_or("none"),
                issuer = issuer.as_deref().unwrap_or("none"),
                "issuance certificate changed"
            );
        }
        tracing::info!(
            audit.action = "rotate_trust_store",
            audit.result = "success",
            generation,
            previous_generation = previous.generation(),
            trusted,
            "audit_event"
        );

        generation
    }
}

impl Default for TrustStore {
    fn default() -> Self {
        Self::empty()
    }
}
