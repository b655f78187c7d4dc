//! Shared test utilities for trust store testing.
//!
//! This module provides key generators, certificate record factories and
//! assertion macros. It is feature-gated behind `testutil` to prevent
//! leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! rollcert-store = { path = "../store", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use rollcert_store::testutil::{issuer_record, verifier_record};
//! ```

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::SigningKey;
use p256::pkcs8::EncodePrivateKey;
use rand_core::OsRng;

use crate::{
    certificate::{CertificateRecord, PrivateKeyMaterial, PublicKeyMaterial},
    error::{StoreError, StoreResult},
};

/// PKCS#8 v1 prefix for a bare Ed25519 private key (RFC 8410).
const ED25519_PKCS8_PREFIX: [u8; 16] =
    [0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20];

/// Generate a random Ed25519 key pair.
///
/// The private key is PKCS#8 DER, the form [`PrivateKeyMaterial`] expects.
///
/// # Panics
///
/// Panics if the public key bytes are rejected (should not happen).
#[must_use]
pub fn generate_ed25519_keypair() -> (PrivateKeyMaterial, PublicKeyMaterial) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let mut der = Vec::with_capacity(48);
    der.extend_from_slice(&ED25519_PKCS8_PREFIX);
    der.extend_from_slice(signing_key.as_bytes());

    let public_key = PublicKeyMaterial::ed25519(signing_key.verifying_key().as_bytes())
        .expect("generated Ed25519 key is valid");
    (PrivateKeyMaterial::from_der(der), public_key)
}

/// Generate a random P-256 key pair.
///
/// # Panics
///
/// Panics if PKCS#8 encoding fails (should not happen).
#[must_use]
pub fn generate_p256_keypair() -> (PrivateKeyMaterial, PublicKeyMaterial) {
    let signing_key = p256::ecdsa::SigningKey::random(&mut OsRng);
    let der = signing_key.to_pkcs8_der().expect("PKCS#8 encoding");
    let point = signing_key.verifying_key().to_encoded_point(false);
    let public_key =
        PublicKeyMaterial::p256_sec1(point.as_bytes()).expect("generated P-256 key is valid");
    (PrivateKeyMaterial::from_der(der.as_bytes().to_vec()), public_key)
}

/// Synthetic DER for a test certificate; the thumbprint derives from it.
#[must_use]
pub fn test_der(label: &str) -> Vec<u8> {
    format!("rollcert-test-certificate:{label}").into_bytes()
}

/// Create an Ed25519 record with a private key, valid from 1 day ago to 30 days ahead.
#[must_use]
pub fn issuer_record(label: &str) -> CertificateRecord {
    let now = Utc::now();
    issuer_record_with_window(label, now - Duration::days(1), now + Duration::days(30))
}

/// Create an Ed25519 record with a private key and an explicit validity window.
///
/// # Panics
///
/// Panics if the window is inverted.
#[must_use]
pub fn issuer_record_with_window(
    label: &str,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
) -> CertificateRecord {
    let (private_key, public_key) = generate_ed25519_keypair();
    build(label, public_key, Some(private_key), not_before, not_after)
        .expect("valid issuer record")
}

/// Create a P-256 record with a private key, valid from 1 day ago to 30 days ahead.
#[must_use]
pub fn p256_issuer_record(label: &str) -> CertificateRecord {
    let now = Utc::now();
    let (private_key, public_key) = generate_p256_keypair();
    build(label, public_key, Some(private_key), now - Duration::days(1), now + Duration::days(30))
        .expect("valid P-256 issuer record")
}

/// Create an Ed25519 record without a private key (verification only).
#[must_use]
pub fn verifier_record(label: &str) -> CertificateRecord {
    let now = Utc::now();
    let (_, public_key) = generate_ed25519_keypair();
    build(label, public_key, None, now - Duration::days(1), now + Duration::days(30))
        .expect("valid verifier record")
}

fn build(
    label: &str,
    public_key: PublicKeyMaterial,
    private_key: Option<PrivateKeyMaterial>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
) -> StoreResult<CertificateRecord> {
    CertificateRecord::builder()
        .der(test_der(label))
        .subject(format!("CN={label}"))
        .public_key(public_key)
        .maybe_private_key(private_key)
        .not_before(not_before)
        .not_after(not_after)
        .build()
}

/// Assert that a [`StoreResult`] is a [`StoreError::SourceUnavailable`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use rollcert_store::assert_source_unavailable;
/// use rollcert_store::error::{StoreError, StoreResult};
///
/// let result: StoreResult<()> = Err(StoreError::source_unavailable("share offline"));
/// assert_source_unavailable!(result);
/// ```
#[macro_export]
macro_rules! assert_source_unavailable {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StoreError::SourceUnavailable { .. })),
            "expected StoreError::SourceUnavailable, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StoreError::SourceUnavailable { .. })),
            "{}: expected StoreError::SourceUnavailable, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Helper to verify that a result is a `SourceUnavailable` error.
pub fn is_source_unavailable<T>(result: &StoreResult<T>) -> bool {
    matches!(result, Err(StoreError::SourceUnavailable { .. }))
}
