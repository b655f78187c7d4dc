//! Shared test utilities for token issuance and validation.
//!
//! This module provides a ready-made issuer/validator pair over a shared
//! trust store, helpers for signing arbitrary claims (for boundary and
//! attack testing) and for crafting raw token strings. It is feature-gated
//! behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! rollcert-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use rollcert_authn::testutil::{Fixture, sign_claims};
//! ```

use std::{sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use rollcert_store::{CertificateRecord, TrustSnapshot, TrustStore};

use crate::{
    canonical::{self, TokenClaims, TokenHeader},
    config::{IssuerConfig, ValidatorConfig},
    issuer::{TokenIssuer, generate_token_id},
    validator::TokenValidator,
};

/// Issuer name used by [`test_issuer_config`].
pub const TEST_ISSUER: &str = "rollcert-test";

/// Audience used by the test configs.
pub const TEST_AUDIENCE: &str = "api";

/// Issuer config: issuer `rollcert-test`, audience `api`, 1h default, 24h max.
///
/// # Panics
///
/// Panics if the config is rejected (should not happen).
#[must_use]
pub fn test_issuer_config() -> IssuerConfig {
    IssuerConfig::builder()
        .issuer(TEST_ISSUER)
        .default_audience(TEST_AUDIENCE)
        .build()
        .expect("valid test issuer config")
}

/// Validator config: audience `api`, no leeway.
///
/// # Panics
///
/// Panics if the config is rejected (should not happen).
#[must_use]
pub fn test_validator_config() -> ValidatorConfig {
    test_validator_config_with_leeway(Duration::ZERO)
}

/// Validator config: audience `api` with the given leeway.
///
/// # Panics
///
/// Panics if `leeway` exceeds the allowed maximum.
#[must_use]
pub fn test_validator_config_with_leeway(leeway: Duration) -> ValidatorConfig {
    ValidatorConfig::builder()
        .expected_audience(TEST_AUDIENCE)
        .leeway(leeway)
        .build()
        .expect("valid test validator config")
}

/// An issuer and a validator sharing one trust store.
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Shared trust store.
    pub store: Arc<TrustStore>,
    /// Issuer over `store`.
    pub issuer: TokenIssuer,
    /// Validator over `store`.
    pub validator: TokenValidator,
}

impl Fixture {
    /// Builds a fixture whose store holds `records` at generation 1.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = CertificateRecord>) -> Self {
        Self::with_records_and_leeway(records, Duration::ZERO)
    }

    /// Builds a fixture whose validator tolerates `leeway` of clock skew.
    ///
    /// # Panics
    ///
    /// Panics if the test configs are rejected.
    #[must_use]
    pub fn with_records_and_leeway(
        records: impl IntoIterator<Item = CertificateRecord>,
        leeway: Duration,
    ) -> Self {
        let store = Arc::new(TrustStore::new(TrustSnapshot::from_records(records, Utc::now())));

        let issuer =
            TokenIssuer::new(Arc::clone(&store), test_issuer_config()).expect("valid issuer");
        let validator =
            TokenValidator::new(Arc::clone(&store), test_validator_config_with_leeway(leeway))
                .expect("valid validator");
        Self { store, issuer, validator }
    }

    /// Replaces the trusted set, returning the new generation.
    pub fn rotate_to(&self, records: impl IntoIterator<Item = CertificateRecord>) -> u64 {
        self.store.rotate(TrustSnapshot::from_records(records, Utc::now()))
    }

    /// Claims that pass every gate: fresh id, valid for one hour from
    /// `now`, naming `signer` and the fixture's audience.
    #[must_use]
    pub fn claims_for(&self, signer: &CertificateRecord, now: DateTime<Utc>) -> TokenClaims {
        let issued_at = now.trunc_subsecs(0);
        TokenClaims {
            jti: generate_token_id(),
            iss: self.issuer.config().issuer().to_owned(),
            sub: "user-1".to_owned(),
            aud: self.validator.config().expected_audience().to_owned(),
            iat: issued_at,
            nbf: issued_at,
            exp: issued_at + TimeDelta::hours(1),
            x5t: Some(signer.thumbprint().to_string()),
        }
    }
}

/// Signs arbitrary header and claims with `signer`'s private key.
///
/// The header is used as given, so it may advertise a key other than the
/// signer's.
///
/// # Panics
///
/// Panics if `signer` has no private key or signing fails.
#[must_use]
pub fn sign_claims(signer: &CertificateRecord, header: &TokenHeader, claims: &TokenClaims) -> String {
    let private_key = signer.private_key().expect("signer has a private key");
    let input = canonical::signing_input(header, claims).expect("serializable token");
    let signature = jsonwebtoken::crypto::sign(
        input.as_bytes(),
        &private_key.encoding_key(signer.algorithm()),
        signer.algorithm().jwt_algorithm(),
    )
    .expect("signing succeeds");
    canonical::assemble(&input, &signature)
}

/// Creates a raw token string from arbitrary header and claims JSON.
///
/// The result is `{header_b64}.{claims_b64}.` with an empty signature.
///
/// # Panics
///
/// Panics if JSON serialization fails.
#[must_use]
pub fn craft_raw_token(header_json: &serde_json::Value, claims_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims_json).expect("claims json"));
    format!("{header_b64}.{claims_b64}.")
}

/// Replaces one segment (0 = header, 1 = claims, 2 = signature) of an
/// encoded token with the base64url encoding of `bytes`.
///
/// # Panics
///
/// Panics if `token` does not have three segments or `index > 2`.
#[must_use]
pub fn replace_segment(token: &str, index: usize, bytes: &[u8]) -> String {
    let mut segments: Vec<String> = token.split('.').map(str::to_owned).collect();
    assert_eq!(segments.len(), 3, "token must have three segments");
    segments[index] = URL_SAFE_NO_PAD.encode(bytes);
    segments.join(".")
}

/// Asserts that a [`ValidationResult`](crate::validator::ValidationResult)
/// has the given outcome.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use rollcert_authn::{ValidationOutcome, assert_outcome};
/// # fn check(result: rollcert_authn::ValidationResult) {
/// assert_outcome!(result, ValidationOutcome::Expired);
/// # }
/// ```
#[macro_export]
macro_rules! assert_outcome {
    ($result:expr, $outcome:expr) => {{
        let result = &$result;
        assert_eq!(
            result.outcome(),
            $outcome,
            "unexpected outcome (detail: {})",
            result.detail(),
        );
    }};
    ($result:expr, $outcome:expr, $msg:expr) => {{
        let result = &$result;
        assert_eq!(
            result.outcome(),
            $outcome,
            "{} (detail: {})",
            $msg,
            result.detail(),
        );
    }};
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rollcert_store::testutil::issuer_record;
    use serde_json::json;

    use super::*;
    use crate::validator::ValidationOutcome;

    #[test]
    fn test_fixture_shares_store() {
        let fixture = Fixture::with_records([issuer_record("a")]);
        assert_eq!(fixture.store.generation(), 1);

        let token = fixture.issuer.issue_default("user-1").unwrap();
        assert_outcome!(fixture.validator.validate_default(token.encoded()), ValidationOutcome::Valid);

        assert_eq!(fixture.rotate_to([issuer_record("b")]), 2);
        assert_outcome!(
            fixture.validator.validate_default(token.encoded()),
            ValidationOutcome::CertificateNotTrusted
        );
    }

    #[test]
    fn test_sign_claims_produces_valid_token() {
        let record = issuer_record("a");
        let fixture = Fixture::with_records([record.clone()]);
        let claims = fixture.claims_for(&record, Utc::now());
        let token = sign_claims(&record, &TokenHeader::for_key(record.public_key()), &claims);

        let result = fixture.validator.validate_default(&token);
        assert_outcome!(result, ValidationOutcome::Valid, "hand-signed claims should validate");
        assert_eq!(result.resolved().unwrap().token_id, claims.jti);
    }

    #[test]
    fn test_craft_raw_token_format() {
        let token = craft_raw_token(&json!({"alg": "none"}), &json!({"sub": "test"}));
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[2].is_empty(), "signature should be empty for raw tokens");
    }

    #[test]
    fn test_replace_segment() {
        let replaced = replace_segment("a.b.c", 1, b"{}");
        assert_eq!(replaced, "a.e30.c");
    }
}
