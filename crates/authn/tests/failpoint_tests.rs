#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection in the authn crate.
//!
//! These tests require both `failpoints` and `testutil` features:
//! ```bash
//! cargo test -p rollcert-authn --features failpoints,testutil --test failpoint_tests
//! ```

use rollcert_authn::{IssuanceError, ValidationOutcome, assert_outcome, testutil::Fixture};
use rollcert_store::testutil::issuer_record;

#[test]
fn issuer_sign_failpoint_returns_signing_failure() {
    let scenario = fail::FailScenario::setup();
    let fixture = Fixture::with_records([issuer_record("a")]);

    fail::cfg("issuer-before-sign", "return").expect("failed to configure fail point");

    let result = fixture.issuer.issue_default("user-1");
    assert!(
        matches!(result, Err(IssuanceError::SigningFailure { .. })),
        "issuance should fail when fail point is active, got: {result:?}"
    );
    if let Err(err) = result {
        assert_eq!(err.public_message(), "token issuance failed");
    }

    scenario.teardown();
}

#[test]
fn issuer_sign_without_failpoint_succeeds() {
    let scenario = fail::FailScenario::setup();
    let fixture = Fixture::with_records([issuer_record("a")]);

    let token = fixture.issuer.issue_default("user-1").expect("issuance should succeed");
    assert_outcome!(fixture.validator.validate_default(token.encoded()), ValidationOutcome::Valid);

    scenario.teardown();
}

#[test]
fn issuer_recovers_after_failpoint_removed() {
    let scenario = fail::FailScenario::setup();
    let fixture = Fixture::with_records([issuer_record("a")]);

    fail::cfg("issuer-before-sign", "return").expect("failed to configure fail point");
    assert!(fixture.issuer.issue_default("user-1").is_err());

    fail::remove("issuer-before-sign");
    let token = fixture.issuer.issue_default("user-1").expect("issuance should recover");
    assert_outcome!(fixture.validator.validate_default(token.encoded()), ValidationOutcome::Valid);

    scenario.teardown();
}
