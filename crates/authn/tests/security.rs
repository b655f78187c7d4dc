//! Security-focused token tests.
//!
//! These tests exercise the issue/validate pipeline end to end against the
//! attacks and boundary conditions a token validator has to withstand:
//! tampering, algorithm substitution, key substitution, untrusted and
//! retired signers, validity window edges, audience confusion and
//! certificate rotation while validations are in flight.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use chrono::{Duration as ChronoDuration, SubsecRound, Utc};
use rollcert_authn::{
    ValidationOutcome,
    assert_outcome,
    canonical::{self, MAX_TOKEN_LENGTH, TokenClaims, TokenHeader},
    testutil::{Fixture, craft_raw_token, replace_segment, sign_claims},
};
use rollcert_store::{
    SignatureAlgorithm,
    testutil::{issuer_record, issuer_record_with_window, p256_issuer_record, verifier_record},
};
use serde_json::json;

// ===========================================================================
// 1. Round trip
// ===========================================================================

#[test]
fn test_issue_then_validate_ed25519() {
    let fixture = Fixture::with_records([issuer_record("a")]);
    let token = fixture.issuer.issue("user-42", "api", Duration::from_secs(300)).unwrap();
    assert_eq!(token.algorithm(), SignatureAlgorithm::EdDsa);

    let result = fixture.validator.validate(token.encoded(), "api");
    assert_outcome!(result, ValidationOutcome::Valid);

    let identity = result.into_identity().unwrap();
    assert_eq!(identity.subject, "user-42");
    assert_eq!(&identity.signer_thumbprint, token.signer_thumbprint());
    assert_eq!(identity.token_id, token.id());
}

#[test]
fn test_issue_then_validate_es256() {
    let fixture = Fixture::with_records([p256_issuer_record("p256")]);
    let token = fixture.issuer.issue_default("user-42").unwrap();
    assert_eq!(token.algorithm(), SignatureAlgorithm::Es256);
    assert!(token.encoded().contains('.'));

    assert_outcome!(fixture.validator.validate_default(token.encoded()), ValidationOutcome::Valid);
}

#[test]
fn test_mixed_key_types_in_one_snapshot() {
    let now = Utc::now();
    let ed = issuer_record_with_window("ed", now - ChronoDuration::days(2), now + ChronoDuration::days(30));
    let fixture = Fixture::with_records([ed.clone()]);
    let ed_token = fixture.issuer.issue_default("user-1").unwrap();

    let p256 = p256_issuer_record("p256");
    fixture.rotate_to([ed, p256.clone()]);
    let p256_token = fixture.issuer.issue_default("user-1").unwrap();
    assert_eq!(p256_token.signer_thumbprint(), p256.thumbprint());

    assert_outcome!(fixture.validator.validate_default(ed_token.encoded()), ValidationOutcome::Valid);
    assert_outcome!(fixture.validator.validate_default(p256_token.encoded()), ValidationOutcome::Valid);
}

// ===========================================================================
// 2. Tampering
// ===========================================================================

#[test]
fn test_tampered_subject_rejected() {
    let fixture = Fixture::with_records([issuer_record("a")]);
    let token = fixture.issuer.issue_default("user-1").unwrap();

    let mut claims = canonical::decode(token.encoded()).unwrap().claims;
    claims.sub = "admin".into();
    let tampered = replace_segment(token.encoded(), 1, &serde_json::to_vec(&claims).unwrap());

    let result = fixture.validator.validate_default(&tampered);
    assert_outcome!(result, ValidationOutcome::SignatureInvalid);
    assert!(result.resolved().is_none());
}

#[test]
fn test_tampered_expiry_rejected() {
    let fixture = Fixture::with_records([issuer_record("a")]);
    let token = fixture.issuer.issue("user-1", "api", Duration::from_secs(60)).unwrap();

    let mut claims = canonical::decode(token.encoded()).unwrap().claims;
    claims.exp += ChronoDuration::days(365);
    let tampered = replace_segment(token.encoded(), 1, &serde_json::to_vec(&claims).unwrap());

    assert_outcome!(fixture.validator.validate_default(&tampered), ValidationOutcome::SignatureInvalid);
}

#[test]
fn test_tampered_signature_rejected() {
    let fixture = Fixture::with_records([issuer_record("a")]);
    let token = fixture.issuer.issue_default("user-1").unwrap();

    let forged = replace_segment(token.encoded(), 2, &[0u8; 64]);
    assert_outcome!(fixture.validator.validate_default(&forged), ValidationOutcome::SignatureInvalid);

    let empty = replace_segment(token.encoded(), 2, &[]);
    assert_outcome!(fixture.validator.validate_default(&empty), ValidationOutcome::SignatureInvalid);
}

#[test]
fn test_signature_from_another_token_rejected() {
    let fixture = Fixture::with_records([issuer_record("a")]);
    let first = fixture.issuer.issue_default("user-1").unwrap();
    let second = fixture.issuer.issue_default("user-2").unwrap();

    let (input, _) = second.encoded().rsplit_once('.').unwrap();
    let spliced = canonical::assemble(input, first.signature());
    assert_outcome!(fixture.validator.validate_default(&spliced), ValidationOutcome::SignatureInvalid);
}

/// URL-safe base64 alphabet, the only characters a segment may hold.
const BASE64URL_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn assert_no_single_character_edit_validates(fixture: &Fixture) {
    let token = fixture.issuer.issue_default("user-1").unwrap();
    let encoded = token.encoded().as_bytes();
    let mut checked = 0usize;

    for position in 0..encoded.len() {
        if encoded[position] == b'.' {
            continue;
        }
        for &replacement in BASE64URL_ALPHABET {
            if replacement == encoded[position] {
                continue;
            }
            let mut edited = encoded.to_vec();
            edited[position] = replacement;
            let edited = String::from_utf8(edited).unwrap();

            let result = fixture.validator.validate_default(&edited);
            assert!(
                !result.is_valid(),
                "editing position {position} to '{}' produced a valid token",
                replacement as char
            );
            checked += 1;
        }
    }
    assert!(checked > 1000);
}

#[test]
fn test_single_character_edits_never_validate_ed25519() {
    let fixture = Fixture::with_records([issuer_record("a")]);
    assert_no_single_character_edit_validates(&fixture);
}

#[test]
fn test_single_character_edits_never_validate_es256() {
    let fixture = Fixture::with_records([p256_issuer_record("p256")]);
    assert_no_single_character_edit_validates(&fixture);
}

// ===========================================================================
// 3. Algorithm substitution and key confusion
// ===========================================================================

fn raw_claims(x5t: &str) -> serde_json::Value {
    let now = Utc::now().trunc_subsecs(0);
    json!({
        "jti": "id-0123456789abcdef0123456789abcdef",
        "iss": "rollcert-test",
        "sub": "admin",
        "aud": "api",
        "iat": canonical::format_timestamp(now),
        "nbf": canonical::format_timestamp(now),
        "exp": canonical::format_timestamp(now + ChronoDuration::hours(1)),
        "x5t": x5t,
    })
}

#[test]
fn test_algorithm_none_rejected() {
    let record = issuer_record("a");
    let fixture = Fixture::with_records([record.clone()]);
    let mut header = serde_json::to_value(TokenHeader::for_key(record.public_key())).unwrap();
    header["alg"] = json!("none");

    let token = craft_raw_token(&header, &raw_claims(record.thumbprint().as_str()));
    let result = fixture.validator.validate_default(&token);
    assert_outcome!(result, ValidationOutcome::MalformedToken);
    assert!(result.detail().contains("not allowed for security reasons"), "{}", result.detail());
}

#[test]
fn test_symmetric_algorithms_rejected() {
    let record = issuer_record("a");
    let fixture = Fixture::with_records([record.clone()]);

    for alg in ["HS256", "HS384", "HS512"] {
        let mut header = serde_json::to_value(TokenHeader::for_key(record.public_key())).unwrap();
        header["alg"] = json!(alg);
        let token = craft_raw_token(&header, &raw_claims(record.thumbprint().as_str()));
        assert_outcome!(
            fixture.validator.validate_default(&token),
            ValidationOutcome::MalformedToken,
            format!("{alg} must be rejected")
        );
    }
}

#[test]
fn test_algorithm_key_type_mismatch_rejected() {
    let record = issuer_record("a");
    let fixture = Fixture::with_records([record.clone()]);
    let token = fixture.issuer.issue_default("user-1").unwrap();

    // Ed25519 key advertised as ES256.
    let mut header = canonical::decode(token.encoded()).unwrap().header;
    header.alg = "ES256".into();
    let confused = replace_segment(token.encoded(), 0, &serde_json::to_vec(&header).unwrap());
    assert_outcome!(fixture.validator.validate_default(&confused), ValidationOutcome::MalformedToken);
}

#[test]
fn test_attacker_key_with_trusted_thumbprint_rejected() {
    let trusted = issuer_record("trusted");
    let attacker = issuer_record("attacker");
    let fixture = Fixture::with_records([trusted.clone()]);
    let claims = fixture.claims_for(&trusted, Utc::now());

    let own_key = sign_claims(&attacker, &TokenHeader::for_key(attacker.public_key()), &claims);
    assert_outcome!(fixture.validator.validate_default(&own_key), ValidationOutcome::SignatureInvalid);

    let borrowed_key = sign_claims(&attacker, &TokenHeader::for_key(trusted.public_key()), &claims);
    assert_outcome!(fixture.validator.validate_default(&borrowed_key), ValidationOutcome::SignatureInvalid);
}

#[test]
fn test_cross_algorithm_signature_rejected() {
    // ES256 signer claiming an Ed25519 certificate's thumbprint.
    let trusted = issuer_record("ed");
    let attacker = p256_issuer_record("p256");
    let fixture = Fixture::with_records([trusted.clone()]);
    let claims = fixture.claims_for(&trusted, Utc::now());

    let token = sign_claims(&attacker, &TokenHeader::for_key(attacker.public_key()), &claims);
    assert_outcome!(fixture.validator.validate_default(&token), ValidationOutcome::SignatureInvalid);
}

// ===========================================================================
// 4. Untrusted signers and audience
// ===========================================================================

#[test]
fn test_unknown_signer_rejected() {
    let outsider = Fixture::with_records([issuer_record("outsider")]);
    let token = outsider.issuer.issue_default("user-1").unwrap();

    let fixture = Fixture::with_records([issuer_record("a"), verifier_record("b")]);
    assert_outcome!(
        fixture.validator.validate_default(token.encoded()),
        ValidationOutcome::CertificateNotTrusted
    );
}

#[test]
fn test_audience_mismatch() {
    let fixture = Fixture::with_records([issuer_record("a")]);
    let token = fixture.issuer.issue("user-1", "billing", Duration::from_secs(60)).unwrap();

    assert_outcome!(fixture.validator.validate(token.encoded(), "billing"), ValidationOutcome::Valid);
    assert_outcome!(fixture.validator.validate_default(token.encoded()), ValidationOutcome::AudienceMismatch);
    assert_outcome!(fixture.validator.validate(token.encoded(), "Billing"), ValidationOutcome::AudienceMismatch);
}

#[test]
fn test_rejections_share_public_message() {
    let fixture = Fixture::with_records([issuer_record("a")]);
    let token = fixture.issuer.issue_default("user-1").unwrap();

    let mismatch = fixture.validator.validate(token.encoded(), "other");
    let malformed = fixture.validator.validate_default("garbage");
    assert_eq!(mismatch.outcome().public_message(), malformed.outcome().public_message());
}

// ===========================================================================
// 5. Validity window boundaries
// ===========================================================================

#[test]
fn test_window_edges() {
    let fixture = Fixture::with_records([issuer_record("a")]);
    let now = Utc::now();
    let token = fixture.issuer.issue_at("user-1", "api", Duration::from_secs(600), now).unwrap();
    let encoded = token.encoded();
    let one_second = ChronoDuration::seconds(1);

    let at = |instant| fixture.validator.validate_at(encoded, "api", instant).outcome();

    assert_eq!(at(token.not_before() - one_second), ValidationOutcome::NotYetValid);
    assert_eq!(at(token.not_before()), ValidationOutcome::Valid);
    assert_eq!(at(token.not_on_or_after() - one_second), ValidationOutcome::Valid);
    assert_eq!(at(token.not_on_or_after()), ValidationOutcome::Expired);
}

#[test]
fn test_expired_one_second_ago() {
    let record = issuer_record("a");
    let fixture = Fixture::with_records([record.clone()]);
    let now = Utc::now().trunc_subsecs(0);

    let claims = TokenClaims {
        iat: now - ChronoDuration::hours(1),
        nbf: now - ChronoDuration::hours(1),
        exp: now - ChronoDuration::seconds(1),
        ..fixture.claims_for(&record, now)
    };
    let token = sign_claims(&record, &TokenHeader::for_key(record.public_key()), &claims);
    assert_outcome!(fixture.validator.validate_at(&token, "api", now), ValidationOutcome::Expired);
}

#[test]
fn test_not_yet_valid_for_an_hour() {
    let record = issuer_record("a");
    let fixture = Fixture::with_records([record.clone()]);
    let now = Utc::now().trunc_subsecs(0);

    let claims = TokenClaims {
        nbf: now + ChronoDuration::hours(1),
        exp: now + ChronoDuration::hours(2),
        ..fixture.claims_for(&record, now)
    };
    let token = sign_claims(&record, &TokenHeader::for_key(record.public_key()), &claims);
    assert_outcome!(fixture.validator.validate_at(&token, "api", now), ValidationOutcome::NotYetValid);
}

// ===========================================================================
// 6. Gate ordering: the first failing gate decides
// ===========================================================================

#[test]
fn test_gate_order() {
    let record = issuer_record("a");
    let stranger = issuer_record("stranger");
    let fixture = Fixture::with_records([record.clone()]);
    let now = Utc::now().trunc_subsecs(0);
    let header = TokenHeader::for_key(record.public_key());

    let expired_elsewhere = TokenClaims {
        aud: "elsewhere".into(),
        iat: now - ChronoDuration::hours(2),
        nbf: now - ChronoDuration::hours(2),
        exp: now - ChronoDuration::hours(1),
        ..fixture.claims_for(&record, now)
    };

    // Missing thumbprint beats expiry and audience.
    let claims = TokenClaims { x5t: None, ..expired_elsewhere.clone() };
    let token = sign_claims(&record, &header, &claims);
    assert_outcome!(fixture.validator.validate_at(&token, "api", now), ValidationOutcome::ThumbprintMissing);

    // Untrusted signer beats expiry and audience.
    let claims = TokenClaims { x5t: Some(stranger.thumbprint().to_string()), ..expired_elsewhere.clone() };
    let token = sign_claims(&stranger, &TokenHeader::for_key(stranger.public_key()), &claims);
    assert_outcome!(fixture.validator.validate_at(&token, "api", now), ValidationOutcome::CertificateNotTrusted);

    // Bad signature beats expiry and audience.
    let token = sign_claims(&stranger, &header, &expired_elsewhere);
    assert_outcome!(fixture.validator.validate_at(&token, "api", now), ValidationOutcome::SignatureInvalid);

    // Expiry beats audience.
    let token = sign_claims(&record, &header, &expired_elsewhere);
    assert_outcome!(fixture.validator.validate_at(&token, "api", now), ValidationOutcome::Expired);

    // Not-yet-valid beats audience.
    let future_elsewhere = TokenClaims {
        nbf: now + ChronoDuration::hours(1),
        exp: now + ChronoDuration::hours(2),
        ..expired_elsewhere
    };
    let token = sign_claims(&record, &header, &future_elsewhere);
    assert_outcome!(fixture.validator.validate_at(&token, "api", now), ValidationOutcome::NotYetValid);
}

// ===========================================================================
// 7. Malformed input
// ===========================================================================

#[test]
fn test_malformed_structures() {
    let record = issuer_record("a");
    let fixture = Fixture::with_records([record.clone()]);
    let token = fixture.issuer.issue_default("user-1").unwrap();
    let header = serde_json::to_value(TokenHeader::for_key(record.public_key())).unwrap();

    let oversized = "a".repeat(MAX_TOKEN_LENGTH + 1);
    let four_segments = format!("{}.extra", token.encoded());

    let mut wrong_type = header.clone();
    wrong_type["typ"] = json!("JWT");
    let mut wrong_version = header.clone();
    wrong_version["ver"] = json!(2);
    let mut extra_claim = raw_claims(record.thumbprint().as_str());
    extra_claim["admin"] = json!(true);
    let mut loose_timestamp = raw_claims(record.thumbprint().as_str());
    loose_timestamp["exp"] = json!("2030-01-01T00:00:00+00:00");
    let mut numeric_timestamp = raw_claims(record.thumbprint().as_str());
    numeric_timestamp["exp"] = json!(1_900_000_000);
    let mut empty_subject = raw_claims(record.thumbprint().as_str());
    empty_subject["sub"] = json!("");

    let cases = [
        ("empty", String::new()),
        ("oversized", oversized),
        ("four segments", four_segments),
        ("wrong typ", craft_raw_token(&wrong_type, &raw_claims(record.thumbprint().as_str()))),
        ("wrong ver", craft_raw_token(&wrong_version, &raw_claims(record.thumbprint().as_str()))),
        ("unknown claim", craft_raw_token(&header, &extra_claim)),
        ("offset timestamp", craft_raw_token(&header, &loose_timestamp)),
        ("numeric timestamp", craft_raw_token(&header, &numeric_timestamp)),
        ("empty subject", craft_raw_token(&header, &empty_subject)),
    ];

    for (name, token) in cases {
        assert_outcome!(
            fixture.validator.validate_default(&token),
            ValidationOutcome::MalformedToken,
            name
        );
    }
}

// ===========================================================================
// 8. Certificate rotation
// ===========================================================================

#[test]
fn test_rotation_overlap_then_retire() {
    let now = Utc::now();
    let old = issuer_record_with_window("old", now - ChronoDuration::days(20), now + ChronoDuration::days(10));
    let new = issuer_record_with_window("new", now - ChronoDuration::hours(1), now + ChronoDuration::days(40));

    let fixture = Fixture::with_records([old.clone()]);
    let old_token = fixture.issuer.issue_default("user-1").unwrap();
    assert_eq!(old_token.signer_thumbprint(), old.thumbprint());

    // Overlap: both trusted, the newer certificate signs.
    fixture.rotate_to([old.clone(), new.clone()]);
    let new_token = fixture.issuer.issue_default("user-1").unwrap();
    assert_eq!(new_token.signer_thumbprint(), new.thumbprint());
    assert_outcome!(fixture.validator.validate_default(old_token.encoded()), ValidationOutcome::Valid);
    assert_outcome!(fixture.validator.validate_default(new_token.encoded()), ValidationOutcome::Valid);

    // Retire the old certificate.
    let generation = fixture.rotate_to([new]);
    let result = fixture.validator.validate_default(old_token.encoded());
    assert_outcome!(result, ValidationOutcome::CertificateNotTrusted);
    assert_eq!(result.generation(), generation);
    assert_outcome!(fixture.validator.validate_default(new_token.encoded()), ValidationOutcome::Valid);
}

#[test]
fn test_validation_against_held_snapshot_survives_retirement() {
    let record = issuer_record("a");
    let fixture = Fixture::with_records([record]);
    let token = fixture.issuer.issue_default("user-1").unwrap();

    let held = fixture.store.snapshot();
    fixture.rotate_to([issuer_record("b")]);

    let result = fixture.validator.validate_with_snapshot(token.encoded(), &held, "api", Utc::now());
    assert_outcome!(result, ValidationOutcome::Valid);
    assert_eq!(result.generation(), held.generation());
    assert_outcome!(
        fixture.validator.validate_default(token.encoded()),
        ValidationOutcome::CertificateNotTrusted
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_validation_during_rotation() {
    let a = issuer_record("a");
    let b = issuer_record("b");
    let fixture = Arc::new(Fixture::with_records([a.clone()]));
    let token: Arc<str> = fixture.issuer.issue_default("user-1").unwrap().into_encoded().into();

    // Odd generations trust `a`, even generations do not.
    let rotator = {
        let fixture = Arc::clone(&fixture);
        let (a, b) = (a.clone(), b.clone());
        tokio::spawn(async move {
            for round in 0..200 {
                if round % 2 == 0 {
                    fixture.rotate_to([b.clone()]);
                } else {
                    fixture.rotate_to([a.clone(), b.clone()]);
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let mut validators = Vec::with_capacity(100);
    for _ in 0..100 {
        let fixture = Arc::clone(&fixture);
        let token = Arc::clone(&token);
        validators.push(tokio::spawn(async move {
            for _ in 0..20 {
                let result = fixture.validator.validate_default(&token);
                let trusted = result.generation() % 2 == 1;
                let expected = if trusted {
                    ValidationOutcome::Valid
                } else {
                    ValidationOutcome::CertificateNotTrusted
                };
                assert_outcome!(result, expected, format!("generation {}", result.generation()));
                tokio::task::yield_now().await;
            }
        }));
    }

    rotator.await.expect("rotator panicked");
    for handle in validators {
        handle.await.expect("validator task panicked");
    }
    assert_eq!(fixture.store.generation(), 201);
}
