//! Structured fuzz target for token header and claim parsing.
//!
//! Uses the `arbitrary` crate to generate token-shaped inputs with plausible
//! structure (known and hostile algorithm names, canonical and
//! non-canonical timestamps, optional thumbprints) so the fuzzer reaches
//! the claim checks behind the header checks.

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;
use rollcert_authn::{TokenValidator, ValidatorConfig, canonical};
use rollcert_store::TrustStore;
use serde_json::{Map, Value, json};

/// Structured input representing a fuzzed token.
#[derive(Debug, Arbitrary)]
struct FuzzedToken {
    alg: FuzzedAlg,
    typ: Option<String>,
    ver: u32,
    kty: String,
    crv: Option<String>,
    x: Option<Vec<u8>>,
    y: Option<Vec<u8>>,
    jti: String,
    iss: String,
    sub: String,
    aud: String,
    iat: FuzzedTime,
    nbf: FuzzedTime,
    exp: FuzzedTime,
    x5t: Option<String>,
    extra_claim: Option<(String, String)>,
    signature_bytes: Vec<u8>,
}

/// Algorithm values covering known attack vectors and edge cases.
#[derive(Debug, Arbitrary)]
enum FuzzedAlg {
    EdDsa,
    Es256,
    Rs256,
    None,
    Hs256,
    Other(String),
}

impl FuzzedAlg {
    fn as_str(&self) -> &str {
        match self {
            Self::EdDsa => "EdDSA",
            Self::Es256 => "ES256",
            Self::Rs256 => "RS256",
            Self::None => "none",
            Self::Hs256 => "HS256",
            Self::Other(s) => s,
        }
    }
}

/// Timestamp encodings, canonical and otherwise.
#[derive(Debug, Arbitrary)]
enum FuzzedTime {
    Canonical(i64),
    Numeric(i64),
    Raw(String),
}

impl FuzzedTime {
    fn to_value(&self) -> Value {
        match self {
            Self::Canonical(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
                .map_or(Value::Null, |t| Value::String(canonical::format_timestamp(t))),
            Self::Numeric(secs) => json!(secs),
            Self::Raw(s) => json!(s),
        }
    }
}

fn build_token(input: &FuzzedToken) -> String {
    let mut jwk = Map::new();
    jwk.insert("kty".into(), json!(input.kty));
    if let Some(crv) = &input.crv {
        jwk.insert("crv".into(), json!(crv));
    }
    if let Some(x) = &input.x {
        jwk.insert("x".into(), json!(URL_SAFE_NO_PAD.encode(x)));
    }
    if let Some(y) = &input.y {
        jwk.insert("y".into(), json!(URL_SAFE_NO_PAD.encode(y)));
    }

    let mut header = Map::new();
    if let Some(typ) = &input.typ {
        header.insert("typ".into(), json!(typ));
    }
    header.insert("ver".into(), json!(input.ver));
    header.insert("alg".into(), json!(input.alg.as_str()));
    header.insert("jwk".into(), Value::Object(jwk));

    let mut claims = Map::new();
    claims.insert("jti".into(), json!(input.jti));
    claims.insert("iss".into(), json!(input.iss));
    claims.insert("sub".into(), json!(input.sub));
    claims.insert("aud".into(), json!(input.aud));
    claims.insert("iat".into(), input.iat.to_value());
    claims.insert("nbf".into(), input.nbf.to_value());
    claims.insert("exp".into(), input.exp.to_value());
    if let Some(x5t) = &input.x5t {
        claims.insert("x5t".into(), json!(x5t));
    }
    if let Some((key, value)) = &input.extra_claim {
        claims.insert(key.clone(), json!(value));
    }

    let header_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&Value::Object(header)).unwrap_or_default());
    let claims_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&Value::Object(claims)).unwrap_or_default());
    let sig_b64 = URL_SAFE_NO_PAD.encode(&input.signature_bytes);

    format!("{header_b64}.{claims_b64}.{sig_b64}")
}

fuzz_target!(|input: FuzzedToken| {
    let token = build_token(&input);

    // Must not panic
    let decoded = canonical::decode(&token);

    // Forbidden algorithms never parse
    if matches!(input.alg, FuzzedAlg::None | FuzzedAlg::Hs256) {
        assert!(decoded.is_err());
    }

    // Nothing validates against an empty store
    if let Ok(config) = ValidatorConfig::builder().expected_audience("api").build() {
        if let Ok(validator) = TokenValidator::new(Arc::new(TrustStore::empty()), config) {
            assert!(!validator.validate(&token, &input.aud).is_valid());
        }
    }
});
