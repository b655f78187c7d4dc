//! Canonical RCT wire form.
//!
//! A token is three unpadded base64url segments:
//!
//! ```text
//! base64url(header_json) "." base64url(claims_json) "." base64url(signature)
//! ```
//!
//! The header is `{"typ":"RCT","ver":1,"alg":..,"jwk":{..}}` and the claims
//! are `{"jti","iss","sub","aud","iat","nbf","exp","x5t"}` in that order.
//! JSON is compact and field order is fixed by the struct definitions, so
//! serializing the same values always yields the same bytes. Validators
//! re-serialize the parsed header and claims to obtain the signing input;
//! any non-canonical encoding therefore fails signature verification.
//!
//! Timestamps are UTC strings with whole-second precision
//! (`YYYY-MM-DDTHH:MM:SSZ`). `exp` is exclusive: a token is no longer valid
//! at that instant.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, NaiveDateTime, Utc};
use rollcert_store::{PublicKeyMaterial, SignatureAlgorithm};
use serde::{Deserialize, Serialize};

use crate::{
    error::TokenFormatError,
    validation::{require_claim, validate_algorithm, validate_token_id},
};

/// Value of the header `typ` field.
pub const TOKEN_TYPE: &str = "RCT";

/// Value of the header `ver` field.
pub const TOKEN_VERSION: u32 = 1;

/// Maximum accepted encoded token length in bytes.
pub const MAX_TOKEN_LENGTH: usize = 16 * 1024;

/// `chrono` format string of claim timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Public key embedded in the token header.
///
/// Components are unpadded base64url. Absent components are omitted, so an
/// Ed25519 key serializes as `{"kty":"OKP","crv":"Ed25519","x":".."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Jwk {
    /// Key type: `OKP`, `EC` or `RSA`.
    pub kty: String,
    /// Curve name for `OKP` and `EC` keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Ed25519 public key, or EC x coordinate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// RSA modulus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// Builds the header key for a certificate's public key.
    #[must_use]
    pub fn from_public_key(key: &PublicKeyMaterial) -> Self {
        let empty = Self { kty: String::new(), crv: None, x: None, y: None, n: None, e: None };
        match key {
            PublicKeyMaterial::Ed25519 { x } => {
                Self { kty: "OKP".into(), crv: Some("Ed25519".into()), x: b64(x), ..empty }
            },
            PublicKeyMaterial::EcdsaP256 { x, y } => Self {
                kty: "EC".into(),
                crv: Some("P-256".into()),
                x: b64(x),
                y: b64(y),
                ..empty
            },
            PublicKeyMaterial::Rsa { n, e } => {
                Self { kty: "RSA".into(), n: b64(n), e: b64(e), ..empty }
            },
        }
    }

    /// Converts the header key back into key material.
    ///
    /// # Errors
    ///
    /// Returns [`TokenFormatError::Header`] if the key type or curve is
    /// unsupported, a component is missing or superfluous, or the key is
    /// not a valid public key.
    pub fn to_public_key(&self) -> Result<PublicKeyMaterial, TokenFormatError> {
        let material = match (self.kty.as_str(), self.crv.as_deref()) {
            ("OKP", Some("Ed25519")) => {
                self.reject_extra(&[&self.y, &self.n, &self.e])?;
                PublicKeyMaterial::ed25519(&component("x", self.x.as_deref())?)
            },
            ("EC", Some("P-256")) => {
                self.reject_extra(&[&self.n, &self.e])?;
                PublicKeyMaterial::p256_coordinates(
                    &component("x", self.x.as_deref())?,
                    &component("y", self.y.as_deref())?,
                )
            },
            ("RSA", None) => {
                self.reject_extra(&[&self.x, &self.y])?;
                PublicKeyMaterial::rsa(
                    &component("n", self.n.as_deref())?,
                    &component("e", self.e.as_deref())?,
                )
            },
            (kty, crv) => {
                return Err(TokenFormatError::Header(format!(
                    "unsupported key type '{kty}' (curve {})",
                    crv.unwrap_or("none")
                )));
            },
        };
        material.map_err(|e| TokenFormatError::Header(format!("invalid key: {e}")))
    }

    fn reject_extra(&self, fields: &[&Option<String>]) -> Result<(), TokenFormatError> {
        if fields.iter().any(|field| field.is_some()) {
            return Err(TokenFormatError::Header(format!(
                "unexpected components for key type '{}'",
                self.kty
            )));
        }
        Ok(())
    }
}

fn b64(bytes: &[u8]) -> Option<String> {
    Some(URL_SAFE_NO_PAD.encode(bytes))
}

fn component(name: &str, value: Option<&str>) -> Result<Vec<u8>, TokenFormatError> {
    let value =
        value.ok_or_else(|| TokenFormatError::Header(format!("key component '{name}' missing")))?;
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| TokenFormatError::Header(format!("key component '{name}' is not base64url")))
}

/// Token header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenHeader {
    /// Always [`TOKEN_TYPE`].
    pub typ: String,
    /// Always [`TOKEN_VERSION`].
    pub ver: u32,
    /// Signature algorithm name.
    pub alg: String,
    /// Signer public key.
    pub jwk: Jwk,
}

impl TokenHeader {
    /// Builds the header for a signer key.
    #[must_use]
    pub fn for_key(key: &PublicKeyMaterial) -> Self {
        Self {
            typ: TOKEN_TYPE.to_owned(),
            ver: TOKEN_VERSION,
            alg: key.algorithm().as_str().to_owned(),
            jwk: Jwk::from_public_key(key),
        }
    }
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenClaims {
    /// Token id.
    pub jti: String,
    /// Issuer name.
    pub iss: String,
    /// Authenticated subject.
    pub sub: String,
    /// Intended audience.
    pub aud: String,
    /// Issue time.
    #[serde(with = "timestamp")]
    pub iat: DateTime<Utc>,
    /// Start of validity (inclusive).
    #[serde(with = "timestamp")]
    pub nbf: DateTime<Utc>,
    /// End of validity (exclusive).
    #[serde(with = "timestamp")]
    pub exp: DateTime<Utc>,
    /// Signer certificate thumbprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5t: Option<String>,
}

/// A parsed, not yet verified token.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    /// Parsed header.
    pub header: TokenHeader,
    /// Parsed claims.
    pub claims: TokenClaims,
    /// Algorithm named by the header.
    pub algorithm: SignatureAlgorithm,
    /// Key material embedded in the header.
    pub public_key: PublicKeyMaterial,
    /// Signature segment, still base64url encoded.
    pub signature: String,
}

impl DecodedToken {
    /// Recomputes the canonical signing input from the parsed values.
    ///
    /// # Errors
    ///
    /// Returns [`TokenFormatError::Json`] if serialization fails.
    pub fn signing_input(&self) -> Result<String, TokenFormatError> {
        signing_input(&self.header, &self.claims)
    }
}

/// Formats a timestamp in canonical form.
#[must_use]
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a canonical timestamp.
///
/// # Errors
///
/// Returns [`TokenFormatError::InvalidClaim`] unless `value` is exactly
/// what [`format_timestamp`] would produce for some instant.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TokenFormatError> {
    let parsed = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map_err(|e| TokenFormatError::invalid_claim("timestamp", e.to_string()))?
        .and_utc();
    if format_timestamp(parsed) != value {
        return Err(TokenFormatError::invalid_claim("timestamp", "not in canonical form"));
    }
    Ok(parsed)
}

mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(super::TIMESTAMP_FORMAT))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_timestamp(&value).map_err(D::Error::custom)
    }
}

/// Computes `b64(header) "." b64(claims)` from the canonical serialization.
///
/// # Errors
///
/// Returns [`TokenFormatError::Json`] if serialization fails.
pub fn signing_input(header: &TokenHeader, claims: &TokenClaims) -> Result<String, TokenFormatError> {
    let header = serde_json::to_vec(header).map_err(|e| TokenFormatError::json("header", &e))?;
    let claims = serde_json::to_vec(claims).map_err(|e| TokenFormatError::json("claims", &e))?;
    Ok(format!("{}.{}", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(claims)))
}

/// Appends the encoded signature to a signing input.
#[must_use]
pub fn assemble(signing_input: &str, signature: &str) -> String {
    format!("{signing_input}.{signature}")
}

/// Parses an encoded token without verifying it.
///
/// # Errors
///
/// Returns a [`TokenFormatError`] if:
/// - The token is empty or longer than [`MAX_TOKEN_LENGTH`]
/// - It does not have exactly three segments, or a segment is not unpadded base64url
/// - The header or claims are not valid JSON for their schema (unknown fields, missing fields,
///   non-canonical timestamps)
/// - `typ` or `ver` is wrong, `alg` is forbidden or unsupported, or `alg` disagrees with the
///   embedded key type
/// - A required claim is empty, or `nbf` is after `exp`
pub fn decode(token: &str) -> Result<DecodedToken, TokenFormatError> {
    if token.is_empty() {
        return Err(TokenFormatError::Empty);
    }
    if token.len() > MAX_TOKEN_LENGTH {
        return Err(TokenFormatError::TooLong { length: token.len(), max: MAX_TOKEN_LENGTH });
    }

    let segments: Vec<&str> = token.split('.').collect();
    let [header_b64, claims_b64, signature] = segments.as_slice() else {
        return Err(TokenFormatError::SegmentCount(segments.len()));
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| TokenFormatError::Encoding { segment: "header" })?;
    let claims_bytes = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| TokenFormatError::Encoding { segment: "claims" })?;
    URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| TokenFormatError::Encoding { segment: "signature" })?;

    let header: TokenHeader =
        serde_json::from_slice(&header_bytes).map_err(|e| TokenFormatError::json("header", &e))?;
    if header.typ != TOKEN_TYPE {
        return Err(TokenFormatError::Header(format!("unexpected typ '{}'", header.typ)));
    }
    if header.ver != TOKEN_VERSION {
        return Err(TokenFormatError::Header(format!("unsupported version {}", header.ver)));
    }
    let algorithm = validate_algorithm(&header.alg)?;
    let public_key = header.jwk.to_public_key()?;
    if public_key.algorithm() != algorithm {
        return Err(TokenFormatError::Header(format!(
            "algorithm {algorithm} does not match {} key",
            header.jwk.kty
        )));
    }

    let claims: TokenClaims =
        serde_json::from_slice(&claims_bytes).map_err(|e| TokenFormatError::json("claims", &e))?;
    validate_token_id(&claims.jti)?;
    require_claim("iss", &claims.iss)?;
    require_claim("sub", &claims.sub)?;
    require_claim("aud", &claims.aud)?;
    if claims.nbf > claims.exp {
        return Err(TokenFormatError::invalid_claim("nbf", "is after exp"));
    }

    Ok(DecodedToken { header, claims, algorithm, public_key, signature: (*signature).to_owned() })
}
