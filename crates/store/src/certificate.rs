//! Certificate records held by a trust snapshot.
//!
//! A [`CertificateRecord`] is the loaded, usable form of one certificate:
//! its thumbprint, display subject, public key, optional private key, and the
//! certificate's own validity window. Records are produced by a
//! [`CertificateSource`](crate::source::CertificateSource) and never mutated
//! afterwards.
//!
//! # Key Material
//!
//! Public keys are a small tagged variant ([`PublicKeyMaterial`]) instead of
//! a verifier trait object: the variant fixes the [`SignatureAlgorithm`] and
//! verification dispatches on it.
//!
//! | Variant | Algorithm | Private key encoding |
//! |---------|-----------|----------------------|
//! | `Ed25519` | `EdDSA` | PKCS#8 DER |
//! | `EcdsaP256` | `ES256` | PKCS#8 DER |
//! | `Rsa` | `RS256` | PKCS#1 DER |
//!
//! # Thumbprints
//!
//! The thumbprint is the lowercase hex SHA-256 digest of the certificate's
//! DER encoding. Parsing accepts either case and normalizes to lowercase.

use std::{fmt, str::FromStr};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, VerifyingKey};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{StoreError, StoreResult};

/// Minimum accepted RSA modulus size in bytes (2048 bits).
pub const MIN_RSA_MODULUS_BYTES: usize = 256;

/// Minimum thumbprint length in hex characters (SHA-1 sized digests).
const MIN_THUMBPRINT_HEX_LEN: usize = 40;

/// Maximum thumbprint length in hex characters (SHA-512 sized digests).
const MAX_THUMBPRINT_HEX_LEN: usize = 128;

/// Message signed and verified when checking that a private key matches
/// its public key.
const KEY_PAIR_PROBE: &[u8] = b"rollcert key pair probe";

/// Stable digest-based identifier of a certificate.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Thumbprint(String);

impl Thumbprint {
    /// Computes the thumbprint of a DER-encoded certificate.
    #[must_use]
    pub fn of_der(der: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(der)))
    }

    /// Parses a hex thumbprint, normalizing it to lowercase.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCertificate`] if the value is not an
    /// even-length hex string between 40 and 128 characters.
    pub fn parse(value: &str) -> StoreResult<Self> {
        let len = value.len();
        if !(MIN_THUMBPRINT_HEX_LEN..=MAX_THUMBPRINT_HEX_LEN).contains(&len) || len % 2 != 0 {
            return Err(StoreError::invalid_certificate(format!(
                "thumbprint must be {MIN_THUMBPRINT_HEX_LEN}-{MAX_THUMBPRINT_HEX_LEN} hex characters, got {len}"
            )));
        }
        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StoreError::invalid_certificate("thumbprint contains non-hex characters"));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Returns the lowercase hex form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thumbprint({})", self.0)
    }
}

impl FromStr for Thumbprint {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Thumbprint {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Thumbprint> for String {
    fn from(value: Thumbprint) -> Self {
        value.0
    }
}

/// Asymmetric signature algorithm bound to a certificate's key type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// Ed25519 (RFC 8037 `EdDSA`).
    #[serde(rename = "EdDSA")]
    EdDsa,
    /// ECDSA over P-256 with SHA-256.
    #[serde(rename = "ES256")]
    Es256,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[serde(rename = "RS256")]
    Rs256,
}

impl SignatureAlgorithm {
    /// All supported algorithms.
    pub const ALL: [SignatureAlgorithm; 3] = [Self::EdDsa, Self::Es256, Self::Rs256];

    /// Returns the JOSE algorithm name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EdDsa => "EdDSA",
            Self::Es256 => "ES256",
            Self::Rs256 => "RS256",
        }
    }

    /// Returns the matching [`jsonwebtoken::Algorithm`].
    #[must_use]
    pub const fn jwt_algorithm(self) -> Algorithm {
        match self {
            Self::EdDsa => Algorithm::EdDSA,
            Self::Es256 => Algorithm::ES256,
            Self::Rs256 => Algorithm::RS256,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.as_str() == s)
            .ok_or_else(|| StoreError::invalid_certificate(format!("unsupported algorithm '{s}'")))
    }
}

/// Public key of a certificate, tagged by key type.
#[derive(Clone, PartialEq, Eq)]
pub enum PublicKeyMaterial {
    /// Raw 32-byte Ed25519 public key.
    Ed25519 {
        /// Compressed Edwards point.
        x: [u8; PUBLIC_KEY_LENGTH],
    },
    /// P-256 public key as affine coordinates.
    EcdsaP256 {
        /// Big-endian x coordinate.
        x: [u8; 32],
        /// Big-endian y coordinate.
        y: [u8; 32],
    },
    /// RSA public key components (big-endian, no leading zeros).
    Rsa {
        /// Modulus.
        n: Vec<u8>,
        /// Public exponent.
        e: Vec<u8>,
    },
}

impl PublicKeyMaterial {
    /// Creates Ed25519 key material from the raw 32-byte public key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCertificate`] if the bytes are not a
    /// valid Ed25519 point.
    pub fn ed25519(bytes: &[u8]) -> StoreResult<Self> {
        let x: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            StoreError::invalid_certificate(format!(
                "expected {PUBLIC_KEY_LENGTH} byte Ed25519 key, got {}",
                bytes.len()
            ))
        })?;
        VerifyingKey::from_bytes(&x)
            .map_err(|e| StoreError::invalid_certificate(format!("invalid Ed25519 key: {e}")))?;
        Ok(Self::Ed25519 { x })
    }

    /// Creates P-256 key material from a SEC1 encoded point (compressed or not).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCertificate`] if the point is not on the curve.
    pub fn p256_sec1(bytes: &[u8]) -> StoreResult<Self> {
        use p256::elliptic_curve::sec1::ToEncodedPoint;

        let key = p256::PublicKey::from_sec1_bytes(bytes)
            .map_err(|e| StoreError::invalid_certificate(format!("invalid P-256 key: {e}")))?;
        let point = key.to_encoded_point(false);
        let (Some(x), Some(y)) = (point.x(), point.y()) else {
            return Err(StoreError::invalid_certificate("P-256 key is the identity point"));
        };
        let mut xs = [0u8; 32];
        let mut ys = [0u8; 32];
        xs.copy_from_slice(x);
        ys.copy_from_slice(y);
        Ok(Self::EcdsaP256 { x: xs, y: ys })
    }

    /// Creates P-256 key material from affine coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCertificate`] if the point is not on the curve.
    pub fn p256_coordinates(x: &[u8], y: &[u8]) -> StoreResult<Self> {
        if x.len() != 32 || y.len() != 32 {
            return Err(StoreError::invalid_certificate("P-256 coordinates must be 32 bytes each"));
        }
        let mut sec1 = Vec::with_capacity(65);
        sec1.push(0x04);
        sec1.extend_from_slice(x);
        sec1.extend_from_slice(y);
        Self::p256_sec1(&sec1)
    }

    /// Creates RSA key material from big-endian modulus and exponent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCertificate`] if the modulus is shorter
    /// than 2048 bits or the exponent is empty.
    pub fn rsa(n: &[u8], e: &[u8]) -> StoreResult<Self> {
        let n = strip_leading_zeros(n);
        let e = strip_leading_zeros(e);
        if n.len() < MIN_RSA_MODULUS_BYTES {
            return Err(StoreError::invalid_certificate(format!(
                "RSA modulus must be at least {} bits, got {}",
                MIN_RSA_MODULUS_BYTES * 8,
                n.len() * 8
            )));
        }
        if e.is_empty() {
            return Err(StoreError::invalid_certificate("RSA exponent is empty"));
        }
        Ok(Self::Rsa { n: n.to_vec(), e: e.to_vec() })
    }

    /// Returns the signature algorithm bound to this key type.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::Ed25519 { .. } => SignatureAlgorithm::EdDsa,
            Self::EcdsaP256 { .. } => SignatureAlgorithm::Es256,
            Self::Rsa { .. } => SignatureAlgorithm::Rs256,
        }
    }

    /// Builds the verification key for this material.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCertificate`] if `jsonwebtoken` rejects
    /// the components.
    pub fn decoding_key(&self) -> StoreResult<DecodingKey> {
        let key = match self {
            Self::Ed25519 { x } => DecodingKey::from_ed_components(&URL_SAFE_NO_PAD.encode(x)),
            Self::EcdsaP256 { x, y } => DecodingKey::from_ec_components(
                &URL_SAFE_NO_PAD.encode(x),
                &URL_SAFE_NO_PAD.encode(y),
            ),
            Self::Rsa { n, e } => return Ok(DecodingKey::from_rsa_raw_components(n, e)),
        };
        key.map_err(|e| StoreError::invalid_certificate(e.to_string()))
    }
}

impl fmt::Debug for PublicKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519 { x } => write!(f, "Ed25519({})", URL_SAFE_NO_PAD.encode(x)),
            Self::EcdsaP256 { x, .. } => write!(f, "EcdsaP256(x={})", URL_SAFE_NO_PAD.encode(x)),
            Self::Rsa { n, .. } => write!(f, "Rsa({} bits)", n.len() * 8),
        }
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Private signing key in DER form.
///
/// Ed25519 and P-256 keys are PKCS#8, RSA keys are PKCS#1. The bytes are
/// scrubbed on drop and never printed.
#[derive(Clone)]
pub struct PrivateKeyMaterial(Zeroizing<Vec<u8>>);

impl PrivateKeyMaterial {
    /// Wraps DER-encoded private key bytes.
    #[must_use]
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(der.into()))
    }

    /// Builds the `jsonwebtoken` signing key for the given algorithm.
    #[must_use]
    pub fn encoding_key(&self, algorithm: SignatureAlgorithm) -> EncodingKey {
        match algorithm {
            SignatureAlgorithm::EdDsa => EncodingKey::from_ed_der(&self.0),
            SignatureAlgorithm::Es256 => EncodingKey::from_ec_der(&self.0),
            SignatureAlgorithm::Rs256 => EncodingKey::from_rsa_der(&self.0),
        }
    }
}

impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyMaterial([REDACTED])")
    }
}

/// One loaded certificate.
///
/// Built through [`CertificateRecord::builder`], which computes the
/// thumbprint, validates the key material, and checks that a supplied
/// private key actually belongs to the public key.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use ed25519_dalek::SigningKey;
/// use rand_core::OsRng;
/// use rollcert_store::{CertificateRecord, PublicKeyMaterial};
///
/// let signing_key = SigningKey::generate(&mut OsRng);
/// let public_key = PublicKeyMaterial::ed25519(signing_key.verifying_key().as_bytes())?;
///
/// let record = CertificateRecord::builder()
///     .der(b"example certificate".to_vec())
///     .subject("CN=verifier-only")
///     .public_key(public_key)
///     .not_before(Utc::now() - Duration::days(1))
///     .not_after(Utc::now() + Duration::days(30))
///     .build()?;
///
/// assert!(!record.has_private_key());
/// assert_eq!(record.thumbprint().as_str().len(), 64);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct CertificateRecord {
    thumbprint: Thumbprint,
    subject: String,
    public_key: PublicKeyMaterial,
    private_key: Option<PrivateKeyMaterial>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    decoding_key: DecodingKey,
}

#[bon::bon]
impl CertificateRecord {
    /// Creates a record, validating its key material.
    ///
    /// # Arguments
    ///
    /// * `der` - DER encoding of the certificate; only used to compute the thumbprint.
    /// * `subject` - Display name.
    /// * `public_key` - Verification key.
    /// * `private_key` - Optional signing key; must match `public_key`.
    /// * `not_before` / `not_after` - Certificate validity window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCertificate`] if:
    /// - The validity window is inverted
    /// - The public key cannot be turned into a verification key
    /// - The private key cannot sign, or signs for a different public key
    #[builder]
    pub fn new(
        der: Vec<u8>,
        #[builder(into)] subject: String,
        public_key: PublicKeyMaterial,
        private_key: Option<PrivateKeyMaterial>,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> StoreResult<Self> {
        let thumbprint = Thumbprint::of_der(&der);
        if not_after < not_before {
            return Err(StoreError::invalid_certificate(format!(
                "certificate {thumbprint} has not_after before not_before"
            )));
        }

        let decoding_key = public_key.decoding_key()?;
        if let Some(private_key) = &private_key {
            check_key_pair(&public_key, private_key, &decoding_key)?;
        }

        Ok(Self { thumbprint, subject, public_key, private_key, not_before, not_after, decoding_key })
    }

    /// Returns the thumbprint.
    #[must_use]
    pub fn thumbprint(&self) -> &Thumbprint {
        &self.thumbprint
    }

    /// Returns the display subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the public key material.
    #[must_use]
    pub fn public_key(&self) -> &PublicKeyMaterial {
        &self.public_key
    }

    /// Returns the signature algorithm bound to this certificate's key.
    #[must_use]
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.public_key.algorithm()
    }

    /// Returns the private key, if this certificate can sign.
    #[must_use]
    pub fn private_key(&self) -> Option<&PrivateKeyMaterial> {
        self.private_key.as_ref()
    }

    /// Returns `true` if this certificate can sign.
    #[must_use]
    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Start of the certificate validity window.
    #[must_use]
    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// End of the certificate validity window (inclusive).
    #[must_use]
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Returns `true` if `now` falls inside the certificate validity window.
    #[must_use]
    pub fn is_within_validity(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Returns the precomputed verification key.
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Returns a copy of this record without its private key.
    ///
    /// Used when distributing trust to verifiers that must never sign.
    #[must_use]
    pub fn without_private_key(&self) -> Self {
        Self { private_key: None, ..self.clone() }
    }
}

impl fmt::Debug for CertificateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRecord")
            .field("thumbprint", &self.thumbprint)
            .field("subject", &self.subject)
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// Signs a probe with the private key and verifies it with the public key.
fn check_key_pair(
    public_key: &PublicKeyMaterial,
    private_key: &PrivateKeyMaterial,
    decoding_key: &DecodingKey,
) -> StoreResult<()> {
    let algorithm = public_key.algorithm().jwt_algorithm();
    let encoding_key = private_key.encoding_key(public_key.algorithm());

    let signature = jsonwebtoken::crypto::sign(KEY_PAIR_PROBE, &encoding_key, algorithm)
        .map_err(|e| StoreError::invalid_certificate(format!("private key cannot sign: {e}")))?;

    match jsonwebtoken::crypto::verify(&signature, KEY_PAIR_PROBE, decoding_key, algorithm) {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => {
            Err(StoreError::invalid_certificate("private key does not match public key"))
        },
    }
}
