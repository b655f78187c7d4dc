//! Signed tokens.

use std::fmt;

use chrono::{DateTime, Utc};
use rollcert_store::{PublicKeyMaterial, SignatureAlgorithm, Thumbprint};

use crate::canonical::{TokenClaims, TokenHeader};

/// A signed identity assertion.
///
/// Tokens are only produced by [`TokenIssuer`](crate::issuer::TokenIssuer)
/// and are immutable. Transport the [`encoded`](Self::encoded) form; the
/// receiving side validates that string with
/// [`TokenValidator`](crate::validator::TokenValidator).
///
/// `Debug` omits the signature and the encoded form.
#[derive(Clone)]
pub struct Token {
    id: String,
    subject: String,
    issuer: String,
    audience: String,
    issued_at: DateTime<Utc>,
    not_before: DateTime<Utc>,
    not_on_or_after: DateTime<Utc>,
    signer_thumbprint: Thumbprint,
    algorithm: SignatureAlgorithm,
    public_key: PublicKeyMaterial,
    signature: String,
    encoded: String,
}

impl Token {
    pub(crate) fn from_signed_parts(
        header: &TokenHeader,
        claims: TokenClaims,
        signer_thumbprint: Thumbprint,
        public_key: PublicKeyMaterial,
        signature: String,
        encoded: String,
    ) -> Self {
        debug_assert_eq!(header.alg, public_key.algorithm().as_str());
        Self {
            id: claims.jti,
            subject: claims.sub,
            issuer: claims.iss,
            audience: claims.aud,
            issued_at: claims.iat,
            not_before: claims.nbf,
            not_on_or_after: claims.exp,
            signer_thumbprint,
            algorithm: public_key.algorithm(),
            public_key,
            signature,
            encoded,
        }
    }

    /// Unique token id (`id-` followed by 32 hex characters).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Authenticated subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Issuer name.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Intended audience.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Issue time.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Start of validity (inclusive).
    #[must_use]
    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// End of validity (exclusive).
    #[must_use]
    pub fn not_on_or_after(&self) -> DateTime<Utc> {
        self.not_on_or_after
    }

    /// Thumbprint of the certificate that signed this token.
    #[must_use]
    pub fn signer_thumbprint(&self) -> &Thumbprint {
        &self.signer_thumbprint
    }

    /// Signature algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Signer public key embedded in the header.
    #[must_use]
    pub fn public_key(&self) -> &PublicKeyMaterial {
        &self.public_key
    }

    /// Signature, base64url encoded.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Wire form.
    #[must_use]
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Consumes the token, returning the wire form.
    #[must_use]
    pub fn into_encoded(self) -> String {
        self.encoded
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("issued_at", &self.issued_at)
            .field("not_before", &self.not_before)
            .field("not_on_or_after", &self.not_on_or_after)
            .field("signer_thumbprint", &self.signer_thumbprint)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
