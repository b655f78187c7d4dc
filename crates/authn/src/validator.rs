//! Token validation.
//!
//! [`TokenValidator`] decides whether an encoded token is valid against the
//! current trust snapshot. The decision is made by a fixed sequence of
//! gates; the first gate that fails determines the outcome:
//!
//! | # | Gate | Outcome on failure |
//! |---|------|--------------------|
//! | 1 | Parse wire form, header, claims | `MalformedToken` |
//! | 2 | `x5t` present and non-empty | `ThumbprintMissing` |
//! | 3 | `x5t` resolves in the snapshot | `CertificateNotTrusted` |
//! | 4 | Header key matches the record; signature verifies | `SignatureInvalid` |
//! | 5 | `now >= nbf - leeway` | `NotYetValid` |
//! | 6 | `now < exp + leeway` | `Expired` |
//! | 7 | `aud` equals the expected audience | `AudienceMismatch` |
//!
//! Validation never fails with an error and never panics: every input maps
//! to a [`ValidationResult`].

use std::{fmt, sync::Arc};

use chrono::{DateTime, TimeDelta, Utc};
use rollcert_store::{Thumbprint, TrustSnapshot, TrustStore};
use serde::Serialize;

use crate::{canonical, config::ValidatorConfig, error::ConfigError};

/// Generic denial text for untrusted callers.
const DENIED_PUBLIC_MESSAGE: &str = "authentication failed";

/// Outcome of validating one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// All gates passed.
    Valid,
    /// The token could not be parsed or violates the wire format.
    MalformedToken,
    /// The signature does not verify against the trusted certificate.
    SignatureInvalid,
    /// The signer thumbprint is not in the trust snapshot.
    CertificateNotTrusted,
    /// The validity window has ended.
    Expired,
    /// The validity window has not started.
    NotYetValid,
    /// The token was issued for a different audience.
    AudienceMismatch,
    /// The token does not name its signer.
    ThumbprintMissing,
}

impl ValidationOutcome {
    /// Returns `true` for [`Valid`](Self::Valid).
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Stable snake_case name, for logs and metrics labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::MalformedToken => "malformed_token",
            Self::SignatureInvalid => "signature_invalid",
            Self::CertificateNotTrusted => "certificate_not_trusted",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::AudienceMismatch => "audience_mismatch",
            Self::ThumbprintMissing => "thumbprint_missing",
        }
    }

    /// Text safe to return to an untrusted caller.
    ///
    /// All rejections share one message so callers cannot probe which gate
    /// failed.
    #[must_use]
    pub const fn public_message(self) -> &'static str {
        match self {
            Self::Valid => "authenticated",
            _ => DENIED_PUBLIC_MESSAGE,
        }
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity established by a valid token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentity {
    /// Authenticated subject.
    pub subject: String,
    /// Certificate that signed the token.
    pub signer_thumbprint: Thumbprint,
    /// Token id.
    pub token_id: String,
}

/// Result of [`TokenValidator::validate`].
///
/// Only a `Valid` result carries a [`ResolvedIdentity`]. The `detail` text
/// is diagnostic; do not branch on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    outcome: ValidationOutcome,
    resolved: Option<ResolvedIdentity>,
    detail: String,
    generation: u64,
}

impl ValidationResult {
    fn valid(identity: ResolvedIdentity, generation: u64) -> Self {
        Self {
            outcome: ValidationOutcome::Valid,
            resolved: Some(identity),
            detail: "token is valid".to_owned(),
            generation,
        }
    }

    fn rejected(outcome: ValidationOutcome, detail: impl Into<String>, generation: u64) -> Self {
        debug_assert!(!outcome.is_valid());
        Self { outcome, resolved: None, detail: detail.into(), generation }
    }

    /// The decision.
    #[must_use]
    pub fn outcome(&self) -> ValidationOutcome {
        self.outcome
    }

    /// Returns `true` if the token is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.outcome.is_valid()
    }

    /// The resolved identity, present only for valid tokens.
    #[must_use]
    pub fn resolved(&self) -> Option<&ResolvedIdentity> {
        self.resolved.as_ref()
    }

    /// Consumes the result, returning the identity of a valid token.
    #[must_use]
    pub fn into_identity(self) -> Option<ResolvedIdentity> {
        self.resolved
    }

    /// Human-readable diagnostic.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Generation of the trust snapshot the decision was made against.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Validates tokens against a rotating trust store.
///
/// # Example
///
/// ```no_run
/// // Requires a loaded trust store and an encoded token.
/// use std::sync::Arc;
/// use rollcert_authn::{TokenValidator, ValidatorConfig};
/// use rollcert_store::TrustStore;
///
/// # fn example(store: Arc<TrustStore>, token: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let config = ValidatorConfig::builder().expected_audience("api").build()?;
/// let validator = TokenValidator::new(store, config)?;
///
/// let result = validator.validate_default(token);
/// match result.resolved() {
///     Some(identity) => println!("authenticated {}", identity.subject),
///     None => println!("rejected: {}", result.outcome().public_message()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenValidator {
    store: Arc<TrustStore>,
    config: ValidatorConfig,
    leeway: TimeDelta,
}

impl TokenValidator {
    /// Creates a validator over a shared trust store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(store: Arc<TrustStore>, config: ValidatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let leeway = TimeDelta::from_std(config.leeway)
            .map_err(|e| ConfigError::invalid_value("leeway", e.to_string()))?;
        Ok(Self { store, config, leeway })
    }

    /// Returns the validator configuration.
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validates a token for the configured expected audience.
    #[must_use]
    pub fn validate_default(&self, token: &str) -> ValidationResult {
        self.validate(token, &self.config.expected_audience)
    }

    /// Validates a token against the current snapshot.
    #[must_use]
    pub fn validate(&self, token: &str, expected_audience: &str) -> ValidationResult {
        self.validate_at(token, expected_audience, Utc::now())
    }

    /// Validates a token against the current snapshot as of `now`.
    ///
    /// The snapshot is loaded once and used for the whole decision.
    #[tracing::instrument(skip(self, token), fields(generation = tracing::field::Empty))]
    #[must_use]
    pub fn validate_at(
        &self,
        token: &str,
        expected_audience: &str,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        let snapshot = self.store.snapshot();
        tracing::Span::current().record("generation", snapshot.generation());

        let result = self.validate_with_snapshot(token, &snapshot, expected_audience, now);

        tracing::debug!(
            outcome = %result.outcome(),
            detail = result.detail(),
            "token validated"
        );
        result
    }

    /// Validates a token against an explicit snapshot.
    #[must_use]
    pub fn validate_with_snapshot(
        &self,
        token: &str,
        snapshot: &TrustSnapshot,
        expected_audience: &str,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        use ValidationOutcome::*;

        let generation = snapshot.generation();
        let reject =
            |outcome, detail: String| ValidationResult::rejected(outcome, detail, generation);

        // 1. Parse
        let decoded = match canonical::decode(token) {
            Ok(decoded) => decoded,
            Err(err) => return reject(MalformedToken, err.to_string()),
        };
        let claims = &decoded.claims;

        // 2. Signer named
        let Some(x5t) = claims.x5t.as_deref().filter(|x5t| !x5t.is_empty()) else {
            return reject(ThumbprintMissing, "token does not name a signer certificate".into());
        };

        // 3. Signer trusted
        let Some(record) = snapshot.lookup(x5t) else {
            return reject(
                CertificateNotTrusted,
                format!("certificate {x5t} is not in trust snapshot generation {generation}"),
            );
        };

        // 4. Signature
        if decoded.algorithm != record.algorithm() || decoded.public_key != *record.public_key() {
            return reject(
                SignatureInvalid,
                format!("header key does not match certificate {}", record.thumbprint()),
            );
        }
        let input = match decoded.signing_input() {
            Ok(input) => input,
            Err(err) => return reject(MalformedToken, err.to_string()),
        };
        let verified = jsonwebtoken::crypto::verify(
            &decoded.signature,
            input.as_bytes(),
            record.decoding_key(),
            record.algorithm().jwt_algorithm(),
        );
        if !matches!(verified, Ok(true)) {
            return reject(
                SignatureInvalid,
                format!("signature does not verify with certificate {}", record.thumbprint()),
            );
        }

        // 5-6. Validity window
        let earliest = claims.nbf.checked_sub_signed(self.leeway).unwrap_or(claims.nbf);
        if now < earliest {
            return reject(NotYetValid, format!("token is not valid before {}", claims.nbf));
        }
        let latest = claims.exp.checked_add_signed(self.leeway).unwrap_or(claims.exp);
        if now >= latest {
            return reject(Expired, format!("token expired at {}", claims.exp));
        }

        // 7. Audience
        if claims.aud != expected_audience {
            return reject(
                AudienceMismatch,
                format!("token audience '{}' does not match expected '{expected_audience}'", claims.aud),
            );
        }

        ValidationResult::valid(
            ResolvedIdentity {
                subject: claims.sub.clone(),
                signer_thumbprint: record.thumbprint().clone(),
                token_id: claims.jti.clone(),
            },
            generation,
        )
    }
}
