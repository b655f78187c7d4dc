//! Token error types.
//!
//! Issuance failures are errors ([`IssuanceError`]). Validation failures
//! are not: the validator reports them as
//! [`ValidationOutcome`](crate::validator::ValidationOutcome)s. The parse
//! layer's [`TokenFormatError`] only surfaces as the diagnostic detail of a
//! `MalformedToken` outcome.

use thiserror::Error;

/// Generic message shown to untrusted callers when issuance fails.
const ISSUANCE_PUBLIC_MESSAGE: &str = "token issuance failed";

/// Errors returned by [`TokenIssuer`](crate::issuer::TokenIssuer).
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IssuanceError {
    /// The current trust snapshot has no certificate that can sign.
    #[error("No issuance certificate is configured")]
    NoIssuanceCertificate,

    /// The cryptographic signing operation failed.
    #[error("Signing failed: {message}")]
    SigningFailure {
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<jsonwebtoken::errors::Error>,
    },

    /// The request was rejected before signing.
    #[error("Invalid issuance request: {0}")]
    InvalidRequest(String),
}

impl IssuanceError {
    /// Creates a [`SigningFailure`](Self::SigningFailure) error without a source.
    #[must_use]
    pub fn signing_failure(message: impl Into<String>) -> Self {
        Self::SigningFailure { message: message.into(), source: None }
    }

    /// Creates an [`InvalidRequest`](Self::InvalidRequest) error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Text safe to return to an untrusted caller.
    ///
    /// Request validation errors describe the caller's own input and are
    /// returned as-is; everything else collapses to a generic message.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidRequest(message) => format!("invalid request: {message}"),
            Self::NoIssuanceCertificate | Self::SigningFailure { .. } => {
                ISSUANCE_PUBLIC_MESSAGE.to_owned()
            },
        }
    }
}

impl From<jsonwebtoken::errors::Error> for IssuanceError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::SigningFailure { message: err.to_string(), source: Some(err) }
    }
}

/// Result type alias for issuance operations.
pub type Result<T> = std::result::Result<T, IssuanceError>;

/// Reasons a token string fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TokenFormatError {
    /// The token string is empty.
    #[error("Token is empty")]
    Empty,

    /// The token exceeds the maximum accepted length.
    #[error("Token length {length} exceeds maximum of {max}")]
    TooLong {
        /// Actual length in bytes.
        length: usize,
        /// Maximum accepted length in bytes.
        max: usize,
    },

    /// The token does not have exactly three dot-separated segments.
    #[error("Token must have 3 segments, found {0}")]
    SegmentCount(usize),

    /// A segment is not valid unpadded base64url.
    #[error("Invalid base64url in {segment} segment")]
    Encoding {
        /// Which segment failed (`header`, `claims`, `signature`).
        segment: &'static str,
    },

    /// A segment is not valid JSON for its schema.
    #[error("Invalid {segment} JSON: {message}")]
    Json {
        /// Which segment failed.
        segment: &'static str,
        /// Parser message.
        message: String,
    },

    /// The header is structurally valid but not an accepted RCT header.
    #[error("Invalid header: {0}")]
    Header(String),

    /// The algorithm is forbidden or unsupported.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A required claim is missing or empty.
    #[error("Missing claim: {0}")]
    MissingClaim(&'static str),

    /// A claim has an invalid value.
    #[error("Invalid claim {claim}: {message}")]
    InvalidClaim {
        /// Claim name.
        claim: &'static str,
        /// Description of the problem.
        message: String,
    },
}

impl TokenFormatError {
    pub(crate) fn json(segment: &'static str, err: &serde_json::Error) -> Self {
        Self::Json { segment, message: err.to_string() }
    }

    pub(crate) fn invalid_claim(claim: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidClaim { claim, message: message.into() }
    }
}

/// Invalid issuer or validator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required field is empty.
    #[error("Configuration field '{0}' cannot be empty")]
    EmptyField(&'static str),

    /// A field has an out-of-range value.
    #[error("Invalid configuration for '{field}': {message}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid_value(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue { field, message: message.into() }
    }
}
