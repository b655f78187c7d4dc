//! Algorithm and claim format checks.
//!
//! This module provides the security checks applied while parsing a token,
//! before any trust store lookup.
//!
//! # Security
//!
//! - Strict algorithm checks prevent algorithm substitution attacks
//! - Only asymmetric algorithms bound to a certificate key type are allowed
//! - Symmetric algorithms and "none" are always rejected

use rollcert_store::SignatureAlgorithm;

use crate::error::TokenFormatError;

/// Forbidden algorithms that are never accepted for security reasons.
///
/// These algorithms are blocked because:
/// - `none`: No signature verification (trivially bypassable)
/// - `HS256`, `HS384`, `HS512`: Symmetric algorithms (shared secret vulnerability)
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accepted algorithms, one per supported certificate key type.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["EdDSA", "ES256", "RS256"];

/// Maximum length of a token id.
pub const MAX_TOKEN_ID_LENGTH: usize = 128;

/// Validate a header algorithm against security policies.
///
/// # Errors
///
/// Returns [`TokenFormatError::UnsupportedAlgorithm`] if:
/// - Algorithm is symmetric (HS256, HS384, HS512)
/// - Algorithm is "none"
/// - Algorithm is not in [`ACCEPTED_ALGORITHMS`]
///
/// # Examples
///
/// ```
/// use rollcert_authn::validation::validate_algorithm;
/// use rollcert_store::SignatureAlgorithm;
///
/// assert_eq!(validate_algorithm("ES256").unwrap(), SignatureAlgorithm::Es256);
/// assert!(validate_algorithm("HS256").is_err());
/// assert!(validate_algorithm("none").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<SignatureAlgorithm, TokenFormatError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(TokenFormatError::UnsupportedAlgorithm(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(TokenFormatError::UnsupportedAlgorithm(format!(
            "Algorithm '{alg}' is not in accepted list"
        )));
    }

    alg.parse::<SignatureAlgorithm>()
        .map_err(|e| TokenFormatError::UnsupportedAlgorithm(e.to_string()))
}

/// Validate the format of a token id (`jti`).
///
/// Ids are 1 to [`MAX_TOKEN_ID_LENGTH`] characters of ASCII alphanumerics,
/// hyphens and underscores.
///
/// # Errors
///
/// Returns [`TokenFormatError::MissingClaim`] for an empty id and
/// [`TokenFormatError::InvalidClaim`] for an oversized or badly formed one.
pub fn validate_token_id(jti: &str) -> Result<(), TokenFormatError> {
    if jti.is_empty() {
        return Err(TokenFormatError::MissingClaim("jti"));
    }

    if jti.len() > MAX_TOKEN_ID_LENGTH {
        return Err(TokenFormatError::invalid_claim(
            "jti",
            format!("exceeds maximum length of {MAX_TOKEN_ID_LENGTH}"),
        ));
    }

    if !jti.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(TokenFormatError::invalid_claim("jti", "contains invalid characters"));
    }

    Ok(())
}

/// Require a claim to be non-empty.
///
/// # Errors
///
/// Returns [`TokenFormatError::MissingClaim`] if `value` is empty.
pub fn require_claim(name: &'static str, value: &str) -> Result<(), TokenFormatError> {
    if value.is_empty() { Err(TokenFormatError::MissingClaim(name)) } else { Ok(()) }
}
