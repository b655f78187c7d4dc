//! Token issuance.
//!
//! [`TokenIssuer`] signs tokens with the private key of the current
//! snapshot's issuance certificate. The snapshot is read once per call, so
//! a rotation during issuance affects only later tokens.
//!
//! # Example
//!
//! ```no_run
//! // Requires a trust store loaded with an issuance certificate.
//! use std::{sync::Arc, time::Duration};
//! use rollcert_authn::{IssuerConfig, TokenIssuer};
//! use rollcert_store::TrustStore;
//!
//! # fn example(store: Arc<TrustStore>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = IssuerConfig::builder().issuer("auth").default_audience("api").build()?;
//! let issuer = TokenIssuer::new(store, config)?;
//!
//! let token = issuer.issue("user-42", "billing", Duration::from_secs(300))?;
//! println!("issued {} signed by {}", token.id(), token.signer_thumbprint());
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use fail::fail_point;
use rand_core::{OsRng, RngCore};
use rollcert_store::{CertificateRecord, TrustSnapshot, TrustStore};

use crate::{
    canonical::{self, TokenClaims, TokenHeader},
    config::IssuerConfig,
    error::{ConfigError, IssuanceError, Result},
    token::Token,
};

/// Prefix of generated token ids.
pub const TOKEN_ID_PREFIX: &str = "id-";

/// Random bytes in a generated token id.
const TOKEN_ID_BYTES: usize = 16;

/// Issues tokens signed by the current issuance certificate.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    store: Arc<TrustStore>,
    config: IssuerConfig,
}

impl TokenIssuer {
    /// Creates an issuer over a shared trust store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(store: Arc<TrustStore>, config: IssuerConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Returns the issuer configuration.
    #[must_use]
    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    /// Issues a token with the configured default audience and validity.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue).
    pub fn issue_default(&self, subject: &str) -> Result<Token> {
        self.issue(subject, &self.config.default_audience, self.config.default_validity)
    }

    /// Issues a token valid from now for `validity`.
    ///
    /// # Errors
    ///
    /// - [`IssuanceError::InvalidRequest`] if `subject` or `audience` is empty, or `validity` is
    ///   under one second or above the configured maximum
    /// - [`IssuanceError::NoIssuanceCertificate`] if the current snapshot cannot sign
    /// - [`IssuanceError::SigningFailure`] if the signing operation fails
    pub fn issue(&self, subject: &str, audience: &str, validity: Duration) -> Result<Token> {
        self.issue_at(subject, audience, validity, Utc::now())
    }

    /// Issues a token as of `now`.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue).
    #[tracing::instrument(skip(self, subject), fields(generation = tracing::field::Empty))]
    pub fn issue_at(
        &self,
        subject: &str,
        audience: &str,
        validity: Duration,
        now: DateTime<Utc>,
    ) -> Result<Token> {
        let snapshot = self.store.snapshot();
        tracing::Span::current().record("generation", snapshot.generation());
        self.issue_with_snapshot(&snapshot, subject, audience, validity, now)
    }

    /// Issues a token against an explicit snapshot.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue).
    pub fn issue_with_snapshot(
        &self,
        snapshot: &TrustSnapshot,
        subject: &str,
        audience: &str,
        validity: Duration,
        now: DateTime<Utc>,
    ) -> Result<Token> {
        let lifetime = self.check_request(subject, audience, validity)?;
        let signer = snapshot.current_issuer().ok_or(IssuanceError::NoIssuanceCertificate)?;

        if !signer.is_within_validity(now) {
            tracing::warn!(
                thumbprint = %signer.thumbprint(),
                not_before = %signer.not_before(),
                not_after = %signer.not_after(),
                "issuance certificate is outside its validity window; rotate certificates"
            );
        }

        let issued_at = now.trunc_subsecs(0);
        let not_on_or_after = issued_at
            .checked_add_signed(lifetime)
            .ok_or_else(|| IssuanceError::invalid_request("expiry is out of range"))?;

        let claims = TokenClaims {
            jti: generate_token_id(),
            iss: self.config.issuer.clone(),
            sub: subject.to_owned(),
            aud: audience.to_owned(),
            iat: issued_at,
            nbf: issued_at,
            exp: not_on_or_after,
            x5t: Some(signer.thumbprint().to_string()),
        };

        let token = sign(&signer, claims)?;

        tracing::debug!(
            token_id = token.id(),
            thumbprint = %token.signer_thumbprint(),
            expires = %token.not_on_or_after(),
            "token issued"
        );

        Ok(token)
    }

    fn check_request(&self, subject: &str, audience: &str, validity: Duration) -> Result<TimeDelta> {
        if subject.is_empty() {
            return Err(IssuanceError::invalid_request("subject cannot be empty"));
        }
        if audience.is_empty() {
            return Err(IssuanceError::invalid_request("audience cannot be empty"));
        }
        if validity < Duration::from_secs(1) {
            return Err(IssuanceError::invalid_request("validity must be at least 1 second"));
        }
        if validity > self.config.max_validity {
            return Err(IssuanceError::invalid_request(format!(
                "validity of {}s exceeds maximum of {}s",
                validity.as_secs(),
                self.config.max_validity.as_secs()
            )));
        }

        i64::try_from(validity.as_secs())
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| IssuanceError::invalid_request("validity is out of range"))
    }
}

fn sign(signer: &CertificateRecord, claims: TokenClaims) -> Result<Token> {
    fail_point!("issuer-before-sign", |_| {
        Err(IssuanceError::signing_failure("injected failure before sign"))
    });

    let private_key = signer.private_key().ok_or(IssuanceError::NoIssuanceCertificate)?;
    let algorithm = signer.algorithm();
    let header = TokenHeader::for_key(signer.public_key());

    let input = canonical::signing_input(&header, &claims)
        .map_err(|e| IssuanceError::signing_failure(e.to_string()))?;
    let signature = jsonwebtoken::crypto::sign(
        input.as_bytes(),
        &private_key.encoding_key(algorithm),
        algorithm.jwt_algorithm(),
    )?;
    let encoded = canonical::assemble(&input, &signature);

    Ok(Token::from_signed_parts(
        &header,
        claims,
        signer.thumbprint().clone(),
        signer.public_key().clone(),
        signature,
        encoded,
    ))
}

/// Generates a token id: [`TOKEN_ID_PREFIX`] followed by 32 lowercase hex characters.
#[must_use]
pub fn generate_token_id() -> String {
    let mut bytes = [0u8; TOKEN_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{TOKEN_ID_PREFIX}{}", hex::encode(bytes))
}
