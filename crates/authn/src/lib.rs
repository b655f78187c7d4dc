//! # Rolling Certificate Tokens
//!
//! Issues and validates signed identity tokens against a rotating set of
//! trusted certificates held by [`rollcert_store::TrustStore`].
//!
//! This crate provides:
//! - **Issuance**: [`TokenIssuer`] signs tokens with the current issuance certificate
//! - **Validation**: [`TokenValidator`] checks structure, signer trust, signature, validity window
//!   and audience, returning a [`ValidationOutcome`] for every input
//! - **Wire format**: [`canonical`] defines the three-segment encoding and its strict parser
//! - **Algorithm policy**: only asymmetric algorithms (EdDSA, ES256, RS256) are accepted
//!
//! Both sides read one trust snapshot per call, so certificate rotation never
//! affects a request already in flight.
//!
//! ## Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//! use rollcert_authn::{IssuerConfig, TokenIssuer, TokenValidator, ValidatorConfig};
//! use rollcert_store::TrustStore;
//!
//! # fn example(store: Arc<TrustStore>) -> Result<(), Box<dyn std::error::Error>> {
//! let issuer = TokenIssuer::new(
//!     Arc::clone(&store),
//!     IssuerConfig::builder().issuer("auth").default_audience("api").build()?,
//! )?;
//! let validator = TokenValidator::new(
//!     store,
//!     ValidatorConfig::builder().expected_audience("api").leeway(Duration::from_secs(5)).build()?,
//! )?;
//!
//! let token = issuer.issue_default("user-42")?;
//! let result = validator.validate_default(token.encoded());
//! assert!(result.is_valid());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Wire format encoding and parsing.
pub mod canonical;
/// Issuer and validator configuration.
pub mod config;
/// Error types.
pub mod error;
/// Token issuance.
pub mod issuer;
/// Shared test utilities.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
pub mod testutil;
/// Signed tokens.
pub mod token;
/// Algorithm and claim validation.
pub mod validation;
/// Token validation.
pub mod validator;

pub use config::{DEFAULT_MAX_VALIDITY, DEFAULT_VALIDITY, IssuerConfig, MAX_LEEWAY, ValidatorConfig};
pub use error::{ConfigError, IssuanceError, Result, TokenFormatError};
pub use issuer::{TOKEN_ID_PREFIX, TokenIssuer, generate_token_id};
pub use token::Token;
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
pub use validator::{ResolvedIdentity, TokenValidator, ValidationOutcome, ValidationResult};
