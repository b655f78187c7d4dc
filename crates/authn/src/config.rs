//! Issuer and validator configuration.
//!
//! Both structs deserialize from any `serde` format, with durations written
//! in `humantime` form (`"1h"`, `"30s"`), and can be built in code through
//! their `bon` builders, which validate on `build()`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default token validity (1 hour).
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(60 * 60);

/// Default upper bound on requested token validity (24 hours).
pub const DEFAULT_MAX_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Largest accepted clock skew allowance (5 minutes).
pub const MAX_LEEWAY: Duration = Duration::from_secs(5 * 60);

/// Configuration for [`TokenIssuer`](crate::issuer::TokenIssuer).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use rollcert_authn::IssuerConfig;
///
/// let config = IssuerConfig::builder()
///     .issuer("auth.example.internal")
///     .default_audience("api")
///     .default_validity(Duration::from_secs(900))
///     .build()?;
///
/// assert_eq!(config.max_validity(), Duration::from_secs(86_400));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuerConfig {
    /// Value of the `iss` claim.
    pub(crate) issuer: String,

    /// Audience used by `issue_default`.
    pub(crate) default_audience: String,

    /// Validity used by `issue_default`.
    #[serde(with = "humantime_serde", default = "default_validity")]
    pub(crate) default_validity: Duration,

    /// Upper bound on requested validity.
    #[serde(with = "humantime_serde", default = "default_max_validity")]
    pub(crate) max_validity: Duration,
}

fn default_validity() -> Duration {
    DEFAULT_VALIDITY
}

fn default_max_validity() -> Duration {
    DEFAULT_MAX_VALIDITY
}

#[bon::bon]
impl IssuerConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `default_validity` - Validity for `issue_default` (default: 1 hour).
    /// * `max_validity` - Upper bound on requested validity (default: 24 hours).
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    #[builder]
    pub fn new(
        #[builder(into)] issuer: String,
        #[builder(into)] default_audience: String,
        #[builder(default = DEFAULT_VALIDITY)] default_validity: Duration,
        #[builder(default = DEFAULT_MAX_VALIDITY)] max_validity: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { issuer, default_audience, default_validity, max_validity };
        config.validate()?;
        Ok(config)
    }

    /// Checks field values. Deserialized configs should be validated before use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `issuer` or `default_audience` is empty
    /// - `max_validity` is shorter than one second
    /// - `default_validity` is shorter than one second or exceeds `max_validity`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::EmptyField("issuer"));
        }
        if self.default_audience.is_empty() {
            return Err(ConfigError::EmptyField("default_audience"));
        }
        if self.max_validity < Duration::from_secs(1) {
            return Err(ConfigError::invalid_value("max_validity", "must be at least 1s"));
        }
        if self.default_validity < Duration::from_secs(1) {
            return Err(ConfigError::invalid_value("default_validity", "must be at least 1s"));
        }
        if self.default_validity > self.max_validity {
            return Err(ConfigError::invalid_value(
                "default_validity",
                format!(
                    "{}s exceeds max_validity of {}s",
                    self.default_validity.as_secs(),
                    self.max_validity.as_secs()
                ),
            ));
        }
        Ok(())
    }

    /// Returns the issuer name.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the default audience.
    #[must_use]
    pub fn default_audience(&self) -> &str {
        &self.default_audience
    }

    /// Returns the default validity.
    #[must_use]
    pub fn default_validity(&self) -> Duration {
        self.default_validity
    }

    /// Returns the maximum validity.
    #[must_use]
    pub fn max_validity(&self) -> Duration {
        self.max_validity
    }
}

/// Configuration for [`TokenValidator`](crate::validator::TokenValidator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Audience accepted by `validate_default`.
    pub(crate) expected_audience: String,

    /// Clock skew tolerated on `nbf` and `exp`.
    #[serde(with = "humantime_serde", default)]
    pub(crate) leeway: Duration,
}

#[bon::bon]
impl ValidatorConfig {
    /// Creates a new configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `expected_audience` is empty or `leeway`
    /// exceeds [`MAX_LEEWAY`].
    #[builder]
    pub fn new(
        #[builder(into)] expected_audience: String,
        #[builder(default)] leeway: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { expected_audience, leeway };
        config.validate()?;
        Ok(config)
    }

    /// Checks field values.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.expected_audience.is_empty() {
            return Err(ConfigError::EmptyField("expected_audience"));
        }
        if self.leeway > MAX_LEEWAY {
            return Err(ConfigError::invalid_value("leeway", "must not exceed 5m"));
        }
        Ok(())
    }

    /// Returns the expected audience.
    #[must_use]
    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }

    /// Returns the clock skew allowance.
    #[must_use]
    pub fn leeway(&self) -> Duration {
        self.leeway
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_issuer_defaults() {
        let config = IssuerConfig::builder().issuer("iss").default_audience("api").build().unwrap();
        assert_eq!(config.default_validity(), DEFAULT_VALIDITY);
        assert_eq!(config.max_validity(), DEFAULT_MAX_VALIDITY);
    }

    #[test]
    fn test_issuer_rejects_empty_fields() {
        let result = IssuerConfig::builder().issuer("").default_audience("api").build();
        assert_eq!(result.unwrap_err(), ConfigError::EmptyField("issuer"));

        let result = IssuerConfig::builder().issuer("iss").default_audience("").build();
        assert_eq!(result.unwrap_err(), ConfigError::EmptyField("default_audience"));
    }

    #[test]
    fn test_issuer_rejects_default_above_max() {
        let result = IssuerConfig::builder()
            .issuer("iss")
            .default_audience("api")
            .default_validity(Duration::from_secs(7200))
            .max_validity(Duration::from_secs(3600))
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { field: "default_validity", .. })));
    }

    #[test]
    fn test_issuer_rejects_sub_second_validity() {
        let result = IssuerConfig::builder()
            .issuer("iss")
            .default_audience("api")
            .default_validity(Duration::from_millis(500))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_issuer_deserialize() {
        let config: IssuerConfig = serde_json::from_str(
            r#"{"issuer":"auth","default_audience":"api","default_validity":"15m","max_validity":"2h"}"#,
        )
        .unwrap();
        assert_eq!(config.default_validity(), Duration::from_secs(900));
        assert_eq!(config.max_validity(), Duration::from_secs(7200));
        assert!(config.validate().is_ok());

        let config: IssuerConfig =
            serde_json::from_str(r#"{"issuer":"auth","default_audience":"api"}"#).unwrap();
        assert_eq!(config.default_validity(), DEFAULT_VALIDITY);
    }

    #[test]
    fn test_issuer_deserialize_rejects_unknown_fields() {
        let result = serde_json::from_str::<IssuerConfig>(
            r#"{"issuer":"auth","default_audience":"api","ttl":"1h"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validator_config() {
        let config = ValidatorConfig::builder().expected_audience("api").build().unwrap();
        assert_eq!(config.leeway(), Duration::ZERO);

        let config: ValidatorConfig =
            serde_json::from_str(r#"{"expected_audience":"api","leeway":"30s"}"#).unwrap();
        assert_eq!(config.leeway(), Duration::from_secs(30));

        let result = ValidatorConfig::builder()
            .expected_audience("api")
            .leeway(Duration::from_secs(600))
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { field: "leeway", .. })));

        assert!(ValidatorConfig::builder().expected_audience("").build().is_err());
    }
}
