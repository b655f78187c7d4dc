//! Fuzz target for token parsing and validation.
//!
//! Feeds arbitrary byte strings as encoded tokens to the parser and the
//! validator. Every input must produce either a parsed token or a
//! `TokenFormatError`, and the validator must return an outcome without
//! panicking.

#![no_main]

use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;
use rollcert_authn::{TokenValidator, ValidatorConfig, canonical};
use rollcert_store::TrustStore;

fn validator() -> &'static TokenValidator {
    static VALIDATOR: OnceLock<TokenValidator> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        let config = ValidatorConfig::builder()
            .expected_audience("api")
            .build()
            .unwrap_or_else(|e| panic!("fuzz validator config: {e}"));
        TokenValidator::new(Arc::new(TrustStore::empty()), config)
            .unwrap_or_else(|e| panic!("fuzz validator: {e}"))
    })
}

fuzz_target!(|data: &[u8]| {
    // Tokens are always UTF-8 strings
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    // Must not panic on any input
    if let Ok(decoded) = canonical::decode(token) {
        // A parsed token re-serializes to a signing input
        let _ = decoded.signing_input();
    }

    // An empty store trusts nothing: nothing may validate
    let result = validator().validate(token, "api");
    assert!(!result.is_valid());
});
