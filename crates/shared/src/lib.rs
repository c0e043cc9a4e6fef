//! # lnpkg-shared
//!
//! Shared error envelopes, and secret handling for the lnpkg workspace.
//!
//! Every fallible operation in the config crate converts its local error enum
//! into an [`ErrorEnvelope`] at the boundary, so the CLI (and any embedding
//! platform) sees one stable shape: a `namespace:code`, a message, and
//! redaction-aware metadata.
//!
//! ## Design Principles
//!
//! 1. **No workspace dependencies** - This crate only depends on external crates
//! 2. **Serde-compatible** - Envelopes serialize for machine-readable output
//! 3. **Secrets never print** - [`SecretString`] redacts on `Display`/`Debug`

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod errors;
pub mod redaction;

pub use errors::{
    ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata, REDACTED_VALUE,
    UnexpectedError, normalize_unexpected_error,
};
pub use redaction::{REDACTED, SecretString, is_secret_key, redact_if_secret};

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::errors::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind};

    #[test]
    fn shared_error_types_are_available() {
        let error = ErrorEnvelope::expected(ErrorCode::invalid_input(), "invalid");
        assert_eq!(error.kind, ErrorKind::Expected);
        assert_eq!(error.class, ErrorClass::NonRetriable);
    }
}
