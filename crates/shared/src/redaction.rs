//! Secret detection and redaction utilities.
//!
//! Node configs carry RPC credentials, UI passwords, and plugin logins. These
//! helpers keep them out of error metadata, logs, and `Debug` output.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Checks if a key/variable name likely refers to a secret.
///
/// Uses case-insensitive pattern matching to detect common secret-related
/// naming conventions.
///
/// # Examples
///
/// ```
/// use lnpkg_shared::is_secret_key;
///
/// assert!(is_secret_key("bitcoin-rpcpassword"));
/// assert!(is_secret_key("LNPKG_BITCOIN_RPC_PASSWORD"));
/// assert!(is_secret_key("sparko-login"));
/// assert!(!is_secret_key("cltv-delta"));
/// ```
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    key.contains("PASS")
        || key.contains("TOKEN")
        || key.contains("SECRET")
        || key.contains("LOGIN")
        || key.contains("CREDENTIAL")
        || key.contains("AUTH")
}

/// Redacts a value if the key is likely a secret.
///
/// # Examples
///
/// ```
/// use lnpkg_shared::redact_if_secret;
///
/// assert_eq!(redact_if_secret("ui-password", "abc"), "[REDACTED]");
/// assert_eq!(redact_if_secret("fee-base", "1000"), "1000");
/// ```
pub fn redact_if_secret(key: &str, value: &str) -> String {
    if is_secret_key(key) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

/// The redacted placeholder string.
pub const REDACTED: &str = "[REDACTED]";

/// A secret string wrapper that redacts on Display/Debug.
///
/// Serialization writes the real value: the persisted config document is the
/// only place the secret is allowed to live.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecretString(Box<str>);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<Box<str>>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying secret.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl AsRef<str> for SecretString {
    fn as_ref(&self) -> &str {
        self.expose()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_config_secret_keys() {
        assert!(is_secret_key("ui-password"));
        assert!(is_secret_key("bitcoin-rpcpassword"));
        assert!(is_secret_key("btc_rpc_password"));
        assert!(is_secret_key("sparko-login"));
        assert!(is_secret_key("rpc_auth"));
    }

    #[test]
    fn rejects_non_secret_keys() {
        assert!(!is_secret_key("alias"));
        assert!(!is_secret_key("fee-per-satoshi"));
        assert!(!is_secret_key("add-watchtowers"));
        assert!(!is_secret_key("HOST_IP"));
    }

    #[test]
    fn redacts_secret_values() {
        assert_eq!(redact_if_secret("bitcoin-rpcpassword", "hunter2"), REDACTED);
        assert_eq!(redact_if_secret("cltv-delta", "40"), "40");
    }

    #[test]
    fn secret_string_redacts_display_but_serializes() -> Result<(), Box<dyn std::error::Error>> {
        let secret = SecretString::new("shh");
        assert_eq!(secret.to_string(), REDACTED);
        assert_eq!(format!("{secret:?}"), REDACTED);
        assert_eq!(serde_json::to_string(&secret)?, "\"shh\"");

        let parsed: SecretString = serde_json::from_str("\"back\"")?;
        assert_eq!(parsed.expose(), "back");
        Ok(())
    }
}
