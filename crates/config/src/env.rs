//! Environment variable parsing for platform-provided inputs.
//!
//! This module keeps env parsing:
//! - strict (present-but-empty is an error, not "unset")
//! - closed (only the variables listed below are ever read)
//! - safe (secret values are redacted in error metadata)

use crate::compile::ExternalInputs;
use lnpkg_shared::{ErrorCode, ErrorEnvelope, SecretString, redact_if_secret};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Env var: public onion address of the peer interface.
pub const ENV_TOR_ADDRESS: &str = "TOR_ADDRESS";
/// Env var: host IP; the Tor proxy defaults to `HOST_IP:9050`.
pub const ENV_HOST_IP: &str = "HOST_IP";
/// Env var: explicit Tor proxy (`host:port`), overrides [`ENV_HOST_IP`].
pub const ENV_TOR_PROXY: &str = "LNPKG_TOR_PROXY";
/// Env var: Bitcoin Core RPC user.
pub const ENV_BITCOIN_RPC_USER: &str = "LNPKG_BITCOIN_RPC_USER";
/// Env var: Bitcoin Core RPC password (secret).
pub const ENV_BITCOIN_RPC_PASSWORD: &str = "LNPKG_BITCOIN_RPC_PASSWORD";
/// Env var: alias override used when the document has none.
pub const ENV_ALIAS: &str = "LNPKG_ALIAS";

/// Tor SOCKS port on the host.
pub const TOR_SOCKS_PORT: u16 = 9050;

/// Parsed platform environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalEnv {
    /// Peer onion address.
    pub tor_address: Option<String>,
    /// Host IP.
    pub host_ip: Option<IpAddr>,
    /// Explicit Tor proxy.
    pub tor_proxy: Option<String>,
    /// Bitcoin Core RPC user.
    pub bitcoin_rpc_user: Option<String>,
    /// Bitcoin Core RPC password.
    pub bitcoin_rpc_password: Option<SecretString>,
    /// Alias override.
    pub alias: Option<String>,
}

impl ExternalEnv {
    /// Parse from an explicit variable map.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        let host_ip = parse_optional_trimmed_string(map, ENV_HOST_IP)?
            .map(|raw| {
                raw.parse::<IpAddr>()
                    .map_err(|_| EnvParseError::InvalidAddress {
                        var: ENV_HOST_IP,
                        value: raw.clone(),
                    })
            })
            .transpose()?;
        let tor_proxy = parse_optional_trimmed_string(map, ENV_TOR_PROXY)?
            .map(|raw| validate_host_port(ENV_TOR_PROXY, raw))
            .transpose()?;

        Ok(Self {
            tor_address: parse_optional_trimmed_string(map, ENV_TOR_ADDRESS)?,
            host_ip,
            tor_proxy,
            bitcoin_rpc_user: parse_optional_trimmed_string(map, ENV_BITCOIN_RPC_USER)?,
            bitcoin_rpc_password: parse_optional_secret(map, ENV_BITCOIN_RPC_PASSWORD)?,
            alias: parse_optional_trimmed_string(map, ENV_ALIAS)?,
        })
    }

    /// Parse from the current process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for name in [
            ENV_TOR_ADDRESS,
            ENV_HOST_IP,
            ENV_TOR_PROXY,
            ENV_BITCOIN_RPC_USER,
            ENV_BITCOIN_RPC_PASSWORD,
            ENV_ALIAS,
        ] {
            if let Ok(value) = std::env::var(name) {
                map.insert(name.to_owned(), value);
            }
        }
        Self::from_map(&map)
    }

    /// Effective Tor proxy: the explicit override, else `HOST_IP:9050`.
    #[must_use]
    pub fn effective_tor_proxy(&self) -> Option<String> {
        self.tor_proxy.clone().or_else(|| {
            self.host_ip.map(|ip| match ip {
                IpAddr::V4(ip) => format!("{ip}:{TOR_SOCKS_PORT}"),
                IpAddr::V6(ip) => format!("[{ip}]:{TOR_SOCKS_PORT}"),
            })
        })
    }

    /// Compiler inputs carried by the environment.
    #[must_use]
    pub fn to_external_inputs(&self) -> ExternalInputs {
        ExternalInputs {
            bitcoin_rpc_user: self.bitcoin_rpc_user.clone(),
            bitcoin_rpc_password: self.bitcoin_rpc_password.clone(),
            peer_address: self.tor_address.clone(),
            tor_proxy: self.effective_tor_proxy(),
            fallback_alias: self.alias.clone(),
        }
    }
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// A secret env var was present but empty after trimming.
    EmptySecret {
        /// Env var name.
        var: &'static str,
    },
    /// An address env var could not be parsed.
    InvalidAddress {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } | Self::EmptySecret { .. } => {
                ErrorCode::new("config", "empty_env_var")
            },
            Self::InvalidAddress { .. } => ErrorCode::new("config", "invalid_env_address"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } | Self::EmptySecret { var } => {
                write!(formatter, "{var} must be non-empty")
            },
            Self::InvalidAddress { var, .. } => {
                write!(formatter, "{var} must be a valid address")
            },
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } | EnvParseError::EmptySecret { var } => {
                envelope.with_metadata("env_var", var)
            },
            EnvParseError::InvalidAddress { var, value } => envelope
                .with_metadata("env_var", var)
                .with_metadata("value", redact_if_secret(var, &value)),
        }
    }
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<String>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    Ok(Some(trimmed.to_owned()))
}

fn parse_optional_secret(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<SecretString>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptySecret { var });
    }

    Ok(Some(SecretString::new(trimmed.to_owned())))
}

fn validate_host_port(var: &'static str, raw: String) -> Result<String, EnvParseError> {
    let valid = raw
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if valid {
        Ok(raw)
    } else {
        Err(EnvParseError::InvalidAddress { var, value: raw })
    }
}
