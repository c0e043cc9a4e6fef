//! Cross-service compatibility rules.
//!
//! These rules check a dependency's configuration, and their fixes edit the
//! dependency's document. Only the fields the rules read are typed; every
//! other key round-trips untouched through the `extra` maps.

use super::{FixOutcome, Rule, RuleSet};
use crate::document::ConfigDocument;
use crate::schema::SchemaError;
use crate::secrets::SecretSource;
use crate::version::DottedVersion;
use lnpkg_shared::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// RPC proxy user this node authenticates as.
pub const PROXY_USER_NAME: &str = "c-lightning";

/// RPC calls the node needs through the proxy.
pub const PROXY_ALLOWED_CALLS: [&str; 9] = [
    "echo",
    "gettxout",
    "getblockchaininfo",
    "sendrawtransaction",
    "getblockhash",
    "getblock",
    "getblockcount",
    "estimatesmartfee",
    "getnetworkinfo",
];

/// Oldest Bitcoin Core release usable directly.
pub const BITCOIND_MIN_VERSION: [u64; 2] = [29, 1];

const PRUNING_DISABLED: &str = "disabled";

/// RPC proxy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy users.
    pub users: Vec<ProxyUser>,
    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One RPC proxy user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProxyUser {
    /// User name.
    pub name: String,
    /// Permitted RPC calls.
    #[serde(default)]
    pub allowed_calls: Vec<String>,
    /// RPC password.
    pub password: SecretString,
    /// Whether the proxy fetches blocks from peers for this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_blocks: Option<bool>,
    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProxyConfig {
    /// Parse from a dependency document.
    pub fn from_document(document: &ConfigDocument) -> Result<Self, SchemaError> {
        from_document(document)
    }

    /// Lower back into a document.
    pub fn to_document(&self) -> Result<ConfigDocument, SchemaError> {
        to_document(self)
    }

    fn node_user(&self) -> Option<&ProxyUser> {
        self.users.iter().find(|user| user.name == PROXY_USER_NAME)
    }

    fn node_user_mut(&mut self) -> Option<&mut ProxyUser> {
        self.users.iter_mut().find(|user| user.name == PROXY_USER_NAME)
    }
}

/// Bitcoin Core configuration (the parts that matter here).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitcoindConfig {
    /// Advanced section.
    pub advanced: BitcoindAdvanced,
    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Bitcoin Core advanced section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitcoindAdvanced {
    /// Block pruning settings.
    pub pruning: Pruning,
    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Bitcoin Core pruning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pruning {
    /// Pruning mode (`disabled`, `automatic`, ...).
    pub mode: String,
    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BitcoindConfig {
    /// Parse from a dependency document.
    pub fn from_document(document: &ConfigDocument) -> Result<Self, SchemaError> {
        from_document(document)
    }

    /// Lower back into a document.
    pub fn to_document(&self) -> Result<ConfigDocument, SchemaError> {
        to_document(self)
    }

    /// `rpc.username`, when set.
    #[must_use]
    pub fn rpc_username(&self) -> Option<&str> {
        self.rpc_field("username")
    }

    /// `rpc.password`, when set.
    #[must_use]
    pub fn rpc_password(&self) -> Option<SecretString> {
        self.rpc_field("password").map(SecretString::from)
    }

    fn rpc_field(&self, key: &str) -> Option<&str> {
        self.extra
            .get("rpc")
            .and_then(|rpc| rpc.get(key))
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Bitcoin Core configuration paired with its declared package version.
#[derive(Debug, Clone, PartialEq)]
pub struct BitcoindDependency {
    /// Declared package version.
    pub version: DottedVersion,
    /// Current configuration.
    pub config: BitcoindConfig,
}

fn from_document<T: for<'de> Deserialize<'de>>(
    document: &ConfigDocument,
) -> Result<T, SchemaError> {
    serde_json::from_value(document.clone().into_value()).map_err(|error| {
        SchemaError::Malformed {
            reason: error.to_string(),
        }
    })
}

fn to_document<T: Serialize>(value: &T) -> Result<ConfigDocument, SchemaError> {
    let malformed = |reason: String| SchemaError::Malformed { reason };
    let value = serde_json::to_value(value).map_err(|error| malformed(error.to_string()))?;
    ConfigDocument::from_value(value).map_err(|error| malformed(error.to_string()))
}

/// RPC proxy rules in registration order.
#[must_use]
pub fn proxy_rules() -> RuleSet<ProxyConfig> {
    PROXY_ALLOWED_CALLS
        .into_iter()
        .fold(RuleSet::new().with_rule(ProxyUserExists), |rules, call| {
            rules.with_rule(ProxyAllowsCall(call))
        })
        .with_rule(ProxyFetchesBlocks)
}

/// Bitcoin Core rules in registration order.
#[must_use]
pub fn bitcoind_rules() -> RuleSet<BitcoindDependency> {
    RuleSet::new()
        .with_rule(BitcoindVersion)
        .with_rule(PruningDisabled)
}

struct ProxyUserExists;

impl Rule<ProxyConfig> for ProxyUserExists {
    fn name(&self) -> &'static str {
        "proxy-user-exists"
    }

    fn check(&self, config: &ProxyConfig) -> Option<String> {
        config
            .node_user()
            .is_none()
            .then(|| format!("Must have an RPC user named \"{PROXY_USER_NAME}\""))
    }

    fn fix(&self, config: &mut ProxyConfig, secrets: &mut dyn SecretSource) -> FixOutcome {
        config.users.push(ProxyUser {
            name: PROXY_USER_NAME.to_owned(),
            allowed_calls: Vec::new(),
            password: secrets.password(),
            fetch_blocks: None,
            extra: Map::new(),
        });
        FixOutcome::Applied
    }
}

struct ProxyAllowsCall(&'static str);

impl Rule<ProxyConfig> for ProxyAllowsCall {
    fn name(&self) -> &'static str {
        match self.0 {
            "echo" => "proxy-allows-echo",
            "gettxout" => "proxy-allows-gettxout",
            "getblockchaininfo" => "proxy-allows-getblockchaininfo",
            "sendrawtransaction" => "proxy-allows-sendrawtransaction",
            "getblockhash" => "proxy-allows-getblockhash",
            "getblock" => "proxy-allows-getblock",
            "getblockcount" => "proxy-allows-getblockcount",
            "estimatesmartfee" => "proxy-allows-estimatesmartfee",
            "getnetworkinfo" => "proxy-allows-getnetworkinfo",
            _ => "proxy-allows-call",
        }
    }

    fn check(&self, config: &ProxyConfig) -> Option<String> {
        let allowed = config
            .node_user()
            .is_some_and(|user| user.allowed_calls.iter().any(|call| call == self.0));
        (!allowed).then(|| {
            format!(
                "RPC user \"{PROXY_USER_NAME}\" must have \"{}\" enabled",
                self.0
            )
        })
    }

    fn fix(&self, config: &mut ProxyConfig, _: &mut dyn SecretSource) -> FixOutcome {
        let Some(user) = config.node_user_mut() else {
            return FixOutcome::Unavailable;
        };
        user.allowed_calls.push(self.0.to_owned());
        FixOutcome::Applied
    }
}

struct ProxyFetchesBlocks;

impl Rule<ProxyConfig> for ProxyFetchesBlocks {
    fn name(&self) -> &'static str {
        "proxy-fetch-blocks"
    }

    fn check(&self, config: &ProxyConfig) -> Option<String> {
        let enabled = config
            .node_user()
            .and_then(|user| user.fetch_blocks)
            .unwrap_or(false);
        (!enabled).then(|| {
            format!("RPC user \"{PROXY_USER_NAME}\" must have \"Fetch Blocks\" enabled")
        })
    }

    fn fix(&self, config: &mut ProxyConfig, _: &mut dyn SecretSource) -> FixOutcome {
        let Some(user) = config.node_user_mut() else {
            return FixOutcome::Unavailable;
        };
        user.fetch_blocks = Some(true);
        FixOutcome::Applied
    }
}

struct BitcoindVersion;

impl Rule<BitcoindDependency> for BitcoindVersion {
    fn name(&self) -> &'static str {
        "bitcoind-version"
    }

    fn check(&self, dependency: &BitcoindDependency) -> Option<String> {
        let minimum = DottedVersion::from_components(&BITCOIND_MIN_VERSION);
        (dependency.version < minimum).then(|| {
            format!(
                "Bitcoin Core {minimum} or newer is required (found {})",
                dependency.version
            )
        })
    }
}

struct PruningDisabled;

impl Rule<BitcoindDependency> for PruningDisabled {
    fn name(&self) -> &'static str {
        "bitcoind-pruning-disabled"
    }

    fn check(&self, dependency: &BitcoindDependency) -> Option<String> {
        (dependency.config.advanced.pruning.mode != PRUNING_DISABLED).then(|| {
            "Pruning must be disabled to use Bitcoin Core directly. To use with a pruned node, \
             set Bitcoin Core to \"Internal (Bitcoin Proxy)\" instead."
                .to_owned()
        })
    }

    fn fix(&self, dependency: &mut BitcoindDependency, _: &mut dyn SecretSource) -> FixOutcome {
        PRUNING_DISABLED.clone_into(&mut dependency.config.advanced.pruning.mode);
        FixOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::RngSecrets;
    use serde_json::json;
    use std::error::Error;

    fn proxy_document() -> Result<ConfigDocument, Box<dyn Error>> {
        Ok(ConfigDocument::from_value(json!({
            "tor-address": "proxy.onion",
            "users": [
                { "name": "lnd", "password": "p1", "allowed-calls": ["getblock"], "fetch-blocks": false }
            ],
            "advanced": { "tor-only": false }
        }))?)
    }

    #[test]
    fn missing_user_is_the_first_failure() -> Result<(), Box<dyn Error>> {
        let config = ProxyConfig::from_document(&proxy_document()?)?;
        let error = proxy_rules().validate(&config);
        assert_eq!(
            error.map(|error| error.message),
            Some("Must have an RPC user named \"c-lightning\"".to_owned())
        );
        Ok(())
    }

    #[test]
    fn auto_fix_configures_the_proxy_in_one_pass() -> Result<(), Box<dyn Error>> {
        let config = ProxyConfig::from_document(&proxy_document()?)?;
        let report = proxy_rules().auto_fix(config, &mut RngSecrets::seeded(8));
        assert!(report.is_valid());
        assert_eq!(report.applied.len(), 1 + PROXY_ALLOWED_CALLS.len() + 1);

        let document = report.target.to_document()?;
        assert_eq!(document.str_at(&["tor-address"]), Some("proxy.onion"));
        assert_eq!(document.get(&["advanced", "tor-only"]), Some(&json!(false)));

        let users = document
            .get(&["users"])
            .and_then(Value::as_array)
            .ok_or("users missing")?;
        assert_eq!(users.len(), 2);
        let node = users.get(1).ok_or("node user missing")?;
        assert_eq!(node.get("name"), Some(&json!("c-lightning")));
        assert_eq!(node.get("fetch-blocks"), Some(&json!(true)));
        assert_eq!(
            node.get("password").and_then(Value::as_str).map(str::len),
            Some(22)
        );
        assert_eq!(
            node.get("allowed-calls"),
            Some(&json!(PROXY_ALLOWED_CALLS))
        );
        Ok(())
    }

    #[test]
    fn missing_call_is_named() -> Result<(), Box<dyn Error>> {
        let mut config = ProxyConfig::from_document(&proxy_document()?)?;
        let mut secrets = RngSecrets::seeded(1);
        config = proxy_rules().auto_fix(config, &mut secrets).target;
        if let Some(user) = config.node_user_mut() {
            user.allowed_calls.retain(|call| call != "estimatesmartfee");
        }
        assert_eq!(
            proxy_rules().validate(&config).map(|error| error.message),
            Some("RPC user \"c-lightning\" must have \"estimatesmartfee\" enabled".to_owned())
        );
        Ok(())
    }

    fn bitcoind(version: &str, mode: &str) -> Result<BitcoindDependency, Box<dyn Error>> {
        let document = ConfigDocument::from_value(json!({
            "rpc": { "enable": true, "username": "bitcoin" },
            "advanced": { "pruning": { "mode": mode, "size": 550 }, "peers": {} }
        }))?;
        Ok(BitcoindDependency {
            version: DottedVersion::parse_package(version)?,
            config: BitcoindConfig::from_document(&document)?,
        })
    }

    #[test]
    fn pruned_bitcoind_is_rejected_and_fixed() -> Result<(), Box<dyn Error>> {
        let rules = bitcoind_rules();
        let dependency = bitcoind("29.1:1-beta.0", "automatic")?;
        let error = rules.validate(&dependency).ok_or("expected a failure")?;
        assert_eq!(error.rule, "bitcoind-pruning-disabled");
        assert!(error.message.starts_with("Pruning must be disabled"));

        let report = rules.auto_fix(dependency, &mut RngSecrets::seeded(0));
        assert!(report.is_valid());
        let document = report.target.config.to_document()?;
        assert_eq!(document.str_at(&["advanced", "pruning", "mode"]), Some("disabled"));
        assert_eq!(document.get(&["advanced", "pruning", "size"]), Some(&json!(550)));
        Ok(())
    }

    #[test]
    fn old_bitcoind_cannot_be_fixed() -> Result<(), Box<dyn Error>> {
        let report = bitcoind_rules().auto_fix(bitcoind("28.0", "disabled")?, &mut RngSecrets::seeded(0));
        assert!(report.applied.is_empty());
        assert_eq!(
            report.remaining.map(|error| error.message),
            Some("Bitcoin Core 29.1 or newer is required (found 28)".to_owned())
        );
        Ok(())
    }
}
