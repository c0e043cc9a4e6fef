//! Rules over the node's own configuration.

use super::{FixOutcome, Rule, RuleSet};
use crate::schema::{Clboss, DEFAULT_WATCHTOWER_PORT, DualFund, NodeConfig, WatchtowerClient};
use crate::secrets::SecretSource;
use regex::Regex;

/// Accepted shape of a watchtower entry: `<66-hex pubkey>@<host>[:<port>]`.
pub const WATCHTOWER_URI_PATTERN: &str = r"^[0-9a-fA-F]{66}@[^:]+(:\d{1,5})?$";

/// Node rules in registration order.
pub fn node_rules() -> Result<RuleSet<NodeConfig>, regex::Error> {
    Ok(RuleSet::new()
        .with_rule(AliasLength)
        .with_rule(ColorHex)
        .with_rule(FieldRanges)
        .with_rule(WatchtowerUriFormat::new()?)
        .with_rule(WatchtowerUriPort)
        .with_rule(WatchtowerUniquePubkey)
        .with_rule(DualFundChannelBounds)
        .with_rule(ClbossChannelBounds))
}

struct AliasLength;

impl Rule<NodeConfig> for AliasLength {
    fn name(&self) -> &'static str {
        "alias-length"
    }

    fn check(&self, config: &NodeConfig) -> Option<String> {
        let chars = config.alias.as_deref()?.chars().count();
        let max = NodeConfig::alias_max_chars();
        (chars == 0 || chars > max)
            .then(|| format!("Alias must be between 1 and {max} characters (found {chars})"))
    }
}

struct ColorHex;

impl Rule<NodeConfig> for ColorHex {
    fn name(&self) -> &'static str {
        "color-hex"
    }

    fn check(&self, config: &NodeConfig) -> Option<String> {
        let color = &config.color;
        let valid = color.len() == 6 && color.bytes().all(|byte| byte.is_ascii_hexdigit());
        (!valid).then(|| format!("Color must be 6 hexadecimal digits (found '{color}')"))
    }
}

struct FieldRanges;

impl Rule<NodeConfig> for FieldRanges {
    fn name(&self) -> &'static str {
        "field-ranges"
    }

    fn check(&self, config: &NodeConfig) -> Option<String> {
        let field = config.first_out_of_range()?;
        let found = field
            .value
            .map_or_else(|| "unset".to_owned(), |value| value.to_string());
        Some(format!(
            "{} must be between {} and {} (found {found})",
            field.field, field.min, field.max
        ))
    }
}

struct WatchtowerUriFormat {
    pattern: Regex,
}

impl WatchtowerUriFormat {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(WATCHTOWER_URI_PATTERN)?,
        })
    }

    fn accepts(&self, uri: &str) -> bool {
        if !self.pattern.is_match(uri) {
            return false;
        }
        port_of(uri).is_none_or(|port| port.parse::<u16>().is_ok())
    }
}

impl Rule<NodeConfig> for WatchtowerUriFormat {
    fn name(&self) -> &'static str {
        "watchtower-uri-format"
    }

    fn check(&self, config: &NodeConfig) -> Option<String> {
        let uri = config
            .watchtowers
            .wt_client
            .towers()
            .iter()
            .find(|uri| !self.accepts(uri))?;
        Some(format!(
            "Watchtower URI '{uri}' must be of the form <66-hex pubkey>@<host>[:<port>]"
        ))
    }
}

struct WatchtowerUriPort;

impl Rule<NodeConfig> for WatchtowerUriPort {
    fn name(&self) -> &'static str {
        "watchtower-uri-port"
    }

    fn check(&self, config: &NodeConfig) -> Option<String> {
        let uri = config
            .watchtowers
            .wt_client
            .towers()
            .iter()
            .find(|uri| port_of(uri).is_none())?;
        Some(format!(
            "Watchtower URI '{uri}' is missing a port (default is {DEFAULT_WATCHTOWER_PORT})"
        ))
    }

    fn fix(&self, config: &mut NodeConfig, _: &mut dyn SecretSource) -> FixOutcome {
        let WatchtowerClient::Enabled { add_watchtowers } = &mut config.watchtowers.wt_client
        else {
            return FixOutcome::Unavailable;
        };
        let mut outcome = FixOutcome::Unavailable;
        for uri in add_watchtowers.iter_mut().filter(|uri| port_of(uri).is_none()) {
            uri.push(':');
            uri.push_str(&DEFAULT_WATCHTOWER_PORT.to_string());
            outcome = FixOutcome::Applied;
        }
        outcome
    }
}

struct WatchtowerUniquePubkey;

impl Rule<NodeConfig> for WatchtowerUniquePubkey {
    fn name(&self) -> &'static str {
        "watchtower-unique-pubkey"
    }

    fn check(&self, config: &NodeConfig) -> Option<String> {
        let towers = config.watchtowers.wt_client.towers();
        let duplicate = towers.iter().enumerate().any(|(index, uri)| {
            towers
                .iter()
                .skip(index + 1)
                .any(|other| pubkey_of(uri) == pubkey_of(other))
        });
        duplicate.then(|| "Cannot add multiple watchtowers with the same pubkey".to_owned())
    }
}

struct DualFundChannelBounds;

impl Rule<NodeConfig> for DualFundChannelBounds {
    fn name(&self) -> &'static str {
        "dual-fund-channel-bounds"
    }

    fn check(&self, config: &NodeConfig) -> Option<String> {
        let DualFund::Enabled { other, .. } = &config.advanced.experimental.dual_fund else {
            return None;
        };
        if exceeds(other.per_channel_min_msat, other.per_channel_max_msat) {
            return Some(
                "Dual-funding per-channel minimum must not exceed the per-channel maximum"
                    .to_owned(),
            );
        }
        exceeds(other.min_their_funding_msat, other.max_their_funding_msat).then(|| {
            "Dual-funding minimum peer funding must not exceed the maximum peer funding"
                .to_owned()
        })
    }
}

struct ClbossChannelBounds;

impl Rule<NodeConfig> for ClbossChannelBounds {
    fn name(&self) -> &'static str {
        "clboss-channel-bounds"
    }

    fn check(&self, config: &NodeConfig) -> Option<String> {
        let Clboss::Enabled(options) = &config.advanced.plugins.clboss else {
            return None;
        };
        exceeds(options.min_channel, options.max_channel)
            .then(|| "CLBOSS minimum channel size must not exceed the maximum".to_owned())
    }
}

fn pubkey_of(uri: &str) -> &str {
    uri.split_once('@').map_or(uri, |(pubkey, _)| pubkey)
}

fn port_of(uri: &str) -> Option<&str> {
    let (_, location) = uri.split_once('@')?;
    location.rsplit_once(':').map(|(_, port)| port)
}

fn exceeds(min: Option<u64>, max: Option<u64>) -> bool {
    matches!((min, max), (Some(min), Some(max)) if min > max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ClbossOptions, DualFundOther, FundingPolicy, FundingStrategy};
    use crate::secrets::RngSecrets;
    use std::error::Error;

    const PUBKEY_A: &str = "03aa00000000000000000000000000000000000000000000000000000000000001";
    const PUBKEY_B: &str = "02bb00000000000000000000000000000000000000000000000000000000000002";

    fn config_with_towers(towers: &[String]) -> NodeConfig {
        let mut config = NodeConfig::with_defaults(&mut RngSecrets::seeded(9));
        config.watchtowers.wt_client = WatchtowerClient::Enabled {
            add_watchtowers: towers.to_vec(),
        };
        config
    }

    #[test]
    fn registration_order_is_fixed() -> Result<(), Box<dyn Error>> {
        let names: Vec<&str> = node_rules()?.names().collect();
        assert_eq!(
            names,
            [
                "alias-length",
                "color-hex",
                "field-ranges",
                "watchtower-uri-format",
                "watchtower-uri-port",
                "watchtower-unique-pubkey",
                "dual-fund-channel-bounds",
                "clboss-channel-bounds",
            ]
        );
        Ok(())
    }

    #[test]
    fn defaults_are_valid() -> Result<(), Box<dyn Error>> {
        let config = NodeConfig::with_defaults(&mut RngSecrets::seeded(1));
        assert_eq!(node_rules()?.validate(&config), None);
        Ok(())
    }

    #[test]
    fn duplicate_pubkeys_are_rejected() -> Result<(), Box<dyn Error>> {
        let rules = node_rules()?;
        let duplicated = config_with_towers(&[
            format!("{PUBKEY_A}@host1:9814"),
            format!("{PUBKEY_A}@host2:9814"),
        ]);
        let error = rules.validate(&duplicated);
        assert_eq!(
            error.map(|error| error.message),
            Some("Cannot add multiple watchtowers with the same pubkey".to_owned())
        );

        let distinct = config_with_towers(&[
            format!("{PUBKEY_A}@host1:9814"),
            format!("{PUBKEY_B}@host2:9814"),
        ]);
        assert_eq!(rules.validate(&distinct), None);
        Ok(())
    }

    #[test]
    fn missing_port_is_fixed_with_default() -> Result<(), Box<dyn Error>> {
        let rules = node_rules()?;
        let config = config_with_towers(&[format!("{PUBKEY_A}@tower.onion")]);
        assert_eq!(
            rules.validate(&config).map(|error| error.rule),
            Some("watchtower-uri-port")
        );

        let report = rules.auto_fix(config, &mut RngSecrets::seeded(0));
        assert_eq!(report.applied, ["watchtower-uri-port"]);
        assert_eq!(
            report.target.watchtowers.wt_client.towers(),
            [format!("{PUBKEY_A}@tower.onion:9814")]
        );
        assert!(report.is_valid());
        Ok(())
    }

    #[test]
    fn earlier_rule_wins_when_several_fail() -> Result<(), Box<dyn Error>> {
        let mut config = config_with_towers(&[format!("{PUBKEY_A}@tower.onion")]);
        config.color = "not-a-colour".to_owned();

        let error = node_rules()?.validate(&config);
        assert_eq!(error.as_ref().map(|error| error.rule), Some("color-hex"));
        assert_eq!(
            error.map(|error| error.message),
            Some("Color must be 6 hexadecimal digits (found 'not-a-colour')".to_owned())
        );
        Ok(())
    }

    #[test]
    fn malformed_uri_and_port_overflow_are_rejected() -> Result<(), Box<dyn Error>> {
        let rules = node_rules()?;
        for uri in [
            "not-a-pubkey@host:9814".to_owned(),
            format!("{PUBKEY_A}@host:99999"),
            format!("{PUBKEY_A}host"),
        ] {
            let config = config_with_towers(&[uri]);
            assert_eq!(
                rules.validate(&config).map(|error| error.rule),
                Some("watchtower-uri-format")
            );
        }
        Ok(())
    }

    #[test]
    fn alias_length_is_bounded() -> Result<(), Box<dyn Error>> {
        let rules = node_rules()?;
        let mut config = NodeConfig::with_defaults(&mut RngSecrets::seeded(2));
        config.alias = Some("x".repeat(33));
        assert_eq!(
            rules.validate(&config).map(|error| error.rule),
            Some("alias-length")
        );
        config.alias = Some("⚡".repeat(32));
        assert_eq!(rules.validate(&config), None);
        Ok(())
    }

    #[test]
    fn channel_bounds_compare_only_when_both_set() -> Result<(), Box<dyn Error>> {
        let rules = node_rules()?;
        let mut config = NodeConfig::with_defaults(&mut RngSecrets::seeded(4));
        config.advanced.experimental.dual_fund = DualFund::Enabled {
            strategy: FundingStrategy::Incognito {
                policy: FundingPolicy::Match { policy_mod: Some(100) },
                fuzz_percent: None,
                fund_probability: None,
            },
            other: DualFundOther {
                per_channel_min_msat: Some(5_000),
                per_channel_max_msat: None,
                ..DualFundOther::default()
            },
        };
        assert_eq!(rules.validate(&config), None);

        config.advanced.plugins.clboss = Clboss::Enabled(ClbossOptions {
            min_channel: Some(500_000),
            max_channel: Some(100_000),
            ..ClbossOptions::default()
        });
        assert_eq!(
            rules.validate(&config).map(|error| error.rule),
            Some("clboss-channel-bounds")
        );
        Ok(())
    }
}
