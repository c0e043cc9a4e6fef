//! Current-version configuration schema, defaults, and field constraints.
//!
//! - Deserialization uses `serde` with kebab-case keys and
//!   `deny_unknown_fields`, so a document that drifted from the registry fails
//!   loudly instead of being coerced.
//! - Tagged unions are Rust enums; the compiler matches on them exhaustively.
//! - Range checks are manual and surface through the rule engine.

use crate::document::{ConfigDocument, join_path, value_kind};
use crate::secrets::SecretSource;
use crate::version::SchemaVersion;
use lnpkg_shared::{ErrorCode, ErrorEnvelope, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Schema version described by [`NodeConfig`].
pub const NODE_CONFIG_VERSION: SchemaVersion = SchemaVersion::CURRENT;

/// Default watchtower API port appended to URIs that omit one.
pub const DEFAULT_WATCHTOWER_PORT: u16 = 9814;

const ALIAS_MAX_CHARS: usize = 32;
const FEE_RATE_MAX: u64 = 999_999;
const MIN_CAPACITY_MAX: u64 = 16_777_215;
const SATS_MAX: u64 = 9_999_999_999;
const MSATS_MAX: u64 = 9_999_999_999_999;

/// Operator-facing node configuration at [`NODE_CONFIG_VERSION`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NodeConfig {
    /// Platform-resolved onion address of the peer interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_tor_address: Option<String>,
    /// Platform-resolved onion address of the RPC interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_tor_address: Option<String>,
    /// Platform-resolved onion address of the web UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_ui_tor_address: Option<String>,
    /// Platform-resolved onion address of the CLNRest interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clnrest_tor_address: Option<String>,
    /// Platform-resolved onion address of the watchtower API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchtower_tor_address: Option<String>,
    /// Bitcoin Core RPC user resolved from the dependency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitcoin_user: Option<String>,
    /// Bitcoin Core RPC password resolved from the dependency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitcoin_password: Option<SecretString>,
    /// Public node alias; `None` falls back to a generated alias.
    #[serde(default)]
    pub alias: Option<String>,
    /// Public RGB colour (6 hex digits).
    pub color: String,
    /// Password for the web UI.
    pub ui_password: SecretString,
    /// Watchtower server/client settings.
    #[serde(default)]
    pub watchtowers: Watchtowers,
    /// Autoclean ages.
    #[serde(default)]
    pub autoclean: Autoclean,
    /// Advanced options.
    #[serde(default)]
    pub advanced: Advanced,
}

impl NodeConfig {
    /// First-install document with registry defaults.
    ///
    /// The colour, UI password, and Sparko password are drawn from `secrets`;
    /// everything else is fixed.
    pub fn with_defaults(secrets: &mut dyn SecretSource) -> Self {
        let mut advanced = Advanced::default();
        advanced.plugins.sparko = Some(Sparko {
            enabled: true,
            user: "sparko".to_owned(),
            password: secrets.password(),
        });

        Self {
            peer_tor_address: None,
            rpc_tor_address: None,
            web_ui_tor_address: None,
            clnrest_tor_address: None,
            watchtower_tor_address: None,
            bitcoin_user: None,
            bitcoin_password: None,
            alias: None,
            color: secrets.color(),
            ui_password: secrets.password(),
            watchtowers: Watchtowers::default(),
            autoclean: Autoclean::default(),
            advanced,
        }
    }

    /// Lift an untyped current-version document into the typed schema.
    ///
    /// Discriminants are checked first so an unknown variant is reported as
    /// such rather than as a generic shape mismatch.
    pub fn from_document(document: &ConfigDocument) -> Result<Self, SchemaError> {
        if let Some(error) = find_invalid_variant(document) {
            return Err(error);
        }
        serde_json::from_value(document.clone().into_value()).map_err(|error| {
            SchemaError::Malformed {
                reason: error.to_string(),
            }
        })
    }

    /// Lower into an untyped document for persistence.
    pub fn to_document(&self) -> Result<ConfigDocument, SchemaError> {
        let value = serde_json::to_value(self).map_err(|error| SchemaError::Malformed {
            reason: error.to_string(),
        })?;
        ConfigDocument::from_value(value).map_err(|error| SchemaError::Malformed {
            reason: error.to_string(),
        })
    }

    /// Numeric fields with inclusive bounds, in document order.
    ///
    /// Unset optional fields are listed with `value: None` and never violate
    /// their range.
    #[must_use]
    pub fn bounded_fields(&self) -> Vec<BoundedField> {
        let advanced = &self.advanced;
        let mut fields = vec![
            BoundedField::new("advanced.fee-base", Some(advanced.fee_base), 0, u64::MAX),
            BoundedField::new("advanced.fee-rate", Some(advanced.fee_rate), 1, FEE_RATE_MAX),
            BoundedField::new(
                "advanced.min-capacity",
                Some(advanced.min_capacity),
                1,
                MIN_CAPACITY_MAX,
            ),
            BoundedField::new(
                "advanced.funding-confirms",
                Some(advanced.funding_confirms),
                1,
                6,
            ),
            BoundedField::new("advanced.cltv-delta", Some(advanced.cltv_delta), 6, 144),
        ];

        if let DualFund::Enabled { strategy, other } = &advanced.experimental.dual_fund {
            match strategy {
                FundingStrategy::Incognito {
                    policy,
                    fuzz_percent,
                    fund_probability,
                } => {
                    let (policy_mod, max) = match policy {
                        FundingPolicy::Match { policy_mod } => (*policy_mod, 200),
                        FundingPolicy::Available { policy_mod } => (*policy_mod, 100),
                        FundingPolicy::Fixed { policy_mod } => (*policy_mod, SATS_MAX),
                    };
                    fields.extend([
                        BoundedField::new(
                            "advanced.experimental.dual-fund.strategy.policy.policy-mod",
                            policy_mod,
                            0,
                            max,
                        ),
                        BoundedField::new(
                            "advanced.experimental.dual-fund.strategy.fuzz-percent",
                            *fuzz_percent,
                            0,
                            100,
                        ),
                        BoundedField::new(
                            "advanced.experimental.dual-fund.strategy.fund-probability",
                            *fund_probability,
                            0,
                            100,
                        ),
                    ]);
                },
                FundingStrategy::Merchant(merchant) => {
                    fields.extend([
                        BoundedField::new(
                            "advanced.experimental.dual-fund.strategy.lease-fee-base-sat",
                            merchant.lease_fee_base_sat,
                            1,
                            SATS_MAX,
                        ),
                        BoundedField::new(
                            "advanced.experimental.dual-fund.strategy.lease-fee-basis",
                            merchant.lease_fee_basis,
                            0,
                            999_999,
                        ),
                        BoundedField::new(
                            "advanced.experimental.dual-fund.strategy.funding-weight",
                            merchant.funding_weight,
                            0,
                            10_000,
                        ),
                        BoundedField::new(
                            "advanced.experimental.dual-fund.strategy.channel-fee-max-base-msat",
                            merchant.channel_fee_max_base_msat,
                            0,
                            MSATS_MAX,
                        ),
                        BoundedField::new(
                            "advanced.experimental.dual-fund.strategy.channel-fee-max-proportional-thousandths",
                            merchant.channel_fee_max_proportional_thousandths,
                            0,
                            1_000,
                        ),
                    ]);
                },
            }
            fields.extend(
                [
                    ("advanced.experimental.dual-fund.other.min-their-funding-msat", other.min_their_funding_msat),
                    ("advanced.experimental.dual-fund.other.max-their-funding-msat", other.max_their_funding_msat),
                    ("advanced.experimental.dual-fund.other.per-channel-min-msat", other.per_channel_min_msat),
                    ("advanced.experimental.dual-fund.other.per-channel-max-msat", other.per_channel_max_msat),
                    ("advanced.experimental.dual-fund.other.reserve-tank-msat", other.reserve_tank_msat),
                ]
                .map(|(field, value)| BoundedField::new(field, value, 0, MSATS_MAX)),
            );
        }

        if let Clboss::Enabled(options) = &advanced.plugins.clboss {
            fields.extend(
                [
                    ("advanced.plugins.clboss.min-onchain", options.min_onchain),
                    ("advanced.plugins.clboss.min-channel", options.min_channel),
                    ("advanced.plugins.clboss.max-channel", options.max_channel),
                ]
                .map(|(field, value)| BoundedField::new(field, value, 0, SATS_MAX)),
            );
        }

        fields
    }

    /// First numeric field outside its bounds, if any.
    #[must_use]
    pub fn first_out_of_range(&self) -> Option<BoundedField> {
        self.bounded_fields()
            .into_iter()
            .find(|field| !field.is_within_bounds())
    }

    /// Maximum alias length in characters.
    #[must_use]
    pub const fn alias_max_chars() -> usize {
        ALIAS_MAX_CHARS
    }
}

/// A numeric field paired with its inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedField {
    /// Dotted document path.
    pub field: &'static str,
    /// Current value (`None` when unset).
    pub value: Option<u64>,
    /// Inclusive minimum.
    pub min: u64,
    /// Inclusive maximum.
    pub max: u64,
}

impl BoundedField {
    const fn new(field: &'static str, value: Option<u64>, min: u64, max: u64) -> Self {
        Self {
            field,
            value,
            min,
            max,
        }
    }

    /// Returns true when unset or within `[min, max]`.
    #[must_use]
    pub const fn is_within_bounds(&self) -> bool {
        match self.value {
            Some(value) => value >= self.min && value <= self.max,
            None => true,
        }
    }
}

/// Watchtower server and client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Watchtowers {
    /// Run the TEoS watchtower server.
    pub wt_server: bool,
    /// Watchtower client plugin.
    pub wt_client: WatchtowerClient,
}

/// Watchtower client variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "enabled",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case",
    deny_unknown_fields
)]
pub enum WatchtowerClient {
    /// Client plugin not loaded.
    #[default]
    Disabled,
    /// Client plugin loaded with the listed towers.
    Enabled {
        /// `pubkey@host[:port]` entries.
        #[serde(default)]
        add_watchtowers: Vec<String>,
    },
}

impl WatchtowerClient {
    /// Tower URIs when enabled; empty otherwise.
    #[must_use]
    pub fn towers(&self) -> &[String] {
        match self {
            Self::Enabled { add_watchtowers } => add_watchtowers,
            Self::Disabled => &[],
        }
    }
}

/// Autoclean ages (seconds). `None` omits the directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Autoclean {
    /// Interval between autoclean sweeps.
    pub autoclean_cycle: Option<u64>,
    /// Age of settled forwards before deletion.
    pub autoclean_succeededforwards_age: Option<u64>,
    /// Age of failed forwards before deletion.
    pub autoclean_failedforwards_age: Option<u64>,
    /// Age of successful payments before deletion.
    pub autoclean_succeededpays_age: Option<u64>,
    /// Age of failed payments before deletion.
    pub autoclean_failedpays_age: Option<u64>,
    /// Age of paid invoices before deletion.
    pub autoclean_paidinvoices_age: Option<u64>,
    /// Age of expired invoices before deletion.
    pub autoclean_expiredinvoices_age: Option<u64>,
}

impl Default for Autoclean {
    fn default() -> Self {
        Self {
            autoclean_cycle: Some(3_600),
            autoclean_succeededforwards_age: Some(0),
            autoclean_failedforwards_age: Some(0),
            autoclean_succeededpays_age: Some(0),
            autoclean_failedpays_age: Some(0),
            autoclean_paidinvoices_age: Some(0),
            autoclean_expiredinvoices_age: Some(0),
        }
    }
}

impl Autoclean {
    /// Directive name and value pairs, in render order.
    #[must_use]
    pub const fn entries(&self) -> [(&'static str, Option<u64>); 7] {
        [
            ("autoclean-cycle", self.autoclean_cycle),
            (
                "autoclean-succeededforwards-age",
                self.autoclean_succeededforwards_age,
            ),
            (
                "autoclean-failedforwards-age",
                self.autoclean_failedforwards_age,
            ),
            (
                "autoclean-succeededpays-age",
                self.autoclean_succeededpays_age,
            ),
            ("autoclean-failedpays-age", self.autoclean_failedpays_age),
            ("autoclean-paidinvoices-age", self.autoclean_paidinvoices_age),
            (
                "autoclean-expiredinvoices-age",
                self.autoclean_expiredinvoices_age,
            ),
        ]
    }
}

/// Advanced options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "Mirrors independent operator toggles in the persisted document."
)]
pub struct Advanced {
    /// Only use Tor connections.
    pub tor_only: bool,
    /// Routing base fee (msat).
    pub fee_base: u64,
    /// Routing fee rate (ppm).
    pub fee_rate: u64,
    /// Minimum channel capacity (sat).
    pub min_capacity: u64,
    /// Let openers set any fee.
    pub ignore_fee_limits: bool,
    /// Funding confirmations required.
    pub funding_confirms: u64,
    /// Blocks between incoming and outgoing HTLCs.
    pub cltv_delta: u64,
    /// Minimum HTLC for new channels; `None` means no minimum.
    pub htlc_minimum_msat: Option<u64>,
    /// Maximum HTLC for new channels; `None` means no limit.
    pub htlc_maximum_msat: Option<u64>,
    /// Accept channels above the legacy cap.
    pub wumbo_channels: bool,
    /// Extra websocket listener for Clams.
    pub clams_remote_websocket: bool,
    /// Experimental features.
    pub experimental: Experimental,
    /// Bundled plugins.
    pub plugins: Plugins,
}

impl Default for Advanced {
    fn default() -> Self {
        Self {
            tor_only: false,
            fee_base: 1_000,
            fee_rate: 1,
            min_capacity: 10_000,
            ignore_fee_limits: false,
            funding_confirms: 3,
            cltv_delta: 40,
            htlc_minimum_msat: None,
            htlc_maximum_msat: None,
            wumbo_channels: false,
            clams_remote_websocket: false,
            experimental: Experimental::default(),
            plugins: Plugins::default(),
        }
    }
}

/// Experimental features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Experimental {
    /// Dual funding and liquidity ads.
    pub dual_fund: DualFund,
    /// Allow shutdown with alternate funding txids.
    pub shutdown_wrong_funding: bool,
    /// Channel splicing.
    pub splicing: bool,
    /// Route `pay` through xpay.
    pub xpay_handle_pay: bool,
}

/// Dual-funding variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "enabled",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case",
    deny_unknown_fields
)]
pub enum DualFund {
    /// Dual funding off.
    #[default]
    Disabled,
    /// Dual funding on with a channel acceptance strategy.
    Enabled {
        /// How to react to v2 open requests.
        strategy: FundingStrategy,
        /// Limits that apply to both strategies.
        #[serde(default)]
        other: DualFundOther,
    },
}

/// Channel acceptance strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "mode",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case",
    deny_unknown_fields
)]
pub enum FundingStrategy {
    /// React to unsolicited dual-fund requests.
    Incognito {
        /// Contribution policy.
        policy: FundingPolicy,
        /// Percentage to fuzz the contribution by.
        #[serde(default)]
        fuzz_percent: Option<u64>,
        /// Percentage of requests to fund.
        #[serde(default)]
        fund_probability: Option<u64>,
    },
    /// Sell liquidity via lease requests only.
    Merchant(MerchantTerms),
}

/// Liquidity-merchant lease terms. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct MerchantTerms {
    /// Flat lease fee (sat).
    pub lease_fee_base_sat: Option<u64>,
    /// Lease fee in basis points of requested funds.
    pub lease_fee_basis: Option<u64>,
    /// Funding weight charged to the opener.
    pub funding_weight: Option<u64>,
    /// Committed maximum base fee (msat).
    pub channel_fee_max_base_msat: Option<u64>,
    /// Committed maximum proportional fee (thousandths).
    pub channel_fee_max_proportional_thousandths: Option<u64>,
}

impl MerchantTerms {
    /// Returns true when no term is set.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        self.lease_fee_base_sat.is_none()
            && self.lease_fee_basis.is_none()
            && self.funding_weight.is_none()
            && self.channel_fee_max_base_msat.is_none()
            && self.channel_fee_max_proportional_thousandths.is_none()
    }
}

/// Incognito contribution policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "policy",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case",
    deny_unknown_fields
)]
pub enum FundingPolicy {
    /// Match a percentage of the requested funds.
    Match {
        /// Percentage (0-200).
        #[serde(default)]
        policy_mod: Option<u64>,
    },
    /// Commit a percentage of available wallet funds.
    Available {
        /// Percentage (0-100).
        #[serde(default)]
        policy_mod: Option<u64>,
    },
    /// Commit a fixed amount.
    Fixed {
        /// Satoshis.
        #[serde(default)]
        policy_mod: Option<u64>,
    },
}

impl FundingPolicy {
    /// `funder-policy` value.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Match { .. } => "match",
            Self::Available { .. } => "available",
            Self::Fixed { .. } => "fixed",
        }
    }

    /// `funder-policy-mod` value, if set.
    #[must_use]
    pub const fn policy_mod(&self) -> Option<u64> {
        match self {
            Self::Match { policy_mod }
            | Self::Available { policy_mod }
            | Self::Fixed { policy_mod } => *policy_mod,
        }
    }
}

/// Dual-funding limits shared by both strategies (msat).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct DualFundOther {
    /// Minimum peer funding before we contribute.
    pub min_their_funding_msat: Option<u64>,
    /// Maximum peer funding we will consider.
    pub max_their_funding_msat: Option<u64>,
    /// Minimum contribution per channel.
    pub per_channel_min_msat: Option<u64>,
    /// Maximum contribution per channel.
    pub per_channel_max_msat: Option<u64>,
    /// Wallet reserve left untouched.
    pub reserve_tank_msat: Option<u64>,
}

/// Bundled plugin toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "Each plugin is an independent operator toggle."
)]
pub struct Plugins {
    /// Circular rebalancing.
    pub rebalance: bool,
    /// `summary` RPC command.
    pub summary: bool,
    /// Built-in CLNRest plugin.
    pub clnrest: bool,
    /// Sling rebalancer.
    pub sling: bool,
    /// CLBOSS automated manager.
    pub clboss: Clboss,
    /// Sparko web RPC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparko: Option<Sparko>,
}

impl Default for Plugins {
    fn default() -> Self {
        Self {
            rebalance: false,
            summary: false,
            clnrest: true,
            sling: false,
            clboss: Clboss::Disabled,
            sparko: None,
        }
    }
}

/// CLBOSS variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "enabled", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Clboss {
    /// Not loaded.
    #[default]
    Disabled,
    /// Loaded with tuning options.
    Enabled(ClbossOptions),
}

/// CLBOSS tuning options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct ClbossOptions {
    /// On-chain reserve (sat).
    pub min_onchain: Option<u64>,
    /// Allow closing unprofitable channels.
    pub auto_close: bool,
    /// Base-fee advertisement policy.
    pub zerobasefee: ZeroBaseFee,
    /// Smallest channel CLBOSS opens (sat).
    pub min_channel: Option<u64>,
    /// Largest channel CLBOSS opens (sat).
    pub max_channel: Option<u64>,
}

/// CLBOSS zero-base-fee policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroBaseFee {
    /// Let CLBOSS decide.
    #[default]
    Default,
    /// Base fee always zero.
    Required,
    /// Zero allowed when heuristics prefer it.
    Allow,
    /// Base fee never zero.
    Disallow,
}

impl ZeroBaseFee {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Required => "required",
            Self::Allow => "allow",
            Self::Disallow => "disallow",
        }
    }
}

/// Sparko plugin settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Sparko {
    /// Load the plugin.
    pub enabled: bool,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: SecretString,
}

struct VariantTag {
    path: &'static [&'static str],
    allowed: &'static [&'static str],
}

// Every discriminant in the current schema, parent before child.
const VARIANT_TAGS: &[VariantTag] = &[
    VariantTag {
        path: &["watchtowers", "wt-client", "enabled"],
        allowed: &["disabled", "enabled"],
    },
    VariantTag {
        path: &["advanced", "experimental", "dual-fund", "enabled"],
        allowed: &["disabled", "enabled"],
    },
    VariantTag {
        path: &["advanced", "experimental", "dual-fund", "strategy", "mode"],
        allowed: &["incognito", "merchant"],
    },
    VariantTag {
        path: &[
            "advanced",
            "experimental",
            "dual-fund",
            "strategy",
            "policy",
            "policy",
        ],
        allowed: &["match", "available", "fixed"],
    },
    VariantTag {
        path: &["advanced", "plugins", "clboss", "enabled"],
        allowed: &["disabled", "enabled"],
    },
    VariantTag {
        path: &["advanced", "plugins", "clboss", "zerobasefee"],
        allowed: &["default", "required", "allow", "disallow"],
    },
];

/// First stored discriminant that names no known variant.
///
/// Absent discriminants are left to deserialization.
#[must_use]
pub fn find_invalid_variant(document: &ConfigDocument) -> Option<SchemaError> {
    VARIANT_TAGS.iter().find_map(|tag| {
        let value = document.get(tag.path)?;
        let known = value
            .as_str()
            .is_some_and(|found| tag.allowed.contains(&found));
        if known {
            return None;
        }
        Some(SchemaError::InvalidVariant {
            path: join_path(tag.path),
            found: describe_discriminant(value),
            expected: tag.allowed,
        })
    })
}

fn describe_discriminant(value: &Value) -> String {
    match value {
        Value::String(found) => found.clone(),
        other => format!("<{}>", value_kind(other)),
    }
}

/// Failures lifting a document into [`NodeConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A discriminant names no known variant.
    InvalidVariant {
        /// Dotted path of the discriminant.
        path: String,
        /// Stored value.
        found: String,
        /// Known variant names.
        expected: &'static [&'static str],
    },
    /// Any other shape mismatch.
    Malformed {
        /// Deserializer message.
        reason: String,
    },
}

impl SchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidVariant { .. } => ErrorCode::new("schema", "invalid_variant"),
            Self::Malformed { .. } => ErrorCode::new("schema", "malformed_document"),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidVariant {
                path,
                found,
                expected,
            } => write!(
                formatter,
                "{path} has unknown variant '{found}' (expected one of: {})",
                expected.join(", ")
            ),
            Self::Malformed { reason } => write!(formatter, "malformed document: {reason}"),
        }
    }
}

impl std::error::Error for SchemaError {}

impl From<SchemaError> for ErrorEnvelope {
    fn from(error: SchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);
        match error {
            SchemaError::InvalidVariant { path, found, .. } => envelope
                .with_metadata("path", path)
                .with_metadata("variant", found),
            SchemaError::Malformed { .. } => envelope,
        }
    }
}
