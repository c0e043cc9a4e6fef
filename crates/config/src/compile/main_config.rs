//! Daemon config file.

use super::writer::DirectiveWriter;
use super::{CompileError, ExternalInputs};
use crate::schema::{
    Clboss, DualFund, DualFundOther, FundingStrategy, MerchantTerms, NodeConfig,
    WatchtowerClient,
};

const PLUGIN_DIR: &str = "/usr/local/libexec/c-lightning/plugins";
const BITCOIN_RPC_HOST: &str = "bitcoind.embassy";
const BITCOIN_RPC_PORT: u16 = 8332;
const PEER_PORT: u16 = 9735;
const DEFAULT_POLICY_MOD: u64 = 100;
const MERCHANT_FALLBACK_LEASE_FEE_BASIS: u64 = 65;

/// Render the daemon config file.
pub fn render_main_config(
    config: &NodeConfig,
    inputs: &ExternalInputs,
) -> Result<String, CompileError> {
    let alias = match config.alias.as_deref() {
        Some(alias) => alias,
        None => inputs
            .fallback_alias
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .ok_or(CompileError::MissingExternalInput {
                input: "fallback_alias",
            })?,
    };
    let advanced = &config.advanced;
    let experimental = &advanced.experimental;
    let plugins = &advanced.plugins;

    let mut out = DirectiveWriter::new();
    out.section()
        .pair("network", "bitcoin")
        .pair("bitcoin-rpcuser", inputs.bitcoin_rpc_user()?)
        .pair("bitcoin-rpcpassword", inputs.bitcoin_rpc_password()?)
        .pair("bitcoin-rpcconnect", BITCOIN_RPC_HOST)
        .pair("bitcoin-rpcport", BITCOIN_RPC_PORT);

    out.section()
        .pair("bind-addr", format!("0.0.0.0:{PEER_PORT}"))
        .pair(
            "announce-addr",
            format!("{}:{PEER_PORT}", inputs.peer_address()?),
        )
        .pair("proxy", inputs.tor_proxy()?)
        .pair("always-use-proxy", advanced.tor_only);

    out.section().pair("alias", alias).pair("rgb", &config.color);

    out.section()
        .pair("fee-base", advanced.fee_base)
        .pair("fee-per-satoshi", advanced.fee_rate)
        .pair("min-capacity-sat", advanced.min_capacity)
        .pair("ignore-fee-limits", advanced.ignore_fee_limits)
        .pair("funding-confirms", advanced.funding_confirms)
        .pair("cltv-delta", advanced.cltv_delta)
        .optional("htlc-minimum-msat", advanced.htlc_minimum_msat)
        .optional("htlc-maximum-msat", advanced.htlc_maximum_msat)
        .directive_if(advanced.wumbo_channels, "large-channels");

    if let DualFund::Enabled { strategy, other } = &experimental.dual_fund {
        write_dual_fund(&mut out, strategy, other);
    }

    out.section()
        .directive("experimental-onion-messages")
        .directive("experimental-offers")
        .directive_if(
            experimental.shutdown_wrong_funding,
            "experimental-shutdown-wrong-funding",
        )
        .directive_if(experimental.splicing, "experimental-splicing")
        .pair_if(experimental.xpay_handle_pay, "xpay-handle-pay", true);

    out.section()
        .pair("bind-addr", "ws::4269")
        .pair("grpc-port", 2106)
        .pair_if(advanced.clams_remote_websocket, "bind-addr", "ws::7272")
        .pair_if(plugins.clnrest, "clnrest-port", 3010)
        .pair_if(plugins.clnrest, "clnrest-host", "0.0.0.0");

    out.section()
        .pair_if(plugins.sling, "plugin", format!("{PLUGIN_DIR}/sling/sling"))
        .pair_if(
            matches!(plugins.clboss, Clboss::Enabled(_)),
            "plugin",
            format!("{PLUGIN_DIR}/clboss"),
        )
        .pair_if(
            matches!(
                config.watchtowers.wt_client,
                WatchtowerClient::Enabled { .. }
            ),
            "plugin",
            format!("{PLUGIN_DIR}/watchtower-client"),
        )
        .pair_if(
            plugins.rebalance,
            "plugin",
            format!("{PLUGIN_DIR}/rebalance/rebalance.py"),
        )
        .pair_if(
            plugins.summary,
            "plugin",
            format!("{PLUGIN_DIR}/summary/summary.py"),
        );

    out.section();
    for (key, value) in config.autoclean.entries() {
        out.optional(key, value);
    }

    Ok(out.finish())
}

fn write_dual_fund(out: &mut DirectiveWriter, strategy: &FundingStrategy, other: &DualFundOther) {
    out.section().directive("experimental-dual-fund");
    match strategy {
        FundingStrategy::Incognito {
            policy,
            fuzz_percent,
            fund_probability,
        } => {
            out.pair("funder-lease-requests-only", false)
                .pair("funder-policy", policy.name())
                .pair(
                    "funder-policy-mod",
                    policy.policy_mod().unwrap_or(DEFAULT_POLICY_MOD),
                )
                .optional("funder-fuzz-percent", *fuzz_percent)
                .optional("funder-fund-probability", *fund_probability);
        },
        FundingStrategy::Merchant(terms) => {
            out.pair("funder-lease-requests-only", true)
                .pair("funder-policy", "match")
                .pair("funder-policy-mod", DEFAULT_POLICY_MOD);
            write_merchant_terms(out, terms);
        },
    }
    out.optional("funder-min-their-funding", other.min_their_funding_msat)
        .optional("funder-max-their-funding", other.max_their_funding_msat)
        .optional("funder-per-channel-min", other.per_channel_min_msat)
        .optional("funder-per-channel-max", other.per_channel_max_msat)
        .optional("funder-reserve-tank", other.reserve_tank_msat);
}

fn write_merchant_terms(out: &mut DirectiveWriter, terms: &MerchantTerms) {
    // With no terms at all the node would lease for free.
    let lease_fee_basis = if terms.is_unset() {
        Some(MERCHANT_FALLBACK_LEASE_FEE_BASIS)
    } else {
        terms.lease_fee_basis
    };
    out.optional("lease-fee-base-sat", terms.lease_fee_base_sat)
        .optional("lease-fee-basis", lease_fee_basis)
        .optional("lease-funding-weight", terms.funding_weight)
        .optional("channel-fee-max-base-msat", terms.channel_fee_max_base_msat)
        .optional(
            "channel-fee-max-proportional-thousandths",
            terms.channel_fee_max_proportional_thousandths,
        );
}
