//! Watchtower server (TEoS) config.

use super::{CompileError, ExternalInputs, TEOS_ARTIFACT};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct TeosConfig<'a> {
    api_bind: &'a str,
    api_port: u16,
    tor_support: bool,
    rpc_bind: &'a str,
    rpc_port: u16,
    btc_network: &'a str,
    btc_rpc_user: &'a str,
    btc_rpc_password: &'a str,
    btc_rpc_connect: &'a str,
    btc_rpc_port: u16,
    debug: bool,
    deps_debug: bool,
    overwrite_key: bool,
    subscription_slots: u32,
    subscription_duration: u32,
    expiry_delta: u32,
    min_to_self_delay: u16,
    polling_delta: u16,
    internal_api_bind: &'a str,
    internal_api_port: u16,
}

/// Render `teos.toml` for the bundled watchtower server.
pub fn render_teos_config(inputs: &ExternalInputs) -> Result<String, CompileError> {
    let config = TeosConfig {
        api_bind: "0.0.0.0",
        api_port: 9814,
        tor_support: false,
        rpc_bind: "127.0.0.1",
        rpc_port: 8814,
        btc_network: "mainnet",
        btc_rpc_user: inputs.bitcoin_rpc_user()?,
        btc_rpc_password: inputs.bitcoin_rpc_password()?,
        btc_rpc_connect: "bitcoind.embassy",
        btc_rpc_port: 8332,
        debug: false,
        deps_debug: false,
        overwrite_key: false,
        subscription_slots: 10_000,
        subscription_duration: 4_320,
        expiry_delta: 6,
        min_to_self_delay: 20,
        polling_delta: 60,
        internal_api_bind: "127.0.0.1",
        internal_api_port: 50_051,
    };
    toml::to_string(&config).map_err(|error| CompileError::Render {
        artifact: TEOS_ARTIFACT,
        reason: error.to_string(),
    })
}
