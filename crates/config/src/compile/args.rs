//! Daemon argument vector.

use crate::schema::{Clboss, NodeConfig};

/// Daemon data directory inside the container.
pub const LIGHTNING_DIR: &str = "/root/.lightning";

/// `lightningd` argv, including CLBOSS startup options when CLBOSS is on.
#[must_use]
pub fn lightningd_args(config: &NodeConfig) -> Vec<String> {
    let mut args = vec![
        "lightningd".to_owned(),
        format!("--lightning-dir={LIGHTNING_DIR}"),
        format!("--conf={LIGHTNING_DIR}/config"),
    ];

    if let Clboss::Enabled(options) = &config.advanced.plugins.clboss {
        let mut push = |key: &str, value: String| args.push(format!("--clboss-{key}={value}"));
        if let Some(min_onchain) = options.min_onchain {
            push("min-onchain", min_onchain.to_string());
        }
        push("auto-close", options.auto_close.to_string());
        push("zerobasefee", options.zerobasefee.as_str().to_owned());
        if let Some(min_channel) = options.min_channel {
            push("min-channel", min_channel.to_string());
        }
        if let Some(max_channel) = options.max_channel {
            push("max-channel", max_channel.to_string());
        }
    }

    args
}
