//! Init command handler.

use super::path_string;
use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, Summary};
use lnpkg_config::{NODE_CONFIG_VERSION, NodeConfig, RngSecrets, write_document};
use lnpkg_shared::{ErrorCode, ErrorEnvelope};
use std::path::Path;

/// Write a first-install document at `path`.
pub fn run_init(mode: OutputMode, path: &Path, force: bool) -> Result<CliOutput, CliError> {
    if path.exists() && !force {
        return Err(ErrorEnvelope::expected(
            ErrorCode::new("cli", "config_exists"),
            "config already exists; pass --force to overwrite",
        )
        .with_metadata("path", path_string(path))
        .into());
    }

    let config = NodeConfig::with_defaults(&mut RngSecrets::os());
    let document = config.to_document().map_err(ErrorEnvelope::from)?;
    write_document(path, &document).map_err(ErrorEnvelope::from)?;

    let stdout = Summary::new("init", "ok")
        .field("path", path_string(path))
        .field("version", NODE_CONFIG_VERSION.as_str())
        .render(mode)?;

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}
