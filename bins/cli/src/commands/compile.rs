//! Compile command handler.

use super::{load_node_config, path_string};
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, Summary};
use crate::{CliOutput, log_info};
use lnpkg_config::rules::BitcoindConfig;
use lnpkg_config::{
    ExternalEnv, RngSecrets, compile, load_or_create_default_alias, read_typed, write_artifacts,
};
use lnpkg_shared::ErrorEnvelope;
use std::path::Path;
use tracing::info;

/// Inputs for the compile command.
pub struct CompileInput<'a> {
    pub path: &'a Path,
    pub out_dir: &'a Path,
    pub bitcoind_config: Option<&'a Path>,
}

/// Compile the node document and write every artifact under `out_dir`.
///
/// Nothing is written unless every artifact rendered.
pub fn run_compile(
    mode: OutputMode,
    input: &CompileInput<'_>,
    env: &ExternalEnv,
) -> Result<CliOutput, CliError> {
    let config = load_node_config(input.path)?;

    let mut inputs = env.to_external_inputs();
    if let Some(bitcoind_path) = input.bitcoind_config {
        let bitcoind: BitcoindConfig = read_typed(bitcoind_path).map_err(ErrorEnvelope::from)?;
        inputs = inputs.or_bitcoind_rpc(&bitcoind);
    }
    inputs = inputs.or_document_pointers(&config);
    if config.alias.is_none() && inputs.fallback_alias.is_none() {
        let alias_dir = input.path.parent().unwrap_or_else(|| Path::new("."));
        let alias = load_or_create_default_alias(alias_dir, &mut RngSecrets::os())
            .map_err(ErrorEnvelope::from)?;
        inputs.fallback_alias = Some(alias);
    }

    let artifacts = compile(&config, &inputs).map_err(ErrorEnvelope::from)?;
    let written = write_artifacts(input.out_dir, &artifacts).map_err(ErrorEnvelope::from)?;
    info!(
        out_dir = %input.out_dir.display(),
        files = written.len(),
        "artifacts written"
    );

    let mut stderr = String::new();
    log_info(
        &mut stderr,
        &format!("wrote {} artifacts to {}", written.len(), input.out_dir.display()),
        mode.no_progress,
    );

    let files: Vec<String> = written.iter().map(|path| path_string(path)).collect();
    let stdout = Summary::new("compile", "ok")
        .field("path", path_string(input.path))
        .field("files", files)
        .render(mode)?;

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}
