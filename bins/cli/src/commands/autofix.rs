//! Autofix command handler.

use super::{load_node_config, node_rules, path_string, rejection};
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, Summary};
use crate::{CliOutput, log_info};
use lnpkg_config::{RngSecrets, write_document};
use lnpkg_shared::ErrorEnvelope;
use std::path::Path;

/// Run one auto-fix pass over the node document and persist the result.
pub fn run_autofix(mode: OutputMode, path: &Path, dry_run: bool) -> Result<CliOutput, CliError> {
    let config = load_node_config(path)?;
    let report = node_rules()?.auto_fix(config, &mut RngSecrets::os());

    let mut stderr = String::new();
    let written = !dry_run && !report.applied.is_empty();
    if written {
        let document = report.target.to_document().map_err(ErrorEnvelope::from)?;
        write_document(path, &document).map_err(ErrorEnvelope::from)?;
        log_info(
            &mut stderr,
            &format!("wrote {}", path.display()),
            mode.no_progress,
        );
    }

    let (status, exit_code) = if report.is_valid() {
        ("ok", ExitCode::Ok)
    } else {
        ("rejected", ExitCode::InvalidInput)
    };
    let stdout = Summary::new("autofix", status)
        .field("path", path_string(path))
        .field("applied", report.applied.clone())
        .field("written", written)
        .field("error", rejection(report.remaining.as_ref()))
        .render(mode)?;

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code,
    })
}
