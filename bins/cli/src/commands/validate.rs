//! Validate command handler.

use super::{load_node_config, node_rules, path_string, rejection};
use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, Summary};
use std::path::Path;

/// Validate a current-version document against the node rules.
///
/// A rejected document is reported as data with exit code 2.
pub fn run_validate(mode: OutputMode, path: &Path) -> Result<CliOutput, CliError> {
    let config = load_node_config(path)?;
    let failure = node_rules()?.validate(&config);

    let (status, exit_code) = match failure {
        None => ("ok", ExitCode::Ok),
        Some(_) => ("rejected", ExitCode::InvalidInput),
    };
    let stdout = Summary::new("validate", status)
        .field("path", path_string(path))
        .field("error", rejection(failure.as_ref()))
        .render(mode)?;

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code,
    })
}
