//! Versions command handler.

use crate::CliOutput;
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, Summary};
use lnpkg_config::SchemaVersion;
use lnpkg_config::migrate::{DownTransform, edge_into};
use serde_json::{Value, json};

/// List the schema version chain, oldest first.
pub fn run_versions(mode: OutputMode) -> Result<CliOutput, CliError> {
    let versions: Vec<Value> = SchemaVersion::ALL
        .into_iter()
        .map(|version| {
            let edge = edge_into(version);
            let down = match edge.map(|edge| edge.down) {
                None => "none",
                Some(DownTransform::Irreversible) => "irreversible",
                Some(DownTransform::Reversible { breaking: true, .. }) => "reversible-breaking",
                Some(DownTransform::Reversible { breaking: false, .. }) => "reversible",
            };
            json!({
                "version": version.as_str(),
                "upBreaking": edge.is_some_and(|edge| edge.up_breaking),
                "down": down,
            })
        })
        .collect();

    let stdout = Summary::new("versions", "ok")
        .field("current", SchemaVersion::CURRENT.as_str())
        .field("oldest", SchemaVersion::OLDEST.as_str())
        .field("versions", versions)
        .render(mode)?;

    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}
