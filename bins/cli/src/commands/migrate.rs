//! Migrate command handler.

use super::{load_document, path_string};
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, Summary};
use crate::{CliOutput, log_info};
use lnpkg_config::{MigrationOutcome, RngSecrets, SchemaVersion, migrate_between, write_document};
use lnpkg_shared::ErrorEnvelope;
use serde_json::{Value, json};
use std::path::Path;
use tracing::info;

/// Inputs for the migrate command.
pub struct MigrateInput<'a> {
    pub path: &'a Path,
    pub from: &'a str,
    pub to: Option<&'a str>,
    pub dry_run: bool,
}

/// Migrate the document at `path` between two schema versions.
///
/// The file is rewritten only after the whole migration succeeded.
pub fn run_migrate(mode: OutputMode, input: &MigrateInput<'_>) -> Result<CliOutput, CliError> {
    let document = load_document(input.path)?;
    let to = input.to.unwrap_or(SchemaVersion::CURRENT.as_str());
    let outcome = migrate_between(&document, input.from, to, &mut RngSecrets::os())
        .map_err(ErrorEnvelope::from)?;

    info!(
        from = outcome.from.as_str(),
        to = outcome.to.as_str(),
        steps = outcome.steps.len(),
        breaking = outcome.breaking,
        "migration planned"
    );

    let mut stderr = String::new();
    let written = !input.dry_run && !outcome.steps.is_empty();
    if written {
        write_document(input.path, &outcome.document).map_err(ErrorEnvelope::from)?;
        log_info(
            &mut stderr,
            &format!("wrote {}", input.path.display()),
            mode.no_progress,
        );
    }

    let stdout = summarize(&outcome)
        .field("path", path_string(input.path))
        .field("written", written)
        .render(mode)?;

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: ExitCode::Ok,
    })
}

fn summarize(outcome: &MigrationOutcome) -> Summary {
    let steps: Vec<Value> = outcome
        .steps
        .iter()
        .map(|step| json!({ "version": step.version.as_str(), "breaking": step.breaking }))
        .collect();
    Summary::new("migrate", "ok")
        .field("from", outcome.from.as_str())
        .field("to", outcome.to.as_str())
        .field(
            "direction",
            outcome
                .direction
                .map_or(Value::Null, |direction| Value::from(direction.as_str())),
        )
        .field("breaking", outcome.breaking)
        .field("steps", steps)
}
