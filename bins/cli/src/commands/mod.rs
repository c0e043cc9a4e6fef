//! Command handlers.
//!
//! Handlers return a [`CliOutput`](crate::CliOutput) for every outcome the
//! operator should see as data (including rejected documents) and a
//! [`CliError`](crate::error::CliError) only when the operation itself
//! failed.

pub mod autofix;
pub mod check_dependency;
pub mod compile;
pub mod init;
pub mod migrate;
pub mod validate;
pub mod versions;

pub use autofix::run_autofix;
pub use check_dependency::{DependencyCheck, run_check_dependency};
pub use compile::{CompileInput, run_compile};
pub use init::run_init;
pub use migrate::{MigrateInput, run_migrate};
pub use validate::run_validate;
pub use versions::run_versions;

use crate::error::CliError;
use lnpkg_config::{ConfigDocument, NodeConfig, RuleSet, ValidationError, read_document};
use lnpkg_shared::{ErrorCode, ErrorEnvelope};
use serde_json::{Value, json};
use std::path::Path;

pub(crate) fn load_document(path: &Path) -> Result<ConfigDocument, CliError> {
    Ok(read_document(path).map_err(ErrorEnvelope::from)?)
}

pub(crate) fn load_node_config(path: &Path) -> Result<NodeConfig, CliError> {
    let document = load_document(path)?;
    Ok(NodeConfig::from_document(&document).map_err(ErrorEnvelope::from)?)
}

pub(crate) fn node_rules() -> Result<RuleSet<NodeConfig>, CliError> {
    lnpkg_config::rules::node_rules().map_err(|error| {
        CliError::Failed(ErrorEnvelope::invariant(
            ErrorCode::internal(),
            format!("invalid rule pattern: {error}"),
        ))
    })
}

pub(crate) fn rejection(error: Option<&ValidationError>) -> Value {
    error.map_or(Value::Null, |error| {
        json!({ "rule": error.rule, "message": error.message })
    })
}

pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
