//! # lnpkg-config
//!
//! Versioned configuration for the Core Lightning node package: the schema
//! registry, the migration engine, validation and auto-fix rules, and the
//! compiler that renders daemon config files. File and environment access
//! live at the edges (`load`, `env`); everything else is pure.

/// Configuration compiler.
pub mod compile;
/// Untyped configuration documents.
pub mod document;
/// Environment variable parsing for platform-provided inputs.
pub mod env;
/// Document and artifact file I/O.
pub mod load;
/// Migration engine over the schema version chain.
pub mod migrate;
/// Validation and auto-fix rule engine.
pub mod rules;
/// Current-version typed schema.
pub mod schema;
/// Randomness for generated secrets and defaults.
pub mod secrets;
/// Schema versions and dotted version parsing.
pub mod version;

pub use compile::{
    ARGS_ARTIFACT, CONFIG_ARTIFACT, CompileError, CompiledArtifacts, ExternalInputs,
    TEOS_ARTIFACT, compile, compile_document,
};
pub use document::{ConfigDocument, DocumentError};
pub use env::{EnvParseError, ExternalEnv};
pub use load::{
    DEFAULT_ALIAS_FILE, DocumentFormat, DocumentIoError, load_or_create_default_alias,
    read_document, read_typed, write_artifacts, write_document, write_typed,
};
pub use migrate::{
    Direction, MigrationError, MigrationOutcome, MigrationPath, MigrationStep, migrate,
    migrate_between,
};
pub use rules::{AutoFixReport, FixOutcome, Rule, RuleSet, ValidationError};
pub use schema::{NODE_CONFIG_VERSION, NodeConfig, SchemaError};
pub use secrets::{RngSecrets, SecretSource};
pub use version::{DottedVersion, SchemaVersion, VersionParseError};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lnpkg_shared::shared_crate_version;

    #[test]
    fn config_crate_compiles() {
        let version = config_crate_version();
        assert!(!version.is_empty());
        assert_eq!(version, shared_crate_version());
    }

    #[test]
    fn current_schema_version_is_the_newest() {
        assert_eq!(NODE_CONFIG_VERSION, SchemaVersion::CURRENT);
        assert_eq!(SchemaVersion::CURRENT.as_str(), "25.05.0");
    }
}
