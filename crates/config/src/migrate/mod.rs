//! Migration engine over the linear version chain.
//!
//! `migrate` never touches its input: it pre-scans the whole path, then runs
//! each edge on an owned copy and hands back the final document. Callers
//! persist the result with a single write.

mod edges;

pub use edges::{DownTransform, MigrationEdge, Transform, TransformError, edge_into};

use crate::document::ConfigDocument;
use crate::secrets::SecretSource;
use crate::version::{SchemaVersion, VersionParseError};
use lnpkg_shared::{ErrorCode, ErrorEnvelope};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Direction a migration path walks the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards newer versions.
    Up,
    /// Towards older versions.
    Down,
}

impl Direction {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Ordered edges between two versions.
#[derive(Debug, Clone)]
pub struct MigrationPath {
    /// Walk direction; `None` when both endpoints are equal.
    pub direction: Option<Direction>,
    /// Edges in application order.
    pub edges: Vec<MigrationEdge>,
}

impl MigrationPath {
    /// Compute the path from `from` to `to`.
    #[must_use]
    pub fn between(from: SchemaVersion, to: SchemaVersion) -> Self {
        let (from_index, to_index) = (from.index(), to.index());
        let (direction, versions): (Option<Direction>, Vec<usize>) =
            match from_index.cmp(&to_index) {
                std::cmp::Ordering::Equal => (None, Vec::new()),
                std::cmp::Ordering::Less => {
                    (Some(Direction::Up), (from_index + 1..=to_index).collect())
                },
                std::cmp::Ordering::Greater => (
                    Some(Direction::Down),
                    (to_index + 1..=from_index).rev().collect(),
                ),
            };
        let edges = versions
            .into_iter()
            .filter_map(SchemaVersion::from_index)
            .filter_map(edge_into)
            .collect();
        Self { direction, edges }
    }

    /// Number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true when no edge needs to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// First edge that refuses to be walked, in traversal order.
    #[must_use]
    pub fn first_irreversible(&self) -> Option<SchemaVersion> {
        if self.direction != Some(Direction::Down) {
            return None;
        }
        self.edges
            .iter()
            .find(|edge| edge.is_irreversible())
            .map(|edge| edge.version)
    }
}

/// One applied edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationStep {
    /// Version the edge is bound to.
    pub version: SchemaVersion,
    /// Breaking flag reported by the transform.
    pub breaking: bool,
}

/// Result of a successful migration.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOutcome {
    /// Migrated document.
    pub document: ConfigDocument,
    /// Source version.
    pub from: SchemaVersion,
    /// Target version.
    pub to: SchemaVersion,
    /// Walk direction; `None` for a same-version call.
    pub direction: Option<Direction>,
    /// Logical OR of every applied edge's breaking flag.
    pub breaking: bool,
    /// Applied edges in order.
    pub steps: Vec<MigrationStep>,
}

/// Migrate `document` from `from` to `to`.
///
/// `secrets` is read only by edges that introduce generated credentials.
pub fn migrate(
    document: &ConfigDocument,
    from: SchemaVersion,
    to: SchemaVersion,
    secrets: &mut dyn SecretSource,
) -> Result<MigrationOutcome, MigrationError> {
    let path = MigrationPath::between(from, to);
    let expected_len = from.index().abs_diff(to.index());
    if path.len() != expected_len {
        return Err(MigrationError::BrokenChain {
            from,
            to,
            found: path.len(),
            expected: expected_len,
        });
    }

    if let Some(version) = path.first_irreversible() {
        warn!(%from, %to, %version, "refusing downgrade across irreversible edge");
        return Err(MigrationError::Irreversible { version, from, to });
    }

    let mut current = document.clone();
    let mut steps = Vec::with_capacity(path.len());
    for edge in &path.edges {
        let (direction, transform, breaking) = match (path.direction, edge.down) {
            (Some(Direction::Down), DownTransform::Reversible { apply, breaking }) => {
                (Direction::Down, apply, breaking)
            },
            (Some(Direction::Down), DownTransform::Irreversible) => {
                return Err(MigrationError::Irreversible {
                    version: edge.version,
                    from,
                    to,
                });
            },
            _ => (Direction::Up, edge.up, edge.up_breaking),
        };

        current = transform(current, secrets).map_err(|error| {
            MigrationError::TransformFailure {
                version: edge.version,
                direction,
                reason: error.reason,
            }
        })?;
        debug!(version = %edge.version, %direction, breaking, "applied migration edge");
        steps.push(MigrationStep {
            version: edge.version,
            breaking,
        });
    }

    let breaking = steps.iter().any(|step| step.breaking);
    info!(%from, %to, steps = steps.len(), breaking, "migration complete");
    Ok(MigrationOutcome {
        document: current,
        from,
        to,
        direction: path.direction,
        breaking,
        steps,
    })
}

/// [`migrate`] with endpoints given as version strings.
pub fn migrate_between(
    document: &ConfigDocument,
    from: &str,
    to: &str,
    secrets: &mut dyn SecretSource,
) -> Result<MigrationOutcome, MigrationError> {
    let from = from.parse::<SchemaVersion>()?;
    let to = to.parse::<SchemaVersion>()?;
    migrate(document, from, to, secrets)
}

/// Migration failures. None of them leave a partially migrated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// An endpoint is not in the version chain.
    UnknownVersion {
        /// Raw version string.
        input: String,
    },
    /// A downgrade path crosses an irreversible edge.
    Irreversible {
        /// Edge that cannot be walked backwards.
        version: SchemaVersion,
        /// Source version.
        from: SchemaVersion,
        /// Target version.
        to: SchemaVersion,
    },
    /// A transform rejected the document.
    TransformFailure {
        /// Edge that failed.
        version: SchemaVersion,
        /// Direction being walked.
        direction: Direction,
        /// Transform message.
        reason: String,
    },
    /// The edge table does not cover the path.
    BrokenChain {
        /// Source version.
        from: SchemaVersion,
        /// Target version.
        to: SchemaVersion,
        /// Edges found.
        found: usize,
        /// Edges required.
        expected: usize,
    },
}

impl MigrationError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnknownVersion { .. } => ErrorCode::new("migration", "unknown_version"),
            Self::Irreversible { .. } => ErrorCode::new("migration", "irreversible"),
            Self::TransformFailure { .. } => ErrorCode::new("migration", "transform_failed"),
            Self::BrokenChain { .. } => ErrorCode::new("migration", "broken_chain"),
        }
    }
}

impl fmt::Display for MigrationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownVersion { input } => write!(formatter, "unknown version '{input}'"),
            Self::Irreversible { version, from, to } => write!(
                formatter,
                "cannot downgrade from {from} to {to}: version {version} is irreversible"
            ),
            Self::TransformFailure {
                version,
                direction,
                reason,
            } => write!(
                formatter,
                "migration {direction} through {version} failed: {reason}"
            ),
            Self::BrokenChain {
                from,
                to,
                found,
                expected,
            } => write!(
                formatter,
                "edge table covers {found} of {expected} edges between {from} and {to}"
            ),
        }
    }
}

impl std::error::Error for MigrationError {}

impl From<VersionParseError> for MigrationError {
    fn from(error: VersionParseError) -> Self {
        Self::UnknownVersion {
            input: error.input().to_owned(),
        }
    }
}

impl From<MigrationError> for ErrorEnvelope {
    fn from(error: MigrationError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        match error {
            MigrationError::UnknownVersion { input } => {
                Self::expected(code, message).with_metadata("version", input)
            },
            MigrationError::Irreversible { version, from, to } => Self::expected(code, message)
                .with_metadata("version", version.to_string())
                .with_metadata("from", from.to_string())
                .with_metadata("to", to.to_string()),
            MigrationError::TransformFailure {
                version, direction, ..
            } => Self::expected(code, message)
                .with_metadata("version", version.to_string())
                .with_metadata("direction", direction.to_string()),
            MigrationError::BrokenChain { from, to, .. } => Self::invariant(code, message)
                .with_metadata("from", from.to_string())
                .with_metadata("to", to.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::RngSecrets;
    use lnpkg_shared::ErrorKind;
    use serde_json::json;
    use std::error::Error;

    fn oldest_document() -> Result<ConfigDocument, Box<dyn Error>> {
        Ok(ConfigDocument::from_value(json!({
            "alias": "my-node",
            "color": "ff9900",
            "advanced": {
                "fee-base": 1000,
                "experimental": { "dual-fund": false },
                "plugins": { "rest": true, "http": true }
            }
        }))?)
    }

    #[test]
    fn path_lengths_match_index_distance() {
        for from in SchemaVersion::ALL {
            for to in SchemaVersion::ALL {
                let path = MigrationPath::between(from, to);
                assert_eq!(path.len(), from.index().abs_diff(to.index()));
            }
        }
    }

    #[test]
    fn same_version_is_a_no_op() -> Result<(), Box<dyn Error>> {
        let document = oldest_document()?;
        let outcome = migrate(
            &document,
            SchemaVersion::V23_11,
            SchemaVersion::V23_11,
            &mut RngSecrets::seeded(0),
        )?;
        assert_eq!(outcome.document, document);
        assert_eq!(outcome.direction, None);
        assert!(!outcome.breaking);
        assert!(outcome.steps.is_empty());
        Ok(())
    }

    #[test]
    fn oldest_to_current_reports_breaking() -> Result<(), Box<dyn Error>> {
        let outcome = migrate(
            &oldest_document()?,
            SchemaVersion::OLDEST,
            SchemaVersion::CURRENT,
            &mut RngSecrets::seeded(5),
        )?;
        assert!(outcome.breaking);
        assert_eq!(outcome.steps.len(), SchemaVersion::ALL.len() - 1);
        assert_eq!(outcome.direction, Some(Direction::Up));
        Ok(())
    }

    #[test]
    fn breaking_is_the_or_of_traversed_edges() -> Result<(), Box<dyn Error>> {
        let mut secrets = RngSecrets::seeded(5);
        let at_23_11 = migrate(
            &oldest_document()?,
            SchemaVersion::OLDEST,
            SchemaVersion::V23_11,
            &mut secrets,
        )?
        .document;

        let crosses = migrate(
            &at_23_11,
            SchemaVersion::V23_11,
            SchemaVersion::V24_02_1,
            &mut secrets,
        )?;
        assert!(crosses.breaking);

        let quiet = migrate(
            &crosses.document,
            SchemaVersion::V24_02_1,
            SchemaVersion::CURRENT,
            &mut secrets,
        )?;
        assert!(!quiet.breaking);
        Ok(())
    }

    #[test]
    fn irreversible_downgrade_is_refused_before_any_edge() -> Result<(), Box<dyn Error>> {
        let document = ConfigDocument::from_value(json!({ "advanced": {} }))?;
        let result = migrate(
            &document,
            SchemaVersion::V24_11_0,
            SchemaVersion::V23_11,
            &mut RngSecrets::seeded(0),
        );
        assert_eq!(
            result.err(),
            Some(MigrationError::Irreversible {
                version: SchemaVersion::V24_02_1,
                from: SchemaVersion::V24_11_0,
                to: SchemaVersion::V23_11,
            })
        );
        Ok(())
    }

    #[test]
    fn reversible_downgrade_walks_backwards() -> Result<(), Box<dyn Error>> {
        let document = ConfigDocument::from_value(json!({
            "advanced": {
                "clams-remote-websocket": false,
                "experimental": { "xpay-handle-pay": false }
            }
        }))?;
        let outcome = migrate(
            &document,
            SchemaVersion::V24_11_0,
            SchemaVersion::V24_02_1,
            &mut RngSecrets::seeded(0),
        )?;
        assert_eq!(outcome.direction, Some(Direction::Down));
        let versions: Vec<SchemaVersion> =
            outcome.steps.iter().map(|step| step.version).collect();
        assert_eq!(
            versions,
            [SchemaVersion::V24_11_0, SchemaVersion::V24_02_2_1]
        );
        assert!(!outcome.document.contains(&["advanced", "clams-remote-websocket"]));
        assert!(
            !outcome
                .document
                .contains(&["advanced", "experimental", "xpay-handle-pay"])
        );
        Ok(())
    }

    #[test]
    fn unknown_versions_are_not_guessed() -> Result<(), Box<dyn Error>> {
        let document = oldest_document()?;
        let result = migrate_between(&document, "23.02.3", "25.05.0", &mut RngSecrets::seeded(0));
        assert_eq!(
            result.err(),
            Some(MigrationError::UnknownVersion {
                input: "23.02.3".to_owned()
            })
        );
        Ok(())
    }

    #[test]
    fn transform_failure_is_reported_with_edge() -> Result<(), Box<dyn Error>> {
        let document = ConfigDocument::from_value(json!({ "advanced": { "plugins": 7 } }))?;
        let error = migrate(
            &document,
            SchemaVersion::V0_11_1,
            SchemaVersion::V0_11_1_1,
            &mut RngSecrets::seeded(0),
        )
        .err()
        .ok_or("expected failure")?;
        assert!(matches!(
            error,
            MigrationError::TransformFailure {
                version: SchemaVersion::V0_11_1_1,
                direction: Direction::Up,
                ..
            }
        ));
        let envelope = ErrorEnvelope::from(error);
        assert_eq!(envelope.kind, ErrorKind::Expected);
        assert_eq!(
            envelope.metadata.get("version").map(String::as_str),
            Some("0.11.1.1")
        );
        Ok(())
    }
}
