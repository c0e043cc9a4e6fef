//! Per-version up/down transforms.
//!
//! Every `up` only converts values still in the previous shape and only
//! inserts keys that are absent, so re-applying an edge is a no-op.

use crate::document::{ConfigDocument, DocumentError};
use crate::secrets::SecretSource;
use crate::version::SchemaVersion;
use serde_json::{Map, Value, json};

/// Transform from one document shape to its neighbour.
pub type Transform =
    fn(ConfigDocument, &mut dyn SecretSource) -> Result<ConfigDocument, TransformError>;

/// Downgrade half of an edge.
#[derive(Clone, Copy)]
pub enum DownTransform {
    /// The edge can be walked backwards.
    Reversible {
        /// Transform from the edge's version to the previous one.
        apply: Transform,
        /// Whether the result must be re-reviewed by the operator.
        breaking: bool,
    },
    /// Downgrading across this edge is refused.
    Irreversible,
}

/// Up/down transform pair bound to the version it migrates into.
#[derive(Clone, Copy)]
pub struct MigrationEdge {
    /// Version reached by `up`.
    pub version: SchemaVersion,
    /// Transform from the previous version.
    pub up: Transform,
    /// Whether `up` output must be re-reviewed by the operator.
    pub up_breaking: bool,
    /// Transform back to the previous version.
    pub down: DownTransform,
}

impl MigrationEdge {
    /// Returns true when `down` is the irreversible marker.
    #[must_use]
    pub const fn is_irreversible(&self) -> bool {
        matches!(self.down, DownTransform::Irreversible)
    }
}

impl std::fmt::Debug for MigrationEdge {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("MigrationEdge")
            .field("version", &self.version)
            .field("up_breaking", &self.up_breaking)
            .field("irreversible", &self.is_irreversible())
            .finish_non_exhaustive()
    }
}

/// A transform rejected its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError {
    /// Operator-facing description.
    pub reason: String,
}

impl TransformError {
    fn unexpected_shape(path: &str, expected: &str, found: &Value) -> Self {
        Self {
            reason: format!(
                "{path} must be {expected}, found {}",
                crate::document::value_kind(found)
            ),
        }
    }
}

impl From<DocumentError> for TransformError {
    fn from(error: DocumentError) -> Self {
        Self {
            reason: error.to_string(),
        }
    }
}

/// Edge that migrates into `version`; `None` for the oldest version.
#[must_use]
pub fn edge_into(version: SchemaVersion) -> Option<MigrationEdge> {
    use SchemaVersion as V;

    let (up, up_breaking, down): (Transform, bool, DownTransform) = match version {
        V::V0_10_2_1 => return None,
        V::V0_11_1 => (identity, false, reversible(identity)),
        V::V0_11_1_1 => (
            add_clboss_flag,
            false,
            DownTransform::Reversible {
                apply: remove_clboss,
                breaking: true,
            },
        ),
        V::V0_11_2 => (clboss_flag_to_variant, false, reversible(clboss_variant_to_flag)),
        V::V22_11_1 => (
            dual_fund_flag_to_variant,
            false,
            reversible(dual_fund_variant_to_flag),
        ),
        V::V23_02_2 | V::V23_08_1 | V::V23_11 | V::V24_11_1_1 | V::V25_02_1 | V::V25_02_2 => {
            (identity, false, DownTransform::Irreversible)
        },
        V::V23_02_2_1 | V::V23_02_2_2 | V::V23_02_2_4 => {
            (identity, true, DownTransform::Irreversible)
        },
        V::V23_02_2_7 => (add_credentials_and_watchtowers, false, DownTransform::Irreversible),
        V::V23_11_2_1 => (
            add_clnrest_and_autoclean,
            true,
            reversible(remove_clnrest_and_autoclean),
        ),
        V::V24_02_1 => (add_splicing_and_sling, false, DownTransform::Irreversible),
        V::V24_02_2_1 => (
            add_clams_websocket,
            false,
            reversible(remove_clams_websocket),
        ),
        V::V24_11_0 => (add_xpay_handle_pay, false, reversible(remove_xpay_handle_pay)),
        V::V25_02_0 => (remove_legacy_rest, false, DownTransform::Irreversible),
        V::V25_05_0 => (retire_legacy_keys, false, DownTransform::Irreversible),
    };

    Some(MigrationEdge {
        version,
        up,
        up_breaking,
        down,
    })
}

const fn reversible(apply: Transform) -> DownTransform {
    DownTransform::Reversible {
        apply,
        breaking: false,
    }
}

const PLUGINS: &[&str] = &["advanced", "plugins"];
const EXPERIMENTAL: &[&str] = &["advanced", "experimental"];

fn identity(
    document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    Ok(document)
}

fn insert_if_absent(
    document: &mut ConfigDocument,
    parent: &[&str],
    key: &str,
    value: impl FnOnce() -> Value,
) -> Result<(), TransformError> {
    let object = document.ensure_object(parent)?;
    if !object.contains_key(key) {
        object.insert(key.to_owned(), value());
    }
    Ok(())
}

fn remove_at(
    mut document: ConfigDocument,
    paths: &[&[&str]],
) -> Result<ConfigDocument, TransformError> {
    for path in paths {
        document.remove(path)?;
    }
    Ok(document)
}

fn add_clboss_flag(
    mut document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    insert_if_absent(&mut document, PLUGINS, "clboss", || json!(false))?;
    Ok(document)
}

fn remove_clboss(
    document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    remove_at(document, &[&["advanced", "plugins", "clboss"]])
}

/// Replace a boolean toggle with its variant object; objects pass through.
fn flag_to_variant(
    document: &mut ConfigDocument,
    parent: &[&str],
    key: &str,
    enabled: impl FnOnce() -> Value,
) -> Result<(), TransformError> {
    let object = document.ensure_object(parent)?;
    let replacement = match object.get(key) {
        Some(Value::Object(_)) => return Ok(()),
        Some(Value::Bool(true)) => enabled(),
        Some(Value::Bool(false)) | None => json!({ "enabled": "disabled" }),
        Some(other) => {
            let path = format!("{}.{key}", parent.join("."));
            return Err(TransformError::unexpected_shape(
                &path,
                "a boolean or an object",
                other,
            ));
        },
    };
    object.insert(key.to_owned(), replacement);
    Ok(())
}

/// Collapse a variant object back to its boolean toggle; booleans pass through.
fn variant_to_flag(
    document: &mut ConfigDocument,
    parent: &[&str],
    key: &str,
) -> Result<(), TransformError> {
    let Some(object) = document.object_mut(parent)? else {
        return Ok(());
    };
    let flag = match object.get(key) {
        Some(Value::Object(variant)) => {
            variant.get("enabled").and_then(Value::as_str) == Some("enabled")
        },
        None | Some(Value::Bool(_)) => return Ok(()),
        Some(other) => {
            let path = format!("{}.{key}", parent.join("."));
            return Err(TransformError::unexpected_shape(
                &path,
                "a boolean or an object",
                other,
            ));
        },
    };
    object.insert(key.to_owned(), Value::Bool(flag));
    Ok(())
}

fn clboss_flag_to_variant(
    mut document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    flag_to_variant(&mut document, PLUGINS, "clboss", || {
        json!({
            "enabled": "enabled",
            "min-onchain": null,
            "auto-close": false,
            "zerobasefee": "default",
            "min-channel": null,
            "max-channel": null,
        })
    })?;
    Ok(document)
}

fn clboss_variant_to_flag(
    mut document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    variant_to_flag(&mut document, PLUGINS, "clboss")?;
    Ok(document)
}

fn dual_fund_flag_to_variant(
    mut document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    flag_to_variant(&mut document, EXPERIMENTAL, "dual-fund", || {
        json!({
            "enabled": "enabled",
            "strategy": {
                "mode": "incognito",
                "policy": { "policy": "fixed" },
            },
            "other": {},
        })
    })?;
    Ok(document)
}

fn dual_fund_variant_to_flag(
    mut document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    variant_to_flag(&mut document, EXPERIMENTAL, "dual-fund")?;
    Ok(document)
}

fn add_credentials_and_watchtowers(
    mut document: ConfigDocument,
    secrets: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    insert_if_absent(&mut document, &[], "ui-password", || {
        Value::String(secrets.password().expose().to_owned())
    })?;
    document.remove(&["advanced", "plugins", "http"])?;
    insert_if_absent(&mut document, PLUGINS, "sparko", || {
        json!({
            "enabled": true,
            "user": "sparko",
            "password": secrets.password().expose(),
        })
    })?;
    insert_if_absent(&mut document, &[], "watchtowers", || {
        json!({
            "wt-server": false,
            "wt-client": { "enabled": "disabled", "add-watchtowers": [] },
        })
    })?;
    Ok(document)
}

fn default_autoclean() -> Value {
    let mut ages = Map::new();
    ages.insert("autoclean-cycle".to_owned(), json!(3600));
    for key in [
        "autoclean-succeededforwards-age",
        "autoclean-failedforwards-age",
        "autoclean-succeededpays-age",
        "autoclean-failedpays-age",
        "autoclean-paidinvoices-age",
        "autoclean-expiredinvoices-age",
    ] {
        ages.insert(key.to_owned(), json!(0));
    }
    Value::Object(ages)
}

fn add_clnrest_and_autoclean(
    mut document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    insert_if_absent(&mut document, PLUGINS, "clnrest", || json!(true))?;
    insert_if_absent(&mut document, &[], "autoclean", default_autoclean)?;
    Ok(document)
}

fn remove_clnrest_and_autoclean(
    document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    remove_at(
        document,
        &[&["advanced", "plugins", "clnrest"], &["autoclean"]],
    )
}

fn add_splicing_and_sling(
    mut document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    insert_if_absent(&mut document, EXPERIMENTAL, "splicing", || json!(false))?;
    insert_if_absent(&mut document, PLUGINS, "sling", || json!(false))?;
    Ok(document)
}

fn add_clams_websocket(
    mut document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    insert_if_absent(
        &mut document,
        &["advanced"],
        "clams-remote-websocket",
        || json!(false),
    )?;
    Ok(document)
}

fn remove_clams_websocket(
    document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    remove_at(document, &[&["advanced", "clams-remote-websocket"]])
}

fn add_xpay_handle_pay(
    mut document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    insert_if_absent(&mut document, EXPERIMENTAL, "xpay-handle-pay", || json!(false))?;
    Ok(document)
}

fn remove_xpay_handle_pay(
    document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    remove_at(
        document,
        &[&["advanced", "experimental", "xpay-handle-pay"]],
    )
}

fn remove_legacy_rest(
    document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    remove_at(
        document,
        &[&["rest-tor-address"], &["advanced", "plugins", "rest"]],
    )
}

/// Force splicing off and drop keys the current schema no longer reads.
///
/// Credentials in the old `bitcoind` block become the resolved
/// `bitcoin-user`/`bitcoin-password` fields unless those are already set.
fn retire_legacy_keys(
    mut document: ConfigDocument,
    _: &mut dyn SecretSource,
) -> Result<ConfigDocument, TransformError> {
    document
        .ensure_object(EXPERIMENTAL)?
        .insert("splicing".to_owned(), json!(false));
    for (legacy, resolved) in [("user", "bitcoin-user"), ("password", "bitcoin-password")] {
        if let Some(value) = document.str_at(&["bitcoind", legacy]).map(str::to_owned) {
            insert_if_absent(&mut document, &[], resolved, || Value::String(value))?;
        }
    }
    remove_at(
        document,
        &[
            &["bitcoind"],
            &["rpc"],
            &["advanced", "experimental", "onion-messages"],
            &["advanced", "experimental", "offers"],
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::RngSecrets;
    use std::error::Error;

    fn doc(value: Value) -> Result<ConfigDocument, Box<dyn Error>> {
        Ok(ConfigDocument::from_value(value)?)
    }

    fn apply_up(
        version: SchemaVersion,
        document: ConfigDocument,
    ) -> Result<ConfigDocument, Box<dyn Error>> {
        let edge = edge_into(version).ok_or("missing edge")?;
        let mut secrets = RngSecrets::seeded(1);
        (edge.up)(document, &mut secrets).map_err(|error| error.reason.into())
    }

    #[test]
    fn every_version_after_the_oldest_has_an_edge() {
        for version in SchemaVersion::ALL {
            let edge = edge_into(version);
            if version == SchemaVersion::OLDEST {
                assert!(edge.is_none());
            } else {
                assert_eq!(edge.map(|edge| edge.version), Some(version));
            }
        }
    }

    #[test]
    fn clboss_flag_becomes_variant_once() -> Result<(), Box<dyn Error>> {
        let original = doc(json!({ "advanced": { "plugins": { "clboss": true } } }))?;
        let once = apply_up(SchemaVersion::V0_11_2, original)?;
        assert_eq!(
            once.str_at(&["advanced", "plugins", "clboss", "enabled"]),
            Some("enabled")
        );
        assert_eq!(
            once.str_at(&["advanced", "plugins", "clboss", "zerobasefee"]),
            Some("default")
        );
        let twice = apply_up(SchemaVersion::V0_11_2, once.clone())?;
        assert_eq!(once, twice);
        Ok(())
    }

    #[test]
    fn unexpected_toggle_shape_is_a_transform_failure() -> Result<(), Box<dyn Error>> {
        let original = doc(json!({ "advanced": { "experimental": { "dual-fund": "yes" } } }))?;
        let edge = edge_into(SchemaVersion::V22_11_1).ok_or("missing edge")?;
        let result = (edge.up)(original, &mut RngSecrets::seeded(1));
        assert_eq!(
            result.err().map(|error| error.reason),
            Some(
                "advanced.experimental.dual-fund must be a boolean or an object, found string"
                    .to_owned()
            )
        );
        Ok(())
    }

    #[test]
    fn dual_fund_variant_collapses_to_flag() -> Result<(), Box<dyn Error>> {
        let edge = edge_into(SchemaVersion::V22_11_1).ok_or("missing edge")?;
        let DownTransform::Reversible { apply, breaking } = edge.down else {
            return Err("expected a reversible edge".into());
        };
        assert!(!breaking);
        let original = doc(json!({
            "advanced": { "experimental": { "dual-fund": { "enabled": "enabled", "strategy": {} } } }
        }))?;
        let down = apply(original, &mut RngSecrets::seeded(1)).map_err(|error| error.reason)?;
        assert_eq!(
            down.get(&["advanced", "experimental", "dual-fund"]),
            Some(&json!(true))
        );
        Ok(())
    }

    #[test]
    fn credentials_are_generated_only_when_absent() -> Result<(), Box<dyn Error>> {
        let original = doc(json!({
            "ui-password": "keep-me",
            "advanced": { "plugins": { "http": true } }
        }))?;
        let migrated = apply_up(SchemaVersion::V23_02_2_7, original)?;
        assert_eq!(migrated.str_at(&["ui-password"]), Some("keep-me"));
        assert!(!migrated.contains(&["advanced", "plugins", "http"]));
        let sparko_password = migrated
            .str_at(&["advanced", "plugins", "sparko", "password"])
            .map(str::len);
        assert_eq!(sparko_password, Some(22));
        assert_eq!(
            migrated.str_at(&["watchtowers", "wt-client", "enabled"]),
            Some("disabled")
        );

        let again = apply_up(SchemaVersion::V23_02_2_7, migrated.clone())?;
        assert_eq!(again, migrated);
        Ok(())
    }

    #[test]
    fn splicing_is_forced_off() -> Result<(), Box<dyn Error>> {
        let original = doc(json!({ "advanced": { "experimental": { "splicing": true } } }))?;
        let migrated = apply_up(SchemaVersion::V25_05_0, original)?;
        assert_eq!(
            migrated.get(&["advanced", "experimental", "splicing"]),
            Some(&json!(false))
        );
        Ok(())
    }

    #[test]
    fn legacy_connection_keys_are_retired() -> Result<(), Box<dyn Error>> {
        let original = doc(json!({
            "bitcoind": { "type": "internal-proxy", "user": "c-lightning", "password": "pw" },
            "rpc": { "enabled": true, "user": "lightning", "password": "rpcpw" },
            "advanced": {
                "experimental": { "onion-messages": false, "offers": false, "dual-fund": false }
            }
        }))?;
        let migrated = apply_up(SchemaVersion::V25_05_0, original)?;
        assert_eq!(migrated.str_at(&["bitcoin-user"]), Some("c-lightning"));
        assert_eq!(migrated.str_at(&["bitcoin-password"]), Some("pw"));
        for retired in [
            &["bitcoind"][..],
            &["rpc"],
            &["advanced", "experimental", "onion-messages"],
            &["advanced", "experimental", "offers"],
        ] {
            assert!(!migrated.contains(retired), "{retired:?} survived");
        }
        assert!(migrated.contains(&["advanced", "experimental", "dual-fund"]));

        let again = apply_up(SchemaVersion::V25_05_0, migrated.clone())?;
        assert_eq!(again, migrated);
        Ok(())
    }

    #[test]
    fn resolved_bitcoin_user_wins_over_legacy_block() -> Result<(), Box<dyn Error>> {
        let original = doc(json!({
            "bitcoin-user": "resolved",
            "bitcoind": { "user": "legacy" }
        }))?;
        let migrated = apply_up(SchemaVersion::V25_05_0, original)?;
        assert_eq!(migrated.str_at(&["bitcoin-user"]), Some("resolved"));
        assert!(!migrated.contains(&["bitcoin-password"]));
        assert!(!migrated.contains(&["bitcoind"]));
        Ok(())
    }

    #[test]
    fn legacy_rest_is_dropped() -> Result<(), Box<dyn Error>> {
        let original = doc(json!({
            "rest-tor-address": "abc.onion",
            "advanced": { "plugins": { "rest": true, "clnrest": true } }
        }))?;
        let migrated = apply_up(SchemaVersion::V25_02_0, original)?;
        assert!(!migrated.contains(&["rest-tor-address"]));
        assert!(!migrated.contains(&["advanced", "plugins", "rest"]));
        assert!(migrated.contains(&["advanced", "plugins", "clnrest"]));
        Ok(())
    }
}
