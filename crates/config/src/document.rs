//! Untyped, order-preserving configuration documents.
//!
//! Historical schema versions disagree about the shape of the same keys (a
//! plugin flag that later becomes a tagged object), so migrations operate on
//! this JSON tree. Only the current version is lifted into typed structs (see
//! [`crate::schema::NodeConfig`]).

use lnpkg_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The persisted configuration of one service instance.
///
/// Keys keep insertion order, which is also the order they were read from
/// disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument(Map<String, Value>);

impl ConfigDocument {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap an existing JSON object.
    #[must_use]
    pub const fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Wrap a JSON value, rejecting anything that is not an object.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DocumentError::NotAnObject {
                path: String::new(),
                found: value_kind(&other),
            }),
        }
    }

    /// Borrow the root object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Look up a nested value.
    #[must_use]
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        Some(current)
    }

    /// Look up a nested value mutably.
    pub fn get_mut(&mut self, path: &[&str]) -> Option<&mut Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get_mut(*first)?;
        for key in rest {
            current = current.as_object_mut()?.get_mut(*key)?;
        }
        Some(current)
    }

    /// Returns true when a value exists at `path`.
    #[must_use]
    pub fn contains(&self, path: &[&str]) -> bool {
        self.get(path).is_some()
    }

    /// Nested string value, if present and a string.
    #[must_use]
    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Mutable object at `path`.
    ///
    /// `Ok(None)` when any segment is missing; an error when a segment exists
    /// but is not an object. The empty path is the root.
    pub fn object_mut(
        &mut self,
        path: &[&str],
    ) -> Result<Option<&mut Map<String, Value>>, DocumentError> {
        let mut current = &mut self.0;
        for (depth, key) in path.iter().enumerate() {
            let Some(next) = current.get_mut(*key) else {
                return Ok(None);
            };
            match next {
                Value::Object(map) => current = map,
                other => {
                    return Err(DocumentError::NotAnObject {
                        path: join_path(path.get(..=depth).unwrap_or(path)),
                        found: value_kind(other),
                    });
                },
            }
        }
        Ok(Some(current))
    }

    /// Mutable object at `path`, creating missing segments as empty objects.
    pub fn ensure_object(
        &mut self,
        path: &[&str],
    ) -> Result<&mut Map<String, Value>, DocumentError> {
        let mut current = &mut self.0;
        for (depth, key) in path.iter().enumerate() {
            let next = current
                .entry(*key)
                .or_insert_with(|| Value::Object(Map::new()));
            match next {
                Value::Object(map) => current = map,
                other => {
                    return Err(DocumentError::NotAnObject {
                        path: join_path(path.get(..=depth).unwrap_or(path)),
                        found: value_kind(other),
                    });
                },
            }
        }
        Ok(current)
    }

    /// Remove the value at `path`, returning it.
    ///
    /// Missing parents are not an error; removing something that is not
    /// there is a no-op.
    pub fn remove(&mut self, path: &[&str]) -> Result<Option<Value>, DocumentError> {
        let Some((last, parents)) = path.split_last() else {
            return Ok(None);
        };
        Ok(self
            .object_mut(parents)?
            .and_then(|parent| parent.shift_remove(*last)))
    }
}

impl From<ConfigDocument> for Value {
    fn from(document: ConfigDocument) -> Self {
        document.into_value()
    }
}

/// Render a key path the way messages and metadata show it.
#[must_use]
pub fn join_path(path: &[&str]) -> String {
    path.join(".")
}

/// Short JSON type name for diagnostics.
#[must_use]
pub const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Structural document errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// A value that must be an object is some other JSON type.
    NotAnObject {
        /// Dotted key path (empty for the root).
        path: String,
        /// JSON type found instead.
        found: &'static str,
    },
}

impl DocumentError {
    /// Dotted path of the offending value.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::NotAnObject { path, .. } => path,
        }
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject { path, found } if path.is_empty() => {
                write!(formatter, "document root must be an object, found {found}")
            },
            Self::NotAnObject { path, found } => {
                write!(formatter, "{path} must be an object, found {found}")
            },
        }
    }
}

impl std::error::Error for DocumentError {}

impl From<DocumentError> for ErrorEnvelope {
    fn from(error: DocumentError) -> Self {
        let message = error.to_string();
        let path = error.path().to_owned();
        Self::expected(ErrorCode::new("schema", "malformed_document"), message)
            .with_metadata("path", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Result<ConfigDocument, DocumentError> {
        ConfigDocument::from_value(json!({
            "alias": "node",
            "advanced": {
                "plugins": { "clboss": false, "rest": true },
                "tor-only": false
            }
        }))
    }

    #[test]
    fn nested_lookup_follows_objects_only() -> Result<(), DocumentError> {
        let doc = sample()?;
        assert_eq!(doc.get(&["advanced", "plugins", "clboss"]), Some(&json!(false)));
        assert_eq!(doc.str_at(&["alias"]), Some("node"));
        assert!(doc.get(&["alias", "anything"]).is_none());
        assert!(!doc.contains(&[]));
        Ok(())
    }

    #[test]
    fn object_mut_distinguishes_missing_from_conflict() -> Result<(), DocumentError> {
        let mut doc = sample()?;
        assert!(doc.object_mut(&["advanced", "experimental"])?.is_none());
        assert!(doc.object_mut(&["advanced", "plugins"])?.is_some());

        let conflict = doc.object_mut(&["advanced", "tor-only", "x"]);
        assert_eq!(
            conflict.err(),
            Some(DocumentError::NotAnObject {
                path: "advanced.tor-only".to_owned(),
                found: "boolean",
            })
        );
        Ok(())
    }

    #[test]
    fn ensure_object_creates_missing_parents() -> Result<(), DocumentError> {
        let mut doc = sample()?;
        doc.ensure_object(&["advanced", "experimental"])?
            .insert("splicing".to_owned(), json!(false));
        assert_eq!(
            doc.get(&["advanced", "experimental", "splicing"]),
            Some(&json!(false))
        );
        assert!(doc.ensure_object(&["alias", "nested"]).is_err());
        Ok(())
    }

    #[test]
    fn remove_preserves_sibling_order()-> Result<(), DocumentError> {
        let mut doc = sample()?;
        assert_eq!(doc.remove(&["advanced", "plugins", "clboss"])?, Some(json!(false)));
        assert_eq!(doc.remove(&["advanced", "plugins", "clboss"])?, None);
        assert_eq!(doc.remove(&["missing", "key"])?, None);

        let keys: Vec<&String> = doc.as_map().keys().collect();
        assert_eq!(keys, ["alias", "advanced"]);
        Ok(())
    }

    #[test]
    fn root_must_be_an_object() {
        let error = ConfigDocument::from_value(json!([1, 2])).err();
        assert_eq!(
            error.map(|error| error.to_string()),
            Some("document root must be an object, found list".to_owned())
        );
    }
}
