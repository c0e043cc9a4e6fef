//! Document and artifact file I/O.
//!
//! Reads pick the format from the file extension. Writes go to a uniquely
//! named temp file in the target directory that is persisted over the
//! target, so a reader never observes a half-written document.

use crate::compile::CompiledArtifacts;
use crate::document::{ConfigDocument, DocumentError};
use crate::secrets::SecretSource;
use lnpkg_shared::{ErrorCode, ErrorEnvelope, UnexpectedError, normalize_unexpected_error};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Name of the cached fallback alias file.
pub const DEFAULT_ALIAS_FILE: &str = "default_alias.txt";

/// On-disk document encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.json`
    Json,
}

impl DocumentFormat {
    /// Pick the format from a path's extension. No extension means YAML.
    pub fn from_path(path: &Path) -> Result<Self, DocumentIoError> {
        let ext = path
            .extension()
            .and_then(|value| value.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            None | Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(DocumentIoError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: other.to_owned(),
            }),
        }
    }

    /// Lowercase format name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

/// Parse document text.
pub fn parse_document(
    input: &str,
    format: DocumentFormat,
) -> Result<ConfigDocument, DocumentIoError> {
    let value = parse_value(input, format)?;
    Ok(ConfigDocument::from_value(value)?)
}

/// Render a document with a trailing newline.
pub fn render_document(
    document: &ConfigDocument,
    format: DocumentFormat,
) -> Result<String, DocumentIoError> {
    render_value(document, format)
}

/// Read and parse a document file.
pub fn read_document(path: &Path) -> Result<ConfigDocument, DocumentIoError> {
    let format = DocumentFormat::from_path(path)?;
    let input = read_file(path)?;
    parse_document(&input, format).map_err(|error| error.at(path))
}

/// Atomically write a document file.
pub fn write_document(path: &Path, document: &ConfigDocument) -> Result<(), DocumentIoError> {
    let format = DocumentFormat::from_path(path)?;
    let output = render_document(document, format)?;
    write_atomic(path, output.as_bytes())
}

/// Read a file straight into a typed value (dependency configs).
pub fn read_typed<T: DeserializeOwned>(path: &Path) -> Result<T, DocumentIoError> {
    let format = DocumentFormat::from_path(path)?;
    let value = parse_value(&read_file(path)?, format).map_err(|error| error.at(path))?;
    serde_json::from_value(value).map_err(|error| DocumentIoError::Parse {
        path: Some(path.to_path_buf()),
        format,
        reason: error.to_string(),
    })
}

/// Atomically write a typed value.
pub fn write_typed<T: Serialize>(path: &Path, value: &T) -> Result<(), DocumentIoError> {
    let format = DocumentFormat::from_path(path)?;
    let output = render_value(value, format)?;
    write_atomic(path, output.as_bytes())
}

/// Write every compiled artifact under `dir`, creating subdirectories.
///
/// Returns the written paths in write order.
pub fn write_artifacts(
    dir: &Path,
    artifacts: &CompiledArtifacts,
) -> Result<Vec<PathBuf>, DocumentIoError> {
    let mut written = Vec::new();
    for (relative, contents) in artifacts.files() {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| DocumentIoError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        write_atomic(&path, contents.as_bytes())?;
        written.push(path);
    }
    debug!(dir = %dir.display(), files = written.len(), "wrote compiled artifacts");
    Ok(written)
}

/// Load the cached fallback alias from `dir`, generating and caching one when
/// the file is missing or blank.
pub fn load_or_create_default_alias(
    dir: &Path,
    secrets: &mut dyn SecretSource,
) -> Result<String, DocumentIoError> {
    let path = dir.join(DEFAULT_ALIAS_FILE);
    match std::fs::read_to_string(&path) {
        Ok(contents) if !contents.trim().is_empty() => return Ok(contents.trim().to_owned()),
        Ok(_) => {},
        Err(source) if source.kind() == io::ErrorKind::NotFound => {},
        Err(source) => return Err(DocumentIoError::Read { path, source }),
    }

    let alias = secrets.alias();
    write_atomic(&path, alias.as_bytes())?;
    debug!(path = %path.display(), "generated default alias");
    Ok(alias)
}

fn parse_value(input: &str, format: DocumentFormat) -> Result<serde_json::Value, DocumentIoError> {
    let parsed: Result<serde_json::Value, String> = match format {
        DocumentFormat::Yaml => serde_yaml_ng::from_str(input).map_err(|error| error.to_string()),
        DocumentFormat::Json => serde_json::from_str(input).map_err(|error| error.to_string()),
    };
    parsed.map_err(|reason| DocumentIoError::Parse {
        path: None,
        format,
        reason,
    })
}

fn render_value<T: Serialize + ?Sized>(
    value: &T,
    format: DocumentFormat,
) -> Result<String, DocumentIoError> {
    let rendered = match format {
        DocumentFormat::Yaml => serde_yaml_ng::to_string(value).map_err(|error| error.to_string()),
        DocumentFormat::Json => {
            serde_json::to_string_pretty(value).map_err(|error| error.to_string())
        },
    };
    let mut output = rendered.map_err(|reason| DocumentIoError::Serialize { format, reason })?;
    if !output.ends_with('\n') {
        output.push('\n');
    }
    Ok(output)
}

fn read_file(path: &Path) -> Result<String, DocumentIoError> {
    std::fs::read_to_string(path).map_err(|source| DocumentIoError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), DocumentIoError> {
    let write_error = |source| DocumentIoError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    // Dropping an unpersisted temp file removes it.
    let mut temp = NamedTempFile::new_in(dir).map_err(write_error)?;
    temp.write_all(contents).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(path).map_err(|error| write_error(error.error))?;
    Ok(())
}

/// File-level failures.
#[derive(Debug)]
pub enum DocumentIoError {
    /// The extension names no supported format.
    UnsupportedFormat {
        /// File path.
        path: PathBuf,
        /// Lowercased extension.
        extension: String,
    },
    /// Reading failed.
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// Writing failed.
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The text is not valid for its format, or not the expected shape.
    Parse {
        /// File path, when parsing a file.
        path: Option<PathBuf>,
        /// Format that was parsed.
        format: DocumentFormat,
        /// Parser message.
        reason: String,
    },
    /// The parsed root is not a mapping.
    NotAnObject(DocumentError),
    /// Serialization failed.
    Serialize {
        /// Target format.
        format: DocumentFormat,
        /// Serializer message.
        reason: String,
    },
}

impl DocumentIoError {
    fn at(self, path: &Path) -> Self {
        match self {
            Self::Parse { format, reason, .. } => Self::Parse {
                path: Some(path.to_path_buf()),
                format,
                reason,
            },
            other => other,
        }
    }

    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedFormat { .. } => ErrorCode::new("config", "unsupported_format"),
            Self::Read { .. } | Self::Write { .. } => ErrorCode::io(),
            Self::Parse {
                format: DocumentFormat::Yaml,
                ..
            } => ErrorCode::new("config", "invalid_yaml"),
            Self::Parse {
                format: DocumentFormat::Json,
                ..
            } => ErrorCode::new("config", "invalid_json"),
            Self::NotAnObject(_) => ErrorCode::new("schema", "malformed_document"),
            Self::Serialize { .. } => ErrorCode::new("config", "serialize_failed"),
        }
    }
}

impl fmt::Display for DocumentIoError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat { extension, .. } => write!(
                formatter,
                "unsupported document format '.{extension}'; use .yaml, .yml or .json"
            ),
            Self::Read { path, source } => {
                write!(formatter, "failed to read {}: {source}", path.display())
            },
            Self::Write { path, source } => {
                write!(formatter, "failed to write {}: {source}", path.display())
            },
            Self::Parse { format, reason, .. } => {
                write!(formatter, "invalid {} document: {reason}", format.as_str())
            },
            Self::NotAnObject(error) => write!(formatter, "{error}"),
            Self::Serialize { format, reason } => {
                write!(formatter, "failed to serialize {}: {reason}", format.as_str())
            },
        }
    }
}

impl std::error::Error for DocumentIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => Some(source),
            Self::NotAnObject(error) => Some(error),
            _ => None,
        }
    }
}

impl From<DocumentError> for DocumentIoError {
    fn from(error: DocumentError) -> Self {
        Self::NotAnObject(error)
    }
}

impl From<DocumentIoError> for ErrorEnvelope {
    fn from(error: DocumentIoError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        match error {
            DocumentIoError::UnsupportedFormat { path, extension } => {
                Self::expected(code, message)
                    .with_metadata("path", path.to_string_lossy().to_string())
                    .with_metadata("extension", extension)
            },
            DocumentIoError::Read { path, source } | DocumentIoError::Write { path, source } => {
                normalize_unexpected_error(UnexpectedError::error(source))
                    .with_metadata("path", path.to_string_lossy().to_string())
            },
            DocumentIoError::Parse { path, format, .. } => {
                let envelope =
                    Self::expected(code, message).with_metadata("format", format.as_str());
                match path {
                    Some(path) => envelope.with_metadata("path", path.to_string_lossy().to_string()),
                    None => envelope,
                }
            },
            DocumentIoError::NotAnObject(error) => error.into(),
            DocumentIoError::Serialize { format, .. } => {
                Self::invariant(code, message).with_metadata("format", format.as_str())
            },
        }
    }
}
