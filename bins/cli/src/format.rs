//! Output format helpers for CLI commands.

use crate::error::CliError;
use clap::{Args, ValueEnum};
use lnpkg_shared::ErrorEnvelope;
use serde_json::{Map, Value};

/// Output format choices for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-friendly text output.
    Text,
    /// Machine-friendly JSON output.
    Json,
    /// Line-delimited JSON (NDJSON) output.
    Ndjson,
}

/// Output-related CLI flags.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output format for command responses.
    #[arg(long, global = true, value_enum)]
    pub output: Option<OutputFormat>,
    /// Suppress progress/logging output.
    #[arg(long, global = true)]
    pub no_progress: bool,
}

/// Output mode derived from CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct OutputMode {
    pub format: OutputFormat,
    pub no_progress: bool,
}

impl OutputMode {
    /// Build output mode from CLI flags.
    #[must_use]
    pub fn from_args(args: &OutputArgs) -> Self {
        Self {
            format: args.output.unwrap_or(OutputFormat::Text),
            no_progress: args.no_progress,
        }
    }

    /// Returns true when JSON output is requested.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Returns true when NDJSON output is requested.
    #[must_use]
    pub const fn is_ndjson(self) -> bool {
        matches!(self.format, OutputFormat::Ndjson)
    }

    /// Returns true for either JSON flavour.
    #[must_use]
    pub const fn is_machine(self) -> bool {
        self.is_json() || self.is_ndjson()
    }
}

/// A command result before formatting.
///
/// `fields` are rendered in insertion order: as `key: value` lines for text,
/// as top-level keys for JSON.
pub struct Summary {
    kind: &'static str,
    status: &'static str,
    fields: Map<String, Value>,
}

impl Summary {
    pub fn new(kind: &'static str, status: &'static str) -> Self {
        Self {
            kind,
            status,
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    pub fn render(self, mode: OutputMode) -> Result<String, CliError> {
        let mut payload = Map::new();
        if mode.is_ndjson() {
            payload.insert("type".to_owned(), Value::from("summary"));
        }
        payload.insert("status".to_owned(), Value::from(self.status));
        if mode.is_machine() {
            payload.insert("kind".to_owned(), Value::from(self.kind));
        }
        payload.extend(self.fields);

        let mut out = if mode.is_ndjson() {
            serde_json::to_string(&payload)?
        } else if mode.is_json() {
            serde_json::to_string_pretty(&payload)?
        } else {
            format_text(&payload)
        };
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }
}

/// Render a failure envelope.
pub fn format_error(mode: OutputMode, envelope: &ErrorEnvelope) -> String {
    let mut out = if mode.is_machine() {
        let mut payload = Map::new();
        if mode.is_ndjson() {
            payload.insert("type".to_owned(), Value::from("error"));
        }
        payload.insert("status".to_owned(), Value::from("error"));
        // This is a CLI boundary, so JSON serialization errors are internal.
        payload.insert(
            "error".to_owned(),
            serde_json::to_value(envelope).unwrap_or(Value::Null),
        );
        let rendered = if mode.is_ndjson() {
            serde_json::to_string(&payload)
        } else {
            serde_json::to_string_pretty(&payload)
        };
        rendered.unwrap_or_else(|_| {
            "{\"status\":\"error\",\"error\":{\"code\":\"core:internal\"}}".to_owned()
        })
    } else {
        let mut text = format!(
            "status: error\ncode: {}\nmessage: {}\n",
            envelope.code, envelope.message
        );
        for (key, value) in &envelope.metadata {
            text.push_str(&format!("{key}: {value}\n"));
        }
        text
    };
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn format_text(payload: &Map<String, Value>) -> String {
    let mut out = String::new();
    for (key, value) in payload {
        match value {
            Value::Array(items) => {
                out.push_str(key);
                out.push_str(":\n");
                for item in items {
                    out.push_str("  - ");
                    out.push_str(&text_value(item));
                    out.push('\n');
                }
            },
            other => {
                out.push_str(key);
                out.push_str(": ");
                out.push_str(&text_value(other));
                out.push('\n');
            },
        }
    }
    out
}

fn text_value(value: &Value) -> String {
    match value {
        Value::Null => "none".to_owned(),
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{key}={}", text_value(value)))
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}
