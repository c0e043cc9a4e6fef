//! Configuration compiler.
//!
//! Renders a current-version [`NodeConfig`] plus an explicit set of
//! [`ExternalInputs`] into the files and arguments the daemon consumes.
//! Rendering is pure: no randomness, no I/O. Either every artifact renders or
//! the call fails and nothing should be written.

mod args;
mod main_config;
mod teos;
mod writer;

pub use args::{LIGHTNING_DIR, lightningd_args};
pub use main_config::render_main_config;
pub use teos::render_teos_config;

use crate::document::ConfigDocument;
use crate::rules::BitcoindConfig;
use crate::schema::{NodeConfig, SchemaError};
use lnpkg_shared::{ErrorCode, ErrorEnvelope, SecretString};
use std::fmt;
use tracing::debug;

/// Relative path of the daemon config artifact.
pub const CONFIG_ARTIFACT: &str = "config";
/// Relative path of the watchtower server config artifact.
pub const TEOS_ARTIFACT: &str = ".teos/teos.toml";
/// Relative path of the argument-vector artifact.
pub const ARGS_ARTIFACT: &str = "lightningd.args";

/// Values supplied by collaborators. This is the complete list of what the
/// compiler may read besides the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalInputs {
    /// Bitcoin Core RPC user.
    pub bitcoin_rpc_user: Option<String>,
    /// Bitcoin Core RPC password.
    pub bitcoin_rpc_password: Option<SecretString>,
    /// Public onion address of the peer interface (without port).
    pub peer_address: Option<String>,
    /// Tor SOCKS proxy as `host:port`.
    pub tor_proxy: Option<String>,
    /// Alias to use when the document has none.
    pub fallback_alias: Option<String>,
}

impl ExternalInputs {
    /// Fill unset inputs from platform-resolved values stored in the document.
    #[must_use]
    pub fn or_document_pointers(mut self, config: &NodeConfig) -> Self {
        if self.bitcoin_rpc_user.is_none() {
            self.bitcoin_rpc_user.clone_from(&config.bitcoin_user);
        }
        if self.bitcoin_rpc_password.is_none() {
            self.bitcoin_rpc_password.clone_from(&config.bitcoin_password);
        }
        if self.peer_address.is_none() {
            self.peer_address.clone_from(&config.peer_tor_address);
        }
        self
    }

    /// Fill unset RPC credentials from the Bitcoin Core configuration.
    #[must_use]
    pub fn or_bitcoind_rpc(mut self, bitcoind: &BitcoindConfig) -> Self {
        if self.bitcoin_rpc_user.is_none() {
            self.bitcoin_rpc_user = bitcoind.rpc_username().map(str::to_owned);
        }
        if self.bitcoin_rpc_password.is_none() {
            self.bitcoin_rpc_password = bitcoind.rpc_password();
        }
        self
    }

    pub(crate) fn bitcoin_rpc_user(&self) -> Result<&str, CompileError> {
        require(self.bitcoin_rpc_user.as_deref(), "bitcoin_rpc_user")
    }

    pub(crate) fn bitcoin_rpc_password(&self) -> Result<&str, CompileError> {
        require(
            self.bitcoin_rpc_password.as_ref().map(SecretString::expose),
            "bitcoin_rpc_password",
        )
    }

    pub(crate) fn peer_address(&self) -> Result<&str, CompileError> {
        require(self.peer_address.as_deref(), "peer_address")
    }

    pub(crate) fn tor_proxy(&self) -> Result<&str, CompileError> {
        require(self.tor_proxy.as_deref(), "tor_proxy")
    }
}

fn require<'a>(value: Option<&'a str>, input: &'static str) -> Result<&'a str, CompileError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or(CompileError::MissingExternalInput { input })
}

/// Everything the compiler produces for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifacts {
    /// Daemon config file.
    pub config: String,
    /// Watchtower server config, when the server is enabled.
    pub teos: Option<String>,
    /// Daemon argument vector.
    pub lightningd_args: Vec<String>,
}

impl CompiledArtifacts {
    /// Artifacts as `(relative path, contents)` pairs, in write order.
    #[must_use]
    pub fn files(&self) -> Vec<(&'static str, String)> {
        let mut files = vec![(CONFIG_ARTIFACT, self.config.clone())];
        if let Some(teos) = &self.teos {
            files.push((TEOS_ARTIFACT, teos.clone()));
        }
        let mut args = self.lightningd_args.join("\n");
        args.push('\n');
        files.push((ARGS_ARTIFACT, args));
        files
    }
}

/// Compile a typed current-version configuration.
pub fn compile(
    config: &NodeConfig,
    inputs: &ExternalInputs,
) -> Result<CompiledArtifacts, CompileError> {
    let main = render_main_config(config, inputs)?;
    let teos = if config.watchtowers.wt_server {
        Some(render_teos_config(inputs)?)
    } else {
        None
    };
    let lightningd_args = lightningd_args(config);
    debug!(
        teos = teos.is_some(),
        args = lightningd_args.len(),
        "compiled artifacts"
    );
    Ok(CompiledArtifacts {
        config: main,
        teos,
        lightningd_args,
    })
}

/// Check discriminants, lift into [`NodeConfig`], then [`compile`].
pub fn compile_document(
    document: &ConfigDocument,
    inputs: &ExternalInputs,
) -> Result<CompiledArtifacts, CompileError> {
    let config = NodeConfig::from_document(document)?;
    compile(&config, inputs)
}

/// Compilation failures. Nothing is written when any of these occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A collaborator-provided value is absent or empty.
    MissingExternalInput {
        /// Input name.
        input: &'static str,
    },
    /// A stored discriminant names no known variant.
    InvalidVariantState {
        /// Dotted discriminant path.
        path: String,
        /// Stored value.
        found: String,
    },
    /// The document does not have the current shape.
    MalformedDocument {
        /// Deserializer message.
        reason: String,
    },
    /// An artifact serializer failed.
    Render {
        /// Artifact path.
        artifact: &'static str,
        /// Serializer message.
        reason: String,
    },
}

impl CompileError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingExternalInput { .. } => {
                ErrorCode::new("compile", "missing_external_input")
            },
            Self::InvalidVariantState { .. } => ErrorCode::new("compile", "invalid_variant_state"),
            Self::MalformedDocument { .. } => ErrorCode::new("schema", "malformed_document"),
            Self::Render { .. } => ErrorCode::new("compile", "render_failed"),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingExternalInput { input } => {
                write!(formatter, "missing external input: {input}")
            },
            Self::InvalidVariantState { path, found } => {
                write!(formatter, "{path} has unknown variant '{found}'")
            },
            Self::MalformedDocument { reason } => write!(formatter, "malformed document: {reason}"),
            Self::Render { artifact, reason } => {
                write!(formatter, "failed to render {artifact}: {reason}")
            },
        }
    }
}

impl std::error::Error for CompileError {}

impl From<SchemaError> for CompileError {
    fn from(error: SchemaError) -> Self {
        match error {
            SchemaError::InvalidVariant { path, found, .. } => {
                Self::InvalidVariantState { path, found }
            },
            SchemaError::Malformed { reason } => Self::MalformedDocument { reason },
        }
    }
}

impl From<CompileError> for ErrorEnvelope {
    fn from(error: CompileError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        match error {
            CompileError::MissingExternalInput { input } => {
                Self::expected(code, message).with_metadata("input", input)
            },
            CompileError::InvalidVariantState { path, found } => Self::expected(code, message)
                .with_metadata("path", path)
                .with_metadata("variant", found),
            CompileError::MalformedDocument { .. } => Self::expected(code, message),
            CompileError::Render { artifact, .. } => {
                Self::invariant(code, message).with_metadata("artifact", artifact)
            },
        }
    }
}
