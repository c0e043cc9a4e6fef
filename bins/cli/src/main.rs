//! CLI binary entrypoint.

mod commands;
mod error;
mod format;

use clap::{Parser, Subcommand};
use commands::{
    CompileInput, DependencyCheck, MigrateInput, run_autofix, run_check_dependency, run_compile,
    run_init, run_migrate, run_validate, run_versions,
};
use error::{CliError, ExitCode};
use format::{OutputArgs, OutputMode, format_error};
use lnpkg_config::{EnvParseError, ExternalEnv};
use lnpkg_shared::{ErrorCode, ErrorEnvelope};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Env var: tracing filter directives (default `warn`).
const LOG_ENV: &str = "LNPKG_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "lnpkg",
    version,
    about = "Migrate, validate, and compile Core Lightning node configuration",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the schema version chain.
    Versions,
    /// Write a first-install configuration document.
    Init {
        /// Document path (.yaml, .yml or .json).
        #[arg(long)]
        config: PathBuf,
        /// Overwrite an existing document.
        #[arg(long)]
        force: bool,
    },
    /// Migrate a document between schema versions.
    Migrate {
        /// Document path.
        #[arg(long)]
        config: PathBuf,
        /// Version the document is currently at.
        #[arg(long)]
        from: String,
        /// Target version (defaults to the current schema version).
        #[arg(long)]
        to: Option<String>,
        /// Report without writing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a current-version document.
    Validate {
        /// Document path.
        #[arg(long)]
        config: PathBuf,
    },
    /// Apply every available fix once and persist the result.
    Autofix {
        /// Document path.
        #[arg(long)]
        config: PathBuf,
        /// Report without writing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Check a dependency's configuration for compatibility.
    CheckDependency {
        #[command(subcommand)]
        dependency: DependencyCommands,
    },
    /// Render daemon configuration artifacts.
    Compile {
        /// Document path.
        #[arg(long)]
        config: PathBuf,
        /// Output directory for the rendered artifacts.
        #[arg(long)]
        out: PathBuf,
        /// Bitcoin Core configuration providing RPC credentials.
        #[arg(long)]
        bitcoind_config: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum DependencyCommands {
    /// Bitcoin RPC proxy.
    Proxy {
        /// Proxy configuration path.
        #[arg(long)]
        config: PathBuf,
        /// Apply fixes and write the document back.
        #[arg(long)]
        fix: bool,
    },
    /// Bitcoin Core.
    Bitcoind {
        /// Bitcoin Core configuration path.
        #[arg(long)]
        config: PathBuf,
        /// Installed package version.
        #[arg(long)]
        version: String,
        /// Apply fixes and write the document back.
        #[arg(long)]
        fix: bool,
    },
}

/// Rendered command result.
pub(crate) struct CliOutput {
    stdout: String,
    stderr: String,
    exit_code: ExitCode,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let mode = OutputMode::from_args(&cli.output);
    init_tracing(mode);

    let output = match run(&cli.command, mode, ExternalEnv::from_std_env) {
        Ok(output) => output,
        Err(error) => render_failure(mode, error),
    };
    match write_output(&output) {
        Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
        Err(error) => {
            let _ = writeln!(io::stderr(), "error: {error}");
            std::process::ExitCode::from(error.exit_code().as_u8())
        },
    }
}

fn init_tracing(mode: OutputMode) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);
    // A subscriber may already be installed when embedded in tests.
    let _ = if mode.is_machine() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn run(
    command: &Commands,
    mode: OutputMode,
    load_env: impl FnOnce() -> Result<ExternalEnv, EnvParseError>,
) -> Result<CliOutput, CliError> {
    match command {
        Commands::Versions => run_versions(mode),
        Commands::Init { config, force } => run_init(mode, config, *force),
        Commands::Migrate {
            config,
            from,
            to,
            dry_run,
        } => run_migrate(
            mode,
            &MigrateInput {
                path: config,
                from,
                to: to.as_deref(),
                dry_run: *dry_run,
            },
        ),
        Commands::Validate { config } => run_validate(mode, config),
        Commands::Autofix { config, dry_run } => run_autofix(mode, config, *dry_run),
        Commands::CheckDependency { dependency } => match dependency {
            DependencyCommands::Proxy { config, fix } => {
                run_check_dependency(mode, DependencyCheck::Proxy, config, *fix)
            },
            DependencyCommands::Bitcoind {
                config,
                version,
                fix,
            } => run_check_dependency(mode, DependencyCheck::Bitcoind { version }, config, *fix),
        },
        Commands::Compile {
            config,
            out,
            bitcoind_config,
        } => {
            let env = load_env().map_err(ErrorEnvelope::from)?;
            run_compile(
                mode,
                &CompileInput {
                    path: config,
                    out_dir: out,
                    bitcoind_config: bitcoind_config.as_deref(),
                },
                &env,
            )
        },
    }
}

fn render_failure(mode: OutputMode, error: CliError) -> CliOutput {
    let exit_code = error.exit_code();
    let envelope = match error {
        CliError::Failed(envelope) => envelope,
        CliError::Io(error) => ErrorEnvelope::from(error),
        CliError::Serialization(error) => ErrorEnvelope::invariant(
            ErrorCode::internal(),
            format!("failed to serialize output: {error}"),
        ),
    }
    .redact_secrets();

    let mut stderr = String::new();
    log_info(&mut stderr, "command failed", mode.no_progress);
    CliOutput {
        stdout: format_error(mode, &envelope),
        stderr,
        exit_code,
    }
}

pub(crate) fn log_info(stderr: &mut String, message: &str, no_progress: bool) {
    if no_progress {
        return;
    }
    stderr.push_str("info: ");
    stderr.push_str(message);
    stderr.push('\n');
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;

    if !output.stderr.is_empty() {
        let mut stderr = io::stderr();
        stderr.write_all(output.stderr.as_bytes())?;
        stderr.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use format::OutputFormat;
    use lnpkg_config::{NodeConfig, RngSecrets, SchemaVersion, read_document, write_document};
    use serde_json::{Value, json};
    use std::error::Error;
    use std::path::Path;

    const fn mode(format: OutputFormat) -> OutputMode {
        OutputMode {
            format,
            no_progress: true,
        }
    }

    fn fixture_path(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("crates")
            .join("config")
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    fn execute(args: &[&str]) -> Result<CliOutput, Box<dyn Error>> {
        execute_with_env(args, ExternalEnv::default())
    }

    fn execute_with_env(args: &[&str], env: ExternalEnv) -> Result<CliOutput, Box<dyn Error>> {
        let cli = Cli::try_parse_from(std::iter::once("lnpkg").chain(args.iter().copied()))?;
        let mode = OutputMode::from_args(&cli.output);
        Ok(match run(&cli.command, mode, || Ok(env)) {
            Ok(output) => output,
            Err(error) => render_failure(mode, error),
        })
    }

    fn current_document(dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
        let path = dir.join("config.yaml");
        let document = NodeConfig::with_defaults(&mut RngSecrets::seeded(9)).to_document()?;
        write_document(&path, &document)?;
        Ok(path)
    }

    fn as_str(path: &Path) -> &str {
        path.to_str().unwrap_or_default()
    }

    #[test]
    fn version_flag_is_supported() {
        let result = Cli::command().try_get_matches_from(["lnpkg", "--version"]);
        let is_version = matches!(
            result,
            Err(error) if error.kind() == clap::error::ErrorKind::DisplayVersion
        );
        assert!(is_version);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn versions_lists_the_chain_as_json() -> Result<(), Box<dyn Error>> {
        let output = execute(&["--output", "json", "versions"])?;
        assert_eq!(output.exit_code, ExitCode::Ok);

        let value: Value = serde_json::from_str(&output.stdout)?;
        assert_eq!(value.get("current"), Some(&json!("25.05.0")));
        let versions = value
            .get("versions")
            .and_then(Value::as_array)
            .ok_or_else(|| io::Error::other("versions missing"))?;
        assert_eq!(versions.len(), SchemaVersion::ALL.len());
        assert_eq!(
            versions.last().and_then(|entry| entry.get("down")),
            Some(&json!("irreversible"))
        );
        Ok(())
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");

        let first = execute(&["init", "--config", as_str(&path)])?;
        assert_eq!(first.exit_code, ExitCode::Ok);
        let created = read_document(&path)?;
        assert!(NodeConfig::from_document(&created).is_ok());

        let second = execute(&["init", "--config", as_str(&path)])?;
        assert_eq!(second.exit_code, ExitCode::InvalidInput);
        assert!(second.stdout.contains("code: cli:config_exists"));
        assert_eq!(read_document(&path)?, created);

        let forced = execute(&["init", "--config", as_str(&path), "--force"])?;
        assert_eq!(forced.exit_code, ExitCode::Ok);
        Ok(())
    }

    #[test]
    fn migrate_rewrites_the_document() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");
        std::fs::copy(fixture_path("node-0.10.2.1.yaml"), &path)?;

        let dry = execute(&[
            "--output",
            "json",
            "migrate",
            "--config",
            as_str(&path),
            "--from",
            "0.10.2.1",
            "--dry-run",
        ])?;
        let value: Value = serde_json::from_str(&dry.stdout)?;
        assert_eq!(value.get("written"), Some(&json!(false)));
        assert_eq!(value.get("breaking"), Some(&json!(true)));
        assert!(read_document(&path)?.contains(&["rest-tor-address"]));

        let applied = execute(&["migrate", "--config", as_str(&path), "--from", "0.10.2.1"])?;
        assert_eq!(applied.exit_code, ExitCode::Ok);
        assert!(applied.stdout.contains("to: 25.05.0\n"));
        let migrated = read_document(&path)?;
        assert!(NodeConfig::from_document(&migrated).is_ok());
        Ok(())
    }

    #[test]
    fn unknown_version_exits_with_invalid_input() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = current_document(dir.path())?;
        let output = execute(&[
            "--output",
            "ndjson",
            "migrate",
            "--config",
            as_str(&path),
            "--from",
            "23.02.3",
        ])?;
        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        let value: Value = serde_json::from_str(&output.stdout)?;
        assert_eq!(value.get("type"), Some(&json!("error")));
        Ok(())
    }

    #[test]
    fn irreversible_downgrade_leaves_the_file_alone() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = current_document(dir.path())?;
        let before = std::fs::read_to_string(&path)?;

        let output = execute(&[
            "migrate",
            "--config",
            as_str(&path),
            "--from",
            "25.05.0",
            "--to",
            "23.11",
        ])?;
        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        assert!(output.stdout.contains("code: migration:irreversible"));
        assert_eq!(std::fs::read_to_string(&path)?, before);
        Ok(())
    }

    #[test]
    fn validate_reports_rejection_as_data() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = current_document(dir.path())?;
        assert_eq!(
            execute(&["validate", "--config", as_str(&path)])?.exit_code,
            ExitCode::Ok
        );

        let mut document = read_document(&path)?;
        if let Some(root) = document.object_mut(&[])? {
            root.insert("color".to_owned(), json!("zzzzzz"));
        }
        write_document(&path, &document)?;

        let output = execute(&["--output", "json", "validate", "--config", as_str(&path)])?;
        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        let value: Value = serde_json::from_str(&output.stdout)?;
        assert_eq!(value.get("status"), Some(&json!("rejected")));
        assert_eq!(value.pointer("/error/rule"), Some(&json!("color-hex")));
        Ok(())
    }

    #[test]
    fn autofix_appends_missing_watchtower_ports() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = current_document(dir.path())?;
        let tower = format!("{}@tower.example.org", "02".repeat(33));
        let mut document = read_document(&path)?;
        if let Some(watchtowers) = document.object_mut(&["watchtowers"])? {
            watchtowers.insert(
                "wt-client".to_owned(),
                json!({ "enabled": "enabled", "add-watchtowers": [tower] }),
            );
        }
        write_document(&path, &document)?;

        let output = execute(&["autofix", "--config", as_str(&path)])?;
        assert_eq!(output.exit_code, ExitCode::Ok);
        assert!(output.stdout.contains("  - watchtower-uri-port\n"));

        let fixed = NodeConfig::from_document(&read_document(&path)?)?;
        assert_eq!(
            fixed.watchtowers.wt_client.towers(),
            [format!("{tower}:9814")]
        );
        Ok(())
    }

    #[test]
    fn check_dependency_fixes_the_proxy() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("rpc-proxy.yaml");
        std::fs::copy(fixture_path("rpc-proxy.yaml"), &path)?;

        let check = execute(&["check-dependency", "proxy", "--config", as_str(&path)])?;
        assert_eq!(check.exit_code, ExitCode::InvalidInput);
        assert!(check.stdout.contains("proxy-allows-sendrawtransaction"));

        let fix = execute(&["check-dependency", "proxy", "--config", as_str(&path), "--fix"])?;
        assert_eq!(fix.exit_code, ExitCode::Ok);
        assert!(fix.stdout.contains("written: true\n"));
        Ok(())
    }

    #[test]
    fn check_dependency_rejects_old_bitcoind() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bitcoind.yaml");
        std::fs::copy(fixture_path("bitcoind.yaml"), &path)?;

        let output = execute(&[
            "--output",
            "json",
            "check-dependency",
            "bitcoind",
            "--config",
            as_str(&path),
            "--version",
            "28.0.0:2",
            "--fix",
        ])?;
        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        let value: Value = serde_json::from_str(&output.stdout)?;
        assert_eq!(value.get("applied"), Some(&json!(["bitcoind-pruning-disabled"])));
        assert_eq!(value.pointer("/error/rule"), Some(&json!("bitcoind-version")));
        Ok(())
    }

    #[test]
    fn compile_writes_artifacts_with_env_inputs() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = current_document(dir.path())?;
        let out = dir.path().join("out");
        let env = ExternalEnv {
            tor_address: Some("peer.onion".to_owned()),
            host_ip: Some("10.0.3.1".parse()?),
            ..ExternalEnv::default()
        };

        let output = execute_with_env(
            &[
                "compile",
                "--config",
                as_str(&path),
                "--out",
                as_str(&out),
                "--bitcoind-config",
                as_str(&fixture_path("bitcoind.yaml")),
            ],
            env,
        )?;
        assert_eq!(output.exit_code, ExitCode::Ok, "{}", output.stdout);

        let config = std::fs::read_to_string(out.join("config"))?;
        assert!(config.contains("proxy=10.0.3.1:9050\n"));
        assert!(config.contains("bitcoin-rpcuser=bitcoin\n"));
        assert!(out.join("lightningd.args").exists());
        assert!(dir.path().join("default_alias.txt").exists());
        Ok(())
    }

    #[test]
    fn compile_without_credentials_writes_nothing() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = current_document(dir.path())?;
        let out = dir.path().join("out");

        let output = execute(&[
            "compile",
            "--config",
            as_str(&path),
            "--out",
            as_str(&out),
        ])?;
        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        assert!(output.stdout.contains("code: compile:missing_external_input"));
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn missing_document_exits_with_io() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("absent.yaml");
        let output = execute(&["validate", "--config", as_str(&path)])?;
        assert_eq!(output.exit_code, ExitCode::Io);
        assert!(output.stdout.starts_with("status: error\n"));
        Ok(())
    }

    #[test]
    fn failures_redact_secret_metadata() {
        let envelope = ErrorEnvelope::expected(
            ErrorCode::new("config", "empty_env_var"),
            "bad env",
        )
        .with_metadata("password", "hunter2");
        let output = render_failure(mode(OutputFormat::Text), CliError::Failed(envelope));
        assert!(output.stdout.contains("password: <redacted>"));
        assert!(!output.stdout.contains("hunter2"));
    }

    #[test]
    fn exit_codes_for_errors() -> Result<(), Box<dyn Error>> {
        let io_error = CliError::Io(io::Error::other("io"));
        let serialization_error = match serde_json::from_str::<Value>("not-json") {
            Ok(_) => return Err("expected serialization error".into()),
            Err(error) => CliError::Serialization(error),
        };

        assert_eq!(io_error.exit_code(), ExitCode::Io);
        assert_eq!(serialization_error.exit_code(), ExitCode::Internal);
        Ok(())
    }
}
