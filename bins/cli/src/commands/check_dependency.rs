//! Check-dependency command handler.

use super::{path_string, rejection};
use crate::error::{CliError, ExitCode};
use crate::format::{OutputMode, Summary};
use crate::{CliOutput, log_info};
use lnpkg_config::rules::{
    BitcoindConfig, BitcoindDependency, ProxyConfig, bitcoind_rules, proxy_rules,
};
use lnpkg_config::{
    DocumentIoError, DottedVersion, RngSecrets, RuleSet, ValidationError, read_typed, write_typed,
};
use lnpkg_shared::ErrorEnvelope;
use std::path::Path;

/// Which dependency document to check.
#[derive(Debug, Clone, Copy)]
pub enum DependencyCheck<'a> {
    /// Bitcoin RPC proxy users.
    Proxy,
    /// Bitcoin Core, with its declared package version.
    Bitcoind {
        /// Package version string (`29.1.0:0`).
        version: &'a str,
    },
}

impl DependencyCheck<'_> {
    const fn name(self) -> &'static str {
        match self {
            Self::Proxy => "proxy",
            Self::Bitcoind { .. } => "bitcoind",
        }
    }
}

struct Checked {
    applied: Vec<&'static str>,
    remaining: Option<ValidationError>,
    written: bool,
}

/// Check a dependency document and optionally apply its fixes.
pub fn run_check_dependency(
    mode: OutputMode,
    check: DependencyCheck<'_>,
    path: &Path,
    fix: bool,
) -> Result<CliOutput, CliError> {
    let checked = match check {
        DependencyCheck::Proxy => {
            let proxy: ProxyConfig = read_typed(path).map_err(ErrorEnvelope::from)?;
            apply(&proxy_rules(), proxy, fix, |proxy| write_typed(path, proxy))?
        },
        DependencyCheck::Bitcoind { version } => {
            let version = DottedVersion::parse_package(version).map_err(ErrorEnvelope::from)?;
            let config: BitcoindConfig = read_typed(path).map_err(ErrorEnvelope::from)?;
            let dependency = BitcoindDependency { version, config };
            apply(&bitcoind_rules(), dependency, fix, |dependency| {
                write_typed(path, &dependency.config)
            })?
        },
    };

    let mut stderr = String::new();
    if checked.written {
        log_info(
            &mut stderr,
            &format!("wrote {}", path.display()),
            mode.no_progress,
        );
    }

    let (status, exit_code) = match checked.remaining {
        None => ("ok", ExitCode::Ok),
        Some(_) => ("rejected", ExitCode::InvalidInput),
    };
    let stdout = Summary::new("check-dependency", status)
        .field("dependency", check.name())
        .field("path", path_string(path))
        .field("applied", checked.applied)
        .field("written", checked.written)
        .field("error", rejection(checked.remaining.as_ref()))
        .render(mode)?;

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code,
    })
}

fn apply<T, W>(rules: &RuleSet<T>, target: T, fix: bool, write: W) -> Result<Checked, CliError>
where
    W: FnOnce(&T) -> Result<(), DocumentIoError>,
{
    if !fix {
        return Ok(Checked {
            applied: Vec::new(),
            remaining: rules.validate(&target),
            written: false,
        });
    }

    let report = rules.auto_fix(target, &mut RngSecrets::os());
    let written = !report.applied.is_empty();
    if written {
        write(&report.target).map_err(ErrorEnvelope::from)?;
    }
    Ok(Checked {
        applied: report.applied,
        remaining: report.remaining,
        written,
    })
}

