//! Validation and auto-fix rule engine.
//!
//! A [`RuleSet`] evaluates rules in registration order. `validate` stops at
//! the first failure. `auto_fix` walks the rules once, fixing whatever fails
//! and exposes a fix; it does not iterate to a fixpoint, so a document can
//! need several validate/fix round-trips.

pub mod dependency;
pub mod node;

pub use dependency::{
    BITCOIND_MIN_VERSION, BitcoindAdvanced, BitcoindConfig, BitcoindDependency,
    PROXY_ALLOWED_CALLS, PROXY_USER_NAME, ProxyConfig, ProxyUser, Pruning, bitcoind_rules,
    proxy_rules,
};
pub use node::{WATCHTOWER_URI_PATTERN, node_rules};

use crate::secrets::SecretSource;
use lnpkg_shared::{ErrorCode, ErrorEnvelope};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Whether a fix ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// The rule mutated the target.
    Applied,
    /// The rule has no fix, or the fix had nothing to act on.
    Unavailable,
}

/// A single stateless check over `T` with an optional fix.
pub trait Rule<T>: Send + Sync {
    /// Stable kebab-case name.
    fn name(&self) -> &'static str;

    /// Returns an operator-facing message when `target` violates the rule.
    fn check(&self, target: &T) -> Option<String>;

    /// Mutate `target` towards satisfying the rule.
    fn fix(&self, _target: &mut T, _secrets: &mut dyn SecretSource) -> FixOutcome {
        FixOutcome::Unavailable
    }
}

/// Ordered rules over one document type.
pub struct RuleSet<T> {
    rules: Vec<Box<dyn Rule<T>>>,
}

impl<T> Default for RuleSet<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T> fmt::Debug for RuleSet<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_list()
            .entries(self.rules.iter().map(|rule| rule.name()))
            .finish()
    }
}

impl<T> RuleSet<T> {
    /// Empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; registration order is evaluation order.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Rule<T> + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Rule names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|rule| rule.name())
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when no rule is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First failing rule, or `None` when `target` is accepted.
    pub fn validate(&self, target: &T) -> Option<ValidationError> {
        let failure = self.rules.iter().find_map(|rule| {
            rule.check(target).map(|message| ValidationError {
                rule: rule.name(),
                message,
            })
        });
        if let Some(error) = &failure {
            warn!(rule = error.rule, "validation failed");
        }
        failure
    }

    /// One forward pass: fix each failing rule that has a fix.
    pub fn auto_fix(&self, mut target: T, secrets: &mut dyn SecretSource) -> AutoFixReport<T> {
        let mut applied = Vec::new();
        for rule in &self.rules {
            if rule.check(&target).is_none() {
                continue;
            }
            if rule.fix(&mut target, secrets) == FixOutcome::Applied {
                let resolved = rule.check(&target).is_none();
                debug!(rule = rule.name(), resolved, "applied auto-fix");
                applied.push(rule.name());
            }
        }
        let remaining = self.validate(&target);
        AutoFixReport {
            target,
            applied,
            remaining,
        }
    }
}

/// Outcome of [`RuleSet::auto_fix`].
#[derive(Debug, Clone, PartialEq)]
pub struct AutoFixReport<T> {
    /// Target after the pass.
    pub target: T,
    /// Names of rules whose fix ran, in order.
    pub applied: Vec<&'static str>,
    /// First rule still failing after the pass.
    pub remaining: Option<ValidationError>,
}

impl<T> AutoFixReport<T> {
    /// Returns true when the target now passes every rule.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.remaining.is_none()
    }
}

/// A rejected document: the first violated rule and its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Rule name.
    pub rule: &'static str,
    /// Operator-facing message.
    pub message: String,
}

impl ValidationError {
    fn error_code() -> ErrorCode {
        ErrorCode::new("validation", "rejected")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ErrorEnvelope {
    fn from(error: ValidationError) -> Self {
        Self::expected(ValidationError::error_code(), error.message)
            .with_metadata("rule", error.rule)
    }
}
