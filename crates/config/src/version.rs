//! Schema version registry.
//!
//! Known versions form a single linear chain. [`SchemaVersion`] is a fieldless
//! enum declared oldest-first, so the derived `Ord` *is* the chain order and an
//! unregistered version cannot be represented once parsing has succeeded.

use lnpkg_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A dotted numeric version (`23.02.2.7`, `29.1`).
///
/// Trailing zero components are insignificant: `23.11` and `23.11.0` compare
/// equal. Leading zeros inside a component are accepted (`23.02` is `23.2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DottedVersion {
    components: Vec<u64>,
}

impl DottedVersion {
    /// Parse a dotted numeric string.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::Malformed {
                input: input.to_owned(),
            });
        }

        let mut components = trimmed
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|byte| byte.is_ascii_digit()) {
                    return None;
                }
                part.parse::<u64>().ok()
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| VersionParseError::Malformed {
                input: input.to_owned(),
            })?;

        while components.len() > 1 && components.last() == Some(&0) {
            components.pop();
        }

        Ok(Self { components })
    }

    /// Parse a package version that may carry a revision or pre-release
    /// suffix (`29.1:1-beta.0`, `28.0-rc1`). Only the dotted prefix counts.
    pub fn parse_package(input: &str) -> Result<Self, VersionParseError> {
        let prefix = input
            .trim()
            .split([':', '-', '+'])
            .next()
            .unwrap_or_default();
        Self::parse(prefix).map_err(|_| VersionParseError::Malformed {
            input: input.to_owned(),
        })
    }

    /// Build from numeric components.
    #[must_use]
    pub fn from_components(components: &[u64]) -> Self {
        let mut components = components.to_vec();
        while components.len() > 1 && components.last() == Some(&0) {
            components.pop();
        }
        Self { components }
    }

    /// Numeric components with trailing zeros stripped.
    #[must_use]
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for index in 0..len {
            let left = self.components.get(index).copied().unwrap_or(0);
            let right = other.components.get(index).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => {},
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DottedVersion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.components {
            if !first {
                formatter.write_str(".")?;
            }
            write!(formatter, "{component}")?;
            first = false;
        }
        Ok(())
    }
}

/// A registered configuration schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaVersion {
    /// Initial packaged release.
    V0_10_2_1,
    /// No document changes.
    V0_11_1,
    /// Introduces the CLBOSS plugin toggle.
    V0_11_1_1,
    /// CLBOSS becomes a variant with tuning options.
    V0_11_2,
    /// Dual funding becomes a variant with strategies.
    V22_11_1,
    /// First release without a downgrade path.
    V23_02_2,
    /// Forces reconfiguration.
    V23_02_2_1,
    /// Forces reconfiguration.
    V23_02_2_2,
    /// Forces reconfiguration.
    V23_02_2_4,
    /// UI password, Sparko, and watchtowers.
    V23_02_2_7,
    /// No document changes.
    V23_08_1,
    /// No document changes.
    V23_11,
    /// CLNRest plugin and autoclean options.
    V23_11_2_1,
    /// Splicing and Sling.
    V24_02_1,
    /// Clams remote websocket.
    V24_02_2_1,
    /// xpay `pay` handler toggle.
    V24_11_0,
    /// No document changes.
    V24_11_1_1,
    /// Drops the C-Lightning-REST plugin.
    V25_02_0,
    /// No document changes.
    V25_02_1,
    /// No document changes.
    V25_02_2,
    /// Resets splicing.
    V25_05_0,
}

impl SchemaVersion {
    /// Every registered version, oldest first.
    pub const ALL: [Self; 21] = [
        Self::V0_10_2_1,
        Self::V0_11_1,
        Self::V0_11_1_1,
        Self::V0_11_2,
        Self::V22_11_1,
        Self::V23_02_2,
        Self::V23_02_2_1,
        Self::V23_02_2_2,
        Self::V23_02_2_4,
        Self::V23_02_2_7,
        Self::V23_08_1,
        Self::V23_11,
        Self::V23_11_2_1,
        Self::V24_02_1,
        Self::V24_02_2_1,
        Self::V24_11_0,
        Self::V24_11_1_1,
        Self::V25_02_0,
        Self::V25_02_1,
        Self::V25_02_2,
        Self::V25_05_0,
    ];

    /// The version every document is migrated to on install.
    pub const CURRENT: Self = Self::V25_05_0;

    /// The oldest version a persisted document may carry.
    pub const OLDEST: Self = Self::V0_10_2_1;

    /// Canonical dotted string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V0_10_2_1 => "0.10.2.1",
            Self::V0_11_1 => "0.11.1",
            Self::V0_11_1_1 => "0.11.1.1",
            Self::V0_11_2 => "0.11.2",
            Self::V22_11_1 => "22.11.1",
            Self::V23_02_2 => "23.02.2",
            Self::V23_02_2_1 => "23.02.2.1",
            Self::V23_02_2_2 => "23.02.2.2",
            Self::V23_02_2_4 => "23.02.2.4",
            Self::V23_02_2_7 => "23.02.2.7",
            Self::V23_08_1 => "23.08.1",
            Self::V23_11 => "23.11",
            Self::V23_11_2_1 => "23.11.2.1",
            Self::V24_02_1 => "24.02.1",
            Self::V24_02_2_1 => "24.02.2.1",
            Self::V24_11_0 => "24.11.0",
            Self::V24_11_1_1 => "24.11.1.1",
            Self::V25_02_0 => "25.02.0",
            Self::V25_02_1 => "25.02.1",
            Self::V25_02_2 => "25.02.2",
            Self::V25_05_0 => "25.05.0",
        }
    }

    /// Position in the chain (0 = oldest).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Version at a chain position.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The version immediately before this one, if any.
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// The version immediately after this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// Dotted numeric form used for comparisons.
    #[must_use]
    pub fn dotted(self) -> DottedVersion {
        // Registered strings are well-formed; the fallback is unreachable.
        DottedVersion::parse(self.as_str()).unwrap_or(DottedVersion {
            components: Vec::new(),
        })
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for SchemaVersion {
    type Err = VersionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let wanted = DottedVersion::parse(input)?;
        Self::ALL
            .into_iter()
            .find(|version| version.dotted() == wanted)
            .ok_or_else(|| VersionParseError::Unknown {
                input: input.trim().to_owned(),
            })
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Version parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    /// Not a dotted numeric string.
    Malformed {
        /// Raw input.
        input: String,
    },
    /// Well-formed but not in the registry.
    Unknown {
        /// Raw input.
        input: String,
    },
}

impl VersionParseError {
    /// Raw input that failed to parse.
    #[must_use]
    pub fn input(&self) -> &str {
        match self {
            Self::Malformed { input } | Self::Unknown { input } => input,
        }
    }

    fn error_code(&self) -> ErrorCode {
        match self {
            Self::Malformed { .. } => ErrorCode::new("schema", "malformed_version"),
            Self::Unknown { .. } => ErrorCode::new("schema", "unknown_version"),
        }
    }
}

impl fmt::Display for VersionParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { input } => {
                write!(formatter, "'{input}' is not a dotted numeric version")
            },
            Self::Unknown { input } => {
                write!(formatter, "version {input} is not a known schema version")
            },
        }
    }
}

impl std::error::Error for VersionParseError {}

impl From<VersionParseError> for ErrorEnvelope {
    fn from(error: VersionParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        Self::expected(code, message).with_metadata("version", error.input())
    }
}
