//! Reference JDK version normalization.
//!
//! `javac -version` prints free-form strings (`1.8.0_202`, `11.0.2`, `17-ea`). They are
//! mapped onto an ordered [`JavaRelease`] plus a minor ordinal by two literal tables:
//!
//! - [`RELEASE_TABLE`]: ordered matchers, first match wins.
//! - [`MINOR_TABLE`]: exact raw strings per release. Minors grow with time inside one
//!   release, so "fixed at minor N or later" is a plain comparison.
//!
//! Both tables are append-only. An unknown raw string is an error: the harness cannot
//! place that toolchain relative to the excuse pivots.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ToolchainError;

/// Minor assigned to a raw version missing from [`MINOR_TABLE`] under [`MinorPolicy::Lenient`].
pub const MINOR_UNKNOWN: i32 = -1;

/// Language release of a reference toolchain, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JavaRelease {
    #[serde(rename = "1.4")]
    V1_4,
    #[serde(rename = "1.5")]
    V1_5,
    #[serde(rename = "1.6")]
    V1_6,
    #[serde(rename = "1.7")]
    V1_7,
    #[serde(rename = "1.8")]
    V1_8,
    #[serde(rename = "9")]
    V9,
    #[serde(rename = "10")]
    V10,
    #[serde(rename = "11")]
    V11,
    #[serde(rename = "12")]
    V12,
    #[serde(rename = "13")]
    V13,
    #[serde(rename = "14")]
    V14,
    #[serde(rename = "15")]
    V15,
    #[serde(rename = "16")]
    V16,
    #[serde(rename = "17")]
    V17,
    #[serde(rename = "18")]
    V18,
}

impl JavaRelease {
    pub const ALL: [JavaRelease; 15] = [
        Self::V1_4,
        Self::V1_5,
        Self::V1_6,
        Self::V1_7,
        Self::V1_8,
        Self::V9,
        Self::V10,
        Self::V11,
        Self::V12,
        Self::V13,
        Self::V14,
        Self::V15,
        Self::V16,
        Self::V17,
        Self::V18,
    ];

    /// Canonical compliance string (`1.8`, `11`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1_4 => "1.4",
            Self::V1_5 => "1.5",
            Self::V1_6 => "1.6",
            Self::V1_7 => "1.7",
            Self::V1_8 => "1.8",
            Self::V9 => "9",
            Self::V10 => "10",
            Self::V11 => "11",
            Self::V12 => "12",
            Self::V13 => "13",
            Self::V14 => "14",
            Self::V15 => "15",
            Self::V16 => "16",
            Self::V17 => "17",
            Self::V18 => "18",
        }
    }

    /// Parse a compliance level, accepting both `1.8` and `8` spellings.
    #[must_use]
    pub fn parse_compliance(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let short = raw.strip_prefix("1.").unwrap_or(raw);
        Self::ALL.into_iter().find(|release| {
            let canonical = release.as_str();
            canonical == raw || canonical.strip_prefix("1.").unwrap_or(canonical) == short
        })
    }
}

impl fmt::Display for JavaRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a raw version absent from [`MINOR_TABLE`] is treated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MinorPolicy {
    /// Unknown raw versions are fatal.
    #[default]
    Strict,
    /// Unknown raw versions get [`MINOR_UNKNOWN`].
    Lenient,
}

#[derive(Debug, Clone, Copy)]
enum VersionMatcher {
    /// Substring of the raw version or of the toolchain path; javac 1.4 has no `-version`.
    ContainsInVersionOrPath(&'static str),
    Contains(&'static str),
    StartsWith(&'static str),
}

impl VersionMatcher {
    fn matches(self, raw: &str, path: Option<&str>) -> bool {
        match self {
            Self::ContainsInVersionOrPath(needle) => {
                raw.contains(needle) || path.is_some_and(|p| p.contains(needle))
            }
            Self::Contains(needle) => raw.contains(needle),
            Self::StartsWith(prefix) => raw.starts_with(prefix),
        }
    }
}

const RELEASE_TABLE: &[(VersionMatcher, JavaRelease)] = &[
    (VersionMatcher::ContainsInVersionOrPath("1.4"), JavaRelease::V1_4),
    (VersionMatcher::Contains("1.5"), JavaRelease::V1_5),
    (VersionMatcher::Contains("1.6"), JavaRelease::V1_6),
    (VersionMatcher::Contains("1.7"), JavaRelease::V1_7),
    (VersionMatcher::Contains("1.8"), JavaRelease::V1_8),
    (VersionMatcher::StartsWith("9"), JavaRelease::V9),
    (VersionMatcher::StartsWith("10"), JavaRelease::V10),
    (VersionMatcher::StartsWith("11"), JavaRelease::V11),
    (VersionMatcher::StartsWith("12"), JavaRelease::V12),
    (VersionMatcher::StartsWith("13"), JavaRelease::V13),
    (VersionMatcher::StartsWith("14"), JavaRelease::V14),
    (VersionMatcher::StartsWith("15"), JavaRelease::V15),
    (VersionMatcher::StartsWith("16"), JavaRelease::V16),
    (VersionMatcher::StartsWith("17"), JavaRelease::V17),
    (VersionMatcher::StartsWith("18"), JavaRelease::V18),
];

// Two last digits distinguish variants inside the level given by the first two.
const MINOR_TABLE: &[(JavaRelease, &str, i32)] = &[
    (JavaRelease::V1_5, "1.5.0_15-ea", 1500),
    (JavaRelease::V1_5, "1.5.0_16-ea", 1600),
    (JavaRelease::V1_6, "1.6.0_10-ea", 1000),
    (JavaRelease::V1_6, "1.6.0_10-beta", 1010),
    (JavaRelease::V1_6, "1.6.0_45", 1045),
    (JavaRelease::V1_7, "1.7.0-ea", 0),
    (JavaRelease::V1_7, "1.7.0_10", 1000),
    (JavaRelease::V1_7, "1.7.0_25", 2500),
    (JavaRelease::V1_7, "1.7.0_80", 8000),
    (JavaRelease::V1_8, "1.8.0-ea", 0),
    (JavaRelease::V1_8, "1.8.0", 0),
    // 1.8.0_40 and 1.8.0_45 follow the 2015-02-13 JLS maintenance release.
    (JavaRelease::V1_8, "1.8.0_40", 1000),
    (JavaRelease::V1_8, "1.8.0_45", 1100),
    (JavaRelease::V1_8, "1.8.0_60", 1500),
    (JavaRelease::V1_8, "1.8.0_131", 1700),
    (JavaRelease::V1_8, "1.8.0_152", 1900),
    (JavaRelease::V1_8, "1.8.0_162", 2100),
    (JavaRelease::V1_8, "1.8.0_171", 2200),
    (JavaRelease::V1_8, "1.8.0_172", 2300),
    (JavaRelease::V1_8, "1.8.0_181", 2400),
    (JavaRelease::V1_8, "1.8.0_182", 2500),
    (JavaRelease::V1_8, "1.8.0_202", 2600),
    (JavaRelease::V1_8, "1.8.0_212", 2700),
    (JavaRelease::V9, "9", 0),
    (JavaRelease::V9, "9.0.1", 100),
    (JavaRelease::V9, "9.0.4", 400),
    (JavaRelease::V10, "10", 0),
    (JavaRelease::V10, "10.0.1", 100),
    (JavaRelease::V10, "10.0.2", 200),
    (JavaRelease::V11, "11", 0),
    (JavaRelease::V11, "11.0.1", 100),
    (JavaRelease::V11, "11.0.2", 200),
    (JavaRelease::V12, "12", 0),
    (JavaRelease::V12, "12.0.1", 100),
    (JavaRelease::V12, "12.0.2", 200),
    (JavaRelease::V13, "13-ea", 0),
    (JavaRelease::V13, "13", 0),
    (JavaRelease::V13, "13.0.1", 100),
    (JavaRelease::V13, "13.0.2", 200),
    (JavaRelease::V14, "14-ea", 0),
    (JavaRelease::V14, "14", 0),
    (JavaRelease::V14, "14.0.1", 100),
    (JavaRelease::V14, "14.0.2", 200),
    (JavaRelease::V15, "15-ea", 0),
    (JavaRelease::V15, "15", 0),
    (JavaRelease::V15, "15.0.1", 100),
    (JavaRelease::V15, "15.0.2", 200),
    (JavaRelease::V16, "16-ea", 0),
    (JavaRelease::V16, "16", 0),
    (JavaRelease::V16, "16.0.1", 100),
    (JavaRelease::V16, "16.0.2", 200),
    (JavaRelease::V17, "17-ea", 0),
    (JavaRelease::V17, "17", 0),
    (JavaRelease::V17, "17.0.1", 100),
    (JavaRelease::V17, "17.0.2", 200),
    (JavaRelease::V18, "18-ea", 0),
    (JavaRelease::V18, "18", 0),
    (JavaRelease::V18, "18.0.1", 100),
    (JavaRelease::V18, "18.0.2", 200),
];

/// Map a raw version (and optionally the toolchain path) onto a release.
pub fn release_from_raw_version(
    raw: &str,
    toolchain_path: Option<&Path>,
) -> Result<JavaRelease, ToolchainError> {
    let path = toolchain_path.map(|p| p.to_string_lossy());
    RELEASE_TABLE
        .iter()
        .find(|(matcher, _)| matcher.matches(raw, path.as_deref()))
        .map(|(_, release)| *release)
        .ok_or_else(|| ToolchainError::UnknownVersion {
            raw: raw.to_string(),
        })
}

/// Look up the minor ordinal of an exact raw version inside `release`.
pub fn minor_from_raw_version(
    release: JavaRelease,
    raw: &str,
    policy: MinorPolicy,
) -> Result<i32, ToolchainError> {
    let known = MINOR_TABLE
        .iter()
        .find(|(r, candidate, _)| *r == release && *candidate == raw)
        .map(|(_, _, minor)| *minor);
    match (known, policy) {
        (Some(minor), _) => Ok(minor),
        (None, MinorPolicy::Lenient) => Ok(MINOR_UNKNOWN),
        (None, MinorPolicy::Strict) => Err(ToolchainError::UnknownRawVersion {
            release,
            raw: raw.to_string(),
        }),
    }
}

/// Normalize a raw version into `(release, minor)` under the strict policy.
pub fn normalize(
    raw: &str,
    toolchain_path: Option<&Path>,
) -> Result<(JavaRelease, i32), ToolchainError> {
    normalize_with(raw, toolchain_path, MinorPolicy::Strict)
}

/// Normalize a raw version into `(release, minor)`.
pub fn normalize_with(
    raw: &str,
    toolchain_path: Option<&Path>,
    policy: MinorPolicy,
) -> Result<(JavaRelease, i32), ToolchainError> {
    let release = release_from_raw_version(raw, toolchain_path)?;
    let minor = minor_from_raw_version(release, raw, policy)?;
    Ok((release, minor))
}

/// One reference toolchain installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainVersion {
    /// JDK root directory (`<root>/bin/javac`).
    pub root: PathBuf,
    /// Version string as printed by the toolchain.
    pub raw_version: String,
    /// Normalized language release.
    pub release: JavaRelease,
    /// Ordinal inside `release`; see [`MINOR_TABLE`].
    pub minor: i32,
}

impl ToolchainVersion {
    /// Build a toolchain description from an already probed raw version.
    pub fn new(
        root: impl Into<PathBuf>,
        raw_version: impl Into<String>,
        policy: MinorPolicy,
    ) -> Result<Self, ToolchainError> {
        let root = root.into();
        let raw_version = raw_version.into();
        let javac = crate::locator::javac_path(&root);
        let (release, minor) = normalize_with(&raw_version, Some(&javac), policy)?;
        Ok(Self {
            root,
            raw_version,
            release,
            minor,
        })
    }

    #[must_use]
    pub fn javac_path(&self) -> PathBuf {
        crate::locator::javac_path(&self.root)
    }

    #[must_use]
    pub fn java_path(&self) -> PathBuf {
        crate::locator::java_path(&self.root)
    }

    /// True if this toolchain is strictly older than `(release, minor)`.
    #[must_use]
    pub fn is_before(&self, release: JavaRelease, minor: i32) -> bool {
        self.release < release || (self.release == release && self.minor < minor)
    }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "javac {} ({} minor {}) at {}",
            self.raw_version,
            self.release,
            self.minor,
            self.root.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_update_releases_map_to_increasing_minors() {
        assert_eq!(normalize("1.8.0_202", None).unwrap(), (JavaRelease::V1_8, 2600));
        assert_eq!(normalize("1.8.0_212", None).unwrap(), (JavaRelease::V1_8, 2700));
    }

    #[test]
    fn modular_releases_use_prefix_matching() {
        assert_eq!(normalize("11.0.2", None).unwrap(), (JavaRelease::V11, 200));
        assert_eq!(normalize("17-ea", None).unwrap(), (JavaRelease::V17, 0));
        assert_eq!(normalize("9.0.4", None).unwrap(), (JavaRelease::V9, 400));
    }

    #[test]
    fn path_heuristic_detects_javac_1_4() {
        let path = Path::new("/opt/j2sdk1.4.2/bin/javac");
        assert_eq!(
            release_from_raw_version("", Some(path)).unwrap(),
            JavaRelease::V1_4
        );
    }

    #[test]
    fn unknown_release_is_fatal() {
        let err = normalize("21.0.1", None).unwrap_err();
        assert!(matches!(err, ToolchainError::UnknownVersion { .. }));
    }

    #[test]
    fn unknown_raw_version_is_fatal_unless_lenient() {
        let err = normalize("1.8.0_999", None).unwrap_err();
        assert!(matches!(
            err,
            ToolchainError::UnknownRawVersion {
                release: JavaRelease::V1_8,
                ..
            }
        ));
        assert_eq!(
            normalize_with("1.8.0_999", None, MinorPolicy::Lenient).unwrap(),
            (JavaRelease::V1_8, MINOR_UNKNOWN)
        );
    }

    #[test]
    fn every_minor_table_entry_normalizes_to_its_own_release() {
        for (release, raw, minor) in MINOR_TABLE {
            assert_eq!(
                normalize(raw, None).unwrap(),
                (*release, *minor),
                "raw version {raw}"
            );
        }
    }

    #[test]
    fn minors_grow_within_a_release() {
        for release in JavaRelease::ALL {
            let minors: Vec<i32> = MINOR_TABLE
                .iter()
                .filter(|(r, _, _)| *r == release)
                .map(|(_, _, m)| *m)
                .collect();
            assert!(
                minors.windows(2).all(|w| w[0] <= w[1]),
                "minors out of order for {release}: {minors:?}"
            );
        }
    }

    #[test]
    fn compliance_parsing_accepts_short_forms() {
        assert_eq!(JavaRelease::parse_compliance("1.8"), Some(JavaRelease::V1_8));
        assert_eq!(JavaRelease::parse_compliance("8"), Some(JavaRelease::V1_8));
        assert_eq!(JavaRelease::parse_compliance("11"), Some(JavaRelease::V11));
        assert_eq!(JavaRelease::parse_compliance("1.11"), Some(JavaRelease::V11));
        assert_eq!(JavaRelease::parse_compliance("42"), None);
    }

    #[test]
    fn is_before_orders_release_then_minor() {
        let tc = ToolchainVersion {
            root: PathBuf::from("/jdk8"),
            raw_version: "1.8.0_202".into(),
            release: JavaRelease::V1_8,
            minor: 2600,
        };
        assert!(tc.is_before(JavaRelease::V1_8, 2700));
        assert!(!tc.is_before(JavaRelease::V1_8, 2600));
        assert!(tc.is_before(JavaRelease::V9, 0));
        assert!(!tc.is_before(JavaRelease::V1_7, 9000));
    }
}
