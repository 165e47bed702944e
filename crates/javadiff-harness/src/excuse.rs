//! Versioned exemptions for known divergences.
//!
//! An [`Excuse`] declares that, for the reference toolchains it applies to, some
//! [`MismatchKind`]s are expected. The catalog is keyed by bug-tracker references and
//! is never mutated at runtime. Excuses are self-cleaning: one that is attached to a
//! scenario but never needed fails the scenario (see `classifier`).

use std::fmt;

use javadiff_toolchain::{JavaRelease, ToolchainVersion};
use serde::Serialize;

use crate::mismatch::MismatchKind;

/// When an excuse applies to a given reference toolchain.
#[derive(Clone, Copy)]
pub enum Applicability {
    Always,
    /// The bug was fixed at `(release, minor)`; older toolchains still have it.
    Before { release: JavaRelease, minor: i32 },
    /// The divergence appeared at `(release, minor)`.
    Since { release: JavaRelease, minor: i32 },
    Older(JavaRelease),
    Newer(JavaRelease),
    Exactly(JavaRelease),
    Predicate(fn(&ToolchainVersion) -> bool),
}

impl Applicability {
    #[must_use]
    pub fn applies_to(self, toolchain: &ToolchainVersion) -> bool {
        match self {
            Self::Always => true,
            Self::Before { release, minor } => toolchain.is_before(release, minor),
            Self::Since { release, minor } => !toolchain.is_before(release, minor),
            Self::Older(release) => toolchain.release < release,
            Self::Newer(release) => toolchain.release > release,
            Self::Exactly(release) => toolchain.release == release,
            Self::Predicate(predicate) => predicate(toolchain),
        }
    }
}

impl fmt::Debug for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("always"),
            Self::Before { release, minor } => write!(f, "before {release} minor {minor}"),
            Self::Since { release, minor } => write!(f, "since {release} minor {minor}"),
            Self::Older(release) => write!(f, "older than {release}"),
            Self::Newer(release) => write!(f, "newer than {release}"),
            Self::Exactly(release) => write!(f, "exactly {release}"),
            Self::Predicate(_) => f.write_str("custom predicate"),
        }
    }
}

/// Informational classification; never changes behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcuseTag {
    General,
    UnderTestBug,
    ReferenceBug,
    Justification,
}

#[derive(Debug)]
pub struct Excuse {
    pub name: &'static str,
    /// Kinds this excuse clears; empty clears everything.
    pub covers: MismatchKind,
    pub applicability: Applicability,
    /// An unused intermittent excuse only warns.
    pub intermittent: bool,
    pub tag: ExcuseTag,
    /// Options handed to the reference compiler for scenarios carrying this excuse.
    pub reference_options: &'static str,
}

/// Serializable view of an [`Excuse`] for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ExcuseSummary {
    pub name: &'static str,
    pub tag: ExcuseTag,
    pub covers: String,
    pub applicability: String,
    pub intermittent: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub reference_options: &'static str,
}

impl Excuse {
    pub const fn new(name: &'static str, tag: ExcuseTag, covers: MismatchKind) -> Self {
        Self {
            name,
            covers,
            applicability: Applicability::Always,
            intermittent: false,
            tag,
            reference_options: "",
        }
    }

    pub const fn when(mut self, applicability: Applicability) -> Self {
        self.applicability = applicability;
        self
    }

    pub const fn intermittent(mut self) -> Self {
        self.intermittent = true;
        self
    }

    pub const fn with_reference_options(mut self, options: &'static str) -> Self {
        self.reference_options = options;
        self
    }

    /// `Some(self)` when this excuse applies to `toolchain`.
    #[must_use]
    pub fn excuse_for(&self, toolchain: &ToolchainVersion) -> Option<&Self> {
        self.applicability.applies_to(toolchain).then_some(self)
    }

    /// True when the coverage is empty or contains every flag of `kind`.
    #[must_use]
    pub fn clears(&self, kind: MismatchKind) -> bool {
        self.covers.is_empty() || self.covers.contains(kind)
    }

    #[must_use]
    pub fn summary(&self) -> ExcuseSummary {
        ExcuseSummary {
            name: self.name,
            tag: self.tag,
            covers: if self.covers.is_empty() {
                "ALL".to_string()
            } else {
                self.covers.label()
            },
            applicability: format!("{:?}", self.applicability),
            intermittent: self.intermittent,
            reference_options: self.reference_options,
        }
    }
}

impl fmt::Display for Excuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Look up a catalog entry by name.
#[must_use]
pub fn excuse_by_name(name: &str) -> Option<&'static Excuse> {
    CATALOG.iter().find(|excuse| excuse.name == name)
}

const UT_ERR_REF_NONE: MismatchKind = MismatchKind::UNDER_TEST_ERRORS_REFERENCE_NONE;
const UT_ERR_REF_WARN: MismatchKind = MismatchKind::UNDER_TEST_ERRORS_REFERENCE_WARNINGS;
const REF_ERR_UT_NONE: MismatchKind = MismatchKind::REFERENCE_ERRORS_UNDER_TEST_NONE;
const REF_ERR_UT_WARN: MismatchKind = MismatchKind::REFERENCE_ERRORS_UNDER_TEST_WARNINGS;
const UT_WARN_REF_NONE: MismatchKind = MismatchKind::UNDER_TEST_WARNINGS_REFERENCE_NONE;
const REF_WARN_UT_NONE: MismatchKind = MismatchKind::REFERENCE_WARNINGS_UNDER_TEST_NONE;
const STDOUT: MismatchKind = MismatchKind::STANDARD_OUTPUT_MISMATCH;
const ALL: MismatchKind = MismatchKind::empty();

const SWITCH_PREVIEW_13: &str = " --release 13 --enable-preview -Xlint:-preview";
const SWITCH_PREVIEW_12: &str = " --release 12 --enable-preview -Xlint:-preview";

use ExcuseTag::{General, Justification, ReferenceBug, UnderTestBug};
use JavaRelease::{V1_5, V1_6, V1_7, V1_8, V9, V11};

const fn before(release: JavaRelease, minor: i32) -> Applicability {
    Applicability::Before { release, minor }
}

fn javac6_since_update_10(toolchain: &ToolchainVersion) -> bool {
    toolchain.release == V1_6 && toolchain.minor >= 10
}

fn javac_1_5_0_16(toolchain: &ToolchainVersion) -> bool {
    toolchain.release == V1_5 && toolchain.minor == 1600
}

pub static CATALOG: &[Excuse] = &[
    // general
    Excuse::new("UnderTestHasSomeMoreWarnings", General, UT_WARN_REF_NONE),
    Excuse::new(
        "UnderTestWarningConfiguredAsError",
        General,
        UT_ERR_REF_WARN.union(UT_ERR_REF_NONE),
    ),
    Excuse::new("JavacCompilesBogusReferencedFileAgain", General, UT_ERR_REF_NONE),
    Excuse::new("JavacDoesNotCompileCorrectSource", ReferenceBug, REF_ERR_UT_NONE),
    Excuse::new(
        "JavacCompilesIncorrectSource",
        ReferenceBug,
        UT_ERR_REF_NONE.union(UT_ERR_REF_WARN).union(UT_WARN_REF_NONE),
    ),
    Excuse::new("JavacGeneratesIncorrectCode", ReferenceBug, STDOUT),
    Excuse::new(
        "JavacHasWarningsUnderTestNotConfigured",
        ReferenceBug,
        REF_WARN_UT_NONE,
    ),
    Excuse::new("JavacHasErrorsUnderTestHasWarnings", ReferenceBug, REF_ERR_UT_WARN),
    Excuse::new("JavacHasErrorsUnderTestHasNone", ReferenceBug, REF_ERR_UT_NONE),
    // bugs of the compiler under test
    Excuse::new("UnderTestBug159851", UnderTestBug, REF_ERR_UT_NONE)
        .when(Applicability::Older(V1_7)),
    Excuse::new("UnderTestBug177715", UnderTestBug, REF_ERR_UT_NONE)
        .when(Applicability::Older(V1_8)),
    Excuse::new(
        "UnderTestBug207935",
        UnderTestBug,
        UT_ERR_REF_NONE.union(UT_WARN_REF_NONE),
    ),
    Excuse::new("UnderTestBug216558", UnderTestBug, REF_ERR_UT_NONE),
    Excuse::new("UnderTestBug235550", UnderTestBug, REF_ERR_UT_NONE),
    Excuse::new("UnderTestBug235809", UnderTestBug, STDOUT),
    Excuse::new("UnderTestBug236217", UnderTestBug, REF_ERR_UT_NONE)
        .when(Applicability::Older(V1_8)),
    Excuse::new("UnderTestBug236236", UnderTestBug, UT_ERR_REF_NONE)
        .when(Applicability::Newer(V1_5)),
    Excuse::new("UnderTestBug236242", UnderTestBug, UT_ERR_REF_WARN)
        .when(Applicability::Exactly(V1_7)),
    Excuse::new("UnderTestBug236243", UnderTestBug, UT_ERR_REF_NONE)
        .when(Applicability::Newer(V1_6)),
    Excuse::new("UnderTestBug236379", UnderTestBug, UT_WARN_REF_NONE)
        .when(Applicability::Older(V1_6)),
    Excuse::new("UnderTestBug424410", UnderTestBug, REF_ERR_UT_NONE),
    Excuse::new("UnderTestBug427719", UnderTestBug, REF_ERR_UT_WARN),
    Excuse::new("UnderTestBug421922", UnderTestBug, UT_ERR_REF_NONE),
    Excuse::new(
        "UnderTestBug428061",
        UnderTestBug,
        REF_ERR_UT_NONE.union(REF_ERR_UT_WARN),
    ),
    Excuse::new("UnderTestBug510528", UnderTestBug, REF_ERR_UT_NONE),
    Excuse::new("UnderTestBug531531", UnderTestBug, UT_ERR_REF_NONE),
    // deliberate divergences
    Excuse::new("Justification72704", Justification, UT_ERR_REF_NONE),
    Excuse::new("Justification83902", Justification, UT_WARN_REF_NONE)
        .when(Applicability::Newer(V1_5)),
    Excuse::new("Justification83902b", Justification, REF_ERR_UT_WARN),
    Excuse::new("Justification95021", Justification, REF_ERR_UT_NONE)
        .when(Applicability::Exactly(V1_7)),
    Excuse::new("Justification126712", Justification, STDOUT)
        .when(Applicability::Newer(V1_5)),
    Excuse::new("Justification126744", Justification, REF_ERR_UT_NONE),
    Excuse::new("Justification151275", Justification, REF_ERR_UT_NONE)
        .when(Applicability::Older(V1_7)),
    Excuse::new("Justification159214", Justification, UT_ERR_REF_NONE)
        .when(Applicability::Exactly(V1_6)),
    Excuse::new("Justification169017", Justification, REF_ERR_UT_NONE)
        .when(Applicability::Newer(V1_5)),
    Excuse::new("Justification180789", Justification, UT_ERR_REF_WARN),
    Excuse::new("Justification218677", Justification, UT_ERR_REF_NONE)
        .when(Applicability::Newer(V1_6)),
    Excuse::new("Justification234815", Justification, REF_ERR_UT_NONE)
        .when(Applicability::Older(V1_7)),
    Excuse::new("Justification235543", Justification, UT_ERR_REF_NONE),
    Excuse::new("Justification235546", Justification, REF_ERR_UT_NONE),
    Excuse::new("Justification449063", Justification, STDOUT),
    Excuse::new("Justification561549", Justification, UT_ERR_REF_NONE)
        .when(Applicability::Newer(V9)),
    // duplicate attributes nested in an embedded annotation go unreported before 1.7
    Excuse::new("Justification0001", Justification, UT_ERR_REF_NONE)
        .when(Applicability::Older(V1_7)),
    // reference compiler bugs
    Excuse::new("JavacBug4094180", ReferenceBug, UT_ERR_REF_NONE),
    Excuse::new("JavacBug4660984", ReferenceBug, REF_ERR_UT_NONE),
    Excuse::new("JavacBug5042462", ReferenceBug, REF_ERR_UT_NONE).when(before(V1_7, 0)),
    Excuse::new("JavacBug5061359", ReferenceBug, UT_ERR_REF_NONE).when(before(V1_7, 0)),
    Excuse::new("JavacBug6302954", ReferenceBug, REF_ERR_UT_NONE).when(before(V1_7, 0)),
    Excuse::new("JavacBug6400189", ReferenceBug, UT_ERR_REF_NONE)
        .when(Applicability::Exactly(V1_6)),
    Excuse::new("JavacBug6500701", ReferenceBug, STDOUT).when(before(V1_7, 0)),
    // fixed in a 1.7 build that has no distinct minor
    Excuse::new("JavacBug6531075", ReferenceBug, STDOUT).when(before(V1_7, 0)),
    Excuse::new("JavacBug6569404", ReferenceBug, REF_ERR_UT_NONE)
        .when(Applicability::Predicate(javac6_since_update_10)),
    Excuse::new("JavacBug6557661", ReferenceBug, UT_ERR_REF_NONE),
    Excuse::new("JavacBug6573446", ReferenceBug, UT_ERR_REF_NONE),
    Excuse::new("JavacBug6575821", ReferenceBug, REF_ERR_UT_NONE).when(before(V1_6, 10)),
    Excuse::new("JavacBug8033810", ReferenceBug, UT_ERR_REF_NONE),
    Excuse::new("JavacBug8144673", ReferenceBug, REF_ERR_UT_NONE).when(before(V9, 100)),
    Excuse::new("JavacBug8204534", ReferenceBug, UT_ERR_REF_NONE).when(before(V11, 0)),
    Excuse::new("JavacBug8207032", ReferenceBug, UT_ERR_REF_NONE),
    Excuse::new("JavacBug8044196", ReferenceBug, UT_ERR_REF_NONE)
        .when(before(V9, 0))
        .intermittent(),
    Excuse::new("JavacBug6337964", ReferenceBug, REF_ERR_UT_NONE)
        .when(before(V1_6, 1045))
        .intermittent(),
    Excuse::new("JavacBug8144832", ReferenceBug, REF_ERR_UT_NONE).when(before(V9, 0)),
    Excuse::new("JavacBug8179483_switchExpression", ReferenceBug, UT_ERR_REF_WARN)
        .with_reference_options(SWITCH_PREVIEW_13),
    Excuse::new("JavacBug8221413_switchExpression", ReferenceBug, REF_ERR_UT_NONE)
        .with_reference_options(SWITCH_PREVIEW_12),
    Excuse::new("JavacBug8226510_switchExpression", ReferenceBug, UT_ERR_REF_WARN)
        .with_reference_options(SWITCH_PREVIEW_12),
    Excuse::new("JavacBug8231436", ReferenceBug, REF_ERR_UT_NONE),
    Excuse::new("JavacBug8231436_UnderTestWarns", ReferenceBug, REF_ERR_UT_WARN),
    // fixed reference bugs that were never identified
    Excuse::new("JavacBugFixed_6_10", ReferenceBug, ALL).when(before(V1_6, 1000)),
    Excuse::new("JavacBugFixed_6_10_b24", ReferenceBug, ALL).when(before(V1_6, 1010)),
    Excuse::new("JavacBugFixed_7", ReferenceBug, ALL).when(before(V1_7, 0)),
    Excuse::new("JavacBugFixed_901", ReferenceBug, ALL).when(before(V9, 100)),
    // unidentified, but the outcome leaves no doubt
    Excuse::new("JavacThrowsAnException", ReferenceBug, REF_ERR_UT_NONE),
    Excuse::new("JavacThrowsAnExceptionForJava_1_5_0_16", ReferenceBug, REF_ERR_UT_NONE)
        .when(Applicability::Predicate(javac_1_5_0_16)),
    Excuse::new(
        "JavacThrowsAnExceptionForJava_since9_UnderTestWarns",
        ReferenceBug,
        REF_ERR_UT_WARN,
    )
    .when(Applicability::Since {
        release: V9,
        minor: i32::MIN,
    }),
    Excuse::new("NoWarningForMissingJavadocTag", ReferenceBug, UT_ERR_REF_NONE),
    Excuse::new("NoWarningForDuplicateJavadocTag", ReferenceBug, UT_ERR_REF_NONE),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;

    use super::*;

    fn toolchain(release: JavaRelease, minor: i32) -> ToolchainVersion {
        ToolchainVersion {
            root: PathBuf::from("/jdk"),
            raw_version: format!("{release}-{minor}"),
            release,
            minor,
        }
    }

    #[test]
    fn catalog_names_are_unique() {
        let mut seen = HashSet::new();
        for excuse in CATALOG {
            assert!(seen.insert(excuse.name), "duplicate excuse {}", excuse.name);
        }
    }

    #[test]
    fn clears_on_containment_or_empty_mask() {
        let single = excuse_by_name("JavacHasErrorsUnderTestHasNone").unwrap();
        let combined = excuse_by_name("UnderTestBug428061").unwrap();
        let all = excuse_by_name("JavacBugFixed_7").unwrap();

        for kind in MismatchKind::all().iter() {
            assert_eq!(single.clears(kind), kind == REF_ERR_UT_NONE);
            assert_eq!(
                combined.clears(kind),
                kind == REF_ERR_UT_NONE || kind == REF_ERR_UT_WARN
            );
            assert!(all.clears(kind));
        }
        assert!(combined.clears(REF_ERR_UT_NONE | REF_ERR_UT_WARN));
        assert!(!single.clears(STDOUT));
    }

    #[test]
    fn partial_coverage_leaves_combined_kind_uncleared() {
        let single = excuse_by_name("JavacHasErrorsUnderTestHasNone").unwrap();
        let combined = excuse_by_name("UnderTestBug428061").unwrap();
        assert!(!single.clears(REF_ERR_UT_NONE | STDOUT));
        assert!(!combined.clears(REF_ERR_UT_NONE | REF_ERR_UT_WARN | STDOUT));
    }

    #[test]
    fn empty_mask_clears_any_combination() {
        let all = excuse_by_name("JavacBugFixed_901").unwrap();
        assert!(all.covers.is_empty());
        assert!(all.clears(REF_ERR_UT_NONE | STDOUT));
        assert!(all.clears(MismatchKind::all()));
    }

    #[test]
    fn before_pivot_applies_only_to_older_minors() {
        let excuse = Excuse::new("pivot", ReferenceBug, ALL).when(before(V1_8, 2700));
        assert!(excuse.excuse_for(&toolchain(V1_8, 2600)).is_some());
        assert!(excuse.excuse_for(&toolchain(V1_8, 2700)).is_none());
        assert!(excuse.excuse_for(&toolchain(V1_7, 9000)).is_some());
        assert!(excuse.excuse_for(&toolchain(V9, 0)).is_none());
    }

    #[test]
    fn since_pivot_is_the_complement_of_before() {
        let since = Applicability::Since {
            release: V9,
            minor: 100,
        };
        let until = before(V9, 100);
        for minor in [0, 100, 400] {
            let tc = toolchain(V9, minor);
            assert_ne!(since.applies_to(&tc), until.applies_to(&tc), "minor {minor}");
        }
    }

    #[test]
    fn release_gates_match_their_names() {
        let older = excuse_by_name("UnderTestBug159851").unwrap();
        assert!(older.excuse_for(&toolchain(V1_6, 1045)).is_some());
        assert!(older.excuse_for(&toolchain(V1_7, 0)).is_none());

        let exactly = excuse_by_name("UnderTestBug236242").unwrap();
        assert!(exactly.excuse_for(&toolchain(V1_7, 2500)).is_some());
        assert!(exactly.excuse_for(&toolchain(V1_8, 0)).is_none());

        let since9 =
            excuse_by_name("JavacThrowsAnExceptionForJava_since9_UnderTestWarns").unwrap();
        assert!(since9.excuse_for(&toolchain(V1_8, 2700)).is_none());
        assert!(since9.excuse_for(&toolchain(V9, 0)).is_some());
        assert!(since9.excuse_for(&toolchain(JavaRelease::V17, 200)).is_some());
    }

    #[test]
    fn predicates_match_single_builds() {
        let e = excuse_by_name("JavacThrowsAnExceptionForJava_1_5_0_16").unwrap();
        assert!(e.excuse_for(&toolchain(V1_5, 1600)).is_some());
        assert!(e.excuse_for(&toolchain(V1_5, 1500)).is_none());
        assert!(e.excuse_for(&toolchain(V1_6, 1600)).is_none());
    }

    #[test]
    fn switch_expression_bugs_carry_reference_options() {
        let e = excuse_by_name("JavacBug8179483_switchExpression").unwrap();
        assert_eq!(
            e.reference_options,
            " --release 13 --enable-preview -Xlint:-preview"
        );
        assert!(excuse_by_name("JavacBug4094180").unwrap().reference_options.is_empty());
    }

    #[test]
    fn intermittent_flags_are_set() {
        assert!(excuse_by_name("JavacBug8044196").unwrap().intermittent);
        assert!(excuse_by_name("JavacBug6337964").unwrap().intermittent);
        assert!(!excuse_by_name("JavacBug8144832").unwrap().intermittent);
    }

    #[test]
    fn summary_serializes_for_listings() {
        let value =
            serde_json::to_value(excuse_by_name("JavacBugFixed_901").unwrap().summary()).unwrap();
        assert_eq!(value["name"], "JavacBugFixed_901");
        assert_eq!(value["tag"], "reference_bug");
        assert_eq!(value["covers"], "ALL");
        assert_eq!(value["applicability"], "before 9 minor 100");
        assert!(value.get("reference_options").is_none());
    }
}
