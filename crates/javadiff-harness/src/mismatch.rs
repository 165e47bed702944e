//! Categories of divergence between the compiler under test and a reference toolchain.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// One or more observed divergences. The empty set means "no mismatch".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MismatchKind: u32 {
        const UNDER_TEST_ERRORS_REFERENCE_NONE = 0x0001;
        const UNDER_TEST_ERRORS_REFERENCE_WARNINGS = 0x0002;
        const REFERENCE_ERRORS_UNDER_TEST_NONE = 0x0004;
        const REFERENCE_ERRORS_UNDER_TEST_WARNINGS = 0x0008;
        const UNDER_TEST_WARNINGS_REFERENCE_NONE = 0x0010;
        const REFERENCE_WARNINGS_UNDER_TEST_NONE = 0x0020;
        const STANDARD_OUTPUT_MISMATCH = 0x0040;
        const ERROR_OUTPUT_MISMATCH = 0x0080;
        const REFERENCE_ABORTED = 0x0100;
        const REFERENCE_NOT_LAUNCHED = 0x0200;
        const RUNTIME_ABORTED = 0x0400;
        const RUNTIME_NOT_LAUNCHED = 0x0800;
        const COMPILE_ERROR_MISMATCH = 0x1000;
    }
}

const DESCRIPTIONS: &[(MismatchKind, &str)] = &[
    (
        MismatchKind::UNDER_TEST_ERRORS_REFERENCE_NONE,
        "compiler under test found error(s) but reference did not find any",
    ),
    (
        MismatchKind::UNDER_TEST_ERRORS_REFERENCE_WARNINGS,
        "compiler under test found error(s) but reference only found warning(s)",
    ),
    (
        MismatchKind::REFERENCE_ERRORS_UNDER_TEST_NONE,
        "reference found error(s) but compiler under test did not find any",
    ),
    (
        MismatchKind::REFERENCE_ERRORS_UNDER_TEST_WARNINGS,
        "reference found error(s) but compiler under test only found warning(s)",
    ),
    (
        MismatchKind::UNDER_TEST_WARNINGS_REFERENCE_NONE,
        "compiler under test found warning(s) but reference did not find any",
    ),
    (
        MismatchKind::REFERENCE_WARNINGS_UNDER_TEST_NONE,
        "reference found warning(s) but compiler under test did not find any",
    ),
    (MismatchKind::STANDARD_OUTPUT_MISMATCH, "standard output mismatch"),
    (MismatchKind::ERROR_OUTPUT_MISMATCH, "standard error mismatch"),
    (MismatchKind::REFERENCE_ABORTED, "reference compiler failure"),
    (MismatchKind::REFERENCE_NOT_LAUNCHED, "reference compiler failure"),
    (MismatchKind::RUNTIME_ABORTED, "reference runtime failure"),
    (MismatchKind::RUNTIME_NOT_LAUNCHED, "reference runtime failure"),
    (
        MismatchKind::COMPILE_ERROR_MISMATCH,
        "reference compile errors did not match",
    ),
];

/// Tally buckets of the cumulative run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffCategory {
    /// The reference found errors or warnings the compiler under test did not.
    ReferenceStricter,
    /// The compiler under test found errors or warnings the reference did not.
    UnderTestStricter,
    /// Both compiled, but the programs printed different things.
    OutputDiffers,
}

impl MismatchKind {
    /// Failure headline for a single kind.
    #[must_use]
    pub fn describe(self) -> &'static str {
        DESCRIPTIONS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map_or("combined mismatch", |(_, text)| *text)
    }

    /// Which run-log tally a single kind feeds, if any.
    #[must_use]
    pub fn category(self) -> Option<DiffCategory> {
        if self.intersects(
            Self::REFERENCE_ERRORS_UNDER_TEST_NONE
                | Self::REFERENCE_ERRORS_UNDER_TEST_WARNINGS
                | Self::REFERENCE_WARNINGS_UNDER_TEST_NONE,
        ) {
            Some(DiffCategory::ReferenceStricter)
        } else if self.intersects(
            Self::UNDER_TEST_ERRORS_REFERENCE_NONE
                | Self::UNDER_TEST_ERRORS_REFERENCE_WARNINGS
                | Self::UNDER_TEST_WARNINGS_REFERENCE_NONE,
        ) {
            Some(DiffCategory::UnderTestStricter)
        } else if self.intersects(Self::STANDARD_OUTPUT_MISMATCH | Self::ERROR_OUTPUT_MISMATCH) {
            Some(DiffCategory::OutputDiffers)
        } else {
            None
        }
    }

    /// Process-level failure rather than a behavioral difference.
    #[must_use]
    pub fn is_process_failure(self) -> bool {
        self.intersects(
            Self::REFERENCE_ABORTED
                | Self::REFERENCE_NOT_LAUNCHED
                | Self::RUNTIME_ABORTED
                | Self::RUNTIME_NOT_LAUNCHED,
        )
    }

    /// Flag names joined by `|`, or `NONE`.
    #[must_use]
    pub fn label(self) -> String {
        if self.is_empty() {
            return "NONE".to_string();
        }
        self.iter_names()
            .map(|(name, _)| name)
            .collect::<Vec<_>>()
            .join("|")
    }
}
