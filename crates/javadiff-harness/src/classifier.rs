//! Deciding whether an observed divergence fails a scenario.
//!
//! Mismatches that no applicable excuse clears fail. So does an applicable,
//! non-intermittent excuse that ends up clearing nothing, which keeps the catalog from
//! collecting entries for bugs long fixed.

use javadiff_toolchain::ToolchainVersion;

use crate::error::ScenarioFailure;
use crate::excuse::Excuse;
use crate::mismatch::MismatchKind;

/// What the classifier concluded for one toolchain.
#[derive(Debug, Clone, Copy)]
pub enum Disposition<'e> {
    Clean,
    Excused { excuse: &'e Excuse, kind: MismatchKind },
    /// An intermittent excuse applied but nothing needed it.
    UnusedIntermittent { excuse: &'e Excuse },
}

impl Disposition<'_> {
    #[must_use]
    pub fn excuse_name(&self) -> Option<&'static str> {
        match self {
            Self::Clean => None,
            Self::Excused { excuse, .. } | Self::UnusedIntermittent { excuse } => Some(excuse.name),
        }
    }
}

/// Everything needed to explain a mismatch to a human.
#[derive(Debug, Clone, Copy)]
pub struct MismatchReport<'a> {
    pub scenario: &'a str,
    pub toolchain: &'a ToolchainVersion,
    pub kind: MismatchKind,
    /// Problem log expected from the compiler under test.
    pub expected_log: Option<&'a str>,
    /// Reference compiler stderr.
    pub reference_log: &'a str,
    pub expected_stdout: Option<&'a str>,
    pub actual_stdout: Option<&'a str>,
    pub expected_stderr: Option<&'a str>,
    pub actual_stderr: Option<&'a str>,
}

impl MismatchReport<'_> {
    /// The two texts whose disagreement the kind stands for.
    #[must_use]
    pub fn expected_and_actual(&self) -> (String, String) {
        let expected_log = self.expected_log.unwrap_or_default().to_string();
        let reference_log = self.reference_log.to_string();
        let kind = self.kind;
        if kind == MismatchKind::UNDER_TEST_ERRORS_REFERENCE_NONE
            || kind == MismatchKind::UNDER_TEST_WARNINGS_REFERENCE_NONE
        {
            (String::new(), expected_log)
        } else if kind == MismatchKind::REFERENCE_ERRORS_UNDER_TEST_NONE
            || kind == MismatchKind::REFERENCE_WARNINGS_UNDER_TEST_NONE
        {
            (String::new(), reference_log)
        } else if kind == MismatchKind::STANDARD_OUTPUT_MISMATCH {
            (
                self.expected_stdout.unwrap_or_default().to_string(),
                self.actual_stdout.unwrap_or_default().to_string(),
            )
        } else if kind == MismatchKind::ERROR_OUTPUT_MISMATCH {
            (
                self.expected_stderr.unwrap_or_default().to_string(),
                self.actual_stderr.unwrap_or_default().to_string(),
            )
        } else if kind.is_process_failure() {
            (String::new(), String::new())
        } else {
            (expected_log, reference_log)
        }
    }
}

/// `excuse` when it applies to `toolchain` and clears `observed`.
#[must_use]
pub fn classify<'e>(
    excuse: Option<&'e Excuse>,
    observed: MismatchKind,
    toolchain: &ToolchainVersion,
) -> Option<&'e Excuse> {
    excuse
        .and_then(|excuse| excuse.excuse_for(toolchain))
        .filter(|excuse| excuse.clears(observed))
}

/// Route one toolchain's outcome through the excuse.
///
/// `excuse` is the scenario's excuse already filtered by applicability to the
/// reporting toolchain.
pub fn handle_mismatch<'e>(
    report: &MismatchReport<'_>,
    excuse: Option<&'e Excuse>,
) -> Result<Disposition<'e>, ScenarioFailure> {
    if !report.kind.is_empty() {
        if let Some(excuse) = excuse
            && excuse.clears(report.kind)
        {
            return Ok(Disposition::Excused {
                excuse,
                kind: report.kind,
            });
        }
        let (expected, actual) = report.expected_and_actual();
        return Err(ScenarioFailure::UnexcusedMismatch {
            scenario: report.scenario.to_string(),
            toolchain: report.toolchain.raw_version.clone(),
            kind: report.kind,
            expected,
            actual,
        });
    }
    match excuse {
        None => Ok(Disposition::Clean),
        Some(excuse) if excuse.intermittent => {
            eprintln!(
                "{}: unused excuse (intermittent bug) {} for compiler {}",
                report.scenario, excuse, report.toolchain.raw_version
            );
            Ok(Disposition::UnusedIntermittent { excuse })
        }
        Some(excuse) => Err(ScenarioFailure::UnusedExcuse {
            scenario: report.scenario.to_string(),
            excuse: excuse.name.to_string(),
            toolchain: report.toolchain.raw_version.clone(),
        }),
    }
}
