//! Per-scenario verdicts and their aggregation.

use serde::{Deserialize, Serialize};

use crate::reference_check::ToolchainVerdict;

/// Result of running a single scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub scenario: String,
    pub suite: String,
    pub passed: bool,
    /// Short failure code, see `ScenarioFailure::code`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Diff if the failure compared two texts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verdicts: Vec<ToolchainVerdict>,
    /// Hex SHA-256 of the scenario's sources.
    pub fingerprint: String,
}

impl VerificationResult {
    /// Toolchains whose divergence an excuse cleared.
    #[must_use]
    pub fn excused(&self) -> usize {
        self.verdicts.iter().filter(|v| v.excuse.is_some() && !v.mismatch.is_empty()).count()
    }
}

/// Aggregate verification summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Passed scenarios that needed an excuse on some toolchain.
    pub excused: usize,
    pub results: Vec<VerificationResult>,
}

impl VerificationSummary {
    #[must_use]
    pub fn from_results(results: Vec<VerificationResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let excused = results.iter().filter(|r| r.passed && r.excused() > 0).count();
        Self {
            total,
            passed,
            failed: total - passed,
            excused,
            results,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mismatch::MismatchKind;
    use crate::structured_log::Outcome;

    fn result(name: &str, passed: bool, excuse: Option<&str>) -> VerificationResult {
        VerificationResult {
            scenario: name.to_string(),
            suite: "Suite".to_string(),
            passed,
            failure: (!passed).then(|| "unexpected_success".to_string()),
            message: None,
            diff: None,
            verdicts: excuse
                .map(|name| ToolchainVerdict {
                    toolchain: "1.8.0_202".to_string(),
                    mismatch: MismatchKind::REFERENCE_ERRORS_UNDER_TEST_NONE,
                    excuse: Some(name.to_string()),
                    outcome: Outcome::Excused,
                })
                .into_iter()
                .collect(),
            fingerprint: String::new(),
        }
    }

    #[test]
    fn summary_counts() {
        let summary = VerificationSummary::from_results(vec![
            result("a", true, None),
            result("b", true, Some("JavacBug8144832")),
            result("c", false, None),
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.excused, 1);
        assert!(!summary.all_passed());
    }

    #[test]
    fn empty_summary_passes() {
        assert!(VerificationSummary::from_results(Vec::new()).all_passed());
    }
}
