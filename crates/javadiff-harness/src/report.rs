//! Report generation for differential runs.

use serde::{Deserialize, Serialize};

use crate::verify::VerificationSummary;

/// A report over one or more fixture suites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifferentialReport {
    pub title: String,
    /// Raw versions of the reference toolchains compared.
    pub toolchains: Vec<String>,
    /// Timestamp (UTC).
    pub timestamp: String,
    pub summary: VerificationSummary,
}

impl DifferentialReport {
    #[must_use]
    pub fn new(title: impl Into<String>, toolchains: Vec<String>, summary: VerificationSummary) -> Self {
        Self {
            title: title.into(),
            toolchains,
            timestamp: crate::structured_log::now_utc(),
            summary,
        }
    }

    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        let toolchains = if self.toolchains.is_empty() {
            "none".to_string()
        } else {
            self.toolchains.join(", ")
        };
        out.push_str(&format!("- Reference toolchains: {toolchains}\n"));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Total: {}\n", self.summary.total));
        out.push_str(&format!("- Passed: {}\n", self.summary.passed));
        out.push_str(&format!("- Excused: {}\n", self.summary.excused));
        out.push_str(&format!("- Failed: {}\n\n", self.summary.failed));

        out.push_str("| Suite | Scenario | Status | Excuses |\n");
        out.push_str("|-------|----------|--------|---------|\n");
        for r in &self.summary.results {
            let status = match (r.passed, r.failure.as_deref()) {
                (true, _) => "PASS".to_string(),
                (false, Some(code)) => format!("FAIL ({code})"),
                (false, None) => "FAIL".to_string(),
            };
            let excuses: Vec<String> = r
                .verdicts
                .iter()
                .filter_map(|v| v.excuse.as_ref().map(|e| format!("{e}@{}", v.toolchain)))
                .collect();
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                r.suite,
                r.scenario,
                status,
                excuses.join(", ")
            ));
        }

        let failures: Vec<_> = self.summary.results.iter().filter(|r| !r.passed).collect();
        if !failures.is_empty() {
            out.push_str("\n## Failures\n");
            for r in failures {
                out.push_str(&format!("\n### {}\n\n```\n", r.scenario));
                if let Some(message) = &r.message {
                    out.push_str(message);
                    out.push('\n');
                }
                if let Some(diff) = &r.diff {
                    out.push_str(diff);
                }
                out.push_str("```\n");
            }
        }
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::VerificationResult;

    fn summary() -> VerificationSummary {
        VerificationSummary::from_results(vec![
            VerificationResult {
                scenario: "test001".into(),
                suite: "NullTest".into(),
                passed: true,
                failure: None,
                message: None,
                diff: None,
                verdicts: Vec::new(),
                fingerprint: "ab".into(),
            },
            VerificationResult {
                scenario: "test002".into(),
                suite: "NullTest".into(),
                passed: false,
                failure: Some("problem_log_mismatch".into()),
                message: Some("test002: invalid problem log".into()),
                diff: Some("--- expected\n+++ actual\n".into()),
                verdicts: Vec::new(),
                fingerprint: "cd".into(),
            },
        ])
    }

    #[test]
    fn markdown_lists_every_scenario() {
        let report = DifferentialReport::new("javadiff", vec!["1.8.0_202".into()], summary());
        let md = report.to_markdown();
        assert!(md.starts_with("# javadiff\n"));
        assert!(md.contains("- Reference toolchains: 1.8.0_202\n"));
        assert!(md.contains("| NullTest | test001 | PASS |  |"));
        assert!(md.contains("| NullTest | test002 | FAIL (problem_log_mismatch) |"));
        assert!(md.contains("### test002"));
    }

    #[test]
    fn json_round_trips() {
        let report = DifferentialReport::new("javadiff", Vec::new(), summary());
        let parsed: DifferentialReport = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(parsed.summary.failed, 1);
        assert!(parsed.toolchains.is_empty());
    }
}
