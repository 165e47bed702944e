//! Ways a scenario can fail.

use std::path::PathBuf;
use std::sync::Arc;

use javadiff_toolchain::ToolchainError;
use thiserror::Error;

use crate::compiler::CompilerError;
use crate::mismatch::MismatchKind;
use crate::sandbox::SandboxError;

#[derive(Debug, Error)]
pub enum ScenarioFailure {
    #[error("{scenario}: odd number of strings in test files ({count})")]
    MalformedFixture { scenario: String, count: usize },

    #[error("{scenario}: unexpected success")]
    UnexpectedSuccess { scenario: String },

    #[error("{scenario}: unexpected failure\n{log}")]
    UnexpectedFailure { scenario: String, log: String },

    #[error("{scenario}: invalid problem log\n{diff}")]
    ProblemLogMismatch {
        scenario: String,
        expected: String,
        actual: String,
        diff: String,
    },

    #[error("{scenario}: {reason}")]
    ExecutionMismatch {
        scenario: String,
        reason: String,
        expected_stdout: Option<String>,
        actual_stdout: String,
        expected_stderr: Option<String>,
        actual_stderr: String,
    },

    #[error("{} - {} [{}] on {}\nexpected: {:?}\nactual: {:?}", .scenario, .kind.describe(), .kind.label(), .toolchain, .expected, .actual)]
    UnexcusedMismatch {
        scenario: String,
        toolchain: String,
        kind: MismatchKind,
        expected: String,
        actual: String,
    },

    #[error("{scenario}: unused excuse {excuse} for compiler {toolchain}")]
    UnusedExcuse {
        scenario: String,
        excuse: String,
        toolchain: String,
    },

    #[error("{scenario}: unknown excuse {name}")]
    UnknownExcuse { scenario: String, name: String },

    #[error("{scenario}: compiler under test failed: {source}")]
    Compiler {
        scenario: String,
        #[source]
        source: CompilerError,
    },

    #[error("{scenario}: execution sandbox failed: {source}")]
    Sandbox {
        scenario: String,
        #[source]
        source: SandboxError,
    },

    #[error("{scenario}: {source}")]
    Toolchain {
        scenario: String,
        #[source]
        source: Arc<ToolchainError>,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScenarioFailure {
    /// Reference divergence rather than a failure of the compiler under test itself.
    #[must_use]
    pub fn is_reference_failure(&self) -> bool {
        matches!(
            self,
            Self::UnexcusedMismatch { .. } | Self::UnusedExcuse { .. } | Self::UnknownExcuse { .. }
        )
    }

    /// Stable short name for reports and structured logs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedFixture { .. } => "malformed_fixture",
            Self::UnexpectedSuccess { .. } => "unexpected_success",
            Self::UnexpectedFailure { .. } => "unexpected_failure",
            Self::ProblemLogMismatch { .. } => "problem_log_mismatch",
            Self::ExecutionMismatch { .. } => "execution_mismatch",
            Self::UnexcusedMismatch { .. } => "unexcused_mismatch",
            Self::UnusedExcuse { .. } => "unused_excuse",
            Self::UnknownExcuse { .. } => "unknown_excuse",
            Self::Compiler { .. } => "compiler",
            Self::Sandbox { .. } => "sandbox",
            Self::Toolchain { .. } => "toolchain",
            Self::Io { .. } => "io",
        }
    }
}
