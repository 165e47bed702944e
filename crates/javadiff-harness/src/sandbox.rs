//! Execution of the program produced by the compiler under test.

use std::path::PathBuf;
use std::time::Duration;

use javadiff_toolchain::process::{Invocation, ProcessError};
use thiserror::Error;

use crate::problem_log::normalize_line_delimiters;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("sandbox has been shut down")]
    ShutDown,
}

#[derive(Debug, Clone)]
pub struct ExecutionRequest<'a> {
    /// First test file, for failure messages.
    pub source_file: &'a str,
    /// Fully qualified, dot separated.
    pub class_name: &'a str,
    pub classpath: &'a [PathBuf],
    pub vm_arguments: Option<&'a [String]>,
    /// `None` skips the check.
    pub expected_stdout: Option<&'a str>,
    /// `None` skips the check; empty means exactly empty; otherwise a prefix.
    pub expected_stderr: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub passed: bool,
    pub stdout: String,
    pub stderr: String,
    pub failure_reason: Option<String>,
}

pub trait ExecutionSandbox {
    fn execute(&mut self, request: &ExecutionRequest<'_>) -> Result<ExecutionReport, SandboxError>;

    fn shut_down(&mut self) {}
}

/// Builds fresh sandboxes, so one can be torn down and replaced when VM arguments change.
pub trait SandboxFactory {
    fn create(&self) -> Box<dyn ExecutionSandbox>;
}

impl<F> SandboxFactory for F
where
    F: Fn() -> Box<dyn ExecutionSandbox>,
{
    fn create(&self) -> Box<dyn ExecutionSandbox> {
        self()
    }
}

/// Compare captured streams against expectations.
///
/// Stderr is checked first, as a trimmed prefix match; stdout must then match
/// exactly once trimmed.
#[must_use]
pub fn check_buffers(
    source_file: &str,
    stdout: &str,
    stderr: &str,
    expected_stdout: Option<&str>,
    expected_stderr: Option<&str>,
) -> ExecutionReport {
    let mut report = ExecutionReport {
        passed: true,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        failure_reason: None,
    };
    if let Some(expected) = expected_stderr {
        let expected = normalize_line_delimiters(expected.trim());
        let actual = normalize_line_delimiters(stderr.trim());
        if (expected.is_empty() && !actual.is_empty()) || !actual.starts_with(&expected) {
            report.passed = false;
            report.failure_reason = Some(format!(
                "Unexpected error running resulting class file for {source_file}:\n{stderr}"
            ));
            return report;
        }
    }
    if let Some(expected) = expected_stdout {
        let expected = normalize_line_delimiters(expected.trim());
        let actual = normalize_line_delimiters(stdout.trim());
        if expected != actual {
            report.passed = false;
            report.failure_reason = Some(format!(
                "Unexpected output running resulting class file for {source_file}:\n--[START]--\n{stdout}---[END]---\n"
            ));
        }
    }
    report
}

/// Runs classes in a fresh `java` process per execution.
#[derive(Debug, Clone)]
pub struct JvmSandbox {
    java: PathBuf,
    timeout: Option<Duration>,
    alive: bool,
}

impl JvmSandbox {
    #[must_use]
    pub fn new(java: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            timeout: None,
            alive: true,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `java -classpath <cp> [vm args] <class>`, run in the first classpath entry.
    #[must_use]
    pub fn invocation(&self, request: &ExecutionRequest<'_>) -> Invocation {
        let separator = if cfg!(windows) { ";" } else { ":" };
        let classpath = request
            .classpath
            .iter()
            .map(|entry| entry.display().to_string())
            .collect::<Vec<_>>()
            .join(separator);
        let mut invocation = Invocation::new(&self.java)
            .with_arg("-classpath")
            .with_arg(classpath)
            .with_args(request.vm_arguments.unwrap_or_default().iter().cloned())
            .with_arg(request.class_name)
            .with_timeout(self.timeout);
        if let Some(dir) = request.classpath.first() {
            invocation = invocation.with_work_dir(dir);
        }
        invocation
    }
}

impl ExecutionSandbox for JvmSandbox {
    fn execute(&mut self, request: &ExecutionRequest<'_>) -> Result<ExecutionReport, SandboxError> {
        if !self.alive {
            return Err(SandboxError::ShutDown);
        }
        let outcome = self.invocation(request).run()?;
        Ok(check_buffers(
            request.source_file,
            &outcome.stdout,
            &outcome.stderr,
            request.expected_stdout,
            request.expected_stderr,
        ))
    }

    fn shut_down(&mut self) {
        self.alive = false;
    }
}
