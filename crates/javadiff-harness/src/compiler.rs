//! The compiler under test, as seen by the harness.
//!
//! The harness never compiles Java itself. A [`CompilerUnderTest`] receives the
//! scenario's units and options and reports each problem to a [`DiagnosticSink`];
//! [`DiagnosticsRequestor`] turns those reports into the numbered problem log the
//! fixtures are written against.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use javadiff_toolchain::process::{Invocation, ProcessError, tokenize};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::problem_log::{ENTRY_SEPARATOR, normalize_line_delimiters};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "ERROR" => Some(Self::Error),
            "WARNING" => Some(Self::Warning),
            "INFO" => Some(Self::Info),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Offending source line with the caret underline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContext {
    pub text: String,
    pub caret_start: usize,
    pub caret_len: usize,
}

/// One diagnostic reported by the compiler under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub severity: Severity,
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<SourceContext>,
    pub message: String,
}

impl Problem {
    #[must_use]
    pub fn new(
        severity: Severity,
        file: impl Into<String>,
        line: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            file: file.into(),
            line,
            context: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, text: impl Into<String>, caret_start: usize, caret_len: usize) -> Self {
        self.context = Some(SourceContext {
            text: text.into(),
            caret_start,
            caret_len,
        });
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Log entry for this problem, numbered `ordinal`.
    #[must_use]
    pub fn render(&self, ordinal: usize) -> String {
        let mut out = format!(
            "{ordinal}. {} in {} (at line {})\n",
            self.severity, self.file, self.line
        );
        if let Some(context) = &self.context {
            out.push('\t');
            out.push_str(&context.text);
            out.push_str("\n\t");
            out.push_str(&" ".repeat(context.caret_start));
            out.push_str(&"^".repeat(context.caret_len.max(1)));
            out.push('\n');
        }
        out.push_str(&self.message);
        out.push('\n');
        out
    }
}

/// Receives every problem the compiler under test reports.
pub trait DiagnosticSink {
    fn accept(&mut self, problem: &Problem);
}

impl DiagnosticSink for Vec<Problem> {
    fn accept(&mut self, problem: &Problem) {
        self.push(problem.clone());
    }
}

/// Extra sink supplied by a scenario; it sees every problem after the requestor.
#[derive(Clone)]
pub struct CustomSink(pub Arc<Mutex<dyn DiagnosticSink + Send>>);

impl CustomSink {
    pub fn new(sink: impl DiagnosticSink + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(sink)))
    }
}

impl fmt::Debug for CustomSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomSink(..)")
    }
}

/// Collects problems into the numbered, separator-delimited problem log.
#[derive(Debug, Default)]
pub struct DiagnosticsRequestor {
    problems: Vec<Problem>,
    has_errors: bool,
    forward: Option<CustomSink>,
}

impl DiagnosticsRequestor {
    #[must_use]
    pub fn new(forward: Option<CustomSink>) -> Self {
        Self {
            problems: Vec::new(),
            has_errors: false,
            forward,
        }
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    #[must_use]
    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Empty when nothing was reported.
    #[must_use]
    pub fn log(&self) -> String {
        if self.problems.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        for (index, problem) in self.problems.iter().enumerate() {
            out.push_str(ENTRY_SEPARATOR);
            out.push_str(&problem.render(index + 1));
        }
        out.push_str(ENTRY_SEPARATOR);
        out
    }
}

impl DiagnosticSink for DiagnosticsRequestor {
    fn accept(&mut self, problem: &Problem) {
        self.has_errors |= problem.is_error();
        self.problems.push(problem.clone());
        if let Some(forward) = &self.forward {
            forward.0.lock().accept(problem);
        }
    }
}

/// A named source file handed to the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceUnit<'a> {
    pub file_name: &'a str,
    pub contents: &'a str,
}

#[derive(Debug, Clone)]
pub struct CompilationRequest<'a> {
    /// Units compiled together.
    pub units: Vec<SourceUnit<'a>>,
    /// Units visible to name resolution only.
    pub dependent_units: Vec<SourceUnit<'a>>,
    pub class_libraries: &'a [String],
    /// Defaults of the compiler merged with the scenario's overrides.
    pub options: BTreeMap<String, String>,
    pub statement_recovery: bool,
    /// Where class files must be written.
    pub output_dir: &'a Path,
}

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Failed(String),
}

pub trait CompilerUnderTest {
    /// Options every compilation starts from; scenario options override them.
    fn default_options(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn compile(
        &mut self,
        request: &CompilationRequest<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<(), CompilerError>;
}

static PROBLEM_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A\d+\. (ERROR|WARNING|INFO) in (.+?) \(at line (\d+)\)\n")
        .expect("problem header pattern is valid")
});

/// Parse a batch-compiler problem log back into problems. Paths are reported
/// relative to `base` when they lie under it. Chunks that are not problems (such as
/// the trailing `1 problem (1 error)` summary) are ignored.
#[must_use]
pub fn parse_batch_log(text: &str, base: &Path) -> Vec<Problem> {
    let text = normalize_line_delimiters(text);
    let base_prefix = format!("{}{}", base.display(), std::path::MAIN_SEPARATOR);
    let mut problems = Vec::new();
    for chunk in text.split(ENTRY_SEPARATOR) {
        let Some(header) = PROBLEM_HEADER.captures(chunk) else {
            continue;
        };
        let Some(severity) = Severity::parse(&header[1]) else {
            continue;
        };
        let file = header[2]
            .strip_prefix(&base_prefix)
            .unwrap_or(&header[2])
            .replace('\\', "/");
        let line = header[3].parse().unwrap_or(0);
        let body = &chunk[header.get(0).map_or(0, |m| m.end())..];

        let mut lines: Vec<&str> = body.lines().collect();
        let mut problem = Problem::new(severity, file, line, "");
        if lines.len() >= 3
            && let (Some(source), Some(carets)) =
                (lines[0].strip_prefix('\t'), lines[1].strip_prefix('\t'))
            && carets.trim_start().starts_with('^')
        {
            let caret_start = carets.len() - carets.trim_start().len();
            let caret_len = carets.trim().chars().filter(|c| *c == '^').count();
            problem = problem.with_context(source, caret_start, caret_len);
            lines.drain(..2);
        }
        problem.message = lines.join("\n");
        problems.push(problem);
    }
    problems
}

/// A command-line compiler (for instance a batch `ecj`) driven as the compiler under test.
#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    command: Vec<String>,
    defaults: BTreeMap<String, String>,
}

impl ProcessCompiler {
    /// `command_line` is tokenized the same way reference command lines are.
    pub fn new(command_line: &str) -> Result<Self, CompilerError> {
        let command = tokenize(command_line);
        if command.is_empty() {
            return Err(CompilerError::Process(ProcessError::EmptyCommand));
        }
        Ok(Self {
            command,
            defaults: BTreeMap::new(),
        })
    }

    #[must_use]
    pub fn with_default_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Program, flags, `-d`/`-classpath`, then the unit paths.
    #[must_use]
    pub fn invocation(&self, request: &CompilationRequest<'_>, source_dir: &Path) -> Invocation {
        let mut invocation = Invocation::new(&self.command[0]).with_args(self.command[1..].iter().cloned());
        for (key, value) in &request.options {
            invocation = invocation.with_arg(key);
            if !value.is_empty() {
                invocation = invocation.with_arg(value);
            }
        }
        let mut classpath = vec![source_dir.display().to_string()];
        classpath.extend(request.class_libraries.iter().cloned());
        let separator = if cfg!(windows) { ";" } else { ":" };
        invocation
            .with_arg("-d")
            .with_arg(request.output_dir.display().to_string())
            .with_arg("-classpath")
            .with_arg(classpath.join(separator))
            .with_args(request.units.iter().map(|unit| unit.file_name.to_string()))
            .with_work_dir(source_dir)
    }

    fn write_units(dir: &Path, units: &[SourceUnit<'_>]) -> Result<(), CompilerError> {
        for unit in units {
            let path = dir.join(unit.file_name);
            let io = |source| CompilerError::Io {
                path: path.clone(),
                source,
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(io)?;
            }
            std::fs::write(&path, unit.contents).map_err(io)?;
        }
        Ok(())
    }
}

impl CompilerUnderTest for ProcessCompiler {
    fn default_options(&self) -> BTreeMap<String, String> {
        self.defaults.clone()
    }

    fn compile(
        &mut self,
        request: &CompilationRequest<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<(), CompilerError> {
        let source_dir = request.output_dir.join("src");
        Self::write_units(&source_dir, &request.units)?;
        Self::write_units(&source_dir, &request.dependent_units)?;
        let outcome = self.invocation(request, &source_dir).run()?;
        let succeeded = outcome.success();
        let exit_code = outcome.exit_code;
        let mut log = outcome.stdout;
        log.push_str(&outcome.stderr);
        let problems = parse_batch_log(&log, &source_dir);
        if problems.is_empty() && !succeeded {
            return Err(CompilerError::Failed(format!(
                "exit code {exit_code:?} without problems:\n{log}"
            )));
        }
        for problem in &problems {
            sink.accept(problem);
        }
        Ok(())
    }
}
