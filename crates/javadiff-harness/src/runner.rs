//! Scenario execution engine.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::compiler::{CompilationRequest, CompilerUnderTest, DiagnosticsRequestor};
use crate::context::HarnessContext;
use crate::diff::{render_diff, truncate};
use crate::error::ScenarioFailure;
use crate::fixtures::ScenarioSet;
use crate::problem_log::{ProblemLog, indent_block, normalize_line_delimiters, swallow_capture_ids};
use crate::reference_check::{ToolchainVerdict, compare_with_references};
use crate::sandbox::{ExecutionReport, ExecutionRequest, ExecutionSandbox, SandboxFactory};
use crate::scenario::TestScenario;
use crate::structured_log::{LogEntry, LogLevel, Outcome};
use crate::verify::VerificationResult;

/// Source files longer than this are cut when printed for context.
const MAX_PRINTED_SOURCE: usize = 10_000;

/// What a passing scenario produced.
#[derive(Debug, Clone, Default)]
pub struct ScenarioOutcome {
    /// Problem log of the compiler under test, normalized.
    pub log: String,
    pub has_errors: bool,
    pub execution: Option<ExecutionReport>,
    pub verdicts: Vec<ToolchainVerdict>,
}

/// Removes the primary class's generated files when a scenario ends, however it ends.
struct Cleanup {
    dirs: [PathBuf; 2],
    stem: Option<String>,
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        let Some(stem) = &self.stem else {
            return;
        };
        for dir in &self.dirs {
            let _ = std::fs::remove_file(dir.join(format!("{stem}.java")));
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with(stem.as_str()) && name.ends_with(".class") {
                    let _ = std::fs::remove_file(entry.path());
                }
            }
        }
    }
}

/// Runs scenarios through the compiler under test, the sandbox and the references.
pub struct TestRunner {
    ctx: HarnessContext,
    compiler: Box<dyn CompilerUnderTest>,
    sandboxes: Box<dyn SandboxFactory>,
    sandbox: Option<Box<dyn ExecutionSandbox>>,
}

impl TestRunner {
    #[must_use]
    pub fn new(
        ctx: HarnessContext,
        compiler: Box<dyn CompilerUnderTest>,
        sandboxes: Box<dyn SandboxFactory>,
    ) -> Self {
        Self {
            ctx,
            compiler,
            sandboxes,
            sandbox: None,
        }
    }

    #[must_use]
    pub fn context(&self) -> &HarnessContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut HarnessContext {
        &mut self.ctx
    }

    #[must_use]
    pub fn into_context(mut self) -> HarnessContext {
        if let Some(mut sandbox) = self.sandbox.take() {
            sandbox.shut_down();
        }
        self.ctx
    }

    /// Run one scenario.
    ///
    /// A panic inside the compiler under test is resumed after the problem log has
    /// been dumped.
    pub fn run(&mut self, scenario: &TestScenario) -> Result<ScenarioOutcome, ScenarioFailure> {
        let config = self.ctx.config().clone();
        let _cleanup = Cleanup {
            dirs: [config.source_dir(), config.eval_dir()],
            stem: scenario.primary_stem(),
        };

        let output_dir = config.regression_dir();
        if scenario.flush_output {
            flush_directory(&output_dir)?;
        }
        std::fs::create_dir_all(&output_dir).map_err(|source| ScenarioFailure::Io {
            path: output_dir.clone(),
            source,
        })?;
        scenario.validate()?;

        let mut options = self.compiler.default_options();
        options.extend(scenario.options.clone());
        let request = CompilationRequest {
            units: scenario.units(),
            dependent_units: scenario.dependent_units(),
            class_libraries: &scenario.class_libraries,
            options,
            statement_recovery: scenario.statement_recovery,
            output_dir: &output_dir,
        };
        let mut requestor = DiagnosticsRequestor::new(scenario.sink.clone());
        let compiler = &mut self.compiler;
        let compiled = catch_unwind(AssertUnwindSafe(|| compiler.compile(&request, &mut requestor)));

        let mut log = normalize_line_delimiters(&requestor.log());
        if scenario.swallow_capture_ids {
            log = swallow_capture_ids(&log);
        }
        match compiled {
            Err(panic) => {
                report_log_mismatch(scenario, &log);
                resume_unwind(panic);
            }
            Ok(Err(source)) => {
                report_log_mismatch(scenario, &log);
                return Err(ScenarioFailure::Compiler {
                    scenario: scenario.name.clone(),
                    source,
                });
            }
            Ok(Ok(())) => check_problem_log(scenario, &log)?,
        }

        let has_errors = requestor.has_errors();
        if scenario.expects_errors() && !has_errors {
            return Err(ScenarioFailure::UnexpectedSuccess {
                scenario: scenario.name.clone(),
            });
        }
        if !scenario.expects_errors() && has_errors && !log.is_empty() {
            eprintln!("Copy-paste compiler log:\n{}", indent_block(&log, 2));
            return Err(ScenarioFailure::UnexpectedFailure {
                scenario: scenario.name.clone(),
                log,
            });
        }

        let mut execution = None;
        if (!has_errors || scenario.force_execution) && scenario.is_executable() {
            let mut classpath = vec![output_dir.clone()];
            classpath.extend(scenario.class_libraries.iter().map(PathBuf::from));
            execution = Some(self.execute(scenario, &classpath)?);
        }

        let verdicts = compare_with_references(&mut self.ctx, scenario)?;
        Ok(ScenarioOutcome {
            log,
            has_errors,
            execution,
            verdicts,
        })
    }

    fn execute(
        &mut self,
        scenario: &TestScenario,
        classpath: &[PathBuf],
    ) -> Result<ExecutionReport, ScenarioFailure> {
        let class_name = scenario.primary_class_name().unwrap_or_default();
        let request = ExecutionRequest {
            source_file: scenario.primary_file().unwrap_or_default(),
            class_name: &class_name,
            classpath,
            vm_arguments: scenario.vm_arguments.as_deref(),
            expected_stdout: scenario.expected_stdout.as_deref(),
            expected_stderr: scenario.expected_stderr.as_deref(),
        };
        // VM arguments need a sandbox of their own, replaced once done.
        if scenario.vm_arguments.is_some()
            && let Some(mut current) = self.sandbox.take()
        {
            current.shut_down();
        }
        let sandbox = self.sandbox.get_or_insert_with(|| self.sandboxes.create());
        let executed = sandbox.execute(&request);
        if scenario.vm_arguments.is_some()
            && let Some(mut used) = self.sandbox.take()
        {
            used.shut_down();
            self.sandbox = Some(self.sandboxes.create());
        }
        let report = executed.map_err(|source| ScenarioFailure::Sandbox {
            scenario: scenario.name.clone(),
            source,
        })?;
        if report.passed {
            return Ok(report);
        }
        eprintln!("[ERR]: {}", report.stderr);
        eprintln!("[OUT]: {}", report.stdout);
        print_test_files(scenario);
        Err(ScenarioFailure::ExecutionMismatch {
            scenario: scenario.name.clone(),
            reason: report.failure_reason.clone().unwrap_or_default(),
            expected_stdout: scenario.expected_stdout.clone(),
            actual_stdout: report.stdout,
            expected_stderr: scenario.expected_stderr.clone(),
            actual_stderr: report.stderr,
        })
    }

    /// Run a whole suite, turning failures and panics into results.
    pub fn run_all(&mut self, set: &ScenarioSet) -> Vec<VerificationResult> {
        self.ctx.begin_suite(&set.suite, set.scenarios.len());
        let mut results = Vec::with_capacity(set.scenarios.len());
        for scenario in &set.scenarios {
            self.ctx.emit(
                LogEntry::new("", LogLevel::Info, "scenario_start").with_scenario(&scenario.name),
            );
            let started = Instant::now();
            let run = catch_unwind(AssertUnwindSafe(|| self.run(scenario)));
            let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let mut result = VerificationResult {
                scenario: scenario.name.clone(),
                suite: set.suite.clone(),
                passed: false,
                failure: None,
                message: None,
                diff: None,
                verdicts: Vec::new(),
                fingerprint: scenario.fingerprint(),
            };
            match run {
                Ok(Ok(outcome)) => {
                    result.passed = true;
                    result.verdicts = outcome.verdicts;
                }
                Ok(Err(failure)) => {
                    result.failure = Some(failure.code().to_string());
                    result.diff = failure_diff(&failure);
                    result.message = Some(failure.to_string());
                }
                Err(panic) => {
                    result.failure = Some("panic".to_string());
                    result.message = Some(panic_message(panic.as_ref()));
                }
            }

            let (level, outcome) = if result.passed {
                (LogLevel::Info, Outcome::Pass)
            } else {
                (LogLevel::Error, Outcome::Fail)
            };
            let mut entry = LogEntry::new("", level, "scenario_end")
                .with_scenario(&scenario.name)
                .with_outcome(outcome)
                .with_duration_ms(elapsed)
                .with_artifacts(vec![format!("sha256:{}", result.fingerprint)]);
            if let Some(code) = &result.failure {
                entry = entry.with_details(serde_json::json!({ "failure": code }));
            }
            self.ctx.emit(entry);
            self.ctx.finish_test();
            results.push(result);
        }
        results
    }
}

fn flush_directory(dir: &Path) -> Result<(), ScenarioFailure> {
    match std::fs::remove_dir_all(dir) {
        Err(source) if source.kind() != std::io::ErrorKind::NotFound => Err(ScenarioFailure::Io {
            path: dir.to_path_buf(),
            source,
        }),
        _ => Ok(()),
    }
}

/// Compare `log` against the scenario's candidates; unchecked when there are none.
///
/// On mismatch the actual log is dumped and diffed against the last candidate.
fn check_problem_log(scenario: &TestScenario, log: &str) -> Result<(), ScenarioFailure> {
    let candidates = scenario.expected_logs();
    let Some(last) = candidates.last() else {
        return Ok(());
    };
    let actual = ProblemLog::parse(log);
    if candidates.iter().any(|candidate| actual.same_as(candidate)) {
        return Ok(());
    }
    eprintln!(
        "----------------------------------------\n{}: unexpected problem log\n{}",
        scenario.name,
        indent_block(log, 1)
    );
    print_test_files(scenario);
    Err(ScenarioFailure::ProblemLogMismatch {
        scenario: scenario.name.clone(),
        expected: last.clone(),
        actual: log.to_string(),
        diff: render_diff(last, log),
    })
}

/// Print a log mismatch that a compiler failure is about to override.
///
/// Returns whether the log matched.
fn report_log_mismatch(scenario: &TestScenario, log: &str) -> bool {
    match check_problem_log(scenario, log) {
        Ok(()) => true,
        Err(failure) => {
            eprintln!("{failure} (superseded by the compiler failure)");
            false
        }
    }
}

fn print_test_files(scenario: &TestScenario) {
    for unit in scenario.units() {
        eprintln!("[{}]\n{}", unit.file_name, truncate(unit.contents, MAX_PRINTED_SOURCE));
    }
}

fn failure_diff(failure: &ScenarioFailure) -> Option<String> {
    match failure {
        ScenarioFailure::ProblemLogMismatch { diff, .. } => Some(diff.clone()),
        ScenarioFailure::ExecutionMismatch {
            expected_stdout: Some(expected),
            actual_stdout,
            ..
        } => Some(render_diff(expected.trim(), actual_stdout.trim())),
        ScenarioFailure::UnexcusedMismatch {
            expected, actual, ..
        } => Some(render_diff(expected, actual)),
        _ => None,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "compiler under test panicked".to_string()
    }
}
