//! Comparison of a scenario against the configured reference toolchains.
//!
//! For every toolchain of the compliance under test, the scenario's files are
//! compiled with `javac` in `javac/<raw>`, the outcome is cross-tabulated against
//! what the compiler under test reported, and (when both sides compiled cleanly)
//! the program is run and its streams compared. Each toolchain's outcome is routed
//! through the scenario's excuse.

use std::path::Path;
use std::time::Instant;

use javadiff_toolchain::{CompileOutcome, ProcessError, ReferenceCompiler, ToolchainVersion};
use serde::{Deserialize, Serialize};

use crate::classifier::{Disposition, MismatchReport, handle_mismatch};
use crate::config::HarnessConfig;
use crate::context::HarnessContext;
use crate::error::ScenarioFailure;
use crate::excuse::{Excuse, excuse_by_name};
use crate::mismatch::MismatchKind;
use crate::scenario::{ReferenceOptions, TestScenario};
use crate::structured_log::{LogEntry, LogLevel, Outcome};

const EXCEPTION_PREFIX: &str = "Exception in thread \"main\" ";

/// Outcome of one toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainVerdict {
    pub toolchain: String,
    pub mismatch: MismatchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excuse: Option<String>,
    pub outcome: Outcome,
}

/// Reference options: the scenario's own, then ` -d .`, ` -Xlint` and
/// ` -implicit:none` unless present, then libraries outside the JDK.
#[must_use]
pub fn reference_options(
    base: &str,
    class_libraries: &[String],
    on_module_path: bool,
    config: &HarnessConfig,
) -> String {
    let mut options = base.to_string();
    if !options.contains(" -d ") {
        options.push_str(" -d .");
    }
    if !options.contains(" -Xlint") {
        options.push_str(" -Xlint");
    }
    if !options.contains(" -implicit") {
        options.push_str(" -implicit:none");
    }
    let libs: Vec<&str> = class_libraries
        .iter()
        .map(String::as_str)
        .filter(|lib| !config.is_jdk_library(lib))
        .collect();
    if !libs.is_empty() {
        let separator = if cfg!(windows) { ";" } else { ":" };
        options.push_str(if on_module_path {
            " --module-path "
        } else {
            " -classpath "
        });
        options.push_str(&libs.join(separator));
    }
    options
}

/// Mismatch between what the compiler under test reported and what javac did.
///
/// `expected_log` of `None` skips the warnings comparison.
#[must_use]
pub fn cross_tabulate(
    expect_errors: bool,
    expected_log: Option<&str>,
    outcome: &CompileOutcome,
) -> MismatchKind {
    let failed = outcome.failed();
    let logged = outcome.has_log();
    if expect_errors {
        if failed {
            MismatchKind::empty()
        } else if logged {
            MismatchKind::UNDER_TEST_ERRORS_REFERENCE_WARNINGS
        } else {
            MismatchKind::UNDER_TEST_ERRORS_REFERENCE_NONE
        }
    } else if failed {
        if expected_log.is_some_and(|log| !log.is_empty()) {
            MismatchKind::REFERENCE_ERRORS_UNDER_TEST_WARNINGS
        } else {
            MismatchKind::REFERENCE_ERRORS_UNDER_TEST_NONE
        }
    } else {
        match expected_log {
            Some(log) if !log.is_empty() && !logged => {
                MismatchKind::UNDER_TEST_WARNINGS_REFERENCE_NONE
            }
            Some("") if logged => MismatchKind::REFERENCE_WARNINGS_UNDER_TEST_NONE,
            _ => MismatchKind::empty(),
        }
    }
}

/// Stack traces printed by a dying JVM carry a thread prefix the harness's own
/// runs do not.
#[must_use]
pub fn adjust_error_output(stderr: &str) -> String {
    match stderr.strip_prefix(EXCEPTION_PREFIX) {
        Some(rest) => format!("{rest}\n"),
        None => stderr.to_string(),
    }
}

/// Empty expectation means exactly empty; anything else is a prefix. A missing
/// `main` is never held against the scenario.
#[must_use]
pub fn error_string_matches(expected: &str, actual: &str) -> bool {
    if actual.contains("java.lang.NoSuchMethodError: main")
        || actual.contains("Error: Main method not found in class")
    {
        return true;
    }
    if expected.is_empty() {
        return actual.is_empty();
    }
    actual.starts_with(expected)
}

/// Remove every `.java` file below `dir`, keeping compiled classes.
pub fn delete_source_files(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            delete_source_files(&path)?;
        } else if path.extension().is_some_and(|ext| ext == "java") {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn work_dir_failure(path: &Path) -> impl FnOnce(std::io::Error) -> ProcessError + '_ {
    move |source| ProcessError::WorkDir {
        path: path.to_path_buf(),
        source,
    }
}

/// Fresh `javac/<raw>` holding the scenario's files.
///
/// A failure here keeps javac from launching and is reported like one.
fn prepare_output_dir(dir: &Path, scenario: &TestScenario) -> Result<(), ProcessError> {
    if scenario.flush_output {
        match std::fs::remove_dir_all(dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                return Err(work_dir_failure(dir)(e));
            }
            _ => {}
        }
    } else {
        delete_source_files(dir).map_err(work_dir_failure(dir))?;
    }
    std::fs::create_dir_all(dir).map_err(work_dir_failure(dir))?;
    for unit in scenario.units().iter().chain(&scenario.dependent_units()) {
        let path = dir.join(unit.file_name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(work_dir_failure(parent))?;
        }
        std::fs::write(&path, unit.contents).map_err(work_dir_failure(&path))?;
    }
    Ok(())
}

/// The scenario's excuse, if any, and the option string its toolchains start from.
fn resolve_options(
    scenario: &TestScenario,
) -> Result<(Option<&'static Excuse>, String), ScenarioFailure> {
    match &scenario.reference {
        ReferenceOptions::Skip => Ok((None, String::new())),
        ReferenceOptions::Compare { options, .. } => Ok((None, options.clone())),
        ReferenceOptions::Excuse { name } => {
            let excuse = excuse_by_name(name).ok_or_else(|| ScenarioFailure::UnknownExcuse {
                scenario: scenario.name.clone(),
                name: name.clone(),
            })?;
            Ok((Some(excuse), excuse.reference_options.to_string()))
        }
    }
}

/// Reference-side observations for one toolchain.
#[derive(Debug)]
struct Observation {
    mismatch: MismatchKind,
    compiler_log: String,
    stdout: Option<String>,
    stderr: Option<String>,
}

/// Compare `scenario` against every eligible toolchain.
///
/// Returns one verdict per toolchain compared; the first unexcused mismatch or
/// unused excuse fails the scenario.
pub fn compare_with_references(
    ctx: &mut HarnessContext,
    scenario: &TestScenario,
) -> Result<Vec<ToolchainVerdict>, ScenarioFailure> {
    if !ctx.config().run_reference || scenario.reference == ReferenceOptions::Skip {
        return Ok(Vec::new());
    }
    let (excuse, base) = resolve_options(scenario)?;
    let options = reference_options(
        &base,
        &scenario.class_libraries,
        scenario.libs_on_module_path,
        ctx.config(),
    );
    let toolchains = ctx
        .toolchains()
        .map_err(|source| ScenarioFailure::Toolchain {
            scenario: scenario.name.clone(),
            source,
        })?;
    let compliance = ctx.config().compliance;

    let mut verdicts = Vec::new();
    for toolchain in toolchains
        .iter()
        .filter(|tc| tc.release == compliance && !scenario.reference.skips(tc))
    {
        let started = Instant::now();
        let observation = observe(ctx, scenario, toolchain, &options)?;
        let applicable = excuse.and_then(|excuse| excuse.excuse_for(toolchain));
        let report = MismatchReport {
            scenario: &scenario.name,
            toolchain,
            kind: observation.mismatch,
            expected_log: scenario.expected_log.as_deref(),
            reference_log: &observation.compiler_log,
            expected_stdout: scenario.reference_stdout(),
            actual_stdout: observation.stdout.as_deref(),
            expected_stderr: scenario.expected_stderr.as_deref(),
            actual_stderr: observation.stderr.as_deref(),
        };
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let mut entry = LogEntry::new("", LogLevel::Info, "reference_compare")
            .with_scenario(&scenario.name)
            .with_toolchain(&toolchain.raw_version)
            .with_mismatch(observation.mismatch.label())
            .with_duration_ms(elapsed);

        let disposition = match handle_mismatch(&report, applicable) {
            Ok(disposition) => disposition,
            Err(failure) => {
                entry.level = LogLevel::Error;
                ctx.emit(
                    entry
                        .with_outcome(Outcome::Fail)
                        .with_details(serde_json::json!({ "failure": failure.code() })),
                );
                return Err(failure);
            }
        };
        let outcome = match disposition {
            Disposition::Excused { .. } => Outcome::Excused,
            Disposition::Clean | Disposition::UnusedIntermittent { .. } => Outcome::Pass,
        };
        if let Some(name) = disposition.excuse_name() {
            entry = entry.with_excuse(name);
        }
        ctx.emit(entry.with_outcome(outcome));
        verdicts.push(ToolchainVerdict {
            toolchain: toolchain.raw_version.clone(),
            mismatch: observation.mismatch,
            excuse: disposition.excuse_name().map(str::to_string),
            outcome,
        });
    }
    Ok(verdicts)
}

fn observe(
    ctx: &mut HarnessContext,
    scenario: &TestScenario,
    toolchain: &ToolchainVersion,
    options: &str,
) -> Result<Observation, ScenarioFailure> {
    let suite = ctx.suite_name().to_string();
    let dir = ctx.config().javac_dir(&toolchain.raw_version);
    let timeout = ctx.config().process_timeout;
    let prepared = prepare_output_dir(&dir, scenario);
    if let Some(log) = ctx.ensure_run_log(&toolchain.raw_version) {
        log.record_test(&suite, &scenario.name);
    }

    let mut observation = Observation {
        mismatch: MismatchKind::empty(),
        compiler_log: String::new(),
        stdout: None,
        stderr: None,
    };
    let compiler = ReferenceCompiler::new(toolchain.clone()).with_timeout(timeout);
    let compiled =
        prepared.and_then(|()| compiler.compile(&dir, options, &scenario.source_file_names()));
    // Only a javac that ran and rejected the sources counts; launch failures do not.
    let reference_failed = compiled.as_ref().is_ok_and(CompileOutcome::failed);
    let error_flag = ctx.note_reference_result(&scenario.name, reference_failed);
    let compiled = match compiled {
        Ok(outcome) => {
            if let Some(log) = ctx.run_log() {
                log.record_compiler_output(&outcome.log, &outcome.stdout);
            }
            observation.mismatch = cross_tabulate(
                scenario.expects_errors(),
                scenario.expected_log.as_deref(),
                &outcome,
            );
            observation.compiler_log = outcome.log;
            true
        }
        Err(e) => {
            observation.mismatch = launch_failure(ctx, &suite, scenario, &e, true);
            false
        }
    };
    if !observation.mismatch.is_empty() {
        record_divergence(ctx, &suite, scenario, observation.mismatch);
    }

    let wants_run = scenario.reference_stdout().is_some() || scenario.expected_stderr.is_some();
    if wants_run && compiled && !error_flag && observation.mismatch.is_empty() && scenario.is_executable() {
        let class_name = scenario.reference_class_name().unwrap_or_default();
        let vm_options = scenario
            .vm_arguments
            .as_deref()
            .unwrap_or_default()
            .join(" ");
        match ctx.runtime(toolchain).execute(&dir, &vm_options, &class_name) {
            Ok(run) => {
                if let Some(expected) = scenario.reference_stdout() {
                    let stdout = run.stdout.trim().to_string();
                    if expected != stdout {
                        observation.mismatch = MismatchKind::STANDARD_OUTPUT_MISMATCH;
                    }
                    observation.stdout = Some(stdout);
                }
                if let Some(expected) = scenario.expected_stderr.as_deref()
                    && observation.mismatch.is_empty()
                {
                    let stderr = adjust_error_output(run.stderr.trim());
                    if !error_string_matches(expected, &stderr) {
                        observation.mismatch = MismatchKind::ERROR_OUTPUT_MISMATCH;
                    }
                    observation.stderr = Some(stderr);
                }
                if !observation.mismatch.is_empty() {
                    record_divergence(ctx, &suite, scenario, observation.mismatch);
                }
            }
            Err(e) => observation.mismatch = launch_failure(ctx, &suite, scenario, &e, false),
        }
    }
    Ok(observation)
}

fn record_divergence(
    ctx: &mut HarnessContext,
    suite: &str,
    scenario: &TestScenario,
    kind: MismatchKind,
) {
    ctx.record_divergence(kind);
    if let Some(log) = ctx.run_log() {
        log.record_mismatch(&format!("{suite}#{} {}", scenario.name, kind.describe()));
    }
}

/// Map a process failure of javac (`compiling`) or java onto a mismatch kind.
fn launch_failure(
    ctx: &HarnessContext,
    suite: &str,
    scenario: &TestScenario,
    error: &ProcessError,
    compiling: bool,
) -> MismatchKind {
    let tool = if compiling { "javac" } else { "java" };
    eprintln!("{suite}#{}: {tool} failed: {error}", scenario.name);
    if let Some(log) = ctx.run_log() {
        if error.is_aborted() {
            log.record_warning(&format!("{suite}#{} {tool} was aborted: {error}", scenario.name));
        } else {
            log.record_error(&format!("could not launch {tool}: {error}"));
        }
    }
    match (compiling, error.is_aborted()) {
        (true, true) => MismatchKind::REFERENCE_ABORTED,
        (true, false) => MismatchKind::REFERENCE_NOT_LAUNCHED,
        (false, true) => MismatchKind::RUNTIME_ABORTED,
        (false, false) => MismatchKind::RUNTIME_NOT_LAUNCHED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(exit: i32, log: &str) -> CompileOutcome {
        CompileOutcome {
            exit_code: Some(exit),
            log: log.to_string(),
            stdout: String::new(),
        }
    }

    #[test]
    fn options_are_appended_only_when_absent() {
        let cfg = HarnessConfig::default();
        assert_eq!(
            reference_options("", &[], false, &cfg),
            " -d . -Xlint -implicit:none"
        );
        assert_eq!(
            reference_options(" -d out -Xlint:-unchecked -implicit:class", &[], false, &cfg),
            " -d out -Xlint:-unchecked -implicit:class"
        );
        assert_eq!(
            reference_options("--enable-preview -source 14", &[], false, &cfg),
            "--enable-preview -source 14 -d . -Xlint -implicit:none"
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_jdk_libraries_extend_the_path() {
        let mut cfg = HarnessConfig::default();
        cfg.jdk_root = Some("/opt/jdk".into());
        let libs = vec![
            "/opt/jdk/jre/lib/rt.jar".to_string(),
            "/tmp/a.jar".to_string(),
            "/tmp/b.jar".to_string(),
        ];
        assert_eq!(
            reference_options("", &libs, false, &cfg),
            " -d . -Xlint -implicit:none -classpath /tmp/a.jar:/tmp/b.jar"
        );
        assert!(reference_options("", &libs, true, &cfg).ends_with(" --module-path /tmp/a.jar:/tmp/b.jar"));
    }

    #[test]
    fn cross_tab_when_errors_expected() {
        let log = Some("1. ERROR in X.java");
        assert_eq!(cross_tabulate(true, log, &outcome(1, "err")), MismatchKind::empty());
        assert_eq!(
            cross_tabulate(true, log, &outcome(0, "")),
            MismatchKind::UNDER_TEST_ERRORS_REFERENCE_NONE
        );
        assert_eq!(
            cross_tabulate(true, log, &outcome(0, "warning")),
            MismatchKind::UNDER_TEST_ERRORS_REFERENCE_WARNINGS
        );
    }

    #[test]
    fn cross_tab_when_conform_expected() {
        assert_eq!(
            cross_tabulate(false, Some(""), &outcome(1, "err")),
            MismatchKind::REFERENCE_ERRORS_UNDER_TEST_NONE
        );
        assert_eq!(
            cross_tabulate(false, None, &outcome(1, "err")),
            MismatchKind::REFERENCE_ERRORS_UNDER_TEST_NONE
        );
        assert_eq!(
            cross_tabulate(false, Some("1. WARNING"), &outcome(1, "err")),
            MismatchKind::REFERENCE_ERRORS_UNDER_TEST_WARNINGS
        );
        assert_eq!(
            cross_tabulate(false, Some("1. WARNING"), &outcome(0, "")),
            MismatchKind::UNDER_TEST_WARNINGS_REFERENCE_NONE
        );
        assert_eq!(
            cross_tabulate(false, Some(""), &outcome(0, "warning")),
            MismatchKind::REFERENCE_WARNINGS_UNDER_TEST_NONE
        );
        assert_eq!(cross_tabulate(false, None, &outcome(0, "warning")), MismatchKind::empty());
        assert_eq!(
            cross_tabulate(false, Some("1. WARNING"), &outcome(0, "warning")),
            MismatchKind::empty()
        );
    }

    #[test]
    fn killed_compiler_counts_as_failed() {
        let killed = CompileOutcome::default();
        assert_eq!(
            cross_tabulate(false, Some(""), &killed),
            MismatchKind::REFERENCE_ERRORS_UNDER_TEST_NONE
        );
    }

    #[test]
    fn error_output_adjustment() {
        assert_eq!(
            adjust_error_output("Exception in thread \"main\" java.lang.Error: x"),
            "java.lang.Error: x\n"
        );
        assert_eq!(adjust_error_output("java.lang.Error: x"), "java.lang.Error: x");
    }

    #[test]
    fn error_string_matching() {
        assert!(error_string_matches("", ""));
        assert!(!error_string_matches("", "boom"));
        assert!(error_string_matches("java.lang.Error", "java.lang.Error: x\n\tat X.main"));
        assert!(!error_string_matches("java.lang.Error", "java.lang.RuntimeException"));
        assert!(error_string_matches("", "Error: Main method not found in class X"));
        assert!(error_string_matches("x", "Exception java.lang.NoSuchMethodError: main"));
    }

    #[test]
    fn source_files_are_deleted_recursively() {
        let dir = std::env::temp_dir().join(format!("javadiff-delsrc-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("p")).unwrap();
        std::fs::write(dir.join("X.java"), "").unwrap();
        std::fs::write(dir.join("X.class"), "").unwrap();
        std::fs::write(dir.join("p/Y.java"), "").unwrap();
        delete_source_files(&dir).unwrap();
        assert!(!dir.join("X.java").exists());
        assert!(!dir.join("p/Y.java").exists());
        assert!(dir.join("X.class").exists());
        std::fs::remove_dir_all(&dir).unwrap();
        assert!(delete_source_files(&dir).is_ok());
    }

    #[test]
    fn unknown_excuse_is_reported() {
        let scenario = TestScenario::conform("t", vec!["X.java".into(), "class X {}".into()])
            .with_reference(ReferenceOptions::excuse("NoSuchBug"));
        assert!(matches!(
            resolve_options(&scenario),
            Err(ScenarioFailure::UnknownExcuse { .. })
        ));
    }

    #[test]
    fn disabled_reference_compares_nothing() {
        let mut ctx = HarnessContext::new(HarnessConfig::default());
        let scenario = TestScenario::conform("t", vec!["X.java".into(), "class X {}".into()]);
        assert!(compare_with_references(&mut ctx, &scenario).unwrap().is_empty());
    }
}
