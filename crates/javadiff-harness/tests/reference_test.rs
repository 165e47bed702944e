//! Integration test: reference comparison against stand-in JDKs.
//!
//! Each fake JDK has `bin/javac` and `bin/java` shell scripts whose behavior the
//! test chooses, so mismatches and excuses can be provoked on demand.
//!
//! Run: cargo test -p javadiff-harness --test reference_test

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use javadiff_harness::reference_check::{ToolchainVerdict, compare_with_references};
use javadiff_harness::structured_log::{LogEmitter, Outcome, SharedBuffer};
use javadiff_harness::{
    HarnessConfig, HarnessContext, MismatchKind, ReferenceOptions, ScenarioFailure, TestScenario,
};
use javadiff_toolchain::{JavaRelease, ToolchainVersion};

// Writing a script while another test thread forks can leave the script busy for exec.
static SCRIPT_LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SCRIPT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unique_dir(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "javadiff-reference-{tag}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_script(path: &Path, body: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

const JAVAC_CLEAN: &str = "echo \"$@\" > javac.args\nexit 0";
const JAVAC_ERROR: &str =
    "echo 'X.java:3: error: incompatible types: String cannot be converted to int' 1>&2\nexit 1";
const JAVAC_WARNING: &str = "echo 'X.java:1: warning: [serial] serializable class X has no definition of serialVersionUID' 1>&2\nexit 0";
const JAVA_SUCCESS: &str = "echo SUCCESS";

/// JDK at `root` with the given script bodies.
fn fake_jdk(root: &Path, raw: &str, release: JavaRelease, minor: i32, javac: &str, java: &str) -> ToolchainVersion {
    write_script(&root.join("bin/javac"), javac);
    write_script(&root.join("bin/java"), java);
    ToolchainVersion {
        root: root.to_path_buf(),
        raw_version: raw.to_string(),
        release,
        minor,
    }
}

struct Fixture {
    root: PathBuf,
    ctx: HarnessContext,
    events: SharedBuffer,
}

impl Fixture {
    fn new(tag: &str, javac: &str, java: &str) -> Self {
        let root = unique_dir(tag);
        let jdk = fake_jdk(&root.join("jdk"), "1.8.0_202", JavaRelease::V1_8, 2600, javac, java);
        Self::with_toolchains(root, vec![jdk])
    }

    fn with_toolchains(root: PathBuf, toolchains: Vec<ToolchainVersion>) -> Self {
        let config = HarnessConfig {
            run_reference: true,
            ..HarnessConfig::default().with_output_root(root.join("out"))
        };
        let events = SharedBuffer::new();
        let ctx = HarnessContext::new(config)
            .with_toolchains(toolchains)
            .with_emitter(LogEmitter::to_buffer(events.clone(), "reference"))
            .quiet();
        Self { root, ctx, events }
    }

    fn compare(&mut self, scenario: &TestScenario) -> Result<Vec<ToolchainVerdict>, ScenarioFailure> {
        compare_with_references(&mut self.ctx, scenario)
    }

    fn run_log_text(&self) -> String {
        let log = self.ctx.run_log().expect("run log opened");
        log.flush();
        std::fs::read_to_string(log.path()).unwrap()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn mismatch_kind(failure: ScenarioFailure) -> MismatchKind {
    match failure {
        ScenarioFailure::UnexcusedMismatch { kind, .. } => kind,
        other => panic!("unexpected failure: {other}"),
    }
}

fn conform() -> TestScenario {
    TestScenario::conform(
        "test001",
        vec![
            "X.java".into(),
            "public class X { public static void main(String[] a) { System.out.println(\"SUCCESS\"); } }".into(),
        ],
    )
    .with_expected_log("")
    .with_expected_stdout("SUCCESS")
}

#[test]
fn agreement_passes_and_writes_sources() {
    let _guard = serial();
    let mut fixture = Fixture::new("agree", JAVAC_CLEAN, JAVA_SUCCESS);
    let verdicts = fixture.compare(&conform()).expect("javac agrees");
    assert_eq!(
        verdicts,
        [ToolchainVerdict {
            toolchain: "1.8.0_202".into(),
            mismatch: MismatchKind::empty(),
            excuse: None,
            outcome: Outcome::Pass,
        }]
    );

    let dir = fixture.ctx.config().javac_dir("1.8.0_202");
    assert!(dir.join("X.java").exists());
    let args = std::fs::read_to_string(dir.join("javac.args")).unwrap();
    assert_eq!(args.trim(), "-classpath . -d . -Xlint -implicit:none X.java");
    assert!(fixture.run_log_text().starts_with("1.8.0_202\n"));
}

#[test]
fn reference_errors_fail_a_conform_scenario() {
    let _guard = serial();
    let mut fixture = Fixture::new("strict", JAVAC_ERROR, JAVA_SUCCESS);
    fixture.ctx.begin_suite("ConformTest", 1);
    match fixture.compare(&conform()).unwrap_err() {
        ScenarioFailure::UnexcusedMismatch {
            kind, actual, toolchain, ..
        } => {
            assert_eq!(kind, MismatchKind::REFERENCE_ERRORS_UNDER_TEST_NONE);
            assert_eq!(toolchain, "1.8.0_202");
            assert!(actual.contains("incompatible types"));
        }
        other => panic!("unexpected failure: {other}"),
    }
    assert_eq!(fixture.ctx.counters().reference_stricter, 1);
    let text = fixture.run_log_text();
    assert!(text.contains("ConformTest test001\n--- javac err: ---\nX.java:3: error"));
    assert!(text.contains("JAVAC_MISMATCH: ConformTest#test001"));
}

#[test]
fn known_bug_excuses_reference_errors() {
    let _guard = serial();
    let mut fixture = Fixture::new("excused", JAVAC_ERROR, JAVA_SUCCESS);
    fixture.ctx.begin_suite("ExcuseTest", 1);
    let scenario = conform().with_reference(ReferenceOptions::excuse("JavacBug8144832"));
    let verdicts = fixture.compare(&scenario).expect("excused");
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].outcome, Outcome::Excused);
    assert_eq!(verdicts[0].excuse.as_deref(), Some("JavacBug8144832"));
    assert_eq!(verdicts[0].mismatch, MismatchKind::REFERENCE_ERRORS_UNDER_TEST_NONE);

    fixture.ctx.finish_test();
    let log = fixture.events.contents();
    assert!(log.contains("\"event\":\"reference_compare\""));
    assert!(log.contains("\"excuse\":\"JavacBug8144832\""));
    assert!(log.contains("\"outcome\":\"excused\""));
    assert!(log.contains("\"suite\":\"ExcuseTest\""));
}

#[test]
fn unused_excuse_fails_the_scenario() {
    let _guard = serial();
    let mut fixture = Fixture::new("unused", JAVAC_CLEAN, JAVA_SUCCESS);
    let scenario = conform().with_reference(ReferenceOptions::excuse("JavacBug8144832"));
    match fixture.compare(&scenario).unwrap_err() {
        ScenarioFailure::UnusedExcuse { excuse, toolchain, .. } => {
            assert_eq!(excuse, "JavacBug8144832");
            assert_eq!(toolchain, "1.8.0_202");
        }
        other => panic!("unexpected failure: {other}"),
    }
}

#[test]
fn unused_intermittent_excuse_only_warns() {
    let _guard = serial();
    let mut fixture = Fixture::new("intermittent", JAVAC_CLEAN, JAVA_SUCCESS);
    let scenario = conform().with_reference(ReferenceOptions::excuse("JavacBug8044196"));
    let verdicts = fixture.compare(&scenario).expect("intermittent excuse is tolerated");
    assert_eq!(verdicts[0].outcome, Outcome::Pass);
    assert_eq!(verdicts[0].excuse.as_deref(), Some("JavacBug8044196"));
}

#[test]
fn unknown_excuse_is_rejected() {
    let _guard = serial();
    let mut fixture = Fixture::new("unknown", JAVAC_CLEAN, JAVA_SUCCESS);
    let scenario = conform().with_reference(ReferenceOptions::excuse("NoSuchBug"));
    let err = fixture.compare(&scenario).unwrap_err();
    assert_eq!(err.code(), "unknown_excuse");
}

#[test]
fn reference_warnings_on_silent_scenario_are_reported() {
    let _guard = serial();
    let mut fixture = Fixture::new("warn", JAVAC_WARNING, JAVA_SUCCESS);
    let err = fixture.compare(&conform()).unwrap_err();
    assert_eq!(mismatch_kind(err), MismatchKind::REFERENCE_WARNINGS_UNDER_TEST_NONE);

    // An unchecked log does not compare warnings at all.
    let unchecked = TestScenario::conform("test002", vec!["X.java".into(), String::new()]);
    assert!(fixture.compare(&unchecked).is_ok());
}

#[test]
fn negative_scenario_agrees_with_failing_javac() {
    let _guard = serial();
    let mut fixture = Fixture::new("negative", JAVAC_ERROR, JAVA_SUCCESS);
    let scenario = TestScenario::negative(
        "test003",
        vec!["X.java".into(), "public class X { int i = \"\"; }".into()],
        "----------\n1. ERROR in X.java (at line 1)\nType mismatch\n----------\n",
    );
    let verdicts = fixture.compare(&scenario).expect("both reject");
    assert_eq!(verdicts[0].mismatch, MismatchKind::empty());
}

#[test]
fn negative_scenario_with_lenient_javac_is_a_mismatch() {
    let _guard = serial();
    let mut fixture = Fixture::new("lenient", JAVAC_CLEAN, JAVA_SUCCESS);
    let scenario = TestScenario::negative(
        "test004",
        vec!["X.java".into(), "public class X {}".into()],
        "----------\n1. ERROR in X.java (at line 1)\nType mismatch\n----------\n",
    );
    let err = fixture.compare(&scenario).unwrap_err();
    assert_eq!(mismatch_kind(err), MismatchKind::UNDER_TEST_ERRORS_REFERENCE_NONE);
    assert_eq!(fixture.ctx.counters().under_test_stricter, 1);
}

#[test]
fn different_program_output_is_a_mismatch() {
    let _guard = serial();
    let mut fixture = Fixture::new("stdout", JAVAC_CLEAN, "echo FAILURE");
    match fixture.compare(&conform()).unwrap_err() {
        ScenarioFailure::UnexcusedMismatch { kind, expected, actual, .. } => {
            assert_eq!(kind, MismatchKind::STANDARD_OUTPUT_MISMATCH);
            assert_eq!(expected, "SUCCESS");
            assert_eq!(actual, "FAILURE");
        }
        other => panic!("unexpected failure: {other}"),
    }
    assert_eq!(fixture.ctx.counters().output_differs, 1);
}

#[test]
fn reference_stdout_override_is_used() {
    let _guard = serial();
    let mut fixture = Fixture::new("override", JAVAC_CLEAN, "echo javac-flavour");
    let scenario = conform().with_expected_reference_stdout("javac-flavour");
    assert!(fixture.compare(&scenario).is_ok());
}

#[test]
fn thread_prefix_is_stripped_from_reference_stderr() {
    let _guard = serial();
    let mut fixture = Fixture::new(
        "stderr",
        JAVAC_CLEAN,
        "echo 'Exception in thread \"main\" java.lang.RuntimeException: boom' 1>&2\n\
         echo '\tat X.main(X.java:1)' 1>&2\nexit 1",
    );
    let scenario = TestScenario::conform("test005", vec!["X.java".into(), String::new()])
        .with_expected_log("")
        .with_expected_stderr("java.lang.RuntimeException: boom");
    assert!(fixture.compare(&scenario).is_ok());

    let wrong = scenario.clone().with_expected_stderr("java.lang.IllegalStateException");
    let err = fixture.compare(&wrong).unwrap_err();
    assert_eq!(mismatch_kind(err), MismatchKind::ERROR_OUTPUT_MISMATCH);
}

#[test]
fn missing_main_never_counts_against_the_scenario() {
    let _guard = serial();
    let mut fixture = Fixture::new(
        "nomain",
        JAVAC_CLEAN,
        "echo 'Error: Main method not found in class X, please define the main method as:' 1>&2\nexit 1",
    );
    let scenario = TestScenario::conform("test006", vec!["X.java".into(), "class X {}".into()])
        .with_expected_log("")
        .with_expected_stderr("");
    assert!(fixture.compare(&scenario).is_ok());
}

#[test]
fn every_toolchain_of_the_compliance_is_compared() {
    let _guard = serial();
    let root = unique_dir("multi");
    let toolchains = vec![
        fake_jdk(&root.join("jdk8u202"), "1.8.0_202", JavaRelease::V1_8, 2600, JAVAC_CLEAN, JAVA_SUCCESS),
        fake_jdk(&root.join("jdk8u212"), "1.8.0_212", JavaRelease::V1_8, 2700, JAVAC_CLEAN, JAVA_SUCCESS),
        fake_jdk(&root.join("jdk11"), "11.0.2", JavaRelease::V11, 200, JAVAC_ERROR, JAVA_SUCCESS),
    ];
    let mut fixture = Fixture::with_toolchains(root, toolchains);
    let verdicts = fixture.compare(&conform()).expect("both 8 toolchains agree");
    let compared: Vec<&str> = verdicts.iter().map(|v| v.toolchain.as_str()).collect();
    assert_eq!(compared, ["1.8.0_202", "1.8.0_212"]);
    assert!(fixture.ctx.config().javac_dir("1.8.0_212").join("X.java").exists());
    assert!(!fixture.ctx.config().javac_dir("11.0.2").exists());
}

#[test]
fn minimum_compliance_gate_skips_old_toolchains() {
    let _guard = serial();
    let mut fixture = Fixture::new("gate", JAVAC_ERROR, JAVA_SUCCESS);
    let scenario = conform().with_reference(ReferenceOptions::since(JavaRelease::V9));
    assert!(fixture.compare(&scenario).unwrap().is_empty());
    let skipped = conform().with_reference(ReferenceOptions::Skip);
    assert!(fixture.compare(&skipped).unwrap().is_empty());
}

#[test]
fn missing_javac_is_reported_as_not_launched() {
    let _guard = serial();
    let root = unique_dir("nojavac");
    let ghost = ToolchainVersion {
        root: root.join("missing-jdk"),
        raw_version: "1.8.0_202".into(),
        release: JavaRelease::V1_8,
        minor: 2600,
    };
    let mut fixture = Fixture::with_toolchains(root, vec![ghost]);
    let err = fixture.compare(&conform()).unwrap_err();
    assert_eq!(mismatch_kind(err), MismatchKind::REFERENCE_NOT_LAUNCHED);
    assert!(fixture.run_log_text().contains("JAVAC_ERROR: could not launch javac"));
}

#[test]
fn unwritable_reference_dir_counts_as_not_launched() {
    let _guard = serial();
    let mut fixture = Fixture::new("blocked", JAVAC_CLEAN, JAVA_SUCCESS);
    let out = fixture.ctx.config().output_root.clone();
    std::fs::create_dir_all(&out).unwrap();
    // A plain file where `javac/` should be.
    std::fs::write(out.join("javac"), "").unwrap();

    let err = fixture.compare(&conform()).unwrap_err();
    assert_eq!(mismatch_kind(err), MismatchKind::REFERENCE_NOT_LAUNCHED);
    assert!(fixture.run_log_text().contains("JAVAC_ERROR: could not launch javac"));

    let excused = conform().with_reference(ReferenceOptions::excuse("JavacBugFixed_901"));
    let verdicts = fixture.compare(&excused).expect("catch-all excuse applies");
    assert_eq!(verdicts[0].mismatch, MismatchKind::REFERENCE_NOT_LAUNCHED);
    assert_eq!(verdicts[0].outcome, Outcome::Excused);
}

#[test]
fn launch_failure_does_not_skip_later_executions() {
    let _guard = serial();
    let root = unique_dir("relaunch");
    let ghost = ToolchainVersion {
        root: root.join("missing-jdk"),
        raw_version: "1.8.0_202".into(),
        release: JavaRelease::V1_8,
        minor: 2600,
    };
    let working = fake_jdk(&root.join("jdk8u212"), "1.8.0_212", JavaRelease::V1_8, 2700, JAVAC_CLEAN, "echo FAILURE");
    let mut fixture = Fixture::with_toolchains(root, vec![ghost, working]);
    let scenario = conform().with_reference(ReferenceOptions::excuse("JavacBugFixed_901"));
    let verdicts = fixture.compare(&scenario).expect("catch-all excuse applies");
    let mismatches: Vec<MismatchKind> = verdicts.iter().map(|v| v.mismatch).collect();
    assert_eq!(
        mismatches,
        [MismatchKind::REFERENCE_NOT_LAUNCHED, MismatchKind::STANDARD_OUTPUT_MISMATCH]
    );
}

#[test]
fn comparison_is_off_unless_enabled() {
    let _guard = serial();
    let root = unique_dir("off");
    let mut ctx = HarnessContext::new(HarnessConfig::default().with_output_root(&root)).quiet();
    assert!(compare_with_references(&mut ctx, &conform()).unwrap().is_empty());
    let _ = std::fs::remove_dir_all(&root);
}
