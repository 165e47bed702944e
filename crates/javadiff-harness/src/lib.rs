//! Differential testing harness for a Java compiler under test.
//!
//! This crate provides:
//! - Scenarios: in-memory sources with expected problem logs and program output
//! - Orchestration: compile under test, compare diagnostics, run, compare with javac
//! - Classification: mismatch kinds and the versioned excuse catalog
//! - Log comparison: order-insensitive problem log equality
//! - Reporting: cumulative run log, JSONL events, markdown/JSON reports

#![forbid(unsafe_code)]

pub mod classifier;
pub mod compiler;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod excuse;
pub mod fixtures;
pub mod mismatch;
pub mod problem_log;
pub mod reference_check;
pub mod report;
pub mod run_log;
pub mod runner;
pub mod sandbox;
pub mod scenario;
pub mod structured_log;
pub mod verify;

pub use classifier::{Disposition, handle_mismatch};
pub use compiler::{CompilerUnderTest, DiagnosticSink, Problem, ProcessCompiler, Severity};
pub use config::HarnessConfig;
pub use context::HarnessContext;
pub use error::ScenarioFailure;
pub use excuse::{CATALOG, Excuse, excuse_by_name};
pub use fixtures::ScenarioSet;
pub use mismatch::MismatchKind;
pub use problem_log::ProblemLog;
pub use report::DifferentialReport;
pub use runner::{ScenarioOutcome, TestRunner};
pub use sandbox::{ExecutionSandbox, JvmSandbox, SandboxFactory};
pub use scenario::{ReferenceOptions, ScenarioKind, TestScenario};
pub use verify::VerificationResult;
