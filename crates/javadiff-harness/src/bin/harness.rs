//! CLI entrypoint for the javadiff harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use javadiff_harness::excuse::ExcuseSummary;
use javadiff_harness::fixtures::fixture_paths;
use javadiff_harness::structured_log::{LogEmitter, UtcTime, validate_log_file};
use javadiff_harness::verify::VerificationSummary;
use javadiff_harness::{
    CATALOG, DifferentialReport, ExecutionSandbox, HarnessConfig, HarnessContext, JvmSandbox,
    ProblemLog, ProcessCompiler, ScenarioSet, TestRunner, excuse_by_name,
};
use javadiff_toolchain::locator::java_path;
use javadiff_toolchain::version::normalize_with;
use javadiff_toolchain::{Locator, MinorPolicy};

/// Differential testing of a Java compiler against reference JDKs.
#[derive(Debug, Parser)]
#[command(name = "javadiff-harness")]
#[command(about = "Differential testing harness for a Java compiler under test")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Discover reference toolchains and print them as JSON.
    Probe {
        /// JDK root directory; repeat for several.
        #[arg(long = "jdk-root", required = true)]
        jdk_roots: Vec<PathBuf>,
        /// Accept raw versions missing from the minor table.
        #[arg(long)]
        lenient: bool,
    },
    /// Normalize a raw javac version string.
    Normalize {
        /// Raw version, as printed by `javac -version`.
        raw: String,
        /// Toolchain path, consulted for releases that print no version.
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        lenient: bool,
    },
    /// List the excuse catalog as JSON.
    Excuses {
        /// Only this excuse.
        #[arg(long)]
        name: Option<String>,
    },
    /// Compare two problem log files, ignoring order and numbering.
    CompareLogs {
        expected: PathBuf,
        actual: PathBuf,
    },
    /// Validate a structured JSONL log.
    ValidateLog {
        #[arg(long)]
        path: PathBuf,
    },
    /// Run scenario fixtures through a command-line compiler and the references.
    Run {
        /// Fixture JSON file, or a directory of them.
        #[arg(long)]
        fixture: PathBuf,
        /// Command line of the compiler under test.
        #[arg(long)]
        compiler: String,
        /// `java` used to run what the compiler under test produced.
        #[arg(long)]
        java: Option<PathBuf>,
        /// Output report path (markdown); a JSON twin is written next to it.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn policy(lenient: bool) -> MinorPolicy {
    if lenient {
        MinorPolicy::Lenient
    } else {
        MinorPolicy::Strict
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Probe { jdk_roots, lenient } => {
            let toolchains = Locator::new().with_policy(policy(lenient)).discover(&jdk_roots)?;
            println!("{}", serde_json::to_string_pretty(&toolchains)?);
        }
        Command::Normalize { raw, path, lenient } => {
            let (release, minor) = normalize_with(&raw, path.as_deref(), policy(lenient))?;
            println!(
                "{}",
                serde_json::json!({ "raw": raw, "release": release, "minor": minor })
            );
        }
        Command::Excuses { name } => {
            let summaries: Vec<ExcuseSummary> = match name {
                Some(name) => {
                    let excuse =
                        excuse_by_name(&name).ok_or_else(|| format!("Unknown excuse '{name}'"))?;
                    vec![excuse.summary()]
                }
                None => CATALOG.iter().map(|excuse| excuse.summary()).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Command::CompareLogs { expected, actual } => {
            let expected_text = std::fs::read_to_string(&expected)?;
            let actual_text = std::fs::read_to_string(&actual)?;
            let expected_text =
                javadiff_harness::problem_log::normalize_line_delimiters(&expected_text);
            let actual_text = javadiff_harness::problem_log::normalize_line_delimiters(&actual_text);
            if ProblemLog::parse(&expected_text).same_as(&actual_text) {
                eprintln!("Problem logs match");
            } else {
                println!(
                    "{}",
                    javadiff_harness::diff::render_diff(&expected_text, &actual_text)
                );
                return Err("Problem logs differ".into());
            }
        }
        Command::ValidateLog { path } => {
            let (lines, errors) = validate_log_file(&path)?;
            for error in &errors {
                eprintln!("{error}");
            }
            eprintln!("Validated {lines} line(s), {} error(s)", errors.len());
            if !errors.is_empty() {
                return Err("Structured log validation failed".into());
            }
        }
        Command::Run {
            fixture,
            compiler,
            java,
            report,
        } => {
            let config = HarnessConfig::from_env()?;
            let java = java
                .or_else(|| config.jdk_root.as_deref().map(java_path))
                .unwrap_or_else(|| PathBuf::from("java"));
            let timeout = config.process_timeout;
            let structured_log = config.structured_log.clone();
            let run_reference = config.run_reference;

            let mut ctx = HarnessContext::new(config);
            if let Some(path) = structured_log {
                let run_id = UtcTime::now().compact();
                ctx = ctx.with_emitter(LogEmitter::to_file(&path, &run_id)?);
                eprintln!("Structured log: {}", path.display());
            }
            let toolchains = if run_reference {
                ctx.toolchains()?
                    .into_iter()
                    .map(|tc| tc.raw_version)
                    .collect()
            } else {
                Vec::new()
            };

            let compiler = ProcessCompiler::new(&compiler)?;
            let sandboxes = move || -> Box<dyn ExecutionSandbox> {
                Box::new(JvmSandbox::new(java.clone()).with_timeout(timeout))
            };
            let mut runner = TestRunner::new(ctx, Box::new(compiler), Box::new(sandboxes));

            eprintln!("Running fixtures from {}", fixture.display());
            let mut sets = Vec::new();
            for path in fixture_paths(&fixture)? {
                match ScenarioSet::from_file(&path) {
                    Ok(set) => sets.push(set),
                    Err(err) => eprintln!("Skipping {}: {}", path.display(), err),
                }
            }
            if sets.is_empty() {
                return Err(format!("No fixture JSON files found in {}", fixture.display()).into());
            }

            let mut results = Vec::new();
            for set in &sets {
                results.extend(runner.run_all(set));
            }
            drop(runner.into_context());

            let summary = VerificationSummary::from_results(results);
            let report_doc =
                DifferentialReport::new("javadiff Differential Report", toolchains, summary);
            eprintln!(
                "Run complete: total={}, passed={}, excused={}, failed={}",
                report_doc.summary.total,
                report_doc.summary.passed,
                report_doc.summary.excused,
                report_doc.summary.failed
            );

            if let Some(report_path) = report {
                eprintln!("Writing report to {}", report_path.display());
                std::fs::write(&report_path, report_doc.to_markdown())?;
                std::fs::write(report_path.with_extension("json"), report_doc.to_json())?;
            }

            if !report_doc.summary.all_passed() {
                return Err("Differential run failed".into());
            }
        }
    }

    Ok(())
}
