//! State shared by every scenario of a harness run.
//!
//! Toolchains are discovered once, on first use, and never change afterwards; a
//! failed discovery is remembered and reported again without re-probing. The
//! run log is opened lazily with the first toolchain's version. Suite bookkeeping
//! prints the divergence summary when the last test of a suite finishes.

use std::path::PathBuf;
use std::sync::Arc;

use javadiff_toolchain::{Locator, ReferenceRuntime, RuntimeCache, ToolchainError, ToolchainVersion};

use crate::config::HarnessConfig;
use crate::mismatch::MismatchKind;
use crate::run_log::{DiffCounters, RunLog};
use crate::structured_log::{LogEmitter, LogEntry};

#[derive(Debug, Default)]
struct SuiteProgress {
    name: String,
    total: usize,
    finished: usize,
    counters: DiffCounters,
}

/// Whether the reference compiler failed for the test currently running.
#[derive(Debug, Default)]
struct ReferenceErrorFlag {
    test_name: Option<String>,
    failed: bool,
}

#[derive(Debug)]
pub struct HarnessContext {
    config: HarnessConfig,
    toolchains: Option<Result<Vec<ToolchainVersion>, Arc<ToolchainError>>>,
    runtimes: RuntimeCache,
    run_log: Option<RunLog>,
    announce_run_log: bool,
    suite: SuiteProgress,
    reference_error: ReferenceErrorFlag,
    emitter: Option<LogEmitter>,
}

impl HarnessContext {
    #[must_use]
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            toolchains: None,
            runtimes: RuntimeCache::new(),
            run_log: None,
            announce_run_log: true,
            suite: SuiteProgress::default(),
            reference_error: ReferenceErrorFlag::default(),
            emitter: None,
        }
    }

    /// Use these toolchains instead of probing the configured roots.
    #[must_use]
    pub fn with_toolchains(mut self, toolchains: Vec<ToolchainVersion>) -> Self {
        self.toolchains = Some(Ok(toolchains));
        self
    }

    #[must_use]
    pub fn with_emitter(mut self, emitter: LogEmitter) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Do not print the run log banner when it is opened.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.announce_run_log = false;
        self
    }

    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Reference toolchains, discovered on first call.
    ///
    /// Without configured roots the runtime at the primary JDK root is used.
    pub fn toolchains(&mut self) -> Result<Vec<ToolchainVersion>, Arc<ToolchainError>> {
        if let Some(cached) = &self.toolchains {
            return cached.clone();
        }
        let found = self.discover().map_err(Arc::new);
        self.toolchains = Some(found.clone());
        found
    }

    fn discover(&self) -> Result<Vec<ToolchainVersion>, ToolchainError> {
        let locator = Locator::new()
            .with_policy(self.config.minor_policy)
            .with_timeout(self.config.process_timeout);
        let roots = self.config.reference_roots();
        if !self.config.jdk_roots.is_empty() {
            locator.discover(&roots)
        } else if let Some(root) = &self.config.jdk_root {
            match locator.locate(root) {
                Ok(toolchain) => Ok(vec![toolchain]),
                Err(ToolchainError::MissingExecutable { .. }) => {
                    Ok(vec![locator.current_runtime(root)?])
                }
                Err(e) => Err(e),
            }
        } else {
            Err(ToolchainError::NoRoot)
        }
    }

    /// The `java` of `toolchain`, shared across scenarios.
    #[must_use]
    pub fn runtime(&self, toolchain: &ToolchainVersion) -> Arc<ReferenceRuntime> {
        self.runtimes
            .get_or_insert(toolchain, self.config.process_timeout)
    }

    /// Open the run log if needed; failures are reported and the run continues without it.
    pub fn ensure_run_log(&mut self, raw_version: &str) -> Option<&RunLog> {
        if self.run_log.is_none() {
            let dir = self.config.output_root.clone();
            let created = if self.announce_run_log {
                RunLog::create(&dir, raw_version)
            } else {
                RunLog::create_quiet(&dir, raw_version)
            };
            match created {
                Ok(log) => self.run_log = Some(log),
                Err(e) => eprintln!("cannot create run log in {}: {e}", dir.display()),
            }
        }
        self.run_log.as_ref()
    }

    #[must_use]
    pub fn run_log(&self) -> Option<&RunLog> {
        self.run_log.as_ref()
    }

    #[must_use]
    pub fn run_log_path(&self) -> Option<PathBuf> {
        self.run_log.as_ref().map(|log| log.path().to_path_buf())
    }

    /// Record one reference compilation; returns whether any compilation of `test` failed.
    pub fn note_reference_result(&mut self, test: &str, failed: bool) -> bool {
        let flag = &mut self.reference_error;
        if flag.test_name.as_deref() != Some(test) {
            flag.test_name = Some(test.to_string());
            flag.failed = false;
        }
        flag.failed |= failed;
        flag.failed
    }

    pub fn begin_suite(&mut self, name: &str, total: usize) {
        self.suite = SuiteProgress {
            name: name.to_string(),
            total,
            finished: 0,
            counters: DiffCounters::default(),
        };
    }

    #[must_use]
    pub fn suite_name(&self) -> &str {
        &self.suite.name
    }

    #[must_use]
    pub fn counters(&self) -> DiffCounters {
        self.suite.counters
    }

    pub fn record_divergence(&mut self, kind: MismatchKind) {
        self.suite.counters.record(kind);
    }

    /// Mark one test done; the last one of the suite prints the summary.
    pub fn finish_test(&mut self) {
        self.suite.finished += 1;
        if self.suite.finished != self.suite.total {
            return;
        }
        if let Some(log) = &self.run_log {
            log.print_summary(&self.suite.counters);
        }
        if let Some(emitter) = &mut self.emitter
            && let Err(e) = emitter.flush()
        {
            eprintln!("structured log flush failed: {e}");
        }
    }

    /// Forward to the structured log, if one is attached.
    pub fn emit(&mut self, entry: LogEntry) {
        let suite = self.suite.name.clone();
        if let Some(emitter) = &mut self.emitter {
            let entry = if suite.is_empty() { entry } else { entry.with_suite(suite) };
            if let Err(e) = emitter.emit_entry(entry) {
                eprintln!("structured log write failed: {e}");
            }
        }
    }
}
