//! Reference compiler and runtime invocations.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::process::{Invocation, ProcessError, ProcessOutcome, tokenize};
use crate::version::ToolchainVersion;

/// Result of one reference compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutcome {
    pub exit_code: Option<i32>,
    /// Diagnostics, as printed by javac on stderr.
    pub log: String,
    pub stdout: String,
}

impl CompileOutcome {
    #[must_use]
    pub fn failed(&self) -> bool {
        self.exit_code != Some(0)
    }

    #[must_use]
    pub fn has_log(&self) -> bool {
        !self.log.is_empty()
    }
}

impl From<ProcessOutcome> for CompileOutcome {
    fn from(outcome: ProcessOutcome) -> Self {
        Self {
            exit_code: outcome.exit_code,
            log: outcome.stderr,
            stdout: outcome.stdout,
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<(), ProcessError> {
    std::fs::create_dir_all(dir).map_err(|source| ProcessError::WorkDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// `javac` of one reference toolchain.
#[derive(Debug, Clone)]
pub struct ReferenceCompiler {
    toolchain: ToolchainVersion,
    timeout: Option<Duration>,
}

impl ReferenceCompiler {
    #[must_use]
    pub fn new(toolchain: ToolchainVersion) -> Self {
        Self {
            toolchain,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn toolchain(&self) -> &ToolchainVersion {
        &self.toolchain
    }

    /// `javac -classpath . <options> <sources>`, run inside `dir`.
    #[must_use]
    pub fn invocation(&self, dir: &Path, options: &str, sources: &[String]) -> Invocation {
        Invocation::new(self.toolchain.javac_path())
            .with_args(["-classpath", "."])
            .with_args(tokenize(options))
            .with_args(sources.iter().cloned())
            .with_work_dir(dir)
            .with_timeout(self.timeout)
    }

    /// Compile `sources` (paths relative to `dir`), creating `dir` if needed.
    pub fn compile(
        &self,
        dir: &Path,
        options: &str,
        sources: &[String],
    ) -> Result<CompileOutcome, ProcessError> {
        ensure_dir(dir)?;
        self.invocation(dir, options, sources)
            .run()
            .map(CompileOutcome::from)
    }

    /// True when the compilation exits with 0 and prints nothing on stderr.
    pub fn compile_clean(
        &self,
        dir: &Path,
        options: &str,
        sources: &[String],
    ) -> Result<bool, ProcessError> {
        let outcome = self.compile(dir, options, sources)?;
        Ok(!outcome.failed() && !outcome.has_log())
    }
}

/// `java` of one reference toolchain.
#[derive(Debug, Clone)]
pub struct ReferenceRuntime {
    toolchain: ToolchainVersion,
    timeout: Option<Duration>,
}

impl ReferenceRuntime {
    #[must_use]
    pub fn new(toolchain: ToolchainVersion) -> Self {
        Self {
            toolchain,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn toolchain(&self) -> &ToolchainVersion {
        &self.toolchain
    }

    /// `java [-classpath .] <options> <class>`; the default classpath is omitted when
    /// `options` already carries `-cp `.
    #[must_use]
    pub fn invocation(&self, dir: &Path, options: &str, class_name: &str) -> Invocation {
        let mut invocation = Invocation::new(self.toolchain.java_path());
        if !options.contains("-cp ") {
            invocation = invocation.with_args(["-classpath", "."]);
        }
        invocation
            .with_args(tokenize(options))
            .with_arg(class_name)
            .with_work_dir(dir)
            .with_timeout(self.timeout)
    }

    pub fn execute(
        &self,
        dir: &Path,
        options: &str,
        class_name: &str,
    ) -> Result<ProcessOutcome, ProcessError> {
        ensure_dir(dir)?;
        self.invocation(dir, options, class_name).run()
    }
}

/// Runtimes keyed by raw toolchain version, created on first use.
#[derive(Debug, Default)]
pub struct RuntimeCache {
    runtimes: Mutex<HashMap<String, Arc<ReferenceRuntime>>>,
}

impl RuntimeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert(
        &self,
        toolchain: &ToolchainVersion,
        timeout: Option<Duration>,
    ) -> Arc<ReferenceRuntime> {
        let mut runtimes = self.runtimes.lock();
        Arc::clone(
            runtimes
                .entry(toolchain.raw_version.clone())
                .or_insert_with(|| {
                    Arc::new(ReferenceRuntime::new(toolchain.clone()).with_timeout(timeout))
                }),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.runtimes.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runtimes.lock().is_empty()
    }
}
