//! Cumulative human-readable log of reference comparisons.
//!
//! One file per process run, `<rawVersion>_<yyyymmdd_HHMMSS>.txt`, whose first
//! line is the reference version. Every comparison appends to it; suite summaries
//! go to both stdout and the file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;

use crate::mismatch::{DiffCategory, MismatchKind};
use crate::structured_log::UtcTime;

const TEST_SEPARATOR: &str =
    "-----------------------------------------------------------------";
const SUMMARY_SEPARATOR: &str =
    "===========================================================================";

/// Per-suite tallies of divergences by which side was stricter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffCounters {
    pub reference_stricter: u32,
    pub under_test_stricter: u32,
    pub output_differs: u32,
}

impl DiffCounters {
    /// Count `kind` in its category; kinds without one are ignored.
    pub fn record(&mut self, kind: MismatchKind) {
        match kind.category() {
            Some(DiffCategory::ReferenceStricter) => self.reference_stricter += 1,
            Some(DiffCategory::UnderTestStricter) => self.under_test_stricter += 1,
            Some(DiffCategory::OutputDiffers) => self.output_differs += 1,
            None => {}
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Summary lines, empty when nothing diverged.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        if self.is_zero() {
            return Vec::new();
        }
        let mut lines = vec![SUMMARY_SEPARATOR.to_string(), "Results summary:".to_string()];
        if self.reference_stricter != 0 {
            lines.push(format!(
                "\t- {} test(s) where the reference compiler found errors/warnings but the compiler under test did not",
                self.reference_stricter
            ));
        }
        if self.under_test_stricter != 0 {
            lines.push(format!(
                "\t- {} test(s) where the compiler under test found errors/warnings but the reference compiler did not",
                self.under_test_stricter
            ));
        }
        if self.output_differs != 0 {
            lines.push(format!(
                "\t- {} test(s) where the compiler under test and the reference compiler did not have same output",
                self.output_differs
            ));
        }
        lines
    }
}

#[derive(Debug)]
struct RunLogState {
    writer: BufWriter<File>,
    current_test: Option<String>,
}

#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    state: Mutex<RunLogState>,
}

/// `<raw with spaces as underscores>_<yyyymmdd_HHMMSS>.txt`
#[must_use]
pub fn log_file_name(raw_version: &str, at: &UtcTime) -> String {
    format!("{}_{}.txt", raw_version.replace(' ', "_"), at.compact())
}

impl RunLog {
    /// Create the log in `dir` and announce where it lives.
    pub fn create(dir: &Path, raw_version: &str) -> std::io::Result<Self> {
        let log = Self::create_quiet(dir, raw_version)?;
        println!(
            "***************************************************************************\n\
             * Reference javac output archived into file:\n\
             * {}\n\
             ***************************************************************************",
            log.path.display()
        );
        Ok(log)
    }

    pub(crate) fn create_quiet(dir: &Path, raw_version: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(log_file_name(raw_version, &UtcTime::now()));
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{raw_version}")?;
        Ok(Self {
            path,
            state: Mutex::new(RunLogState {
                writer,
                current_test: None,
            }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) {
        let mut state = self.state.lock();
        if let Err(e) = writeln!(state.writer, "{line}") {
            eprintln!("run log {}: {e}", self.path.display());
        }
    }

    /// Print to stdout and append to the file.
    pub fn dual_println(&self, line: &str) {
        println!("{line}");
        self.write_line(line);
    }

    /// Start a test section unless `test` is already the current one.
    pub fn record_test(&self, suite: &str, test: &str) {
        let mut state = self.state.lock();
        if state.current_test.as_deref() == Some(test) {
            return;
        }
        state.current_test = Some(test.to_string());
        if let Err(e) = writeln!(state.writer, "{TEST_SEPARATOR}\n{suite} {test}") {
            eprintln!("run log {}: {e}", self.path.display());
        }
    }

    /// Raw output of one reference compilation.
    pub fn record_compiler_output(&self, stderr: &str, stdout: &str) {
        self.write_line(&format!("--- javac err: ---\n{stderr}\n--- javac out: ---\n{stdout}"));
    }

    pub fn record_mismatch(&self, message: &str) {
        self.write_line(&format!("JAVAC_MISMATCH: {message}"));
    }

    pub fn record_warning(&self, message: &str) {
        self.write_line(&format!("JAVAC_WARNING: {message}"));
    }

    pub fn record_error(&self, message: &str) {
        self.write_line(&format!("JAVAC_ERROR: {message}"));
    }

    /// Print the suite summary and where the full log lives.
    pub fn print_summary(&self, counters: &DiffCounters) {
        for line in counters.summary_lines() {
            self.dual_println(&line);
        }
        self.flush();
        println!("\n\nFull results sent to {}", self.path.display());
    }

    pub fn flush(&self) {
        if let Err(e) = self.state.lock().writer.flush() {
            eprintln!("run log {}: {e}", self.path.display());
        }
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        self.flush();
    }
}
