//! Test scenarios: sources, options and expected outcomes.

use std::collections::BTreeMap;

use javadiff_toolchain::{JavaRelease, ToolchainVersion};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::compiler::{CustomSink, DiagnosticSink, SourceUnit};
use crate::error::ScenarioFailure;
use crate::problem_log::normalize_line_delimiters;

const PACKAGE_INFO_NAME: &str = "package-info";
const MODULE_INFO_NAME: &str = "module-info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Compiles cleanly and runs.
    #[default]
    Conform,
    /// Reports problems; errors unless the log says otherwise.
    Negative,
    /// Compiles with warnings only.
    Warning,
}

/// How a scenario is compared against reference toolchains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReferenceOptions {
    Skip,
    Compare {
        /// Extra reference compiler options.
        #[serde(default)]
        options: String,
        /// Toolchains older than this are not compared.
        #[serde(default)]
        min_compliance: Option<JavaRelease>,
    },
    /// A known divergence from the excuse catalog; the excuse also supplies the options.
    Excuse { name: String },
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self::Compare {
            options: String::new(),
            min_compliance: None,
        }
    }
}

impl ReferenceOptions {
    #[must_use]
    pub fn with_options(options: impl Into<String>) -> Self {
        Self::Compare {
            options: options.into(),
            min_compliance: None,
        }
    }

    #[must_use]
    pub fn since(release: JavaRelease) -> Self {
        Self::Compare {
            options: String::new(),
            min_compliance: Some(release),
        }
    }

    #[must_use]
    pub fn excuse(name: impl Into<String>) -> Self {
        Self::Excuse { name: name.into() }
    }

    /// True when `toolchain` must not be compared at all.
    #[must_use]
    pub fn skips(&self, toolchain: &ToolchainVersion) -> bool {
        match self {
            Self::Skip => true,
            Self::Compare {
                min_compliance: Some(min),
                ..
            } => toolchain.release < *min,
            Self::Compare { .. } | Self::Excuse { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub kind: ScenarioKind,
    /// Alternating file name / contents.
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependent_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_libraries: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub libs_on_module_path: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
    /// `None` skips the problem log check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_log: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_stderr: Option<String>,
    /// Overrides `expected_stdout` for reference runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_reference_stdout: Option<String>,
    #[serde(default)]
    pub force_execution: bool,
    #[serde(default)]
    pub statement_recovery: bool,
    #[serde(default)]
    pub flush_output: bool,
    #[serde(default)]
    pub swallow_capture_ids: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_arguments: Option<Vec<String>>,
    /// Overrides the error expectation derived from `kind` and the log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_errors: Option<bool>,
    #[serde(default)]
    pub reference: ReferenceOptions,
    #[serde(skip)]
    pub sink: Option<CustomSink>,
}

fn chunk_units(files: &[String]) -> Vec<SourceUnit<'_>> {
    files
        .chunks_exact(2)
        .map(|pair| SourceUnit {
            file_name: &pair[0],
            contents: &pair[1],
        })
        .collect()
}

impl TestScenario {
    #[must_use]
    pub fn conform(name: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            name: name.into(),
            files,
            ..Self::default()
        }
    }

    /// Negative scenarios flush the output directory first.
    #[must_use]
    pub fn negative(name: impl Into<String>, files: Vec<String>, expected_log: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ScenarioKind::Negative,
            files,
            expected_log: Some(expected_log.into()),
            flush_output: true,
            ..Self::default()
        }
    }

    /// Negative scenario accepting any one of `logs`.
    #[must_use]
    pub fn negative_multi(name: impl Into<String>, files: Vec<String>, logs: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: ScenarioKind::Negative,
            files,
            alternative_logs: logs,
            flush_output: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn warning(name: impl Into<String>, files: Vec<String>, expected_log: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ScenarioKind::Warning,
            files,
            expected_log: Some(expected_log.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_expected_log(mut self, log: impl Into<String>) -> Self {
        self.expected_log = Some(log.into());
        self
    }

    #[must_use]
    pub fn with_expected_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.expected_stdout = Some(stdout.into());
        self
    }

    #[must_use]
    pub fn with_expected_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.expected_stderr = Some(stderr.into());
        self
    }

    #[must_use]
    pub fn with_expected_reference_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.expected_reference_stdout = Some(stdout.into());
        self
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_dependent_files(mut self, files: Vec<String>) -> Self {
        self.dependent_files = files;
        self
    }

    #[must_use]
    pub fn with_class_libraries(mut self, libs: Vec<String>, on_module_path: bool) -> Self {
        self.class_libraries = libs;
        self.libs_on_module_path = on_module_path;
        self
    }

    #[must_use]
    pub fn with_vm_arguments(mut self, args: Vec<String>) -> Self {
        self.vm_arguments = Some(args);
        self
    }

    #[must_use]
    pub fn with_reference(mut self, reference: ReferenceOptions) -> Self {
        self.reference = reference;
        self
    }

    #[must_use]
    pub fn with_expect_errors(mut self, expect: bool) -> Self {
        self.expect_errors = Some(expect);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: impl DiagnosticSink + Send + 'static) -> Self {
        self.sink = Some(CustomSink::new(sink));
        self
    }

    #[must_use]
    pub fn forcing_execution(mut self) -> Self {
        self.force_execution = true;
        self
    }

    #[must_use]
    pub fn flushing_output(mut self, flush: bool) -> Self {
        self.flush_output = flush;
        self
    }

    #[must_use]
    pub fn swallowing_capture_ids(mut self) -> Self {
        self.swallow_capture_ids = true;
        self
    }

    #[must_use]
    pub fn with_statement_recovery(mut self) -> Self {
        self.statement_recovery = true;
        self
    }

    /// File lists must alternate name and contents.
    pub fn validate(&self) -> Result<(), ScenarioFailure> {
        for files in [&self.files, &self.dependent_files] {
            if files.len() % 2 != 0 {
                return Err(ScenarioFailure::MalformedFixture {
                    scenario: self.name.clone(),
                    count: files.len(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn units(&self) -> Vec<SourceUnit<'_>> {
        chunk_units(&self.files)
    }

    #[must_use]
    pub fn dependent_units(&self) -> Vec<SourceUnit<'_>> {
        chunk_units(&self.dependent_files)
    }

    #[must_use]
    pub fn source_file_names(&self) -> Vec<String> {
        self.units()
            .iter()
            .map(|unit| unit.file_name.to_string())
            .collect()
    }

    #[must_use]
    pub fn primary_file(&self) -> Option<&str> {
        self.files.first().map(String::as_str)
    }

    /// First file without its extension, path separators as dots.
    #[must_use]
    pub fn primary_class_name(&self) -> Option<String> {
        self.reference_class_name()
            .map(|name| name.replace(['/', '\\'], "."))
    }

    /// First file without its extension, path kept as written.
    #[must_use]
    pub fn reference_class_name(&self) -> Option<String> {
        let file = self.primary_file()?;
        let end = file.rfind('.').unwrap_or(file.len());
        Some(file[..end].to_string())
    }

    /// Simple name of the primary class, used to find its generated files.
    #[must_use]
    pub fn primary_stem(&self) -> Option<String> {
        let name = self.reference_class_name()?;
        let stem = name.rsplit(['/', '\\']).next().unwrap_or(&name);
        Some(stem.to_string())
    }

    /// `package-info` and `module-info` units are never executed.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.reference_class_name().is_some_and(|name| {
            !name.ends_with(PACKAGE_INFO_NAME) && !name.ends_with(MODULE_INFO_NAME)
        })
    }

    #[must_use]
    pub fn expects_errors(&self) -> bool {
        if let Some(explicit) = self.expect_errors {
            return explicit;
        }
        match self.kind {
            ScenarioKind::Conform | ScenarioKind::Warning => false,
            ScenarioKind::Negative => match &self.expected_log {
                Some(log) => log.contains("ERROR"),
                None => true,
            },
        }
    }

    /// Candidate logs with normalized line delimiters; empty when the log is unchecked.
    #[must_use]
    pub fn expected_logs(&self) -> Vec<String> {
        match &self.expected_log {
            Some(log) => vec![normalize_line_delimiters(log)],
            None => self
                .alternative_logs
                .iter()
                .map(|log| normalize_line_delimiters(log))
                .collect(),
        }
    }

    #[must_use]
    pub fn reference_stdout(&self) -> Option<&str> {
        self.expected_reference_stdout
            .as_deref()
            .or(self.expected_stdout.as_deref())
    }

    /// Hex SHA-256 over the name and every file.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        for file in self.files.iter().chain(&self.dependent_files) {
            hasher.update([0u8]);
            hasher.update(file.as_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}
