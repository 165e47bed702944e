//! Harness configuration, read once from the environment.

use std::path::PathBuf;
use std::time::Duration;

use javadiff_toolchain::{JavaRelease, MinorPolicy};
use thiserror::Error;

pub const RUN_REFERENCE_VAR: &str = "JAVADIFF_RUN_REFERENCE";
pub const JDK_ROOT_VAR: &str = "JAVADIFF_JDK_ROOT";
pub const JDK_ROOTS_VAR: &str = "JAVADIFF_JDK_ROOTS";
pub const OUTPUT_DIR_VAR: &str = "JAVADIFF_OUTPUT_DIR";
pub const TIMEOUT_VAR: &str = "JAVADIFF_PROCESS_TIMEOUT_SECS";
pub const LENIENT_VAR: &str = "JAVADIFF_LENIENT_VERSIONS";
pub const COMPLIANCE_VAR: &str = "JAVADIFF_COMPLIANCE";
pub const STRUCTURED_LOG_VAR: &str = "JAVADIFF_STRUCTURED_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JAVADIFF_PROCESS_TIMEOUT_SECS: expected whole seconds, got '{value}'")]
    InvalidTimeout { value: String },
    #[error("JAVADIFF_COMPLIANCE: unknown compliance level '{value}'")]
    InvalidCompliance { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Compare against reference toolchains at all.
    pub run_reference: bool,
    /// Primary JDK; also the fallback runtime when no roots are listed.
    pub jdk_root: Option<PathBuf>,
    pub jdk_roots: Vec<PathBuf>,
    pub output_root: PathBuf,
    pub process_timeout: Option<Duration>,
    pub minor_policy: MinorPolicy,
    /// Compliance of the compiler under test; only toolchains of this release are compared.
    pub compliance: JavaRelease,
    pub structured_log: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            run_reference: false,
            jdk_root: None,
            jdk_roots: Vec::new(),
            output_root: std::env::temp_dir().join("javadiff"),
            process_timeout: None,
            minor_policy: MinorPolicy::Strict,
            compliance: JavaRelease::V1_8,
            structured_log: None,
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        config.run_reference = get(RUN_REFERENCE_VAR).is_some_and(|v| v.trim() == "enabled");
        config.jdk_root = get(JDK_ROOT_VAR)
            .or_else(|| get("JAVA_HOME"))
            .map(PathBuf::from);
        if let Some(roots) = get(JDK_ROOTS_VAR) {
            config.jdk_roots = std::env::split_paths(&roots)
                .filter(|root| !root.as_os_str().is_empty())
                .collect();
        }
        if let Some(dir) = get(OUTPUT_DIR_VAR) {
            config.output_root = PathBuf::from(dir);
        }
        if let Some(value) = get(TIMEOUT_VAR) {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout { value: value.clone() })?;
            config.process_timeout = Some(Duration::from_secs(secs));
        }
        if get(LENIENT_VAR).is_some_and(|v| v.trim().eq_ignore_ascii_case("true")) {
            config.minor_policy = MinorPolicy::Lenient;
        }
        if let Some(value) = get(COMPLIANCE_VAR) {
            config.compliance = JavaRelease::parse_compliance(&value)
                .ok_or(ConfigError::InvalidCompliance { value })?;
        }
        config.structured_log = get(STRUCTURED_LOG_VAR).map(PathBuf::from);
        Ok(config)
    }

    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Roots to compare against: the explicit list, else the primary root.
    #[must_use]
    pub fn reference_roots(&self) -> Vec<PathBuf> {
        if self.jdk_roots.is_empty() {
            self.jdk_root.iter().cloned().collect()
        } else {
            self.jdk_roots.clone()
        }
    }

    /// Output of the compiler under test; first classpath entry of executions.
    #[must_use]
    pub fn regression_dir(&self) -> PathBuf {
        self.output_root.join("regression")
    }

    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.output_root.join("source")
    }

    #[must_use]
    pub fn eval_dir(&self) -> PathBuf {
        self.output_root.join("eval")
    }

    #[must_use]
    pub fn lib_dir(&self) -> PathBuf {
        self.output_root.join("lib")
    }

    /// Per-toolchain reference workspace, `javac/<raw>`.
    #[must_use]
    pub fn javac_dir(&self, raw_version: &str) -> PathBuf {
        self.output_root.join("javac").join(raw_version)
    }

    /// True when `lib` lives inside the primary JDK and is implicitly visible.
    #[must_use]
    pub fn is_jdk_library(&self, lib: &str) -> bool {
        self.jdk_root
            .as_deref()
            .is_some_and(|root| lib.starts_with(&*root.to_string_lossy()))
    }
}
