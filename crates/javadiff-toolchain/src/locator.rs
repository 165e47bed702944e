//! Reference JDK discovery.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ToolchainError;
use crate::process::Invocation;
use crate::version::{MinorPolicy, ToolchainVersion};

pub const JAVAC_NAME: &str = if cfg!(windows) { "javac.exe" } else { "javac" };
pub const JAVA_NAME: &str = if cfg!(windows) { "java.exe" } else { "java" };

#[must_use]
pub fn javac_path(root: &Path) -> PathBuf {
    root.join("bin").join(JAVAC_NAME)
}

#[must_use]
pub fn java_path(root: &Path) -> PathBuf {
    root.join("bin").join(JAVA_NAME)
}

/// Probes JDK roots and normalizes what they report.
#[derive(Debug, Clone, Copy, Default)]
pub struct Locator {
    policy: MinorPolicy,
    timeout: Option<Duration>,
}

impl Locator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(mut self, policy: MinorPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `<javac> -version` and return the reported version without the `javac ` prefix.
    ///
    /// javac 1.x prints the banner on stderr, later releases on stdout.
    pub fn probe_version(&self, javac: &Path) -> Result<String, ToolchainError> {
        if !javac.is_file() {
            return Err(ToolchainError::MissingExecutable {
                tool: "javac",
                path: javac.to_path_buf(),
            });
        }
        let outcome = Invocation::new(javac)
            .with_arg("-version")
            .with_timeout(self.timeout)
            .run()
            .map_err(|source| ToolchainError::Probe {
                path: javac.to_path_buf(),
                source,
            })?;
        let banner = if outcome.stderr.trim().is_empty() {
            &outcome.stdout
        } else {
            &outcome.stderr
        };
        let first = banner.lines().next().unwrap_or_default();
        let raw = first.strip_prefix("javac ").unwrap_or(first).trim();
        if raw.is_empty() {
            return Err(ToolchainError::EmptyVersion {
                path: javac.to_path_buf(),
            });
        }
        Ok(raw.to_string())
    }

    /// Describe the JDK installed at `root`.
    pub fn locate(&self, root: &Path) -> Result<ToolchainVersion, ToolchainError> {
        let raw = self.probe_version(&javac_path(root))?;
        ToolchainVersion::new(root, raw, self.policy)
    }

    /// Describe every root, in the order given. Duplicate roots are probed once.
    pub fn discover(&self, roots: &[PathBuf]) -> Result<Vec<ToolchainVersion>, ToolchainError> {
        if roots.is_empty() {
            return Err(ToolchainError::NoRoot);
        }
        let mut found: Vec<ToolchainVersion> = Vec::with_capacity(roots.len());
        for root in roots {
            if found.iter().any(|tc| &tc.root == root) {
                continue;
            }
            found.push(self.locate(root)?);
        }
        Ok(found)
    }

    /// Describe the runtime at `java_home` through `java -version`.
    ///
    /// Used when no javac is configured: the harness then compares against the
    /// runtime it was started from.
    pub fn current_runtime(&self, java_home: &Path) -> Result<ToolchainVersion, ToolchainError> {
        let java = java_path(java_home);
        if !java.is_file() {
            return Err(ToolchainError::MissingExecutable {
                tool: "java",
                path: java,
            });
        }
        let outcome = Invocation::new(&java)
            .with_arg("-version")
            .with_timeout(self.timeout)
            .run()
            .map_err(|source| ToolchainError::Probe {
                path: java.clone(),
                source,
            })?;
        let raw = quoted_version(&outcome.stderr)
            .or_else(|| quoted_version(&outcome.stdout))
            .ok_or(ToolchainError::EmptyVersion { path: java })?;
        ToolchainVersion::new(java_home, raw, self.policy)
    }
}

/// Extract `11.0.2` from `openjdk version "11.0.2" 2019-01-15`.
fn quoted_version(banner: &str) -> Option<String> {
    let line = banner.lines().find(|line| line.contains("version"))?;
    let start = line.find('"')? + 1;
    let len = line[start..].find('"')?;
    let raw = &line[start..start + len];
    (!raw.is_empty()).then(|| raw.to_string())
}

/// [`Locator::locate`] with the strict policy and no timeout.
pub fn locate(root: &Path) -> Result<ToolchainVersion, ToolchainError> {
    Locator::new().locate(root)
}

/// [`Locator::discover`] with the strict policy and no timeout.
pub fn discover(roots: &[PathBuf]) -> Result<Vec<ToolchainVersion>, ToolchainError> {
    Locator::new().discover(roots)
}
