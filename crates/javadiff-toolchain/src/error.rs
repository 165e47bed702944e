//! Errors raised while locating and probing reference toolchains.

use std::path::PathBuf;

use thiserror::Error;

use crate::process::ProcessError;
use crate::version::JavaRelease;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("unknown javac version: {raw}")]
    UnknownVersion { raw: String },
    #[error("unknown raw javac version: {raw} (release {release})")]
    UnknownRawVersion { release: JavaRelease, raw: String },
    #[error("no {tool} executable at {}", path.display())]
    MissingExecutable { tool: &'static str, path: PathBuf },
    #[error("could not read a version from {}", path.display())]
    EmptyVersion { path: PathBuf },
    #[error("version probe of {} failed: {source}", path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: ProcessError,
    },
    #[error("no JDK root configured (set JAVADIFF_JDK_ROOT or JAVA_HOME)")]
    NoRoot,
}
