//! Reference toolchain plumbing for javadiff.
//!
//! This crate provides:
//! - Version normalization: map `javac -version` strings onto an ordered release + minor
//! - Toolchain discovery: locate JDK roots and probe their versions
//! - Subprocess capture: run external tools while draining stdout/stderr concurrently
//! - Reference invocation: `javac`/`java` command lines as the harness issues them

pub mod error;
pub mod locator;
pub mod process;
pub mod reference;
pub mod version;

pub use error::ToolchainError;
pub use locator::{Locator, discover, locate};
pub use process::{Invocation, ProcessError, ProcessOutcome};
pub use reference::{CompileOutcome, ReferenceCompiler, ReferenceRuntime, RuntimeCache};
pub use version::{JavaRelease, MINOR_UNKNOWN, MinorPolicy, ToolchainVersion, normalize};
