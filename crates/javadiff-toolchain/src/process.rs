//! Subprocess launch and output capture.
//!
//! Both pipes are drained by dedicated reader threads started before the wait, so a
//! child that fills one pipe while the other is unread cannot deadlock the harness.
//! Readers are joined only after the child has exited. The child is killed on every
//! exit path by [`ChildGuard`].

use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

/// Variables removed from every child environment; they make the JVM print banners
/// on stderr that would pollute compiler logs.
pub const SCRUBBED_ENV_VARS: &[&str] = &["JAVA_TOOL_OPTIONS", "_JAVA_OPTIONS"];

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty command line")]
    EmptyCommand,
    #[error("cannot prepare working directory {}: {source}", path.display())]
    WorkDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} timed out after {after:?}")]
    TimedOut { program: String, after: Duration },
}

impl ProcessError {
    /// True when the process started but did not run to completion.
    ///
    /// Everything else means the process never launched.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Wait { .. } | Self::TimedOut { .. })
    }
}

/// Split a command-line fragment on whitespace.
///
/// Double quotes are dropped outside Windows, where the launcher would otherwise
/// hand them verbatim to the tool.
#[must_use]
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace()
        .map(|token| {
            if cfg!(windows) {
                token.to_string()
            } else {
                token.replace('"', "")
            }
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// A fully described subprocess launch.
#[derive(Debug, Clone)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    work_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: None,
            env: Vec::new(),
            timeout: None,
        }
    }

    /// Build an invocation from a single command line string.
    pub fn from_command_line(line: &str) -> Result<Self, ProcessError> {
        let mut tokens = tokenize(line).into_iter();
        let program = tokens.next().ok_or(ProcessError::EmptyCommand)?;
        Ok(Self::new(program).with_args(tokens))
    }

    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Human readable command line, for logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Launch, capture both streams, and wait.
    pub fn run(&self) -> Result<ProcessOutcome, ProcessError> {
        run(self)
    }
}

/// Append-only text buffer shared between a reader thread and the caller.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<String>>);

impl CaptureBuffer {
    /// Append one line, always terminated by `\n`.
    pub fn push_line(&self, line: &str) {
        let mut buf = self.0.lock();
        buf.push_str(line);
        buf.push('\n');
    }

    #[must_use]
    pub fn snapshot(&self) -> String {
        self.0.lock().clone()
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    #[must_use]
    pub fn stderr_nonempty(&self) -> bool {
        !self.stderr.is_empty()
    }
}

/// Kills and reaps the child when dropped.
struct ChildGuard {
    child: Child,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Launch `invocation`, drain stdout and stderr concurrently, and wait for exit.
pub fn run(invocation: &Invocation) -> Result<ProcessOutcome, ProcessError> {
    let program = invocation.program.display().to_string();

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for var in SCRUBBED_ENV_VARS {
        command.env_remove(var);
    }
    for (key, value) in &invocation.env {
        command.env(key, value);
    }
    if let Some(dir) = &invocation.work_dir {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;
    let mut guard = ChildGuard { child };

    let stdout = CaptureBuffer::default();
    let stderr = CaptureBuffer::default();
    let readers: Vec<JoinHandle<()>> = [
        guard
            .child
            .stdout
            .take()
            .map(|pipe| spawn_reader("stdout", pipe, stdout.clone())),
        guard
            .child
            .stderr
            .take()
            .map(|pipe| spawn_reader("stderr", pipe, stderr.clone())),
    ]
    .into_iter()
    .flatten()
    .collect();

    let status = wait_for(&mut guard.child, invocation.timeout, &program)?;

    for reader in readers {
        if reader.join().is_err() {
            eprintln!("[javadiff] output reader for {program} panicked");
        }
    }

    Ok(ProcessOutcome {
        exit_code: status.code(),
        stdout: stdout.snapshot(),
        stderr: stderr.snapshot(),
    })
}

fn wait_for(
    child: &mut Child,
    timeout: Option<Duration>,
    program: &str,
) -> Result<ExitStatus, ProcessError> {
    let wait_error = |source| ProcessError::Wait {
        program: program.to_string(),
        source,
    };

    let Some(limit) = timeout else {
        return child.wait().map_err(wait_error);
    };

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(wait_error)? {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProcessError::TimedOut {
                program: program.to_string(),
                after: limit,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R>(stream: &'static str, pipe: R, sink: CaptureBuffer) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    sink.push_line(text.trim_end_matches(['\n', '\r']));
                }
                Err(err) => {
                    eprintln!("[javadiff] error reading {stream}: {err}");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_whitespace() {
        assert_eq!(
            tokenize("  -d .\t-Xlint  -implicit:none "),
            vec!["-d", ".", "-Xlint", "-implicit:none"]
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn tokenize_strips_double_quotes() {
        assert_eq!(tokenize("-cp \"lib.jar\""), vec!["-cp", "lib.jar"]);
        assert!(tokenize("\"\"").is_empty());
    }

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(matches!(
            Invocation::from_command_line("   "),
            Err(ProcessError::EmptyCommand)
        ));
    }

    #[test]
    fn command_line_round_trips_program_and_args() {
        let inv = Invocation::from_command_line("javac -version").unwrap();
        assert_eq!(inv.program(), Path::new("javac"));
        assert_eq!(inv.args(), ["-version"]);
        assert_eq!(inv.command_line(), "javac -version");
    }

    #[test]
    fn capture_buffer_terminates_every_line() {
        let buf = CaptureBuffer::default();
        buf.push_line("a");
        buf.clone().push_line("");
        assert_eq!(buf.snapshot(), "a\n\n");
    }

    #[test]
    fn missing_program_is_a_launch_failure() {
        let err = Invocation::new("/nonexistent/javadiff/javac")
            .run()
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
        assert!(!err.is_aborted());
    }

    #[cfg(unix)]
    #[test]
    fn captures_both_streams_and_exit_code() {
        let outcome = Invocation::new("/bin/sh")
            .with_args(["-c", "echo out; echo err 1>&2; exit 3"])
            .run()
            .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
        assert!(outcome.stderr_nonempty());
        assert!(!outcome.success());
    }

    #[cfg(unix)]
    #[test]
    fn carriage_returns_are_normalized() {
        let outcome = Invocation::new("/bin/sh")
            .with_args(["-c", "printf 'a\\r\\nb'"])
            .run()
            .unwrap();
        assert_eq!(outcome.stdout, "a\nb\n");
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_the_child() {
        let err = Invocation::new("/bin/sh")
            .with_args(["-c", "sleep 5"])
            .with_timeout(Some(Duration::from_millis(100)))
            .run()
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
        assert!(err.is_aborted());
    }
}
