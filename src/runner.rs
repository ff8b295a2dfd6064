//! External tool execution.
//!
//! Every process the pipeline starts (extraction, checkout, build steps) goes
//! through a [`CommandRunner`], so tests can substitute a recording fake for
//! [`SystemRunner`].

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::errors::{BootstrapError, Result};

/// One process to run: program, arguments, working directory and extra
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new<S: Into<String>>(program: S, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    /// Shell-quoted command line, for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| shell_escape::escape(part.as_str().into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `-1` when the process was terminated by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs one invocation to completion.
pub trait CommandRunner {
    /// Starts the process, waits for it and reports its exit status.
    ///
    /// A non-zero exit status is not an error at this level; callers decide
    /// which statuses they tolerate. Failing to start the process is.
    fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<CommandOutput>> + Send;
}

/// Runs invocations as real child processes, streaming their output into the
/// log line by line.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let spawn_error = |source: std::io::Error| BootstrapError::Spawn {
            command: invocation.display(),
            source,
        };

        let program = resolve_program(&invocation.program);
        trace!("Resolved {} to {}", invocation.program, program.display());

        let mut child = Command::new(&program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, stdout, stderr) = tokio::join!(
            child.wait(),
            drain(stdout, "stdout"),
            drain(stderr, "stderr")
        );
        let status = status.map_err(spawn_error)?;

        Ok(CommandOutput {
            status: status.code().unwrap_or(-1),
            stdout: stdout?,
            stderr: stderr?,
        })
    }
}

/// Looks a bare program name up on `PATH`. Paths, and names that cannot be
/// resolved, are passed through unchanged so the spawn error names them.
fn resolve_program(program: &str) -> PathBuf {
    if Path::new(program).components().count() > 1 {
        return PathBuf::from(program);
    }
    which::which(program).unwrap_or_else(|_| PathBuf::from(program))
}

async fn drain<R>(stream: Option<R>, name: &'static str) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut captured = String::new();
    let Some(stream) = stream else {
        return Ok(captured);
    };

    // Build tools on legacy systems do not always print UTF-8.
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    while reader.read_until(b'\n', &mut buf).await? > 0 {
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        debug!(target: "srcstrap::output", stream = name, "{}", line);
        captured.push_str(line);
        captured.push('\n');
        buf.clear();
    }
    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_arguments() {
        let invocation = Invocation::new("make", Path::new("/tmp"))
            .arg("libxerces_c_la_LDFLAGS=-release 3.1 -no-undefined")
            .arg("install");
        assert_eq!(
            invocation.display(),
            "make 'libxerces_c_la_LDFLAGS=-release 3.1 -no-undefined' install"
        );
    }

    #[test]
    fn test_builder_collects_args_and_env() {
        let mut env = BTreeMap::new();
        env.insert("CC".to_string(), "gcc".to_string());
        let invocation = Invocation::new("tar", Path::new("/code"))
            .args(["--no-same-owner", "-xzf"])
            .arg("/c/x.tar.gz")
            .envs(env);
        assert_eq!(invocation.args, vec!["--no-same-owner", "-xzf", "/c/x.tar.gz"]);
        assert_eq!(invocation.env.get("CC").map(String::as_str), Some("gcc"));
        assert_eq!(invocation.cwd, PathBuf::from("/code"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_captures_output_and_status() {
        let dir = tempfile::TempDir::new().unwrap();
        let invocation = Invocation::new("sh", dir.path())
            .arg("-c")
            .arg("echo hello; echo oops >&2; exit 3");

        let output = SystemRunner::new().run(&invocation).await.unwrap();
        assert_eq!(output.status, 3);
        assert!(!output.success());
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_uses_cwd_and_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut env = BTreeMap::new();
        env.insert("SRCSTRAP_TEST_VALUE".to_string(), "42".to_string());
        let invocation = Invocation::new("sh", dir.path())
            .arg("-c")
            .arg("pwd; echo $SRCSTRAP_TEST_VALUE")
            .envs(env);

        let output = SystemRunner::new().run(&invocation).await.unwrap();
        assert!(output.success());
        let canonical = dir.path().canonicalize().unwrap();
        assert!(output.stdout.contains(canonical.file_name().unwrap().to_str().unwrap()));
        assert!(output.stdout.ends_with("42\n"));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let invocation = Invocation::new("srcstrap-no-such-tool", dir.path());
        let err = SystemRunner::new().run(&invocation).await.unwrap_err();
        assert_eq!(err.category(), "spawn");
        assert!(err.to_string().contains("srcstrap-no-such-tool"));
    }
}
