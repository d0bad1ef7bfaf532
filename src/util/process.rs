//! Subprocess execution utilities.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// How often a child with a deadline is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long output is still collected after a timed-out child is killed.
/// Descendants that left the process group can hold the pipes open forever.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Failure to run an external process to successful completion.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed with exit code {}", display_code(*code))]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut {
        command: String,
        timeout: Duration,
        stderr: String,
    },
}

impl ProcessError {
    /// Standard error captured from the child, empty if none was produced.
    pub fn stderr(&self) -> &str {
        match self {
            ProcessError::Failed { stderr, .. } | ProcessError::TimedOut { stderr, .. } => stderr,
            _ => "",
        }
    }
}

fn display_code(code: Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

/// Captured output of a finished process.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            timeout: None,
        }
    }

    /// Create a process builder from an argument list whose first element is the program.
    ///
    /// Returns `None` for an empty list.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(ProcessBuilder::new(program).args(args))
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Kill the child if it has not finished within `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get an environment variable set on this builder.
    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Get the working directory.
    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        // A child that can time out leads its own process group so the whole
        // tree can be killed on expiry.
        if self.timeout.is_some() {
            own_process_group(&mut cmd);
        }

        cmd
    }

    /// Execute the command and wait for completion, capturing stdout and stderr.
    ///
    /// A non-zero exit status is not an error here; see [`exec_and_check`].
    ///
    /// [`exec_and_check`]: ProcessBuilder::exec_and_check
    pub fn exec(&self) -> Result<CapturedOutput, ProcessError> {
        let program = self.program.display().to_string();
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("running `{}`", self.display_command());

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.timeout {
            Some(timeout) => match wait_with_deadline(&mut child, timeout) {
                Ok(Some(status)) => status,
                Ok(None) => {
                    return Err(ProcessError::TimedOut {
                        command: self.display_command(),
                        timeout,
                        stderr: collect_output(stderr, Some(DRAIN_GRACE)),
                    })
                }
                Err(source) => return Err(ProcessError::Wait { program, source }),
            },
            None => child
                .wait()
                .map_err(|source| ProcessError::Wait { program, source })?,
        };

        Ok(CapturedOutput {
            status,
            stdout: collect_output(stdout, None),
            stderr: collect_output(stderr, None),
        })
    }

    /// Execute and require success.
    pub fn exec_and_check(&self) -> Result<CapturedOutput, ProcessError> {
        let output = self.exec()?;
        if !output.status.success() {
            return Err(ProcessError::Failed {
                command: self.display_command(),
                code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Read a child pipe to completion on a separate thread so a chatty child
/// cannot block on a full pipe while we wait for it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
        rx
    })
}

/// Output read by a [`drain`] thread. With `grace`, gives up after that long
/// and returns nothing.
fn collect_output(output: Option<Receiver<Vec<u8>>>, grace: Option<Duration>) -> String {
    output
        .and_then(|rx| match grace {
            Some(grace) => rx.recv_timeout(grace).ok(),
            None => rx.recv().ok(),
        })
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// Kill the process group `child` leads, taking its descendants with it.
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(child.id()).map_err(io::Error::other)?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    child.kill()
}

/// Poll `child` until it exits or `timeout` elapses. On expiry the child and
/// its process group are killed, the child is reaped and `Ok(None)` is
/// returned.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            kill_tree(child)?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("go").args(["build", "-o", "app", "."]);

        assert_eq!(pb.display_command(), "go build -o app .");
    }

    #[test]
    fn test_from_argv() {
        let argv = vec!["npm".to_string(), "run".to_string(), "build".to_string()];
        let pb = ProcessBuilder::from_argv(&argv).unwrap();

        assert_eq!(pb.get_program(), Path::new("npm"));
        assert_eq!(pb.get_args(), &["run".to_string(), "build".to_string()]);
        assert!(ProcessBuilder::from_argv(&[]).is_none());
    }

    #[test]
    fn test_spawn_failure() {
        let err = ProcessBuilder::new("keel-definitely-not-a-real-program")
            .exec()
            .unwrap_err();

        assert!(matches!(err, ProcessError::Spawn { .. }));
        assert_eq!(err.stderr(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_captures_streams_separately() {
        let output = ProcessBuilder::new("sh")
            .args(["-c", "echo out; echo err 1>&2"])
            .exec()
            .unwrap();

        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_and_check_reports_stderr() {
        let err = ProcessBuilder::new("sh")
            .args(["-c", "echo broken 1>&2; exit 3"])
            .exec_and_check()
            .unwrap_err();

        match &err {
            ProcessError::Failed { code, .. } => assert_eq!(*code, Some(3)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.stderr().trim(), "broken");
        assert!(err.to_string().contains("exit code 3"));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let err = ProcessBuilder::new("sleep")
            .arg("5")
            .timeout(Some(Duration::from_millis(100)))
            .exec()
            .unwrap_err();

        assert!(matches!(err, ProcessError::TimedOut { .. }));
        assert!(err.to_string().ends_with("timed out after 100ms"));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_does_not_wait_for_grandchildren() {
        let start = Instant::now();
        let err = ProcessBuilder::new("sh")
            .args(["-c", "sleep 5; true"])
            .timeout(Some(Duration::from_millis(200)))
            .exec()
            .unwrap_err();

        assert!(matches!(err, ProcessError::TimedOut { .. }));
        assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_background_descendants() {
        let tmp = tempfile::TempDir::new().unwrap();
        let marker = tmp.path().join("marker");

        let err = ProcessBuilder::new("sh")
            .args(["-c", "(sleep 1; touch marker) & wait"])
            .cwd(tmp.path())
            .timeout(Some(Duration::from_millis(100)))
            .exec()
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));

        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_env_and_cwd() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = ProcessBuilder::new("sh")
            .args(["-c", "echo $KEEL_TEST_VALUE; pwd"])
            .env("KEEL_TEST_VALUE", "hello")
            .cwd(tmp.path())
            .exec_and_check()
            .unwrap();

        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("hello"));
        let cwd = PathBuf::from(lines.next().unwrap());
        assert_eq!(
            cwd.canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }
}
