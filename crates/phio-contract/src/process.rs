//! Blocking invocation of external programs.
//!
//! Every call is bounded by a timeout. Output pipes are drained on helper
//! threads while the child is polled, so a chatty target cannot deadlock
//! on a full pipe. A timed-out child is killed and reaped before the
//! failure is returned.

use crate::error::InvocationFailure;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
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

    pub fn envs(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    /// `program arg1 arg2 ...`, for diagnostics only.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A process that ran to completion, whatever its exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }

    /// stderr if non-empty, else stdout.
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_secs(timeout_secs: u64) -> Self {
        Self::new(Duration::from_secs(timeout_secs.max(1)))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, InvocationFailure> {
        let program = invocation.program.clone();
        tracing::debug!(command = %invocation.display(), "invoking external program");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|source| InvocationFailure::Spawn {
                program: program.clone(),
                source,
            })?;
        let stdout_reader = child.stdout.take().map(drain);
        let stderr_reader = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        tracing::warn!(
                            command = %invocation.display(),
                            timeout_secs = self.timeout.as_secs(),
                            "external program timed out"
                        );
                        // Reader threads are left detached: a grandchild may
                        // still hold the pipes open.
                        return Err(InvocationFailure::Timeout {
                            program,
                            after_secs: self.timeout.as_secs(),
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(InvocationFailure::Wait { program, source });
                }
            }
        };

        // The child may have exited while a background grandchild still
        // holds the pipes, so reading shares the same deadline.
        let stdout = self.collect(&program, stdout_reader, deadline)?;
        let stderr = self.collect(&program, stderr_reader, deadline)?;
        tracing::debug!(
            command = %invocation.display(),
            exit_code = ?status.code(),
            "external program finished"
        );

        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }

    fn collect(
        &self,
        program: &str,
        reader: Option<Receiver<std::io::Result<Vec<u8>>>>,
        deadline: Instant,
    ) -> Result<String, InvocationFailure> {
        let Some(reader) = reader else {
            return Ok(String::new());
        };
        match reader.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(Ok(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Ok(Err(err)) => Err(InvocationFailure::Capture {
                program: program.to_string(),
                detail: err.to_string(),
            }),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    program,
                    timeout_secs = self.timeout.as_secs(),
                    "output pipes still open at deadline"
                );
                Err(InvocationFailure::Timeout {
                    program: program.to_string(),
                    after_secs: self.timeout.as_secs(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(InvocationFailure::Capture {
                program: program.to_string(),
                detail: "output reader thread panicked".to_string(),
            }),
        }
    }
}

fn drain<R>(mut reader: R) -> Receiver<std::io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = reader.read_to_end(&mut buf).map(|_| buf);
        let _ = tx.send(result);
    });
    rx
}

/// How target instruments are launched: an optional interpreter plus the
/// environment forwarded to every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetLauncher {
    interpreter: Option<String>,
    env: Vec<(String, String)>,
}

impl TargetLauncher {
    pub fn new(interpreter: Option<String>, env: Vec<(String, String)>) -> Self {
        Self { interpreter, env }
    }

    /// `[interpreter] target args...` with the forwarded environment.
    pub fn invocation<I, S>(&self, target: &Path, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let target = target.to_string_lossy().to_string();
        let base = match &self.interpreter {
            Some(interpreter) => Invocation::new(interpreter.clone()).arg(target),
            None => Invocation::new(target),
        };
        base.args(args).envs(self.env.iter().cloned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::InvocationFailureKind;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn captures_stdout_stderr_and_exit_code() {
        let runner = ProcessRunner::from_secs(10);
        let output = runner
            .run(&sh("echo out; echo err 1>&2; exit 3"))
            .expect("sh should run");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.combined(), "out\nerr\n");
        assert_eq!(output.diagnostic(), "err\n");
    }

    #[test]
    fn forwards_environment() {
        let runner = ProcessRunner::from_secs(10);
        let invocation =
            sh("printf '%s' \"$PROBE_MARK\"").envs([("PROBE_MARK".to_string(), "x1".to_string())]);
        let output = runner.run(&invocation).expect("sh should run");
        assert_eq!(output.stdout, "x1");
    }

    #[test]
    fn timeout_is_a_distinct_failure() {
        let runner = ProcessRunner::new(Duration::from_millis(200));
        let err = runner
            .run(&sh("sleep 5"))
            .expect_err("sleep should time out");
        assert_eq!(err.kind(), InvocationFailureKind::Timeout);
    }

    #[test]
    fn background_grandchild_holding_pipes_cannot_outlive_timeout() {
        let runner = ProcessRunner::new(Duration::from_millis(500));
        let started = Instant::now();
        let err = runner
            .run(&sh("sleep 6 & echo help"))
            .expect_err("open pipes should hit the deadline");
        assert_eq!(err.kind(), InvocationFailureKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let runner = ProcessRunner::from_secs(1);
        let err = runner
            .run(&Invocation::new("/nonexistent/phio-probe-binary"))
            .expect_err("spawn should fail");
        assert_eq!(err.kind(), InvocationFailureKind::Spawn);
    }

    #[test]
    fn launcher_prefixes_interpreter() {
        let with_interp = TargetLauncher::new(Some("python3".to_string()), Vec::new());
        let invocation = with_interp.invocation(Path::new("/x/inst.py"), ["--help"]);
        assert_eq!(invocation.program, "python3");
        assert_eq!(invocation.args, vec!["/x/inst.py", "--help"]);

        let direct = TargetLauncher::new(
            None,
            vec![("PHIO_FORCE_ASCII_TAU".to_string(), "1".to_string())],
        );
        let invocation = direct.invocation(Path::new("/x/inst.sh"), ["score", "--input", "a.json"]);
        assert_eq!(invocation.program, "/x/inst.sh");
        assert_eq!(invocation.args, vec!["score", "--input", "a.json"]);
        assert_eq!(invocation.env.len(), 1);
        assert_eq!(invocation.display(), "/x/inst.sh score --input a.json");
    }
}
