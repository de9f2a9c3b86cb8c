//! External command execution with captured output and bounded retry.

use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};

use crate::error::ProcessError;

/// A command line plus extra environment variables for the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for a in &self.args {
            write!(f, " {}", a)?;
        }
        Ok(())
    }
}

/// Runs commands to completion. Implementations must be independent per call.
pub trait CommandRunner: Send + Sync {
    /// Run once; `Ok` carries the trimmed merged output of a zero exit.
    fn run(&self, cmd: &CommandSpec) -> Result<String, ProcessError>;

    /// Re-run the whole command on any failure, up to `max_attempts` runs in total.
    /// No delay between attempts. `max_attempts` of 0 is treated as 1.
    fn run_with_retry(&self, cmd: &CommandSpec, max_attempts: u32) -> Result<String, ProcessError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.run(cmd) {
                Ok(out) => return Ok(out),
                Err(e) if attempt >= max_attempts => {
                    return Err(ProcessError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    })
                }
                Err(e) => {
                    tracing::warn!(
                        command = %cmd,
                        attempt,
                        max_attempts,
                        "command failed, retrying: {}",
                        e
                    );
                }
            }
        }
    }
}

/// OS process runner. Stdout and stderr share one pipe, so the captured output
/// interleaves them in the order the child wrote.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<String, ProcessError> {
        tracing::debug!(command = %cmd, "running");
        let launch = |source: std::io::Error| ProcessError::Launch {
            command: cmd.to_string(),
            source,
        };

        let (mut reader, writer) = std::io::pipe().map_err(launch)?;
        let err_writer = writer.try_clone().map_err(launch)?;
        // the Command temporary owns the write ends and drops them after spawn,
        // so the read below sees EOF once the child exits
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(err_writer)
            .spawn()
            .map_err(launch)?;

        let mut raw = Vec::new();
        let read = reader.read_to_end(&mut raw);
        let status = child.wait().map_err(launch)?;
        read.map_err(launch)?;
        let merged = String::from_utf8_lossy(&raw).trim().to_string();

        if !status.success() {
            return Err(ProcessError::NonZeroExit {
                command: cmd.to_string(),
                code: status.code(),
                output: merged,
            });
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysFails {
        calls: AtomicU32,
    }

    impl CommandRunner for AlwaysFails {
        fn run(&self, cmd: &CommandSpec) -> Result<String, ProcessError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(ProcessError::NonZeroExit {
                command: cmd.to_string(),
                code: Some(1),
                output: format!("attempt {}", n),
            })
        }
    }

    struct FailsThenSucceeds {
        calls: AtomicU32,
        failures: u32,
    }

    impl CommandRunner for FailsThenSucceeds {
        fn run(&self, cmd: &CommandSpec) -> Result<String, ProcessError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(ProcessError::NonZeroExit {
                    command: cmd.to_string(),
                    code: Some(1),
                    output: String::new(),
                })
            } else {
                Ok("done".into())
            }
        }
    }

    #[test]
    fn test_retry_runs_exactly_max_attempts() {
        let runner = AlwaysFails {
            calls: AtomicU32::new(0),
        };
        let err = runner
            .run_with_retry(&CommandSpec::new("pip").arg("install"), 3)
            .unwrap_err();
        assert_eq!(runner.calls.load(Ordering::SeqCst), 3);
        match &err {
            ProcessError::RetriesExhausted { attempts, .. } => assert_eq!(*attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.command(), "pip install");
        assert_eq!(err.captured_output(), "attempt 3");
    }

    #[test]
    fn test_retry_stops_on_success() {
        let runner = FailsThenSucceeds {
            calls: AtomicU32::new(0),
            failures: 1,
        };
        let out = runner.run_with_retry(&CommandSpec::new("x"), 3).unwrap();
        assert_eq!(out, "done");
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let runner = AlwaysFails {
            calls: AtomicU32::new(0),
        };
        assert!(runner.run_with_retry(&CommandSpec::new("x"), 0).is_err());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_captures_merged_output() {
        let out = ProcessRunner
            .run(&CommandSpec::new("sh").args(["-c", "echo out; echo err 1>&2"]))
            .unwrap();
        assert_eq!(out, "out\nerr");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_interleaves_streams() {
        let out = ProcessRunner
            .run(&CommandSpec::new("sh").args(["-c", "echo one; echo two 1>&2; echo three"]))
            .unwrap();
        assert_eq!(out, "one\ntwo\nthree");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_env_override() {
        let out = ProcessRunner
            .run(
                &CommandSpec::new("sh")
                    .args(["-c", "echo $GUESTHOST_TEST_VAR"])
                    .env("GUESTHOST_TEST_VAR", "hello"),
            )
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_nonzero_exit() {
        let err = ProcessRunner
            .run(&CommandSpec::new("sh").args(["-c", "echo boom; exit 3"]))
            .unwrap_err();
        match err {
            ProcessError::NonZeroExit { code, output, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_process_runner_launch_failure() {
        let err = ProcessRunner
            .run(&CommandSpec::new("guesthost-definitely-not-a-binary"))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Launch { .. }));
        assert_eq!(err.captured_output(), "");
    }
}
