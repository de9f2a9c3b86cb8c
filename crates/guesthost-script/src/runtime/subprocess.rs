//! Guest runtime as a child interpreter speaking JSON-RPC 2.0 over stdio.
//!
//! Request:  `{"jsonrpc":"2.0","id":1,"method":"invoke","params":{"callable":"guest_0_ab.fn","args":[..]}}`
//! Response: `{"jsonrpc":"2.0","id":1,"result":..}` or
//!           `{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":..,"data":{"type":..,"traceback":..}}}`
//!
//! The bridge announces itself with `{"id":0,"result":{"ready":true}}` before
//! reading any request. Guest stdout is redirected to stderr, which the child
//! inherits from the host.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use guesthost_core::info_log;
use guesthost_env::Environment;
use serde_json::{json, Value};

use super::{GuestRuntime, GuestRuntimeFactory};
use crate::alias::GuestAlias;
use crate::error::InvocationError;
use crate::value::GuestValue;

const BRIDGE_SOURCE: &str = include_str!("bridge.py");

/// How long a dropped runtime may take to exit before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Starts one bridge process per runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubprocessRuntimeFactory;

impl GuestRuntimeFactory for SubprocessRuntimeFactory {
    fn start(
        &self,
        env: &Environment,
        scripts_dir: &Path,
    ) -> Result<Box<dyn GuestRuntime>, InvocationError> {
        Ok(Box::new(SubprocessRuntime::spawn(env, scripts_dir)?))
    }
}

pub struct SubprocessRuntime {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl SubprocessRuntime {
    /// Launch the environment's interpreter on the bridge and wait for its
    /// ready line.
    pub fn spawn(env: &Environment, scripts_dir: &Path) -> Result<Self, InvocationError> {
        let interpreter = env.interpreter().to_path_buf();
        let mut paths: Vec<PathBuf> = env.search_paths().to_vec();
        if !paths.iter().any(|p| p == scripts_dir) {
            paths.push(scripts_dir.to_path_buf());
        }
        let pythonpath = std::env::join_paths(&paths)
            .map_err(|e| InvocationError::Protocol(format!("invalid search path: {}", e)))?;

        let spawn_err = |source| InvocationError::Spawn {
            interpreter: interpreter.clone(),
            source,
        };
        let mut child = Command::new(&interpreter)
            .args(["-u", "-c", BRIDGE_SOURCE])
            .env("PYTHONPATH", &pythonpath)
            .current_dir(scripts_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_err)?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(i), Some(o)) => (i, o),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(InvocationError::Protocol("child stdio not captured".into()));
            }
        };

        let mut runtime = Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            next_id: 1,
        };
        let ready = runtime.read_response(0)?;
        if ready.get("ready").and_then(Value::as_bool) != Some(true) {
            return Err(InvocationError::Protocol(format!(
                "unexpected handshake: {}",
                ready
            )));
        }
        info_log!(
            pid = runtime.child.id(),
            interpreter = %interpreter.display(),
            "guest runtime started"
        );
        Ok(runtime)
    }

    fn request(&mut self, method: &str, params: Value) -> Result<Value, InvocationError> {
        let id = self.next_id;
        self.next_id += 1;
        let line = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});

        let stdin = self.stdin.as_mut().ok_or_else(|| {
            InvocationError::Transport(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "guest runtime stdin closed",
            ))
        })?;
        writeln!(stdin, "{}", line)?;
        stdin.flush()?;

        self.read_response(id)
    }

    fn read_response(&mut self, expected_id: u64) -> Result<Value, InvocationError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(InvocationError::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "guest runtime exited",
            )));
        }
        let mut resp: Value = serde_json::from_str(line.trim())
            .map_err(|e| InvocationError::Protocol(format!("invalid response line: {}", e)))?;

        if resp.get("id").and_then(Value::as_u64) != Some(expected_id) {
            return Err(InvocationError::Protocol(format!(
                "response id mismatch (expected {}): {}",
                expected_id,
                line.trim()
            )));
        }
        if let Some(err) = resp.get("error") {
            return Err(error_from_response(err));
        }
        Ok(resp
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

fn error_from_response(err: &Value) -> InvocationError {
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match err.get("data").and_then(|d| d.get("type")).and_then(Value::as_str) {
        Some(kind) => InvocationError::GuestRaised {
            kind: kind.to_string(),
            message,
            traceback: err
                .get("data")
                .and_then(|d| d.get("traceback"))
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        None => InvocationError::Protocol(message),
    }
}

impl GuestRuntime for SubprocessRuntime {
    fn exec(&mut self, statement: &str) -> Result<(), InvocationError> {
        self.request("exec", json!({ "source": statement })).map(|_| ())
    }

    fn import(&mut self, module: &str, alias: &GuestAlias) -> Result<(), InvocationError> {
        self.request("import", json!({ "module": module, "alias": alias.as_str() }))
            .map(|_| ())
    }

    fn invoke(&mut self, callable: &str, args: &[GuestValue]) -> Result<GuestValue, InvocationError> {
        let args: Vec<Value> = args.iter().map(GuestValue::to_json).collect();
        let result = self.request("invoke", json!({ "callable": callable, "args": args }))?;
        Ok(GuestValue::from_json(result))
    }
}

impl Drop for SubprocessRuntime {
    fn drop(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let shutdown = json!({"jsonrpc": "2.0", "id": self.next_id, "method": "shutdown"});
            let _ = writeln!(stdin, "{}", shutdown);
            let _ = stdin.flush();
        }
        // stdin is closed here, so a bridge that missed the shutdown line still hits EOF.
        match reap(&mut self.child, SHUTDOWN_GRACE) {
            Ok(status) => tracing::debug!(%status, "guest runtime exited"),
            Err(e) => tracing::warn!("failed to reap guest runtime: {}", e),
        }
    }
}

/// Wait up to `grace` for the child to exit on its own, then kill it.
fn reap(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            tracing::warn!(pid = child.id(), "guest runtime still running after shutdown, killing");
            let _ = child.kill();
            return child.wait();
        }
        std::thread::sleep(REAP_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_type_is_guest_raised() {
        let err = error_from_response(&json!({
            "code": -32000,
            "message": "division by zero",
            "data": {"type": "ZeroDivisionError", "traceback": "Traceback ..."}
        }));
        match err {
            InvocationError::GuestRaised {
                kind,
                message,
                traceback,
            } => {
                assert_eq!(kind, "ZeroDivisionError");
                assert_eq!(message, "division by zero");
                assert_eq!(traceback.as_deref(), Some("Traceback ..."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_without_type_is_protocol() {
        let err = error_from_response(&json!({"code": -32601, "message": "unknown method: x"}));
        assert!(matches!(err, InvocationError::Protocol(m) if m == "unknown method: x"));
    }

    #[cfg(unix)]
    #[test]
    fn test_reap_kills_child_that_outlives_grace() {
        let mut child = Command::new("sh").args(["-c", "sleep 30"]).spawn().unwrap();
        let started = Instant::now();
        let status = reap(&mut child, Duration::from_millis(100)).unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_reap_waits_for_clean_exit() {
        let mut child = Command::new("sh").args(["-c", "exit 0"]).spawn().unwrap();
        let status = reap(&mut child, Duration::from_secs(10)).unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_bridge_source_is_bundled() {
        assert!(BRIDGE_SOURCE.contains("\"ready\": True"));
        assert!(BRIDGE_SOURCE.contains("sys.stdout = sys.stderr"));
    }
}
