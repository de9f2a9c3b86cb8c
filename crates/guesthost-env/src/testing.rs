//! Test doubles for code that provisions environments.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ProcessError;
use crate::process::{CommandRunner, CommandSpec};

/// Pretends to be python: `-m venv <root>` lays down `<root>/bin/python`, the
/// sysconfig query answers with a lib path under the interpreter's prefix, and
/// `-m pip` succeeds unless `pip_fails` is set. Every command is recorded.
#[derive(Debug, Default)]
pub struct FakePython {
    calls: Mutex<Vec<CommandSpec>>,
    pub pip_fails: bool,
    pub venv_fails: bool,
}

impl FakePython {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn venv_calls(&self) -> Vec<CommandSpec> {
        self.filtered("venv")
    }

    pub fn pip_calls(&self) -> Vec<CommandSpec> {
        self.filtered("pip")
    }

    fn filtered(&self, module: &str) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.args.first().map(String::as_str) == Some("-m"))
            .filter(|c| c.args.get(1).map(String::as_str) == Some(module))
            .collect()
    }
}

impl CommandRunner for FakePython {
    fn run(&self, cmd: &CommandSpec) -> Result<String, ProcessError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(cmd.clone());
        }
        let fail = |output: &str| ProcessError::NonZeroExit {
            command: cmd.to_string(),
            code: Some(1),
            output: output.to_string(),
        };
        let arg = |i: usize| cmd.args.get(i).map(String::as_str);
        match (arg(0), arg(1)) {
            (Some("-m"), Some("venv")) => {
                if self.venv_fails {
                    return Err(fail("venv: permission denied"));
                }
                let root = PathBuf::from(arg(2).unwrap_or_default());
                let bin = root.join("bin");
                std::fs::create_dir_all(&bin)
                    .and_then(|_| std::fs::write(bin.join("python"), ""))
                    .map_err(|e| fail(&e.to_string()))?;
                Ok(String::new())
            }
            (Some("-m"), Some("pip")) => {
                if self.pip_fails {
                    Err(fail("Could not find a version that satisfies the requirement"))
                } else {
                    Ok("Successfully installed".into())
                }
            }
            (Some("-c"), _) => {
                let prefix = Path::new(&cmd.program)
                    .parent()
                    .and_then(Path::parent)
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(format!("{}/lib/python3.11/site-packages", prefix))
            }
            _ => Err(fail("unexpected command")),
        }
    }
}
