//! Dotted entry-point references (`pkg.module.callable`).
//!
//! Resolution is a textual pre-check only: the source file must contain a line
//! that, after leading whitespace, starts with `def <callable>`. Nothing is
//! parsed or executed. A commented-out definition or a longer name sharing the
//! prefix (`def pollster` for `poll`) passes; a definition split across
//! unusual formatting does not.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::EntryPointError;

/// Guest source file extension.
pub const SCRIPT_EXT: &str = "py";
const DEF_KEYWORD: &str = "def ";

/// A resolved entry point. Built once per ScriptHost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPointRef {
    /// Module segments, source file stem last.
    pub import_path: Vec<String>,
    pub callable: String,
    /// File the callable was found in.
    pub source_file: PathBuf,
}

impl EntryPointRef {
    /// Split and validate `reference` against the scripts under `scripts_root`.
    pub fn resolve(reference: &str, scripts_root: &Path) -> Result<Self, EntryPointError> {
        let segments: Vec<&str> = reference.trim().split('.').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.trim().is_empty()) {
            return Err(EntryPointError::MalformedReference(reference.to_string()));
        }

        let (callable, module) = match segments.split_last() {
            Some((c, m)) => (c.trim().to_string(), m),
            None => return Err(EntryPointError::MalformedReference(reference.to_string())),
        };
        let import_path: Vec<String> = module.iter().map(|s| s.trim().to_string()).collect();

        let mut source_file = scripts_root.to_path_buf();
        for dir in &import_path[..import_path.len() - 1] {
            source_file.push(dir);
        }
        source_file.push(format!("{}.{}", import_path[import_path.len() - 1], SCRIPT_EXT));

        let not_found = || EntryPointError::CallableNotFound {
            path: source_file.clone(),
            callable: callable.clone(),
        };
        let text = std::fs::read_to_string(&source_file).map_err(|_| not_found())?;
        if !defines_callable(&text, &callable) {
            return Err(not_found());
        }

        tracing::debug!(
            module = %import_path.join("."),
            callable = %callable,
            file = %source_file.display(),
            "resolved entry point"
        );
        Ok(Self {
            import_path,
            callable,
            source_file,
        })
    }

    /// Dotted module name to import (`pkg.module`).
    pub fn module(&self) -> String {
        self.import_path.join(".")
    }

    /// The reference as written, `pkg.module.callable`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module(), self.callable)
    }
}

fn defines_callable(source: &str, callable: &str) -> bool {
    let needle = format!("{}{}", DEF_KEYWORD, callable);
    source
        .lines()
        .any(|line| line.trim_start().starts_with(&needle))
}
