//! Base interpreter discovery and library-path queries.

use std::path::{Path, PathBuf};

use crate::error::{ProcessError, ProvisioningError};
use crate::process::{CommandRunner, CommandSpec};

const SITE_PACKAGES_SCRIPT: &str = "import sysconfig; print(sysconfig.get_paths()[\"purelib\"])";

/// Find the host's default interpreter: `python3`, then `python`, on PATH.
pub fn discover_interpreter() -> Result<PathBuf, ProvisioningError> {
    for name in ["python3", "python"] {
        if let Ok(path) = which::which(name) {
            tracing::debug!(interpreter = %path.display(), "discovered interpreter");
            return Ok(path);
        }
    }
    Err(ProvisioningError::NoInterpreterFound)
}

/// Ask `interpreter` for its pure-library install path (site-packages).
pub fn site_packages<R: CommandRunner + ?Sized>(
    runner: &R,
    interpreter: &Path,
) -> Result<PathBuf, ProcessError> {
    let out = runner.run(
        &CommandSpec::new(interpreter.to_string_lossy())
            .arg("-c")
            .arg(SITE_PACKAGES_SCRIPT),
    )?;
    // Interpreter startup noise (e.g. sitecustomize prints) lands before the path.
    let line = out.lines().last().unwrap_or_default().trim();
    Ok(PathBuf::from(line))
}

/// Same path with the first `/lib/` segment swapped for `/lib64/`.
/// Returns `None` when the path has no `/lib/` segment.
pub fn lib64_variant(path: &Path) -> Option<PathBuf> {
    let s = path.to_string_lossy();
    s.find("/lib/").map(|pos| {
        let mut out = String::with_capacity(s.len() + 2);
        out.push_str(&s[..pos]);
        out.push_str("/lib64/");
        out.push_str(&s[pos + "/lib/".len()..]);
        PathBuf::from(out)
    })
}

/// Interpreter inside a venv root (`bin/python` or `Scripts/python.exe`).
pub fn venv_interpreter(root: &Path) -> Option<PathBuf> {
    [
        root.join("bin").join("python"),
        root.join("Scripts").join("python.exe"),
    ]
    .into_iter()
    .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    impl CommandRunner for Canned {
        fn run(&self, _cmd: &CommandSpec) -> Result<String, ProcessError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_lib64_variant() {
        assert_eq!(
            lib64_variant(Path::new("/usr/lib/python3.11/site-packages")),
            Some(PathBuf::from("/usr/lib64/python3.11/site-packages"))
        );
        // only the first segment is replaced
        assert_eq!(
            lib64_variant(Path::new("/opt/lib/x/lib/site-packages")),
            Some(PathBuf::from("/opt/lib64/x/lib/site-packages"))
        );
        assert_eq!(lib64_variant(Path::new("C:\\Python\\Lib\\site-packages")), None);
    }

    #[test]
    fn test_site_packages_takes_last_line() {
        let runner = Canned("warning: something\n/venv/lib/python3.12/site-packages");
        let p = site_packages(&runner, Path::new("/venv/bin/python")).unwrap();
        assert_eq!(p, PathBuf::from("/venv/lib/python3.12/site-packages"));
    }

    #[test]
    fn test_venv_interpreter_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(venv_interpreter(dir.path()), None);
        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("bin").join("python"), "").unwrap();
        assert_eq!(
            venv_interpreter(dir.path()),
            Some(dir.path().join("bin").join("python"))
        );
    }
}
