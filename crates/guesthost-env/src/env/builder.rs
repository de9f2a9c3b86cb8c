//! Build an isolated guest environment (venv) and resolve its search paths.

use std::path::{Path, PathBuf};

use guesthost_core::config::schema::DEFAULT_INSTALL_ATTEMPTS;
use guesthost_core::info_log;
use serde::Serialize;

use crate::error::ProvisioningError;
use crate::interpreter::{self, lib64_variant, venv_interpreter};
use crate::process::{CommandRunner, CommandSpec, ProcessRunner};

/// A built, dependency-installed guest environment.
///
/// Immutable once returned. Nothing removes the installation root except an
/// explicit [`Environment::remove`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    interpreter: PathBuf,
    search_paths: Vec<PathBuf>,
    root: PathBuf,
    name: String,
}

impl Environment {
    /// Interpreter inside the environment.
    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    /// Library search paths, deduplicated, in insertion order. Never empty.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Installation root (`working_dir/name`).
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delete the installation root.
    pub fn remove(self) -> std::io::Result<()> {
        info_log!(root = %self.root.display(), "removing environment");
        std::fs::remove_dir_all(&self.root)
    }
}

/// Optional knobs for [`EnvironmentProvisioner::build`].
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Interpreter to create the venv from. `None` = discover on PATH.
    pub base_interpreter: Option<PathBuf>,
    /// Directory name under the working dir. `None` = `venv-<uuid>`.
    pub env_name: Option<String>,
    /// Local package directory the installer may resolve from (`--find-links`).
    pub offline_deps_dir: Option<PathBuf>,
    /// Extra entry for the search paths (typically the scripts directory).
    pub extra_search_path: Option<PathBuf>,
}

/// Creates environments with a [`CommandRunner`] (the OS runner by default).
#[derive(Debug, Clone)]
pub struct EnvironmentProvisioner<R: CommandRunner = ProcessRunner> {
    runner: R,
    install_attempts: u32,
}

impl<R: CommandRunner> EnvironmentProvisioner<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            install_attempts: DEFAULT_INSTALL_ATTEMPTS,
        }
    }

    /// Attempts per dependency install run.
    pub fn with_install_attempts(mut self, attempts: u32) -> Self {
        self.install_attempts = attempts.max(1);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Build a new environment rooted at `working_dir/<name>` with `dependencies` installed.
    ///
    /// An existing directory at that path is reused as-is by the venv tool; pick
    /// an unused name unless overwriting is intended. Any failure aborts the
    /// build, no partially built `Environment` is ever returned.
    pub fn build(
        &self,
        dependencies: &[String],
        working_dir: &Path,
        opts: &BuildOptions,
    ) -> Result<Environment, ProvisioningError> {
        let base = match &opts.base_interpreter {
            Some(p) => p.clone(),
            None => interpreter::discover_interpreter()?,
        };

        let name = opts
            .env_name
            .clone()
            .unwrap_or_else(|| format!("venv-{}", uuid::Uuid::new_v4()));
        let root = working_dir.join(&name);

        info_log!(
            env = %name,
            root = %root.display(),
            base = %base.display(),
            "creating guest environment"
        );

        std::fs::create_dir_all(working_dir).map_err(|source| ProvisioningError::Io {
            path: working_dir.to_path_buf(),
            source,
        })?;

        // Library path of the host's default interpreter; the base stands in when
        // nothing is discoverable.
        let default_interpreter = interpreter::discover_interpreter().unwrap_or_else(|_| base.clone());
        let default_site = self.site_packages(&default_interpreter)?;

        self.runner
            .run(
                &CommandSpec::new(base.to_string_lossy())
                    .args(["-m", "venv"])
                    .arg(root.to_string_lossy()),
            )
            .map_err(|source| ProvisioningError::CreateFailed {
                path: root.clone(),
                source,
            })?;

        let env_interpreter =
            venv_interpreter(&root).ok_or_else(|| ProvisioningError::MissingInterpreter(root.clone()))?;
        let env_site = self.site_packages(&env_interpreter)?;

        let mut search_paths = Vec::new();
        for p in [&default_site, &env_site] {
            push_unique(&mut search_paths, p.clone());
            if let Some(v) = lib64_variant(p) {
                push_unique(&mut search_paths, v);
            }
        }
        if let Some(extra) = &opts.extra_search_path {
            push_unique(&mut search_paths, extra.clone());
        }

        self.install(&env_interpreter, &env_site, dependencies, opts.offline_deps_dir.as_deref())?;

        Ok(Environment {
            interpreter: env_interpreter,
            search_paths,
            root,
            name,
        })
    }

    fn site_packages(&self, interpreter: &Path) -> Result<PathBuf, ProvisioningError> {
        interpreter::site_packages(&self.runner, interpreter).map_err(|source| {
            ProvisioningError::SitePackages {
                interpreter: interpreter.to_path_buf(),
                source,
            }
        })
    }

    fn install(
        &self,
        env_interpreter: &Path,
        env_site: &Path,
        dependencies: &[String],
        offline_deps_dir: Option<&Path>,
    ) -> Result<(), ProvisioningError> {
        let packages: Vec<&str> = dependencies
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty() && !d.starts_with('#'))
            .collect();
        if packages.is_empty() {
            return Ok(());
        }

        info_log!(count = packages.len(), "installing guest dependencies");

        let mut cmd = CommandSpec::new(env_interpreter.to_string_lossy())
            .args(["-m", "pip", "install"])
            .args(packages.iter().copied())
            .env("PYTHONPATH", env_site.to_string_lossy());
        if let Some(dir) = offline_deps_dir {
            cmd = cmd.arg("--find-links").arg(dir.to_string_lossy());
        }

        self.runner
            .run_with_retry(&cmd, self.install_attempts)
            .map(|_| ())
            .map_err(ProvisioningError::Install)
    }
}

fn push_unique(paths: &mut Vec<PathBuf>, p: PathBuf) {
    if !p.as_os_str().is_empty() && !paths.contains(&p) {
        paths.push(p);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::testing::FakePython;

    fn opts(base: &Path) -> BuildOptions {
        BuildOptions {
            base_interpreter: Some(base.to_path_buf()),
            env_name: Some("venv-test".into()),
            offline_deps_dir: None,
            extra_search_path: None,
        }
    }

    #[test]
    fn test_build_populates_environment() {
        let work = tempfile::tempdir().unwrap();
        let provisioner = EnvironmentProvisioner::new(FakePython::new());
        let mut o = opts(Path::new("/usr/bin/python3"));
        o.extra_search_path = Some(PathBuf::from("/srv/scripts"));

        let env = provisioner
            .build(&["requests==2.31.0".into()], work.path(), &o)
            .unwrap();

        let root = work.path().join("venv-test");
        assert_eq!(env.root(), root.as_path());
        assert_eq!(env.name(), "venv-test");
        assert_eq!(env.interpreter(), root.join("bin").join("python").as_path());

        let env_site = PathBuf::from(format!("{}/lib/python3.11/site-packages", root.display()));
        assert!(env.search_paths().contains(&env_site));
        assert!(env
            .search_paths()
            .contains(&lib64_variant(&env_site).unwrap()));
        assert_eq!(env.search_paths().last(), Some(&PathBuf::from("/srv/scripts")));
    }

    #[test]
    fn test_install_carries_pythonpath_and_find_links() {
        let work = tempfile::tempdir().unwrap();
        let provisioner = EnvironmentProvisioner::new(FakePython::new());
        let mut o = opts(Path::new("/usr/bin/python3"));
        o.offline_deps_dir = Some(PathBuf::from("/opt/wheels"));

        provisioner
            .build(
                &["faker".into(), "".into(), "# comment".into(), " arrow ".into()],
                work.path(),
                &o,
            )
            .unwrap();

        let pip = provisioner.runner().pip_calls();
        assert_eq!(pip.len(), 1);
        let args = &pip[0].args;
        assert_eq!(&args[..5], &["-m", "pip", "install", "faker", "arrow"]);
        assert_eq!(&args[5..], &["--find-links", "/opt/wheels"]);
        assert_eq!(pip[0].env.len(), 1);
        assert_eq!(pip[0].env[0].0, "PYTHONPATH");
        assert!(pip[0].env[0].1.ends_with("venv-test/lib/python3.11/site-packages"));
    }

    #[test]
    fn test_no_dependencies_skips_installer() {
        let work = tempfile::tempdir().unwrap();
        let provisioner = EnvironmentProvisioner::new(FakePython::new());
        provisioner
            .build(&[], work.path(), &opts(Path::new("/usr/bin/python3")))
            .unwrap();
        assert!(provisioner.runner().pip_calls().is_empty());
    }

    #[test]
    fn test_install_failure_retries_three_times_then_aborts() {
        let work = tempfile::tempdir().unwrap();
        let mut fake = FakePython::new();
        fake.pip_fails = true;
        let provisioner = EnvironmentProvisioner::new(fake);

        let err = provisioner
            .build(&["nope==0.0".into()], work.path(), &opts(Path::new("/usr/bin/python3")))
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisioningError::Install(ProcessError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(provisioner.runner().pip_calls().len(), 3);
    }

    #[test]
    fn test_venv_failure_is_create_failed() {
        let work = tempfile::tempdir().unwrap();
        let mut fake = FakePython::new();
        fake.venv_fails = true;
        let provisioner = EnvironmentProvisioner::new(fake);

        let err = provisioner
            .build(&[], work.path(), &opts(Path::new("/usr/bin/python3")))
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::CreateFailed { .. }));
        assert!(provisioner.runner().pip_calls().is_empty());
    }

    #[test]
    fn test_generated_names_are_unique() {
        let work = tempfile::tempdir().unwrap();
        let provisioner = EnvironmentProvisioner::new(FakePython::new());
        let mut o = opts(Path::new("/usr/bin/python3"));
        o.env_name = None;
        let a = provisioner.build(&[], work.path(), &o).unwrap();
        let b = provisioner.build(&[], work.path(), &o).unwrap();
        assert!(a.name().starts_with("venv-"));
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn test_remove_deletes_root() {
        let work = tempfile::tempdir().unwrap();
        let provisioner = EnvironmentProvisioner::new(FakePython::new());
        let env = provisioner
            .build(&[], work.path(), &opts(Path::new("/usr/bin/python3")))
            .unwrap();
        let root = env.root().to_path_buf();
        assert!(root.exists());
        env.remove().unwrap();
        assert!(!root.exists());
    }
}
