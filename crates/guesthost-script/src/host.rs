//! ScriptHost: one provisioned environment, one resolved entry point, one
//! running guest runtime.
//!
//! Construction runs, in order: scripts directory checks, dependency manifest
//! read, bridge requirement merge, entry-point resolution, provisioning,
//! runtime start, aliased import. Any failure aborts construction; there is no
//! partially built host. A host that exists is ready to call.
//!
//! Calls are not retried or suppressed here. Guest calls have no timeout: a
//! guest that never returns blocks the caller.

use std::path::{Path, PathBuf};

use guesthost_core::config::schema::DEFAULT_INSTALL_ATTEMPTS;
use guesthost_core::config::ScriptConfig;
use guesthost_core::info_log;
use guesthost_env::{BuildOptions, CommandRunner, Environment, EnvironmentProvisioner, ProcessRunner};

use crate::alias::GuestAlias;
use crate::entry_point::{EntryPointRef, SCRIPT_EXT};
use crate::error::{InvocationError, ScriptHostError};
use crate::runtime::{BridgeRequirement, GuestRuntime, GuestRuntimeFactory, SubprocessRuntimeFactory};
use crate::value::GuestValue;

/// Dependency manifest file name, matched case-insensitively in the scripts directory.
pub const MANIFEST_FILE: &str = "requirements.txt";

const VENV_MARKER: &str = "pyvenv.cfg";

#[derive(Debug, Clone)]
pub struct ScriptHostOptions {
    /// Parent of the environment directory. `None` = the scripts directory.
    pub working_dir: Option<PathBuf>,
    /// `None` = discover on PATH.
    pub base_interpreter: Option<PathBuf>,
    pub offline_deps_dir: Option<PathBuf>,
    /// `None` = generated `venv-<uuid>`.
    pub env_name: Option<String>,
    pub install_attempts: u32,
}

impl Default for ScriptHostOptions {
    fn default() -> Self {
        Self {
            working_dir: None,
            base_interpreter: None,
            offline_deps_dir: None,
            env_name: None,
            install_attempts: DEFAULT_INSTALL_ATTEMPTS,
        }
    }
}

impl From<&ScriptConfig> for ScriptHostOptions {
    fn from(cfg: &ScriptConfig) -> Self {
        Self {
            working_dir: Some(cfg.working_dir.clone()),
            base_interpreter: cfg.python_path.clone(),
            offline_deps_dir: cfg.offline_install_dir.clone(),
            env_name: None,
            install_attempts: cfg.install_attempts,
        }
    }
}

pub struct ScriptHost {
    environment: Environment,
    entry_point: EntryPointRef,
    alias: GuestAlias,
    scripts_dir: PathBuf,
    runtime: Box<dyn GuestRuntime>,
}

impl std::fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHost")
            .field("environment", &self.environment)
            .field("entry_point", &self.entry_point)
            .field("alias", &self.alias)
            .field("scripts_dir", &self.scripts_dir)
            .finish_non_exhaustive()
    }
}

impl ScriptHost {
    /// Build with OS processes and the subprocess guest runtime.
    pub fn build(
        scripts_dir: &Path,
        entry_point: &str,
        opts: &ScriptHostOptions,
    ) -> Result<Self, ScriptHostError> {
        let provisioner = EnvironmentProvisioner::new(ProcessRunner).with_install_attempts(opts.install_attempts);
        Self::build_with(scripts_dir, entry_point, opts, &provisioner, &SubprocessRuntimeFactory)
    }

    /// Build with an explicit provisioner and runtime factory.
    /// `opts.install_attempts` is ignored; the provisioner carries its own.
    pub fn build_with<R: CommandRunner>(
        scripts_dir: &Path,
        entry_point: &str,
        opts: &ScriptHostOptions,
        provisioner: &EnvironmentProvisioner<R>,
        factory: &dyn GuestRuntimeFactory,
    ) -> Result<Self, ScriptHostError> {
        validate_scripts_dir(scripts_dir)?;

        let manifest = read_manifest(scripts_dir)?;
        let dependencies = with_bridge_requirement(manifest, factory.bridge_requirement().as_ref());

        // Resolve before provisioning: a bad reference must not cost an install.
        let entry_point = EntryPointRef::resolve(entry_point, scripts_dir)?;

        let working_dir = opts.working_dir.as_deref().unwrap_or(scripts_dir);
        let environment = provisioner.build(
            &dependencies,
            working_dir,
            &BuildOptions {
                base_interpreter: opts.base_interpreter.clone(),
                env_name: opts.env_name.clone(),
                offline_deps_dir: opts.offline_deps_dir.clone(),
                extra_search_path: Some(scripts_dir.to_path_buf()),
            },
        )?;

        let alias = GuestAlias::generate();
        let mut runtime = factory.start(&environment, scripts_dir)?;
        runtime.import(&entry_point.module(), &alias)?;

        info_log!(
            env = %environment.name(),
            entry_point = %entry_point.qualified_name(),
            alias = %alias,
            "script host ready"
        );

        Ok(Self {
            environment,
            entry_point,
            alias,
            scripts_dir: scripts_dir.to_path_buf(),
            runtime,
        })
    }

    /// Build from structured config (`ScriptConfig`).
    pub fn from_config(cfg: &ScriptConfig) -> Result<Self, ScriptHostError> {
        Self::build(&cfg.scripts_dir, &cfg.entry_point, &ScriptHostOptions::from(cfg))
    }

    /// Invoke `<alias>.<method>` in the guest.
    pub fn call_named(&mut self, method: &str, args: &[GuestValue]) -> Result<GuestValue, InvocationError> {
        tracing::debug!(alias = %self.alias, method, args = args.len(), "guest call");
        self.runtime.invoke(&self.alias.qualify(method), args)
    }

    /// Invoke the resolved entry-point callable.
    pub fn call_entry_point(&mut self, args: &[GuestValue]) -> Result<GuestValue, InvocationError> {
        let callable = self.entry_point.callable.clone();
        self.call_named(&callable, args)
    }

    /// Call an init callable once with the opaque settings string, followed by `extra` args.
    pub fn call_init(
        &mut self,
        method: &str,
        settings: &str,
        extra: &[GuestValue],
    ) -> Result<GuestValue, InvocationError> {
        info_log!(method, alias = %self.alias, "calling init method");
        let mut args = Vec::with_capacity(extra.len() + 1);
        args.push(GuestValue::Str(settings.to_string()));
        args.extend_from_slice(extra);
        self.call_named(method, &args)
    }

    /// Run an arbitrary statement in the guest.
    pub fn execute(&mut self, statement: &str) -> Result<(), InvocationError> {
        self.runtime.exec(statement)
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn entry_point(&self) -> &EntryPointRef {
        &self.entry_point
    }

    pub fn alias(&self) -> &GuestAlias {
        &self.alias
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Stop the runtime and hand back the environment, e.g. to `remove()` it.
    pub fn into_environment(self) -> Environment {
        let Self {
            environment, runtime, ..
        } = self;
        drop(runtime);
        environment
    }
}

fn validate_scripts_dir(dir: &Path) -> Result<(), ScriptHostError> {
    let invalid = |reason: &str| ScriptHostError::InvalidScriptsDir {
        path: dir.to_path_buf(),
        reason: reason.to_string(),
    };
    if !dir.is_dir() {
        return Err(invalid("does not exist or is not a directory"));
    }
    let mut entries = std::fs::read_dir(dir).map_err(|e| invalid(&e.to_string()))?;
    if entries.next().is_none() {
        return Err(invalid("directory is empty"));
    }
    if !contains_script(dir) {
        return Err(invalid(&format!("no .{} files found", SCRIPT_EXT)));
    }
    Ok(())
}

/// Symlinks are not followed and virtualenvs (a `pyvenv.cfg` at their root)
/// are skipped, so environments provisioned under the scripts dir never count.
fn contains_script(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        if file_type.is_dir() {
            if !path.join(VENV_MARKER).is_file() && contains_script(&path) {
                return true;
            }
        } else if file_type.is_file() && path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXT) {
            return true;
        }
    }
    false
}

/// Dependency lines from the manifest, blank lines and `#` comments dropped.
/// No manifest means no dependencies.
pub fn read_manifest(scripts_dir: &Path) -> Result<Vec<String>, ScriptHostError> {
    let entries = std::fs::read_dir(scripts_dir).map_err(|source| ScriptHostError::Manifest {
        path: scripts_dir.to_path_buf(),
        source,
    })?;
    let manifest = entries.flatten().map(|e| e.path()).find(|p| {
        p.is_file()
            && p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(MANIFEST_FILE))
    });
    let Some(path) = manifest else {
        return Ok(Vec::new());
    };

    let text = std::fs::read_to_string(&path).map_err(|source| ScriptHostError::Manifest {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(manifest = %path.display(), "read dependency manifest");
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Prepend the bridge's own requirement unless a line already starts with its prefix.
pub fn with_bridge_requirement(mut deps: Vec<String>, bridge: Option<&BridgeRequirement>) -> Vec<String> {
    if let Some(req) = bridge {
        if !deps.iter().any(|d| d.trim().starts_with(&req.prefix)) {
            deps.insert(0, req.specifier.clone());
        }
    }
    deps
}
