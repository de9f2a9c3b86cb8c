//! `guesthost provision` and `guesthost resolve`.

use anyhow::{Context, Result};
use guesthost_env::{BuildOptions, EnvironmentProvisioner, ProcessRunner};
use guesthost_script::EntryPointRef;
use std::path::{Path, PathBuf};

/// `guesthost provision`
pub fn cmd_provision(
    deps: &[String],
    working_dir: &Path,
    python: Option<PathBuf>,
    name: Option<String>,
    offline_dir: Option<PathBuf>,
    extra_path: Option<PathBuf>,
) -> Result<()> {
    let opts = BuildOptions {
        base_interpreter: python,
        env_name: name,
        offline_deps_dir: offline_dir,
        extra_search_path: extra_path,
    };
    let env = EnvironmentProvisioner::new(ProcessRunner)
        .build(deps, working_dir, &opts)
        .with_context(|| format!("Failed to provision environment under {}", working_dir.display()))?;
    println!("{}", serde_json::to_string_pretty(&env)?);
    Ok(())
}

/// `guesthost resolve`
pub fn cmd_resolve(entry_point: &str, scripts_dir: &Path) -> Result<()> {
    let ep = EntryPointRef::resolve(entry_point, scripts_dir)?;
    println!("{}", serde_json::to_string_pretty(&ep)?);
    Ok(())
}
