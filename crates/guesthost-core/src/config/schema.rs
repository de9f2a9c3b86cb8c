//! Structured config grouped by concern.
//!
//! Script settings come either from a connector property map or from the
//! environment; both paths share the same defaults.

use super::env_keys::{observability as obv_keys, props, script as script_keys, source as source_keys};
use super::loader::{env_bool, env_optional, env_or};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Attempts per dependency install when nothing is configured.
pub const DEFAULT_INSTALL_ATTEMPTS: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting '{0}'")]
    Missing(&'static str),

    #[error("Invalid value for '{key}': {value}")]
    Invalid { key: &'static str, value: String },
}

/// Settings for one script host: where scripts live, what to call, how to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptConfig {
    /// Base interpreter. `None` means discover one on the host.
    pub python_path: Option<PathBuf>,
    pub scripts_dir: PathBuf,
    /// Where the isolated environment is created. Defaults to `scripts_dir`.
    pub working_dir: PathBuf,
    pub entry_point: String,
    /// Optional init callable, called once with the private settings.
    pub init_method: Option<String>,
    /// Opaque JSON string forwarded to the init callable untouched.
    pub private_settings: String,
    pub offline_install_dir: Option<PathBuf>,
    pub install_attempts: u32,
}

impl ScriptConfig {
    /// Build from a connector property map only.
    pub fn from_props(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::build(|prop, _env| prop_value(map, prop))
    }

    /// Build from a property map, falling back to `GUESTHOST_*` env vars per key.
    pub fn from_props_with_env(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        super::loader::load_dotenv();
        Self::build(|prop, env| prop_value(map, prop).or_else(|| env_value(prop, env)))
    }

    /// Build from env vars only (loads `.env` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_props_with_env(&HashMap::new())
    }

    fn build<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str, &'static str) -> Option<String>,
    {
        let python_path = get(props::PYTHON_PATH, script_keys::GUESTHOST_PYTHON_PATH)
            .map(PathBuf::from);
        let scripts_dir = get(props::SCRIPTS_DIR, script_keys::GUESTHOST_SCRIPTS_DIR)
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(props::SCRIPTS_DIR))?;
        let entry_point = get(props::ENTRY_POINT, script_keys::GUESTHOST_ENTRY_POINT)
            .ok_or(ConfigError::Missing(props::ENTRY_POINT))?;
        let working_dir = get(props::WORKING_DIR, script_keys::GUESTHOST_WORKING_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| scripts_dir.clone());
        let init_method = get(props::INIT_METHOD, script_keys::GUESTHOST_INIT_METHOD);
        let private_settings = get(props::PRIVATE_SETTINGS, script_keys::GUESTHOST_PRIVATE_SETTINGS)
            .unwrap_or_default();
        let offline_install_dir =
            get(props::OFFLINE_INSTALL_DIR, script_keys::GUESTHOST_OFFLINE_INSTALL_DIR)
                .map(PathBuf::from);
        let install_attempts = match get(props::INSTALL_ATTEMPTS, script_keys::GUESTHOST_INSTALL_ATTEMPTS) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: props::INSTALL_ATTEMPTS,
                        value: raw,
                    })
                }
            },
            None => DEFAULT_INSTALL_ATTEMPTS,
        };

        Ok(Self {
            python_path,
            scripts_dir,
            working_dir,
            entry_point,
            init_method,
            private_settings,
            offline_install_dir,
            install_attempts,
        })
    }
}

/// Source task settings: the script host plus where produced records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub script: ScriptConfig,
    pub topic: String,
    pub task_id: u32,
}

impl SourceConfig {
    pub fn from_props(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let script = ScriptConfig::from_props(map)?;
        Self::with_source_keys(script, |prop, _env| prop_value(map, prop))
    }

    pub fn from_props_with_env(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let script = ScriptConfig::from_props_with_env(map)?;
        Self::with_source_keys(script, |prop, env| {
            prop_value(map, prop).or_else(|| env_value(prop, env))
        })
    }

    fn with_source_keys<F>(script: ScriptConfig, get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str, &'static str) -> Option<String>,
    {
        let topic = get(props::TOPIC, source_keys::GUESTHOST_TOPIC)
            .ok_or(ConfigError::Missing(props::TOPIC))?;
        let task_id = match get(props::TASK_ID, source_keys::GUESTHOST_TASK_ID) {
            Some(raw) => raw.parse::<u32>().map_err(|_| ConfigError::Invalid {
                key: props::TASK_ID,
                value: raw,
            })?,
            None => 0,
        };
        Ok(Self {
            script,
            topic,
            task_id,
        })
    }
}

/// Trimmed value, empty counted as unset. Private settings are opaque and
/// pass through untouched.
fn prop_value(map: &HashMap<String, String>, prop: &str) -> Option<String> {
    let raw = map.get(prop)?;
    if prop == props::PRIVATE_SETTINGS {
        return Some(raw.clone()).filter(|s| !s.is_empty());
    }
    Some(raw.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_value(prop: &str, env: &str) -> Option<String> {
    if prop == props::PRIVATE_SETTINGS {
        return std::env::var(env).ok().filter(|s| !s.is_empty());
    }
    env_optional(env, &[])
}

/// Logging and event-channel settings.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub marshal_events_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::GUESTHOST_QUIET, &[], false),
                log_level: env_or(obv_keys::GUESTHOST_LOG_LEVEL, &[], || {
                    "guesthost=info".to_string()
                }),
                log_json: env_bool(obv_keys::GUESTHOST_LOG_JSON, &[], false),
                marshal_events_log: env_optional(obv_keys::GUESTHOST_MARSHAL_EVENTS_LOG, &[]),
            }
        })
    }
}
