//! Environment variable names and connector property names.
//!
//! Env vars use the `GUESTHOST_*` prefix. Property names follow the
//! dotted connector convention (`scripts.dir`, `entry.point`, ...).

/// Script host settings
pub mod script {
    pub const GUESTHOST_PYTHON_PATH: &str = "GUESTHOST_PYTHON_PATH";

    pub const GUESTHOST_SCRIPTS_DIR: &str = "GUESTHOST_SCRIPTS_DIR";
    pub const GUESTHOST_WORKING_DIR: &str = "GUESTHOST_WORKING_DIR";
    pub const GUESTHOST_ENTRY_POINT: &str = "GUESTHOST_ENTRY_POINT";
    pub const GUESTHOST_INIT_METHOD: &str = "GUESTHOST_INIT_METHOD";
    pub const GUESTHOST_PRIVATE_SETTINGS: &str = "GUESTHOST_PRIVATE_SETTINGS";
    pub const GUESTHOST_OFFLINE_INSTALL_DIR: &str = "GUESTHOST_OFFLINE_INSTALL_DIR";

    /// Attempts per dependency install. Default 3.
    pub const GUESTHOST_INSTALL_ATTEMPTS: &str = "GUESTHOST_INSTALL_ATTEMPTS";
}

/// Source task settings
pub mod source {
    pub const GUESTHOST_TOPIC: &str = "GUESTHOST_TOPIC";
    pub const GUESTHOST_TASK_ID: &str = "GUESTHOST_TASK_ID";
}

/// Observability and logging
pub mod observability {
    pub const GUESTHOST_QUIET: &str = "GUESTHOST_QUIET";
    pub const GUESTHOST_LOG_LEVEL: &str = "GUESTHOST_LOG_LEVEL";
    pub const GUESTHOST_LOG_JSON: &str = "GUESTHOST_LOG_JSON";

    /// JSONL file receiving one line per marshalling fallback / dropped poll result.
    pub const GUESTHOST_MARSHAL_EVENTS_LOG: &str = "GUESTHOST_MARSHAL_EVENTS_LOG";
}

/// Connector property names (the keys a host framework hands to a task).
pub mod props {
    pub const PYTHON_PATH: &str = "python.path";
    pub const SCRIPTS_DIR: &str = "scripts.dir";
    pub const WORKING_DIR: &str = "working.dir";
    pub const ENTRY_POINT: &str = "entry.point";
    pub const INIT_METHOD: &str = "init.method";
    pub const PRIVATE_SETTINGS: &str = "private.settings";
    pub const OFFLINE_INSTALL_DIR: &str = "offline.installation.dir";
    pub const INSTALL_ATTEMPTS: &str = "install.attempts";
    pub const TOPIC: &str = "kafka.topic";
    pub const TASK_ID: &str = "task.id";
}
