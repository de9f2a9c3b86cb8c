use std::path::PathBuf;

use guesthost_env::ProvisioningError;
use thiserror::Error;

/// Entry-point reference could not be resolved to a callable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntryPointError {
    #[error("Malformed entry point '{0}': expected <module>.<callable>")]
    MalformedReference(String),

    #[error("Callable '{callable}' not found in {path}")]
    CallableNotFound { path: PathBuf, callable: String },
}

impl EntryPointError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedReference(_) => "malformed_reference",
            Self::CallableNotFound { .. } => "callable_not_found",
        }
    }
}

/// A call into the guest runtime failed.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Failed to start guest runtime {interpreter}: {source}")]
    Spawn {
        interpreter: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Guest runtime transport failed: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Guest runtime protocol error: {0}")]
    Protocol(String),

    #[error("{kind}: {message}")]
    GuestRaised {
        /// Guest exception class name.
        kind: String,
        message: String,
        traceback: Option<String>,
    },
}

impl InvocationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::Transport(_) => "transport",
            Self::Protocol(_) => "protocol",
            Self::GuestRaised { .. } => "guest_raised",
        }
    }
}

/// ScriptHost construction failed; the host never reached `Ready`.
#[derive(Debug, Error)]
pub enum ScriptHostError {
    #[error("Invalid scripts directory {path}: {reason}")]
    InvalidScriptsDir { path: PathBuf, reason: String },

    #[error("Failed to read dependency manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    EntryPoint(#[from] EntryPointError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error("Guest runtime failed during setup: {0}")]
    Runtime(#[from] InvocationError),
}

impl ScriptHostError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidScriptsDir { .. } => "invalid_scripts_dir",
            Self::Manifest { .. } => "manifest",
            Self::EntryPoint(e) => e.kind(),
            Self::Provisioning(_) => "provisioning",
            Self::Runtime(e) => e.kind(),
        }
    }
}
