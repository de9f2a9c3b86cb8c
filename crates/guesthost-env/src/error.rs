use std::path::PathBuf;
use thiserror::Error;

/// Failure of an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to execute `{command}` (exit code {code:?})\noutput: {output}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ProcessError>,
    },
}

impl ProcessError {
    /// The command line that failed.
    pub fn command(&self) -> &str {
        match self {
            Self::Launch { command, .. } | Self::NonZeroExit { command, .. } => command,
            Self::RetriesExhausted { last, .. } => last.command(),
        }
    }

    /// Merged stdout/stderr captured before the failure (empty on launch failure).
    pub fn captured_output(&self) -> &str {
        match self {
            Self::Launch { .. } => "",
            Self::NonZeroExit { output, .. } => output,
            Self::RetriesExhausted { last, .. } => last.captured_output(),
        }
    }
}

/// Failure while building an isolated environment. Always fatal to the build.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("No default python3 interpreter found on PATH")]
    NoInterpreterFound,

    #[error("Failed to create environment at {path}: {source}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: ProcessError,
    },

    #[error("Environment at {0} has no interpreter after creation")]
    MissingInterpreter(PathBuf),

    #[error("Failed to query library path of {interpreter}: {source}")]
    SitePackages {
        interpreter: PathBuf,
        #[source]
        source: ProcessError,
    },

    #[error("Dependency installation failed: {0}")]
    Install(#[source] ProcessError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
