//! Guest environment provisioning.
//!
//! `process` runs external commands (with bounded retry), `interpreter` finds a
//! base interpreter and its library path, `env` builds the isolated
//! installation the script host binds to.

pub mod env;
pub mod error;
pub mod interpreter;
pub mod process;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use env::builder::{BuildOptions, Environment, EnvironmentProvisioner};
pub use error::{ProcessError, ProvisioningError};
pub use process::{CommandRunner, CommandSpec, ProcessRunner};
