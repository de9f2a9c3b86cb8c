//! The guest runtime capability.
//!
//! A [`GuestRuntime`] executes statements, imports modules and invokes
//! callables inside one guest interpreter instance. The host only talks to
//! this trait; [`subprocess`] is the shipped implementation.

use std::path::Path;

use guesthost_env::Environment;

use crate::alias::GuestAlias;
use crate::error::InvocationError;
use crate::value::GuestValue;

pub mod subprocess;

pub use subprocess::{SubprocessRuntime, SubprocessRuntimeFactory};

/// One running guest interpreter. Calls are serialized through `&mut self`.
pub trait GuestRuntime: Send {
    /// Run an arbitrary statement in the runtime's global namespace.
    fn exec(&mut self, statement: &str) -> Result<(), InvocationError>;

    /// Bind `module` under `alias` in the global namespace.
    fn import(&mut self, module: &str, alias: &GuestAlias) -> Result<(), InvocationError> {
        self.exec(&format!("import {} as {}", module, alias))
    }

    /// Call the dotted `callable` (`<alias>.<name>`) with positional `args`.
    /// A guest `None` return is `Ok(GuestValue::None)`.
    fn invoke(&mut self, callable: &str, args: &[GuestValue]) -> Result<GuestValue, InvocationError>;
}

/// A guest package the embedding itself needs installed in every environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRequirement {
    /// A manifest line starting with this counts as already present.
    pub prefix: String,
    /// Line to prepend when absent (e.g. `pemja==0.3.0`).
    pub specifier: String,
}

/// Starts runtimes bound to a provisioned [`Environment`].
pub trait GuestRuntimeFactory: Send + Sync {
    fn start(
        &self,
        env: &Environment,
        scripts_dir: &Path,
    ) -> Result<Box<dyn GuestRuntime>, InvocationError>;

    fn bridge_requirement(&self) -> Option<BridgeRequirement> {
        None
    }
}
