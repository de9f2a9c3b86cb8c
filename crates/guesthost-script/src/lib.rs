//! Script host: binds one provisioned environment and one resolved entry
//! point to a running guest runtime.
//!
//! - `entry_point`: dotted reference → module path + callable, with a textual pre-check
//! - `alias`: process-unique namespace for the imported guest module
//! - `runtime`: the `GuestRuntime` capability and the subprocess bridge behind it
//! - `host`: `ScriptHost` construction and calls

pub mod alias;
pub mod entry_point;
pub mod error;
pub mod host;
pub mod runtime;
pub mod value;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use alias::GuestAlias;
pub use entry_point::EntryPointRef;
pub use error::{EntryPointError, InvocationError, ScriptHostError};
pub use host::{ScriptHost, ScriptHostOptions};
pub use runtime::{BridgeRequirement, GuestRuntime, GuestRuntimeFactory, SubprocessRuntimeFactory};
pub use value::GuestValue;
