//! Environment builder: venv creation, search paths, dependency install.
//!
//! Callers pass a dependency list and directories; this module creates the
//! isolated environment and returns an immutable `Environment`.

pub mod builder;
