//! CLI command implementations.
//!
//! `call` and `poll` hand their flags to the config layer as connector
//! properties, so unset flags fall back to `GUESTHOST_*` env vars and `.env`.

pub mod env;
pub mod script;

use std::collections::HashMap;
use std::path::PathBuf;

pub use guesthost_core::config::env_keys::props;

/// Property map from flags that were given.
pub fn prop_map<const N: usize>(pairs: [(&'static str, Option<String>); N]) -> HashMap<String, String> {
    pairs
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect()
}

pub fn path_str(p: PathBuf) -> String {
    p.to_string_lossy().into_owned()
}
