//! Unified configuration layer.
//!
//! Every environment variable read goes through this module; the rest of the
//! workspace works with structured config instead of calling `std::env::var`.
//!
//! - `loader`: `env_or`, `env_optional`, `env_bool`, `.env` loading
//! - `schema`: `ScriptConfig`, `SourceConfig`, `ObservabilityConfig`
//! - `env_keys`: env var names and connector property names

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, load_dotenv, load_dotenv_from_dir};
pub use schema::{ConfigError, ObservabilityConfig, ScriptConfig, SourceConfig};
