//! Record consumers built on [`guesthost_script::ScriptHost`].
//!
//! Both consumers are single-threaded: the caller drives one task or one
//! transform instance from one thread at a time.

pub mod source;
pub mod transform;

pub use source::{SourceRecord, SourceTask};
pub use transform::{ConnectRecord, FallbackPolicy, RecordTransform};
