//! Process-unique names for imported guest modules.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT: AtomicU64 = AtomicU64::new(0);

/// Namespace the entry-point module is imported under.
///
/// Unique for the lifetime of the process: a monotonic counter plus a random
/// uuid, so two hosts sharing one guest process never shadow each other.
/// The text is always a valid guest identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuestAlias(String);

impl GuestAlias {
    pub fn generate() -> Self {
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        Self(format!("guest_{}_{}", n, uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<alias>.<name>`
    pub fn qualify(&self, name: &str) -> String {
        format!("{}.{}", self.0, name)
    }
}

impl fmt::Display for GuestAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
