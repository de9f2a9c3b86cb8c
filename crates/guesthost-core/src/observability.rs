//! Observability: tracing init and the marshal-event channel.
//!
//! Uses `config::ObservabilityConfig` for GUESTHOST_QUIET, LOG_LEVEL, LOG_JSON
//! and MARSHAL_EVENTS_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

/// Quiet-mode aware info logging. When GUESTHOST_QUIET=1, info lines are dropped.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        if !$crate::observability::is_quiet() {
            tracing::info!($($arg)*);
        }
    }};
}

pub fn is_quiet() -> bool {
    ObservabilityConfig::from_env().quiet
}

/// Initialize tracing. Call once at process startup; later calls are no-ops.
/// `RUST_LOG` wins over GUESTHOST_LOG_LEVEL when set.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "guesthost=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}

/// Which consumer path produced a marshal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshalEvent {
    /// Transform result could not be parsed; the original record was kept.
    TransformFallback,
    /// Poll result had a shape the adapter does not accept; nothing was produced.
    PollDropped,
}

impl MarshalEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransformFallback => "transform_fallback",
            Self::PollDropped => "poll_dropped",
        }
    }
}

/// Record a marshalling failure: always a `warn!`, plus one JSONL line when
/// GUESTHOST_MARSHAL_EVENTS_LOG is set.
pub fn marshal_event(event: MarshalEvent, script: &str, error_kind: &str, message: &str) {
    tracing::warn!(
        event = event.as_str(),
        script,
        error_kind,
        "{}",
        message
    );
    if let Some(path) = ObservabilityConfig::from_env().marshal_events_log.as_deref() {
        append_marshal_event(Path::new(path), event, script, error_kind, message);
    }
}

/// Append one marshal event line to `path`, creating parent dirs as needed.
pub fn append_marshal_event(
    path: &Path,
    event: MarshalEvent,
    script: &str,
    error_kind: &str,
    message: &str,
) {
    let record = json!({
        "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "event": event.as_str(),
        "script": script,
        "error_kind": error_kind,
        "message": message,
    });
    append_jsonl(path, &record);
}

fn append_jsonl(path: &Path, record: &serde_json::Value) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}
