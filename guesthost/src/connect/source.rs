//! Source task: each poll calls the guest with the current cursor and turns
//! the result into records for one topic.

use anyhow::{Context, Result};
use guesthost_core::config::SourceConfig;
use guesthost_core::info_log;
use guesthost_core::observability::{marshal_event, MarshalEvent};
use guesthost_marshal::{adapt_with_cursor, Cursor, Slot};
use guesthost_script::{GuestValue, InvocationError, ScriptHost};
use serde_json::{json, Value};

/// Partition and header key identifying the producing task.
pub const TASK_ID_KEY: &str = "task.id";

#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// `{"task.id": <id>}`
    pub partition: GuestValue,
    pub cursor: Cursor,
    pub topic: String,
    pub key: Slot,
    pub value: Slot,
    pub headers: Vec<(String, GuestValue)>,
}

impl SourceRecord {
    pub fn to_json(&self) -> Value {
        let slot = |s: &Slot| {
            json!({
                "schema": s.schema.as_ref().map(|t| t.to_string()),
                "data": s.value.as_ref().map(|v| v.to_json()).unwrap_or(Value::Null),
            })
        };
        json!({
            "topic": self.topic,
            "partition": self.partition.to_json(),
            "offset": self.cursor.to_json(),
            "key": slot(&self.key),
            "value": slot(&self.value),
            "headers": GuestValue::Map(self.headers.clone()).to_json(),
        })
    }
}

pub struct SourceTask {
    host: ScriptHost,
    topic: String,
    task_id: u32,
    cursor: Cursor,
    script_name: String,
}

impl SourceTask {
    /// Build the script host and call the init callable with
    /// `(settings, cursor)`. `stored` is the cursor persisted by a previous run.
    pub fn start(cfg: &SourceConfig, stored: Option<Cursor>) -> Result<Self> {
        info_log!(topic = %cfg.topic, task_id = cfg.task_id, "starting source task");
        let host = ScriptHost::from_config(&cfg.script)
            .with_context(|| format!("Failed to build script host for '{}'", cfg.script.entry_point))?;
        Self::from_host(
            host,
            cfg.script.init_method.as_deref(),
            &cfg.script.private_settings,
            &cfg.topic,
            cfg.task_id,
            stored,
        )
    }

    pub fn from_host(
        mut host: ScriptHost,
        init_method: Option<&str>,
        settings: &str,
        topic: &str,
        task_id: u32,
        stored: Option<Cursor>,
    ) -> Result<Self> {
        let cursor = stored.unwrap_or_default();
        if let Some(method) = init_method.filter(|m| !m.is_empty()) {
            host.call_init(method, settings, &[cursor.to_guest()])
                .with_context(|| format!("Init method '{}' failed", method))?;
        }
        let script_name = host.entry_point().qualified_name();
        Ok(Self {
            host,
            topic: topic.to_string(),
            task_id,
            cursor,
            script_name,
        })
    }

    /// One poll. `Ok(None)` when the guest returned `None` or a result the
    /// adapter rejects; the cursor is unchanged in both cases. Guest
    /// exceptions propagate.
    pub fn poll(&mut self) -> Result<Option<Vec<SourceRecord>>, InvocationError> {
        let raw = self.host.call_entry_point(&[self.cursor.to_guest()])?;
        if raw.is_none() {
            info_log!(script = %self.script_name, "guest returned None, nothing produced");
            return Ok(None);
        }

        let batch = match adapt_with_cursor(&raw, &self.script_name, &self.cursor) {
            Ok(batch) => batch,
            Err(e) => {
                marshal_event(MarshalEvent::PollDropped, &self.script_name, e.kind(), &e.to_string());
                return Ok(None);
            }
        };
        if let Some((_, cursor)) = batch.last() {
            self.cursor = cursor.clone();
        }

        let partition = GuestValue::map([(TASK_ID_KEY, GuestValue::Int(i64::from(self.task_id)))]);
        let headers = vec![(TASK_ID_KEY.to_string(), GuestValue::Int(i64::from(self.task_id)))];
        let records: Vec<SourceRecord> = batch
            .into_iter()
            .map(|(record, cursor)| SourceRecord {
                partition: partition.clone(),
                cursor,
                topic: self.topic.clone(),
                key: record.key,
                value: record.value,
                headers: headers.clone(),
            })
            .collect();
        tracing::debug!(script = %self.script_name, count = records.len(), "poll produced records");
        Ok(Some(records))
    }

    /// Cursor to persist between runs.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn host(&self) -> &ScriptHost {
        &self.host
    }

    /// Stop the guest runtime. The environment stays on disk.
    pub fn stop(self) {
        info_log!(script = %self.script_name, task_id = self.task_id, "stopping source task");
        drop(self.host);
    }
}
