//! Single-record transform through a guest callable.
//!
//! The guest receives `{topic, key_schema, key, value_schema, value}` and
//! returns a mapping of the same shape, or `None` to drop the record. Record
//! payloads travel as the quoted-field text encoding. Key and value schemas
//! cannot be changed by the guest: the result is parsed against the original
//! record's schemas.

use anyhow::{Context, Result};
use guesthost_core::config::ScriptConfig;
use guesthost_core::info_log;
use guesthost_core::observability::{marshal_event, MarshalEvent};
use guesthost_marshal::{parse, record_to_text, to_guest, FieldType, MarshalError, TypedValue};
use guesthost_script::{GuestValue, InvocationError, ScriptHost};

/// A record as exchanged with the host framework.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRecord {
    pub topic: String,
    pub partition: Option<i32>,
    pub key_schema: FieldType,
    pub key: Option<TypedValue>,
    pub value_schema: FieldType,
    pub value: Option<TypedValue>,
    pub timestamp: Option<i64>,
}

/// What `apply` returns when the guest result cannot be converted back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Keep the unmodified input record; the failure goes to the marshal-event channel.
    #[default]
    ReturnOriginal,
}

pub struct RecordTransform {
    host: ScriptHost,
    policy: FallbackPolicy,
    script_name: String,
}

impl RecordTransform {
    /// Build the script host from config and run the init callable, if any.
    pub fn configure(cfg: &ScriptConfig) -> Result<Self> {
        let host = ScriptHost::from_config(cfg)
            .with_context(|| format!("Failed to build script host for '{}'", cfg.entry_point))?;
        Self::from_host(host, cfg.init_method.as_deref(), &cfg.private_settings)
    }

    /// Wrap a ready host. `init_method` is called once with the settings string.
    pub fn from_host(mut host: ScriptHost, init_method: Option<&str>, settings: &str) -> Result<Self> {
        if let Some(method) = init_method.filter(|m| !m.is_empty()) {
            host.call_init(method, settings, &[])
                .with_context(|| format!("Init method '{}' failed", method))?;
        }
        let script_name = host.entry_point().qualified_name();
        Ok(Self {
            host,
            policy: FallbackPolicy::default(),
            script_name,
        })
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn host(&self) -> &ScriptHost {
        &self.host
    }

    /// Transform one record. `Ok(None)` drops it. Guest exceptions propagate.
    pub fn apply(&mut self, record: ConnectRecord) -> Result<Option<ConnectRecord>, InvocationError> {
        tracing::debug!(script = %self.script_name, topic = %record.topic, "transforming record");
        let result = self.host.call_entry_point(&[record_to_guest(&record)])?;
        if result.is_none() {
            info_log!(script = %self.script_name, "guest returned None, record dropped");
            return Ok(None);
        }

        match record_from_guest(&result, &record) {
            Ok(transformed) => Ok(Some(transformed)),
            Err(e) => match self.policy {
                FallbackPolicy::ReturnOriginal => {
                    marshal_event(
                        MarshalEvent::TransformFallback,
                        &self.script_name,
                        e.kind(),
                        &e.to_string(),
                    );
                    Ok(Some(record))
                }
            },
        }
    }
}

/// Guest view of a record.
pub fn record_to_guest(record: &ConnectRecord) -> GuestValue {
    GuestValue::map([
        ("topic", GuestValue::Str(record.topic.clone())),
        ("key_schema", record.key_schema.normalized_type_name().into()),
        ("key", payload_to_guest(record.key.as_ref())),
        ("value_schema", record.value_schema.normalized_type_name().into()),
        ("value", payload_to_guest(record.value.as_ref())),
    ])
}

fn payload_to_guest(payload: Option<&TypedValue>) -> GuestValue {
    match payload {
        None => GuestValue::None,
        Some(TypedValue::Record(r)) => GuestValue::Str(record_to_text(r)),
        Some(v) => to_guest(v),
    }
}

/// Rebuild a record from the guest result, keeping the original schemas,
/// partition and timestamp.
pub fn record_from_guest(result: &GuestValue, original: &ConnectRecord) -> Result<ConnectRecord, MarshalError> {
    if !matches!(result, GuestValue::Map(_)) {
        return Err(MarshalError::NotAMapping {
            found: result.native_type_name(),
        });
    }
    let slot = |name: &str| {
        result
            .get(name)
            .ok_or_else(|| MarshalError::MissingField { field: name.to_string() })
    };

    let topic = match slot("topic")? {
        GuestValue::None => original.topic.clone(),
        other => other.to_text(),
    };
    Ok(ConnectRecord {
        topic,
        partition: original.partition,
        key_schema: original.key_schema.clone(),
        key: parse(&original.key_schema, slot("key")?)?,
        value_schema: original.value_schema.clone(),
        value: parse(&original.value_schema, slot("value")?)?,
        timestamp: original.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use guesthost_env::testing::FakePython;
    use guesthost_env::EnvironmentProvisioner;
    use guesthost_marshal::{Record, RecordSchema};
    use guesthost_script::testing::ScriptedRuntimeFactory;
    use guesthost_script::ScriptHostOptions;
    use std::path::PathBuf;

    const TRANSFORM1: &str = "def init(settings):\n    print(settings)\n\ndef transform(record):\n    return record\n";

    struct Fixture {
        _scripts: tempfile::TempDir,
        _work: tempfile::TempDir,
        factory: ScriptedRuntimeFactory,
        transform: RecordTransform,
    }

    fn fixture(factory: ScriptedRuntimeFactory) -> Fixture {
        let scripts = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::write(scripts.path().join("transform1.py"), TRANSFORM1).unwrap();
        let opts = ScriptHostOptions {
            working_dir: Some(work.path().to_path_buf()),
            base_interpreter: Some(PathBuf::from("/usr/bin/python3")),
            ..Default::default()
        };
        let host = ScriptHost::build_with(
            scripts.path(),
            "transform1.transform",
            &opts,
            &EnvironmentProvisioner::new(FakePython::new()),
            &factory,
        )
        .unwrap();
        let transform = RecordTransform::from_host(host, Some("init"), "{\"conf1\":\"value1\"}").unwrap();
        Fixture {
            _scripts: scripts,
            _work: work,
            factory,
            transform,
        }
    }

    /// Prefixes `value`, as transform1.py does.
    fn modify_value(args: &[GuestValue]) -> GuestValue {
        let GuestValue::Map(entries) = &args[0] else {
            return GuestValue::None;
        };
        GuestValue::Map(
            entries
                .iter()
                .map(|(k, v)| {
                    if k == "value" {
                        (k.clone(), GuestValue::Str(format!("Modified from python --> {}", v.to_text())))
                    } else {
                        (k.clone(), v.clone())
                    }
                })
                .collect(),
        )
    }

    fn string_record(value: &str) -> ConnectRecord {
        ConnectRecord {
            topic: "test-topic".into(),
            partition: Some(0),
            key_schema: FieldType::String,
            key: Some("k1".into()),
            value_schema: FieldType::String,
            value: Some(value.into()),
            timestamp: Some(1_700_000_000_000),
        }
    }

    #[test]
    fn test_record_to_guest_shape() {
        let user = Record::new().with("name", "Ada").with("age", TypedValue::Int32(36)).with("active", true);
        let record = ConnectRecord {
            topic: "users".into(),
            partition: None,
            key_schema: FieldType::Int32,
            key: Some(TypedValue::Int32(7)),
            value_schema: TypedValue::Record(user.clone()).field_type(),
            value: Some(TypedValue::Record(user)),
            timestamp: None,
        };
        let g = record_to_guest(&record);
        assert_eq!(g.get("topic"), Some(&GuestValue::Str("users".into())));
        assert_eq!(g.get("key_schema"), Some(&GuestValue::Str("INT32".into())));
        assert_eq!(g.get("key"), Some(&GuestValue::Int(7)));
        assert_eq!(g.get("value_schema"), Some(&GuestValue::Str("JSON".into())));
        assert_eq!(
            g.get("value"),
            Some(&GuestValue::Str(r#"{"name":"Ada","age":"36","active":"true"}"#.into()))
        );
    }

    #[test]
    fn test_init_then_transform_string_value() {
        let mut fx = fixture(
            ScriptedRuntimeFactory::new()
                .on("init", |_| GuestValue::None)
                .on("transform", modify_value),
        );
        let out = fx.transform.apply(string_record("Hello")).unwrap().unwrap();
        assert_eq!(out.value, Some("Modified from python --> Hello".into()));
        assert_eq!(out.key, Some("k1".into()));
        assert_eq!(out.timestamp, Some(1_700_000_000_000));

        let calls = fx.factory.invocations();
        assert_eq!(calls[0].0, "init");
        assert_eq!(calls[0].1, vec![GuestValue::Str("{\"conf1\":\"value1\"}".into())]);
        assert_eq!(calls[1].0, "transform");
    }

    #[test]
    fn test_struct_value_round_trips_through_text() {
        let mut fx = fixture(
            ScriptedRuntimeFactory::new()
                .on("init", |_| GuestValue::None)
                .on("transform", |args| args[0].clone()),
        );
        let schema = FieldType::Record(RecordSchema::new(vec![
            ("name".into(), FieldType::String),
            ("age".into(), FieldType::Int32),
        ]));
        let user = Record::new().with("name", "Ada").with("age", TypedValue::Int32(36));
        let record = ConnectRecord {
            value_schema: schema,
            value: Some(TypedValue::Record(user.clone())),
            ..string_record("")
        };
        let out = fx.transform.apply(record).unwrap().unwrap();
        assert_eq!(out.value, Some(TypedValue::Record(user)));
    }

    #[test]
    fn test_none_result_drops_record() {
        let mut fx = fixture(
            ScriptedRuntimeFactory::new()
                .on("init", |_| GuestValue::None)
                .on("transform", |_| GuestValue::None),
        );
        assert_eq!(fx.transform.apply(string_record("x")).unwrap(), None);
    }

    #[test]
    fn test_unparseable_result_falls_back_to_original() {
        let mut fx = fixture(
            ScriptedRuntimeFactory::new()
                .on("init", |_| GuestValue::None)
                .on("transform", |args| {
                    let mut m = args[0].clone();
                    if let GuestValue::Map(entries) = &mut m {
                        for (k, v) in entries.iter_mut() {
                            if k == "key" {
                                *v = "not a number".into();
                            }
                        }
                    }
                    m
                }),
        );
        let original = ConnectRecord {
            key_schema: FieldType::Int64,
            key: Some(TypedValue::Int64(5)),
            ..string_record("v")
        };
        let out = fx.transform.apply(original.clone()).unwrap();
        assert_eq!(out, Some(original.clone()));

        // not a mapping at all
        let mut fx = fixture(
            ScriptedRuntimeFactory::new()
                .on("init", |_| GuestValue::None)
                .on("transform", |_| GuestValue::Str("hello".into())),
        );
        assert_eq!(fx.transform.apply(original.clone()).unwrap(), Some(original));
    }

    #[test]
    fn test_guest_exception_propagates() {
        let mut fx = fixture(
            ScriptedRuntimeFactory::new()
                .on("init", |_| GuestValue::None)
                .raises("transform", "KeyError", "'value'"),
        );
        let err = fx.transform.apply(string_record("x")).unwrap_err();
        assert!(matches!(err, InvocationError::GuestRaised { ref kind, .. } if kind == "KeyError"));
    }

    #[test]
    fn test_failing_init_aborts_configuration() {
        let scripts = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::write(scripts.path().join("transform1.py"), TRANSFORM1).unwrap();
        let factory = ScriptedRuntimeFactory::new().raises("init", "ValueError", "bad settings");
        let host = ScriptHost::build_with(
            scripts.path(),
            "transform1.transform",
            &ScriptHostOptions {
                working_dir: Some(work.path().to_path_buf()),
                base_interpreter: Some(PathBuf::from("/usr/bin/python3")),
                ..Default::default()
            },
            &EnvironmentProvisioner::new(FakePython::new()),
            &factory,
        )
        .unwrap();
        let err = RecordTransform::from_host(host, Some("init"), "{}").err().unwrap();
        assert!(err.to_string().contains("Init method 'init' failed"));
    }

    #[test]
    fn test_topic_can_be_rewritten() {
        let original = string_record("v");
        let result = GuestValue::map([
            ("topic", "other".into()),
            ("key", GuestValue::None),
            ("value", "w".into()),
        ]);
        let out = record_from_guest(&result, &original).unwrap();
        assert_eq!(out.topic, "other");
        assert_eq!(out.key, None);
        assert_eq!(out.value, Some("w".into()));
        assert_eq!(out.partition, Some(0));

        let missing = GuestValue::map([("topic", "other".into())]);
        assert_eq!(
            record_from_guest(&missing, &original),
            Err(MarshalError::MissingField { field: "key".into() })
        );
    }
}
