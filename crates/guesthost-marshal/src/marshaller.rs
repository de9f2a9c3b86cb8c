//! Conversions between typed host values and guest values.
//!
//! Host → guest is total. Guest → host has two paths: inference when no
//! schema is declared (never fails), and typed parse against a declared
//! schema (fails with [`MarshalError`]).

use serde_json::{Map, Value};

use guesthost_script::GuestValue;

use crate::error::MarshalError;
use crate::typed::{FieldType, Record, RecordSchema, TypedValue};

/// Host value → guest value. Records become mappings, null fields `None`.
pub fn to_guest(value: &TypedValue) -> GuestValue {
    match value {
        TypedValue::Int8(i) => GuestValue::Int(i64::from(*i)),
        TypedValue::Int16(i) => GuestValue::Int(i64::from(*i)),
        TypedValue::Int32(i) => GuestValue::Int(i64::from(*i)),
        TypedValue::Int64(i) => GuestValue::Int(*i),
        TypedValue::Float32(f) => GuestValue::Float(f64::from(*f)),
        TypedValue::Float64(f) => GuestValue::Float(*f),
        TypedValue::Bool(b) => GuestValue::Bool(*b),
        TypedValue::Bytes(b) => GuestValue::Bytes(b.clone()),
        TypedValue::String(s) => GuestValue::Str(s.clone()),
        TypedValue::Record(r) => GuestValue::Map(
            r.fields()
                .iter()
                .map(|(n, v)| (n.clone(), v.as_ref().map(to_guest).unwrap_or(GuestValue::None)))
                .collect(),
        ),
    }
}

/// Text encoding of a record for guests that take records as strings:
/// `{"name":"Ada","age":"36","active":"true"}`.
///
/// Every value is rendered as a quoted string, so field types are lost.
/// Nested records are encoded the same way and embedded as a string; null
/// fields are `null`.
pub fn record_to_text(record: &Record) -> String {
    let mut obj = Map::new();
    for (name, value) in record.fields() {
        let v = match value {
            Some(v) => Value::String(v.to_text()),
            None => Value::Null,
        };
        obj.insert(name.clone(), v);
    }
    Value::Object(obj).to_string()
}

/// Field type of an untyped guest value. Mappings become records with every
/// field inferred the same way, at any depth; everything else goes through
/// [`FieldType::from_native_type_name`].
pub fn infer_schema(value: &GuestValue) -> FieldType {
    match value {
        GuestValue::Map(entries) => FieldType::Record(RecordSchema::new(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), infer_schema(v)))
                .collect(),
        )),
        other => FieldType::from_native_type_name(other.native_type_name()),
    }
}

/// Value matching [`infer_schema`]. `None` for a guest `None`.
pub fn infer_value(value: &GuestValue) -> Option<TypedValue> {
    Some(match value {
        GuestValue::None => return None,
        GuestValue::Bool(b) => TypedValue::Bool(*b),
        GuestValue::Int(i) => TypedValue::Int64(*i),
        GuestValue::Float(f) => TypedValue::Float64(*f),
        GuestValue::Str(s) => TypedValue::String(s.clone()),
        GuestValue::Bytes(b) => TypedValue::Bytes(b.clone()),
        GuestValue::List(_) => TypedValue::String(value.to_text()),
        GuestValue::Map(entries) => {
            let mut record = Record::new();
            for (k, v) in entries {
                record.put(k.clone(), infer_value(v));
            }
            TypedValue::Record(record)
        }
    })
}

/// Parse a guest value against a declared type.
///
/// Numbers and booleans are parsed from the value's text form at the declared
/// width. Records JSON-decode the text form and parse each declared field;
/// a record schema without fields takes every decoded field with inferred
/// types. `String` accepts anything. A guest `None` is null for every type.
pub fn parse(field_type: &FieldType, value: &GuestValue) -> Result<Option<TypedValue>, MarshalError> {
    if value.is_none() {
        return Ok(None);
    }
    let parsed = match field_type {
        FieldType::Int8 => TypedValue::Int8(parse_int(value, "INT8")?),
        FieldType::Int16 => TypedValue::Int16(parse_int(value, "INT16")?),
        FieldType::Int32 => TypedValue::Int32(parse_int(value, "INT32")?),
        FieldType::Int64 => TypedValue::Int64(parse_int(value, "INT64")?),
        FieldType::Float32 => TypedValue::Float32(parse_float(value, "FLOAT32")?),
        FieldType::Float64 => TypedValue::Float64(parse_float(value, "FLOAT64")?),
        FieldType::Bool => {
            let text = value.to_text();
            match text.trim().to_ascii_lowercase().as_str() {
                "true" => TypedValue::Bool(true),
                "false" => TypedValue::Bool(false),
                _ => return Err(MarshalError::ParseBool { text }),
            }
        }
        FieldType::Bytes => match value {
            GuestValue::Bytes(b) => TypedValue::Bytes(b.clone()),
            other => TypedValue::Bytes(other.to_text().into_bytes()),
        },
        FieldType::String => TypedValue::String(value.to_text()),
        FieldType::Record(schema) => TypedValue::Record(parse_record(schema, value)?),
    };
    Ok(Some(parsed))
}

fn parse_int<T: std::str::FromStr>(value: &GuestValue, ty: &'static str) -> Result<T, MarshalError> {
    let text = value.to_text();
    text.trim()
        .parse::<T>()
        .map_err(|_| MarshalError::ParseInt { ty, text })
}

fn parse_float<T: std::str::FromStr>(value: &GuestValue, ty: &'static str) -> Result<T, MarshalError> {
    let text = value.to_text();
    text.trim()
        .parse::<T>()
        .map_err(|_| MarshalError::ParseFloat { ty, text })
}

fn parse_record(schema: &RecordSchema, value: &GuestValue) -> Result<Record, MarshalError> {
    let text = value.to_text();
    let decoded: Value = serde_json::from_str(&text).map_err(|e| MarshalError::InvalidJson {
        text: text.clone(),
        message: e.to_string(),
    })?;
    let fields = match GuestValue::from_json(decoded) {
        GuestValue::Map(fields) => fields,
        other => {
            return Err(MarshalError::NotAMapping {
                found: other.native_type_name(),
            })
        }
    };

    let mut record = Record::new();
    if schema.fields.is_empty() {
        for (name, v) in &fields {
            record.put(name.clone(), infer_value(v));
        }
        return Ok(record);
    }
    for (name, ty) in &schema.fields {
        let v = fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .ok_or_else(|| MarshalError::MissingField { field: name.clone() })?;
        record.put(name.clone(), parse(ty, v)?);
    }
    Ok(record)
}

/// Narrow a value to a declared type when the guest produced a wider one:
/// 64-bit int to 32/16-bit (truncating), 64-bit float to 32-bit. Every other
/// pairing is returned unchanged.
pub fn cast_from_type_hint(value: TypedValue, declared: &FieldType) -> TypedValue {
    match (value, declared) {
        (TypedValue::Int64(i), FieldType::Int32) => TypedValue::Int32(i as i32),
        (TypedValue::Int64(i), FieldType::Int16) => TypedValue::Int16(i as i16),
        (TypedValue::Float64(f), FieldType::Float32) => TypedValue::Float32(f as f32),
        (v, _) => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(v: TypedValue) {
        let ty = v.field_type();
        let back = parse(&ty, &to_guest(&v)).unwrap();
        assert_eq!(back, Some(v));
    }

    #[test]
    fn test_primitive_round_trips() {
        for v in [
            TypedValue::Int8(i8::MIN),
            TypedValue::Int8(i8::MAX),
            TypedValue::Int16(i16::MIN),
            TypedValue::Int16(i16::MAX),
            TypedValue::Int32(i32::MIN),
            TypedValue::Int32(i32::MAX),
            TypedValue::Int64(i64::MIN),
            TypedValue::Int64(0),
            TypedValue::Float32(0.0),
            TypedValue::Float32(-2.5),
            TypedValue::Float32(1.1),
            TypedValue::Float64(0.0),
            TypedValue::Float64(-1234.5678),
            TypedValue::Bool(true),
            TypedValue::Bool(false),
            TypedValue::String("héllo".into()),
            TypedValue::Bytes(vec![4, 0]),
        ] {
            round_trip(v);
        }
    }

    #[test]
    fn test_record_round_trip_through_mapping() {
        let r = Record::new()
            .with("name", "Ada")
            .with("age", TypedValue::Int32(36))
            .with("active", true);
        round_trip(TypedValue::Record(r));
    }

    #[test]
    fn test_record_to_text() {
        let r = Record::new()
            .with("name", "Ada")
            .with("age", TypedValue::Int32(36))
            .with("active", true);
        assert_eq!(record_to_text(&r), r#"{"name":"Ada","age":"36","active":"true"}"#);
    }

    #[test]
    fn test_record_text_parses_back_with_declared_schema() {
        let r = Record::new()
            .with("name", "Ada")
            .with("age", TypedValue::Int32(36))
            .with("score", TypedValue::Float64(0.5));
        let text = GuestValue::Str(record_to_text(&r));
        let parsed = parse(&TypedValue::Record(r.clone()).field_type(), &text).unwrap();
        assert_eq!(parsed, Some(TypedValue::Record(r)));
    }

    #[test]
    fn test_nested_record_text_parses_back() {
        let inner = Record::new().with("zip", "75001").with("floor", TypedValue::Int16(3));
        let outer = Record::new().with("id", 7i64).with("addr", inner);
        let text = GuestValue::Str(record_to_text(&outer));
        let parsed = parse(&TypedValue::Record(outer.clone()).field_type(), &text).unwrap();
        assert_eq!(parsed, Some(TypedValue::Record(outer)));
    }

    #[test]
    fn test_infer_schema_table() {
        assert_eq!(infer_schema(&GuestValue::Int(1)), FieldType::Int64);
        assert_eq!(infer_schema(&GuestValue::Float(1.0)), FieldType::Float64);
        assert_eq!(infer_schema(&GuestValue::Bool(true)), FieldType::Bool);
        assert_eq!(infer_schema(&GuestValue::Bytes(vec![1])), FieldType::Bytes);
        assert_eq!(infer_schema(&"x".into()), FieldType::String);
        assert_eq!(infer_schema(&GuestValue::None), FieldType::String);
        assert_eq!(infer_schema(&GuestValue::List(vec![])), FieldType::String);
    }

    #[test]
    fn test_infer_two_levels_of_nesting() {
        let v = GuestValue::map([
            ("id", GuestValue::Int(1)),
            (
                "user",
                GuestValue::map([
                    ("name", "Jane".into()),
                    ("address", GuestValue::map([("zip", GuestValue::Int(75001))])),
                ]),
            ),
        ]);
        let expected = FieldType::Record(RecordSchema::new(vec![
            ("id".into(), FieldType::Int64),
            (
                "user".into(),
                FieldType::Record(RecordSchema::new(vec![
                    ("name".into(), FieldType::String),
                    (
                        "address".into(),
                        FieldType::Record(RecordSchema::new(vec![("zip".into(), FieldType::Int64)])),
                    ),
                ])),
            ),
        ]));
        assert_eq!(infer_schema(&v), expected);

        let value = infer_value(&v).unwrap();
        assert_eq!(value.field_type(), expected);
        let zip = value
            .as_record()
            .and_then(|r| r.get("user"))
            .and_then(TypedValue::as_record)
            .and_then(|r| r.get("address"))
            .and_then(TypedValue::as_record)
            .and_then(|r| r.get("zip"));
        assert_eq!(zip, Some(&TypedValue::Int64(75001)));
    }

    #[test]
    fn test_cast_from_type_hint() {
        let wide = TypedValue::Int64(0x1_0000_0005);
        assert_eq!(cast_from_type_hint(wide.clone(), &FieldType::Int32), TypedValue::Int32(5));
        assert_eq!(cast_from_type_hint(wide.clone(), &FieldType::Int64), wide);
        assert_eq!(
            cast_from_type_hint(TypedValue::Int64(70_000), &FieldType::Int16),
            TypedValue::Int16(70_000i64 as i16)
        );
        assert_eq!(
            cast_from_type_hint(TypedValue::Float64(1.5), &FieldType::Float32),
            TypedValue::Float32(1.5)
        );
        // not a narrowing: unchanged
        assert_eq!(
            cast_from_type_hint(TypedValue::String("7".into()), &FieldType::Int32),
            TypedValue::String("7".into())
        );
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(
            parse(&FieldType::Int16, &GuestValue::Int(70_000)),
            Err(MarshalError::ParseInt {
                ty: "INT16",
                text: "70000".into()
            })
        );
        assert!(matches!(
            parse(&FieldType::Float64, &"abc".into()),
            Err(MarshalError::ParseFloat { .. })
        ));
        assert!(matches!(
            parse(&FieldType::Bool, &"yes".into()),
            Err(MarshalError::ParseBool { .. })
        ));
        let schema = FieldType::Record(RecordSchema::new(vec![("a".into(), FieldType::Int64)]));
        assert!(matches!(
            parse(&schema, &"not json".into()),
            Err(MarshalError::InvalidJson { .. })
        ));
        assert!(matches!(
            parse(&schema, &"[1]".into()),
            Err(MarshalError::NotAMapping { found: "list" })
        ));
        assert_eq!(
            parse(&schema, &"{\"b\":1}".into()),
            Err(MarshalError::MissingField { field: "a".into() })
        );
    }

    #[test]
    fn test_parse_lenient_cases() {
        assert_eq!(parse(&FieldType::Int32, &GuestValue::None), Ok(None));
        assert_eq!(
            parse(&FieldType::Bool, &GuestValue::Bool(true)),
            Ok(Some(TypedValue::Bool(true)))
        );
        assert_eq!(
            parse(&FieldType::Int64, &" 42 ".into()),
            Ok(Some(TypedValue::Int64(42)))
        );
        assert_eq!(
            parse(&FieldType::String, &GuestValue::Int(5)),
            Ok(Some(TypedValue::String("5".into())))
        );
    }
}
