//! The host's schema-typed value model.

use std::fmt;

use serde_json::Value;

/// Declared type of a field or payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Bytes,
    String,
    Record(RecordSchema),
}

/// Ordered, named field types of a record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSchema {
    pub name: Option<String>,
    pub fields: Vec<(String, FieldType)>,
}

impl RecordSchema {
    pub fn new(fields: Vec<(String, FieldType)>) -> Self {
        Self { name: None, fields }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

impl FieldType {
    /// Upper-case type tag (`INT32`, `STRUCT`, ...).
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Int8 => "INT8",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
            Self::Bool => "BOOLEAN",
            Self::Bytes => "BYTES",
            Self::String => "STRING",
            Self::Record(_) => "STRUCT",
        }
    }

    /// Type name shown to guest scripts: the tag, with records presented as `JSON`.
    pub fn normalized_type_name(&self) -> &'static str {
        match self {
            Self::Record(_) => "JSON",
            other => other.type_tag(),
        }
    }

    /// Parse an upper- or lower-case type tag. `JSON` is accepted for
    /// `STRUCT`. Unknown tags fall back to `String`.
    pub fn from_type_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "INT8" => Self::Int8,
            "INT16" => Self::Int16,
            "INT32" => Self::Int32,
            "INT64" => Self::Int64,
            "FLOAT32" => Self::Float32,
            "FLOAT64" => Self::Float64,
            "BOOLEAN" | "BOOL" => Self::Bool,
            "BYTES" => Self::Bytes,
            "STRUCT" | "JSON" => Self::Record(RecordSchema::default()),
            _ => Self::String,
        }
    }

    /// Closed table from guest-native type names to field types.
    /// Anything not listed maps to `String`, including `dict`.
    pub fn from_native_type_name(name: &str) -> Self {
        match name {
            "str" | "string" => Self::String,
            "int16" | "short" => Self::Int16,
            "int32" => Self::Int32,
            "int" | "long" | "int64" => Self::Int64,
            "float32" => Self::Float32,
            "float" | "double" | "float64" => Self::Float64,
            "bool" | "boolean" => Self::Bool,
            "bytes" | "bytearray" => Self::Bytes,
            _ => Self::String,
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(schema) => {
                write!(f, "STRUCT{{")?;
                for (i, (name, ty)) in schema.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", name, ty)?;
                }
                write!(f, "}}")
            }
            other => f.write_str(other.type_tag()),
        }
    }
}

/// A host value of a concrete field type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    String(String),
    Record(Record),
}

impl TypedValue {
    /// The value's own type. Null record fields are typed `String`.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Int8(_) => FieldType::Int8,
            Self::Int16(_) => FieldType::Int16,
            Self::Int32(_) => FieldType::Int32,
            Self::Int64(_) => FieldType::Int64,
            Self::Float32(_) => FieldType::Float32,
            Self::Float64(_) => FieldType::Float64,
            Self::Bool(_) => FieldType::Bool,
            Self::Bytes(_) => FieldType::Bytes,
            Self::String(_) => FieldType::String,
            Self::Record(r) => FieldType::Record(r.schema()),
        }
    }

    /// Plain text of the value. Records use the quoted-field text encoding.
    pub fn to_text(&self) -> String {
        match self {
            Self::Int8(i) => i.to_string(),
            Self::Int16(i) => i.to_string(),
            Self::Int32(i) => i.to_string(),
            Self::Int64(i) => i.to_string(),
            Self::Float32(v) => format!("{:?}", v),
            Self::Float64(v) => format!("{:?}", v),
            Self::Bool(b) => b.to_string(),
            Self::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Self::String(s) => s.clone(),
            Self::Record(r) => crate::marshaller::record_to_text(r),
        }
    }

    pub fn to_json(&self) -> Value {
        crate::marshaller::to_guest(self).to_json()
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for TypedValue {
    fn from(i: i64) -> Self {
        Self::Int64(i)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Record> for TypedValue {
    fn from(r: Record) -> Self {
        Self::Record(r)
    }
}

/// Named fields in insertion order. A `None` field is null.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Option<TypedValue>)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Record::put`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.put(name, Some(value.into()));
        self
    }

    /// Set a field, replacing an existing one of the same name in place.
    pub fn put(&mut self, name: impl Into<String>, value: Option<TypedValue>) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// `None` when the field is absent or null.
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn fields(&self) -> &[(String, Option<TypedValue>)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Schema derived from the present values.
    pub fn schema(&self) -> RecordSchema {
        RecordSchema::new(
            self.fields
                .iter()
                .map(|(n, v)| {
                    let ty = v.as_ref().map(TypedValue::field_type).unwrap_or(FieldType::String);
                    (n.clone(), ty)
                })
                .collect(),
        )
    }
}
