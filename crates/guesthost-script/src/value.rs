//! Dynamically-typed values as they cross the guest boundary.

use serde_json::{Map, Number, Value};

/// JSON object key marking a byte string on the wire (`{"$bytes": "<hex>"}`).
pub const BYTES_TAG: &str = "$bytes";

/// A guest-native value. Mappings keep the guest's key order.
#[derive(Debug, Clone, PartialEq)]
pub enum GuestValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<GuestValue>),
    Map(Vec<(String, GuestValue)>),
}

impl GuestValue {
    /// Guest-side type name of the value (`int`, `float`, `str`, `dict`, ...).
    pub fn native_type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "dict",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Look up a key in a mapping. `None` for missing keys and non-mappings.
    pub fn get(&self, key: &str) -> Option<&GuestValue> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Build a mapping from `(key, value)` pairs.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, GuestValue)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Textual form, as the guest would print it. Containers render as JSON so
    /// the text can be decoded back into fields.
    pub fn to_text(&self) -> String {
        match self {
            Self::None => "None".to_string(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format!("{:?}", f),
            Self::Str(s) => s.clone(),
            Self::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Self::List(_) | Self::Map(_) => self.to_json().to_string(),
        }
    }

    /// Wire encoding. Bytes become `{"$bytes": hex}`; non-finite floats become null.
    pub fn to_json(&self) -> Value {
        match self {
            Self::None => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Self::Str(s) => Value::String(s.clone()),
            Self::Bytes(b) => {
                let mut m = Map::new();
                m.insert(BYTES_TAG.to_string(), Value::String(hex::encode(b)));
                Value::Object(m)
            }
            Self::List(items) => Value::Array(items.iter().map(GuestValue::to_json).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Decode the wire encoding. Integers outside `i64` are kept as text.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if n.is_u64() {
                    Self::Str(n.to_string())
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            Value::Object(m) => {
                if m.len() == 1 {
                    if let Some(Value::String(h)) = m.get(BYTES_TAG) {
                        if let Ok(bytes) = hex::decode(h) {
                            return Self::Bytes(bytes);
                        }
                    }
                }
                Self::Map(m.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect())
            }
        }
    }
}

impl From<&str> for GuestValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for GuestValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for GuestValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for GuestValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for GuestValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_key_order() {
        let v = GuestValue::from_json(json!({"z": 1, "a": 2, "m": 3}));
        let GuestValue::Map(entries) = v else {
            panic!("expected a mapping");
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_bytes_wire_tag() {
        let v = GuestValue::Bytes(vec![4, 0]);
        assert_eq!(v.to_json(), json!({"$bytes": "0400"}));
        assert_eq!(GuestValue::from_json(json!({"$bytes": "0400"})), v);
        // not hex: stays a mapping
        assert!(matches!(
            GuestValue::from_json(json!({"$bytes": "zz"})),
            GuestValue::Map(_)
        ));
    }

    #[test]
    fn test_numbers_from_json() {
        assert_eq!(GuestValue::from_json(json!(25)), GuestValue::Int(25));
        assert_eq!(GuestValue::from_json(json!(1.0)), GuestValue::Float(1.0));
        assert_eq!(
            GuestValue::from_json(json!(u64::MAX)),
            GuestValue::Str(u64::MAX.to_string())
        );
    }

    #[test]
    fn test_to_text() {
        assert_eq!(GuestValue::Bool(true).to_text(), "True");
        assert_eq!(GuestValue::Float(1.0).to_text(), "1.0");
        assert_eq!(GuestValue::Int(-7).to_text(), "-7");
        assert_eq!(GuestValue::None.to_text(), "None");
        assert_eq!(
            GuestValue::map([("a", GuestValue::Int(1))]).to_text(),
            "{\"a\":1}"
        );
    }

    #[test]
    fn test_get_and_type_names() {
        let v = GuestValue::map([("key", GuestValue::None), ("value", "Hello".into())]);
        assert_eq!(v.get("value").and_then(GuestValue::as_str), Some("Hello"));
        assert!(v.get("key").unwrap().is_none());
        assert_eq!(v.get("missing"), None);
        assert_eq!(v.native_type_name(), "dict");
        assert_eq!(GuestValue::Bytes(vec![]).native_type_name(), "bytes");
    }
}
