//! Guest poll results → typed records.
//!
//! A poll result is a list of elements or a single element. Each element is
//! a mapping with `key` and `value` slots and an optional `offset`:
//!
//! ```text
//! {"key": 1234, "value": {"first_name": "John", "age": 25}, "offset": 17}
//! {"key": null, "value": {"type": "INT32", "data": 7}}
//! ```
//!
//! A slot holding exactly `type` and `data` is explicitly typed; anything
//! else has its type inferred. Missing slots are null.

use std::collections::BTreeMap;

use serde_json::Value;

use guesthost_script::GuestValue;

use crate::error::MarshalError;
use crate::marshaller::{cast_from_type_hint, infer_schema, infer_value, parse};
use crate::typed::{FieldType, RecordSchema, TypedValue};

pub const KEY_SLOT: &str = "key";
pub const VALUE_SLOT: &str = "value";
pub const OFFSET_SLOT: &str = "offset";
pub const TYPE_TAG: &str = "type";
pub const DATA_TAG: &str = "data";
/// Cursor field holding the most recent offset.
pub const LATEST: &str = "latest";

/// Opaque progress marker persisted by the caller between polls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cursor {
    entries: BTreeMap<String, GuestValue>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor holding only `{"latest": value}`.
    pub fn latest_of(value: GuestValue) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(LATEST.to_string(), value);
        Self { entries }
    }

    pub fn latest(&self) -> Option<&GuestValue> {
        self.entries.get(LATEST).filter(|v| !v.is_none())
    }

    pub fn get(&self, key: &str) -> Option<&GuestValue> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Guest mapping handed to init and poll callables.
    pub fn to_guest(&self) -> GuestValue {
        GuestValue::Map(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Mapping from storage. Non-mapping values give an empty cursor.
    pub fn from_guest(value: &GuestValue) -> Self {
        match value {
            GuestValue::Map(entries) => Self {
                entries: entries.iter().cloned().collect(),
            },
            _ => Self::default(),
        }
    }

    pub fn to_json(&self) -> Value {
        self.to_guest().to_json()
    }

    pub fn from_json(value: Value) -> Self {
        Self::from_guest(&GuestValue::from_json(value))
    }
}

/// One typed payload slot. `value` is `None` for null.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// `None` when the slot is null and carries no declared type.
    pub schema: Option<FieldType>,
    pub value: Option<TypedValue>,
}

impl Slot {
    pub fn null() -> Self {
        Self {
            schema: None,
            value: None,
        }
    }
}

/// Key and value of one produced record.
#[derive(Debug, Clone, PartialEq)]
pub struct PollRecord {
    pub key: Slot,
    pub value: Slot,
}

/// [`adapt_with_cursor`] starting from an empty cursor.
pub fn adapt(raw: &GuestValue, script_name: &str) -> Result<Vec<(PollRecord, Cursor)>, MarshalError> {
    adapt_with_cursor(raw, script_name, &Cursor::new())
}

/// Normalize a poll result into typed records, each paired with the cursor
/// after this batch: `{"latest": <last non-null offset>}`, or `previous` when
/// no element carries an offset.
///
/// A list is taken as-is and a mapping as a one-element batch. Any other
/// shape, or a list element that is not a mapping, fails the whole batch.
pub fn adapt_with_cursor(
    raw: &GuestValue,
    script_name: &str,
    previous: &Cursor,
) -> Result<Vec<(PollRecord, Cursor)>, MarshalError> {
    let elements: Vec<&GuestValue> = match raw {
        GuestValue::List(items) => items.iter().collect(),
        GuestValue::Map(_) => vec![raw],
        other => {
            return Err(MarshalError::UnexpectedResultShape {
                found: other.native_type_name(),
            })
        }
    };

    let mut records = Vec::with_capacity(elements.len());
    let mut latest = None;
    for element in elements {
        if !matches!(element, GuestValue::Map(_)) {
            return Err(MarshalError::NotAMapping {
                found: element.native_type_name(),
            });
        }
        if let Some(offset) = element.get(OFFSET_SLOT).filter(|o| !o.is_none()) {
            latest = Some(offset.clone());
        }
        records.push(PollRecord {
            key: resolve_slot(element.get(KEY_SLOT), &format!("{}.{}", script_name, KEY_SLOT))?,
            value: resolve_slot(element.get(VALUE_SLOT), &format!("{}.{}", script_name, VALUE_SLOT))?,
        });
    }

    let cursor = match latest {
        Some(offset) => Cursor::latest_of(offset),
        None => previous.clone(),
    };
    tracing::debug!(script = script_name, records = records.len(), "adapted poll result");
    Ok(records.into_iter().map(|r| (r, cursor.clone())).collect())
}

fn resolve_slot(slot: Option<&GuestValue>, record_name: &str) -> Result<Slot, MarshalError> {
    let Some(slot) = slot.filter(|s| !s.is_none()) else {
        return Ok(Slot::null());
    };

    if let Some((tag, data)) = explicit_type(slot) {
        let declared = FieldType::from_type_tag(tag);
        return match declared {
            // no field list in a tag: take the fields as inferred
            FieldType::Record(_) => {
                if data.is_none() {
                    return Ok(Slot {
                        schema: Some(FieldType::Record(RecordSchema::default().named(record_name))),
                        value: None,
                    });
                }
                if !matches!(data, GuestValue::Map(_)) {
                    return Err(MarshalError::NotAMapping {
                        found: data.native_type_name(),
                    });
                }
                Ok(inferred(data, record_name))
            }
            ty => {
                let value = narrowed(&ty, data)?;
                Ok(Slot {
                    schema: Some(ty),
                    value,
                })
            }
        };
    }

    Ok(inferred(slot, record_name))
}

/// Natural value narrowed to the declared width. Pairings the narrowing does
/// not cover (text under a numeric tag, an int under `STRING`) go through the
/// text parse.
fn narrowed(declared: &FieldType, data: &GuestValue) -> Result<Option<TypedValue>, MarshalError> {
    let Some(natural) = infer_value(data) else {
        return Ok(None);
    };
    let value = cast_from_type_hint(natural, declared);
    if value.field_type() == *declared {
        return Ok(Some(value));
    }
    parse(declared, data)
}

fn inferred(value: &GuestValue, record_name: &str) -> Slot {
    let schema = match infer_schema(value) {
        FieldType::Record(schema) => FieldType::Record(schema.named(record_name)),
        other => other,
    };
    Slot {
        schema: Some(schema),
        value: infer_value(value),
    }
}

/// `{"type": "<tag>", "data": ...}` and nothing else.
fn explicit_type(slot: &GuestValue) -> Option<(&str, &GuestValue)> {
    match slot {
        GuestValue::Map(entries) if entries.len() == 2 => {
            let tag = slot.get(TYPE_TAG)?.as_str()?;
            let data = slot.get(DATA_TAG)?;
            Some((tag, data))
        }
        _ => None,
    }
}
