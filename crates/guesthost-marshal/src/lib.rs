//! Host-side typed records and their conversion to and from guest values.
//!
//! - `typed`: `FieldType`, `TypedValue`, `Record`
//! - `marshaller`: host → guest, inference, typed parse, numeric narrowing
//! - `poll`: turns a guest poll result into typed records plus a cursor

pub mod error;
pub mod marshaller;
pub mod poll;
pub mod typed;

pub use error::MarshalError;
pub use marshaller::{cast_from_type_hint, infer_schema, infer_value, parse, record_to_text, to_guest};
pub use poll::{adapt, adapt_with_cursor, Cursor, PollRecord, Slot};
pub use typed::{FieldType, Record, RecordSchema, TypedValue};
