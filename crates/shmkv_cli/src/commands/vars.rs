//! Variable commands: get, set, delete, exists.
//!
//! Values cross the command line as JSON and are stored as CBOR, so any
//! JSON document can be written. Reads go through the dynamic CBOR value,
//! so variables written by other programs print even when they use CBOR
//! types JSON lacks.

use super::{CommandResult, Format};
use serde_json::{Map, Number, Value};
use shmkv_core::{SegmentFacility, SegmentStore};
use std::io::Write;

/// Prints the value stored under `name`.
///
/// In text format a string value prints bare; everything else prints as
/// compact JSON.
pub fn get<F: SegmentFacility>(
    store: &SegmentStore<F>,
    name: &str,
    format: Format,
    out: &mut impl Write,
) -> CommandResult {
    let value = to_json(store.get(name)?);
    match (format, &value) {
        (Format::Text, Value::String(s)) => writeln!(out, "{s}")?,
        (Format::Text, other) => writeln!(out, "{other}")?,
        (Format::Json, other) => writeln!(out, "{}", serde_json::to_string_pretty(other)?)?,
    }
    Ok(())
}

/// Converts a stored CBOR value for display.
///
/// Byte strings become arrays of numbers, tags are dropped in favour of the
/// tagged value, non-text map keys are rendered as JSON text, and integers
/// outside the 64-bit range become decimal strings.
fn to_json(value: shmkv_core::Value) -> Value {
    use shmkv_core::Value as Cbor;

    match value {
        Cbor::Null => Value::Null,
        Cbor::Bool(b) => Value::Bool(b),
        Cbor::Integer(i) => {
            let wide = i128::from(i);
            if let Ok(n) = i64::try_from(wide) {
                Value::from(n)
            } else if let Ok(n) = u64::try_from(wide) {
                Value::from(n)
            } else {
                Value::String(wide.to_string())
            }
        }
        Cbor::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        Cbor::Text(s) => Value::String(s),
        Cbor::Bytes(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
        Cbor::Tag(_, inner) => to_json(*inner),
        Cbor::Array(items) => Value::Array(items.into_iter().map(to_json).collect()),
        Cbor::Map(entries) => {
            let mut map = Map::new();
            for (key, val) in entries {
                let key = match to_json(key) {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                map.insert(key, to_json(val));
            }
            Value::Object(map)
        }
        _ => Value::Null,
    }
}

/// Parses `json` and stores it under `name`.
pub fn set<F: SegmentFacility>(store: &mut SegmentStore<F>, name: &str, json: &str) -> CommandResult {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| format!("value for {name:?} is not valid JSON: {e}"))?;
    store.set(name, &value)?;
    Ok(())
}

/// Removes `name`.
pub fn delete<F: SegmentFacility>(store: &mut SegmentStore<F>, name: &str) -> CommandResult {
    store.delete(name)?;
    Ok(())
}

/// Prints `true` or `false`.
pub fn exists<F: SegmentFacility>(
    store: &SegmentStore<F>,
    name: &str,
    out: &mut impl Write,
) -> CommandResult {
    writeln!(out, "{}", store.exists(name)?)?;
    Ok(())
}
