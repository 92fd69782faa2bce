//! Field Accessor
//!
//! Uniform read of a named field from either a JSON mapping or a typed
//! resource struct.

use crate::error::CommandError;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A resource that can report its fields by name
///
/// Mapping-shaped resources (`serde_json::Value` objects, `Map`) get this for
/// free. Typed resources implement it once per kind:
///
/// ```ignore
/// impl FieldSource for Server {
///     fn field(&self, name: &str) -> Option<Value> {
///         match name {
///             "id" => Some(Value::from(self.id.clone())),
///             "name" => Some(Value::from(self.name.clone())),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait FieldSource {
    /// Value of `name`, or `None` when the resource doesn't carry it
    fn field(&self, name: &str) -> Option<Value>;
}

impl FieldSource for Value {
    fn field(&self, name: &str) -> Option<Value> {
        self.as_object().and_then(|map| map.get(name)).cloned()
    }
}

impl FieldSource for Map<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<T: FieldSource + ?Sized> FieldSource for &T {
    fn field(&self, name: &str) -> Option<Value> {
        (**self).field(name)
    }
}

impl<T: FieldSource + ?Sized> FieldSource for Box<T> {
    fn field(&self, name: &str) -> Option<Value> {
        (**self).field(name)
    }
}

/// Read `field` from `item`, failing when it is absent
pub fn get_field<R: FieldSource + ?Sized>(item: &R, field: &str) -> Result<Value, CommandError> {
    item.field(field)
        .ok_or_else(|| CommandError::field_not_found(field))
}

/// Read `field` from `item`, falling back to `default` when it is absent
pub fn get_field_or<R: FieldSource + ?Sized>(item: &R, field: &str, default: Value) -> Value {
    item.field(field).unwrap_or(default)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over field values
///
/// Values of different types order by type (null, bool, number, string,
/// array, object). Objects compare equal to each other.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ord = compare_values(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
