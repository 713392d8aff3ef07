//! Values mirroring the structural type shapes, plus comparison and a
//! JSON projection.

use indexmap::IndexMap;
use serde_json::Number;

/// A value in the structural model.
///
/// The shape mirrors [`crate::schema::Type`] variant for variant, with
/// one addition: [`Value::Null`] stands for an absent optional (or an
/// unresolvable default) and is its own variant rather than an
/// `Option` wrapper, so containers can hold absence directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit absence.
    Null,
    /// Boolean.
    Bool(bool),
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 32-bit unsigned integer.
    U32(u32),
    /// 64-bit unsigned integer.
    U64(u64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// UTF-8 string.
    Str(String),
    /// Raw byte string.
    Bytes(Vec<u8>),
    /// Record value keyed by field id.
    Product(IndexMap<String, Value>),
    /// Tagged-choice value.
    Sum {
        /// The selected variant's tag.
        tag: String,
        /// The variant's payload, if it carries one.
        payload: Option<Box<Value>>,
    },
    /// Ordered collection.
    List(Vec<Value>),
    /// Keyed collection as an ordered entry list; keys are arbitrary
    /// values, so no map structure is imposed.
    Map(Vec<(Value, Value)>),
}

/// Deep structural equality.
///
/// Products compare as keyed sets (field order does not matter); maps
/// compare as ordered entry sequences, so the same entries in a
/// different order are unequal. Sums compare tag first, then payload;
/// two payload-less values with the same tag are equal. Values of
/// different variants are never equal.
pub fn value_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::I32(x), Value::I32(y)) => x == y,
        (Value::I64(x), Value::I64(y)) => x == y,
        (Value::U32(x), Value::U32(y)) => x == y,
        (Value::U64(x), Value::U64(y)) => x == y,
        (Value::F32(x), Value::F32(y)) => x == y,
        (Value::F64(x), Value::F64(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::Product(x), Value::Product(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(id, value)| y.get(id).is_some_and(|other| value_equals(value, other)))
        }
        (
            Value::Sum {
                tag: tag_a,
                payload: payload_a,
            },
            Value::Sum {
                tag: tag_b,
                payload: payload_b,
            },
        ) => {
            tag_a == tag_b
                && match (payload_a, payload_b) {
                    (None, None) => true,
                    (Some(x), Some(y)) => value_equals(x, y),
                    _ => false,
                }
        }
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(va, vb)| value_equals(va, vb))
        }
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|((ka, va), (kb, vb))| value_equals(ka, kb) && value_equals(va, vb))
        }
        _ => false,
    }
}

/// Project a value into `serde_json::Value`.
///
/// Sums become a single-key object `{tag: payload}` with `null` for a
/// missing payload; maps become an array of `[key, value]` pairs since
/// keys need not be strings; bytes become an array of integers;
/// non-finite floats become `null`.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(v) => serde_json::Value::Bool(*v),
        Value::I32(v) => serde_json::Value::Number((*v).into()),
        Value::I64(v) => serde_json::Value::Number((*v).into()),
        Value::U32(v) => serde_json::Value::Number((*v).into()),
        Value::U64(v) => serde_json::Value::Number((*v).into()),
        Value::F32(v) => float_to_json(f64::from(*v)),
        Value::F64(v) => float_to_json(*v),
        Value::Str(v) => serde_json::Value::String(v.clone()),
        Value::Bytes(v) => {
            serde_json::Value::Array(v.iter().map(|b| serde_json::Value::Number((*b).into())).collect())
        }
        Value::Product(fields) => {
            let mut object = serde_json::Map::new();
            for (id, field) in fields {
                object.insert(id.clone(), value_to_json(field));
            }
            serde_json::Value::Object(object)
        }
        Value::Sum { tag, payload } => {
            let inner = payload
                .as_deref()
                .map_or(serde_json::Value::Null, value_to_json);
            let mut object = serde_json::Map::new();
            object.insert(tag.clone(), inner);
            serde_json::Value::Object(object)
        }
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => serde_json::Value::Array(
            entries
                .iter()
                .map(|(key, val)| {
                    serde_json::Value::Array(vec![value_to_json(key), value_to_json(val)])
                })
                .collect(),
        ),
    }
}

fn float_to_json(value: f64) -> serde_json::Value {
    Number::from_f64(value).map_or(serde_json::Value::Null, serde_json::Value::Number)
}
